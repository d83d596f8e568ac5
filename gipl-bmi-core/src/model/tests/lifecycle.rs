//! Phase transitions, engine binding and failure handling.

use super::{config_path, initialized_gipl};
use crate::engine::{Engine, EngineBinding};
use crate::errors::BmiError;
use crate::model::{ModelAdapter, Phase};
use crate::reference_engine::ReferenceEngine;
use crate::testing::MapEngine;
use crate::value::Value;
use ndarray::Array2;
use std::cell::Cell;
use std::io::Write;
use std::rc::Rc;

fn is_lifecycle<T>(result: Result<T, BmiError>) -> bool {
    matches!(result, Err(BmiError::Lifecycle { .. }))
}

#[test]
fn operations_before_initialize() {
    let mut model = ModelAdapter::gipl(ReferenceEngine::new()).unwrap();
    assert_eq!(model.phase(), Phase::Uninitialized);

    assert!(is_lifecycle(model.get_value("soil__temperature")));
    assert!(is_lifecycle(model.get_value_at_indices("soil__temperature", &[0])));
    assert!(is_lifecycle(model.set_value("model__end_time", Value::scalar(1.0))));
    assert!(is_lifecycle(model.update()));
    assert!(is_lifecycle(model.update_until(3.0)));
    assert!(is_lifecycle(model.get_current_time()));
    assert!(is_lifecycle(model.get_grid_shape("site_by_depth")));
    assert!(is_lifecycle(model.publish_output()));
    assert!(is_lifecycle(model.finalize()));

    assert_eq!(model.phase(), Phase::Uninitialized);
    // The adapter is still usable
    model.initialize(config_path()).unwrap();
    assert_eq!(model.phase(), Phase::Initialized);
}

#[test]
fn lifecycle_error_names_operation_and_phase() {
    let model = ModelAdapter::gipl(ReferenceEngine::new()).unwrap();
    let err = model.get_value("soil__temperature").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cannot get_value while the model is uninitialized"
    );
}

#[test]
fn operations_after_finalize() {
    let mut model = initialized_gipl();
    model.finalize().unwrap();
    assert_eq!(model.phase(), Phase::Finalized);
    assert!(model.engine().is_none());

    assert!(is_lifecycle(model.get_value("soil__temperature")));
    assert!(is_lifecycle(model.set_value("model__end_time", Value::scalar(1.0))));
    assert!(is_lifecycle(model.update()));
    assert!(is_lifecycle(model.finalize()));
    assert!(is_lifecycle(model.initialize(config_path())));
    assert_eq!(model.phase(), Phase::Finalized);

    // Static metadata stays available
    assert_eq!(model.get_var_units("soil__depth").unwrap(), "m");
}

#[test]
fn initialize_twice() {
    let mut model = initialized_gipl();
    assert!(is_lifecycle(model.initialize(config_path())));
    assert_eq!(model.phase(), Phase::Initialized);
    assert_eq!(model.get_current_time().unwrap(), 0.0);
}

#[test]
fn bad_configuration_paths() {
    let mut model = ModelAdapter::gipl(ReferenceEngine::new()).unwrap();
    let dir = tempfile::tempdir().unwrap();

    for path in [
        std::path::PathBuf::new(),
        dir.path().join("missing.toml"),
        dir.path().to_path_buf(),
    ] {
        let err = model.initialize(&path).unwrap_err();
        assert!(matches!(err, BmiError::Config { .. }), "{:?}", err);
        assert_eq!(model.phase(), Phase::Uninitialized);
    }
}

#[test]
fn engine_rejecting_configuration() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"n_site = 0\nn_grd = 3\nn_time = 12\ntime_e = 1.0\ntime_step = 1.0\ninitial_temperature = 0.0\n")
        .unwrap();

    let engine = ReferenceEngine::new();
    let id = engine.binding_id().to_string();
    let mut model = ModelAdapter::gipl(engine).unwrap();
    let err = model.initialize(file.path()).unwrap_err();
    assert!(matches!(err, BmiError::Config { .. }));
    assert_eq!(model.phase(), Phase::Uninitialized);
    // The claim on the engine is released again
    assert!(!EngineBinding::is_bound(&id));
}

#[test]
fn second_adapter_on_same_engine_is_rejected() {
    let mut first = ModelAdapter::gipl(ReferenceEngine::with_binding_id("gipl-shared")).unwrap();
    let mut second = ModelAdapter::gipl(ReferenceEngine::with_binding_id("gipl-shared")).unwrap();

    first.initialize(config_path()).unwrap();
    let err = second.initialize(config_path()).unwrap_err();
    assert!(matches!(err, BmiError::Lifecycle { .. }));
    assert_eq!(second.phase(), Phase::Uninitialized);

    // Released on finalize
    first.finalize().unwrap();
    second.initialize(config_path()).unwrap();
    assert_eq!(second.phase(), Phase::Initialized);
}

#[test]
fn binding_released_on_drop() {
    let mut model = ModelAdapter::gipl(ReferenceEngine::with_binding_id("gipl-dropped")).unwrap();
    model.initialize(config_path()).unwrap();
    assert!(EngineBinding::is_bound("gipl-dropped"));
    drop(model);
    assert!(!EngineBinding::is_bound("gipl-dropped"));
}

#[test]
fn drop_finalizes_the_engine() {
    let module = Rc::new(Cell::new(false));

    let mut first =
        ModelAdapter::gipl(MapEngine::new("gipl-module").sharing_module(&module)).unwrap();
    first.initialize(config_path()).unwrap();
    assert!(module.get());
    drop(first);
    assert!(!module.get());
    assert!(!EngineBinding::is_bound("gipl-module"));

    // A new adapter finds the module arrays released
    let mut second =
        ModelAdapter::gipl(MapEngine::new("gipl-module").sharing_module(&module)).unwrap();
    second.initialize(config_path()).unwrap();
    assert_eq!(second.phase(), Phase::Initialized);
}

#[test]
fn drop_after_finalize_does_not_finalize_again() {
    let module = Rc::new(Cell::new(false));
    let mut model =
        ModelAdapter::gipl(MapEngine::new("gipl-module-finalized").sharing_module(&module))
            .unwrap();
    model.initialize(config_path()).unwrap();
    model.finalize().unwrap();

    // Another engine on the same module starts while the finalized adapter is alive
    let mut other =
        ModelAdapter::gipl(MapEngine::new("gipl-module-finalized").sharing_module(&module))
            .unwrap();
    other.initialize(config_path()).unwrap();
    drop(model);
    assert!(module.get());
    assert_eq!(other.phase(), Phase::Initialized);
}

#[test]
fn independent_engines_coexist() {
    let mut a = initialized_gipl();
    let b = initialized_gipl();
    a.update().unwrap();
    assert_eq!(a.get_current_time().unwrap(), 1.0);
    assert_eq!(b.get_current_time().unwrap(), 0.0);
}

#[test]
fn engine_failure_poisons_the_adapter() {
    let mut model =
        ModelAdapter::gipl(ReferenceEngine::with_binding_id("gipl-failing").with_failure_after(2))
            .unwrap();
    model.initialize(config_path()).unwrap();

    let err = model.update_until(10.0).unwrap_err();
    assert!(err.is_engine_failure());
    assert_eq!(model.phase(), Phase::Failed);

    assert!(is_lifecycle(model.get_value("soil__temperature")));
    assert!(is_lifecycle(model.update()));
    assert!(is_lifecycle(model.get_grid_size("scalar")));

    // Finalize still releases the engine
    model.finalize().unwrap();
    assert_eq!(model.phase(), Phase::Finalized);
    assert!(!EngineBinding::is_bound("gipl-failing"));
}

#[test]
fn failed_read_poisons_the_adapter() {
    let engine = MapEngine::new("gipl-unreadable")
        .with_value("time_loop", Value::scalar(0.0))
        .with_unreadable("temp");
    let mut model = ModelAdapter::gipl(engine).unwrap();
    model.initialize(config_path()).unwrap();

    let err = model.get_value("soil__temperature").unwrap_err();
    assert!(err.is_engine_failure(), "{:?}", err);
    assert_eq!(model.phase(), Phase::Failed);

    assert!(is_lifecycle(model.get_current_time()));
    assert!(is_lifecycle(model.update()));
    assert!(is_lifecycle(model.initialize(config_path())));

    model.finalize().unwrap();
    assert_eq!(model.phase(), Phase::Finalized);
    assert!(!EngineBinding::is_bound("gipl-unreadable"));
}

#[test]
fn registry_errors_do_not_poison() {
    let mut model = initialized_gipl();
    assert!(model.get_value("soil__moisture").is_err());
    assert!(model
        .set_value("soil__temperature", Value::Float(Array2::zeros((1, 1)).into_dyn()))
        .is_err());
    assert_eq!(model.phase(), Phase::Initialized);
}
