//! Integration tests for the model adapter.
//!
//! These tests drive a [`ModelAdapter`] around the reference engine through the
//! full initialize, step, read/write and finalize workflow.

use crate::grid::GridKind;
use crate::model::ModelAdapter;
use crate::reference_engine::ReferenceEngine;
use crate::schema::{GridSpec, Schema, SchemaConfig, VariableSpec};
use crate::value::ElementType;
use crate::variable::Direction;
use std::path::PathBuf;

#[cfg(test)]
mod lifecycle;

/// Five sites, three soil levels, twelve forcing slots, 36 monthly steps.
fn config_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/gipl_config_3yr.toml")
}

fn initialized_gipl() -> ModelAdapter<ReferenceEngine> {
    let mut model = ModelAdapter::gipl(ReferenceEngine::new()).unwrap();
    model.initialize(config_path()).unwrap();
    model
}

/// A reduced schema naming the soil temperature `soil_temperature`.
fn soil_schema() -> Schema {
    let mut config = SchemaConfig::gipl();
    config.grids = vec![
        GridSpec {
            id: "scalar".to_string(),
            kind: GridKind::Point,
        },
        GridSpec {
            id: "site_by_depth".to_string(),
            kind: GridKind::Rectilinear,
        },
    ];
    config.aliases.clear();
    config.variables = vec![VariableSpec {
        name: "soil_temperature".to_string(),
        internal_name: "temp".to_string(),
        units: "deg_C".to_string(),
        grid: "site_by_depth".to_string(),
        direction: Direction::Both,
        element_type: ElementType::F64,
    }];
    for (name, internal) in [
        ("model__start_time", "time_s"),
        ("model__current_time", "time_loop"),
        ("model__end_time", "time_e"),
        ("model__time_step", "time_step"),
    ] {
        config.variables.push(VariableSpec {
            name: name.to_string(),
            internal_name: internal.to_string(),
            units: "month".to_string(),
            grid: "scalar".to_string(),
            direction: Direction::Output,
            element_type: ElementType::F64,
        });
    }
    config.build().unwrap()
}

fn initialized_soil() -> ModelAdapter<ReferenceEngine> {
    let mut model = ModelAdapter::new(ReferenceEngine::new(), soil_schema());
    model.initialize(config_path()).unwrap();
    model
}
