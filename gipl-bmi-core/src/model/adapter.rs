//! The public coupling surface.

use crate::accessor::{ValueAccessor, ValueAccessorMut};
use crate::engine::{Engine, EngineBinding, EngineHandle};
use crate::errors::{BmiError, BmiResult};
use crate::grid::{GridKind, GridRegistry};
use crate::schema::Schema;
use crate::standard_variables::gipl_schema;
use crate::time::TimeController;
use crate::value::Value;
use crate::variable::VariableRegistry;
use std::cell::Cell;
use std::fmt;
use std::path::Path;

/// Lifecycle phase of a [`ModelAdapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Initialized,
    /// The engine reported a failure. Only [`ModelAdapter::finalize`] is allowed.
    Failed,
    Finalized,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Uninitialized => "uninitialized",
            Phase::Initialized => "initialized",
            Phase::Failed => "failed",
            Phase::Finalized => "finalized",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug)]
enum Lifecycle<E> {
    Uninitialized(E),
    Initialized(EngineHandle<E>),
    Failed(EngineHandle<E>),
    Finalized,
}

impl<E: Engine> Lifecycle<E> {
    fn phase(&self) -> Phase {
        match self {
            Lifecycle::Uninitialized(_) => Phase::Uninitialized,
            Lifecycle::Initialized(_) => Phase::Initialized,
            Lifecycle::Failed(_) => Phase::Failed,
            Lifecycle::Finalized => Phase::Finalized,
        }
    }

    fn live(&self, operation: &str) -> BmiResult<&EngineHandle<E>> {
        match self {
            Lifecycle::Initialized(handle) => Ok(handle),
            other => Err(lifecycle_error(operation, other.phase())),
        }
    }

    fn live_mut(&mut self, operation: &str) -> BmiResult<&mut EngineHandle<E>> {
        match self {
            Lifecycle::Initialized(handle) => Ok(handle),
            other => Err(lifecycle_error(operation, other.phase())),
        }
    }
}

fn lifecycle_error(operation: &str, phase: Phase) -> BmiError {
    BmiError::Lifecycle {
        operation: operation.to_string(),
        phase: phase.to_string(),
    }
}

/// Checks that `path` names an existing regular file.
fn check_config_path(path: &Path) -> BmiResult<()> {
    let display = path.display().to_string();
    if display.is_empty() {
        return Err(BmiError::config(display, "no configuration file given"));
    }
    let metadata = std::fs::metadata(path).map_err(|e| BmiError::config(&display, e.to_string()))?;
    if !metadata.is_file() {
        return Err(BmiError::config(display, "not a regular file"));
    }
    Ok(())
}

/// Adapter exposing an [`Engine`] through the coupling interface.
///
/// Variables and grids are described by a [`Schema`]; every query and accessor
/// resolves names through it. The adapter moves through the phases
/// `Uninitialized -> Initialized -> Finalized`. Value, time and grid-shape operations
/// are only available while `Initialized`; static metadata (names, units, grids,
/// types) can be queried in any phase.
///
/// An [`BmiError::EngineFailure`] returned by any operation moves the adapter to
/// [`Phase::Failed`], after which only [`ModelAdapter::finalize`] succeeds.
///
/// Dropping an initialized adapter finalizes the engine before its binding is
/// released.
///
/// # Example
///
/// ```no_run
/// use gipl_bmi_core::model::ModelAdapter;
/// use gipl_bmi_core::reference_engine::ReferenceEngine;
///
/// let mut model = ModelAdapter::gipl(ReferenceEngine::new()).unwrap();
/// model.initialize("gipl_config.toml").unwrap();
///
/// model.update_until(12.0).unwrap();
/// let temperature = model.get_value("soil__temperature").unwrap();
/// println!("{:?}", temperature.shape());
///
/// model.finalize().unwrap();
/// ```
#[derive(Debug)]
pub struct ModelAdapter<E: Engine> {
    component_name: String,
    grids: GridRegistry,
    variables: VariableRegistry,
    time: TimeController,
    state: Lifecycle<E>,
    // Set when a read reports an engine failure; applied on the next `&mut self` call
    read_failed: Cell<bool>,
}

impl<E: Engine> ModelAdapter<E> {
    pub fn new(engine: E, schema: Schema) -> Self {
        Self {
            component_name: schema.component_name,
            grids: schema.grids,
            variables: schema.variables,
            time: schema.time,
            state: Lifecycle::Uninitialized(engine),
            read_failed: Cell::new(false),
        }
    }

    /// Adapter using the standard GIPL variables.
    pub fn gipl(engine: E) -> BmiResult<Self> {
        Ok(Self::new(engine, gipl_schema()?))
    }

    pub fn phase(&self) -> Phase {
        match self.state.phase() {
            Phase::Initialized if self.read_failed.get() => Phase::Failed,
            phase => phase,
        }
    }

    /// The wrapped engine, unless the adapter has been finalized.
    pub fn engine(&self) -> Option<&E> {
        match &self.state {
            Lifecycle::Uninitialized(engine) => Some(engine),
            Lifecycle::Initialized(handle) | Lifecycle::Failed(handle) => Some(handle.engine()),
            Lifecycle::Finalized => None,
        }
    }

    pub fn variables(&self) -> &VariableRegistry {
        &self.variables
    }

    pub fn grids(&self) -> &GridRegistry {
        &self.grids
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Initialize the engine from a configuration file.
    ///
    /// # Errors
    ///
    /// * [`BmiError::Config`] if the path is empty, missing, not a regular file or
    ///   rejected by the engine. The adapter stays uninitialized.
    /// * [`BmiError::Lifecycle`] if the adapter is not uninitialized or another adapter
    ///   holds the engine instance.
    pub fn initialize(&mut self, config: impl AsRef<Path>) -> BmiResult<()> {
        self.settle_read_failure();
        let path = config.as_ref();
        let mut engine = match std::mem::replace(&mut self.state, Lifecycle::Finalized) {
            Lifecycle::Uninitialized(engine) => engine,
            other => {
                let phase = other.phase();
                self.state = other;
                return Err(lifecycle_error("initialize", phase));
            }
        };

        match Self::start(&mut engine, path) {
            Ok(binding) => {
                log::info!(
                    "{} initialized from '{}'",
                    self.component_name,
                    path.display()
                );
                self.state = Lifecycle::Initialized(EngineHandle::new(engine, binding));
                Ok(())
            }
            Err(err) => {
                log::warn!("{} failed to initialize: {}", self.component_name, err);
                self.state = Lifecycle::Uninitialized(engine);
                Err(err)
            }
        }
    }

    fn start(engine: &mut E, path: &Path) -> BmiResult<EngineBinding> {
        check_config_path(path)?;
        let binding = EngineBinding::acquire(engine.binding_id())?;
        engine.initialize(path).map_err(|err| match err {
            BmiError::Config { .. } => err,
            other => BmiError::config(path.display().to_string(), other.to_string()),
        })?;
        Ok(binding)
    }

    /// Release the engine.
    ///
    /// A failed adapter releases its binding without calling back into the engine.
    /// The adapter is finalized afterwards even if the engine reports an error.
    pub fn finalize(&mut self) -> BmiResult<()> {
        self.settle_read_failure();
        match std::mem::replace(&mut self.state, Lifecycle::Finalized) {
            Lifecycle::Initialized(mut handle) => {
                let result = handle.engine_mut().finalize();
                log::info!(
                    "{} finalized, released engine '{}'",
                    self.component_name,
                    handle.binding_id()
                );
                result
            }
            Lifecycle::Failed(handle) => {
                log::info!(
                    "{} finalized after failure, released engine '{}'",
                    self.component_name,
                    handle.binding_id()
                );
                Ok(())
            }
            other => {
                let phase = other.phase();
                self.state = other;
                Err(lifecycle_error("finalize", phase))
            }
        }
    }

    fn poison_on_failure<T>(&mut self, result: BmiResult<T>) -> BmiResult<T> {
        if let Err(err) = &result {
            if err.is_engine_failure() {
                log::warn!("{} engine failure: {}", self.component_name, err);
                self.mark_failed();
            }
        }
        result
    }

    fn mark_failed(&mut self) {
        self.state = match std::mem::replace(&mut self.state, Lifecycle::Finalized) {
            Lifecycle::Initialized(handle) => Lifecycle::Failed(handle),
            other => other,
        };
    }

    /// Move to `Failed` if a read has reported an engine failure.
    fn settle_read_failure(&mut self) {
        if self.read_failed.replace(false) {
            self.mark_failed();
        }
    }

    /// Record an engine failure seen by a read-only operation.
    fn observe<T>(&self, result: BmiResult<T>) -> BmiResult<T> {
        if let Err(err) = &result {
            if err.is_engine_failure() {
                log::warn!("{} engine failure: {}", self.component_name, err);
                self.read_failed.set(true);
            }
        }
        result
    }

    fn values(&self, operation: &str) -> BmiResult<ValueAccessor<'_, E>> {
        if self.read_failed.get() {
            return Err(lifecycle_error(operation, Phase::Failed));
        }
        let handle = self.state.live(operation)?;
        Ok(ValueAccessor::new(&self.variables, handle.engine()))
    }

    // ------------------------------------------------------------------
    // Variable metadata
    // ------------------------------------------------------------------

    pub fn get_component_name(&self) -> &str {
        &self.component_name
    }

    pub fn get_input_var_names(&self) -> Vec<&str> {
        self.variables.list_input_names()
    }

    pub fn get_output_var_names(&self) -> Vec<&str> {
        self.variables.list_output_names()
    }

    pub fn get_var_units(&self, name: &str) -> BmiResult<&str> {
        self.variables.units_of(name)
    }

    pub fn get_var_grid(&self, name: &str) -> BmiResult<&str> {
        self.variables.grid_of(name).map(|grid| grid.as_str())
    }

    /// Element type name, `float64` or `int64`.
    pub fn get_var_type(&self, name: &str) -> BmiResult<&'static str> {
        self.variables
            .element_type_of(name)
            .map(|element_type| element_type.bmi_name())
    }

    pub fn get_var_itemsize(&self, name: &str) -> BmiResult<usize> {
        self.variables
            .element_type_of(name)
            .map(|element_type| element_type.itemsize())
    }

    pub fn get_var_nbytes(&self, name: &str) -> BmiResult<usize> {
        self.observe(self.values("get_var_nbytes")?.get_nbytes(name))
    }

    // ------------------------------------------------------------------
    // Grids
    // ------------------------------------------------------------------

    pub fn get_grid_type(&self, grid: &str) -> BmiResult<GridKind> {
        self.grids.kind_of(grid)
    }

    pub fn get_grid_shape(&self, grid: &str) -> BmiResult<Vec<usize>> {
        let values = self.values("get_grid_shape")?;
        self.observe(self.grids.shape_of(grid, Some(&values)))
    }

    pub fn get_grid_rank(&self, grid: &str) -> BmiResult<usize> {
        let values = self.values("get_grid_rank")?;
        self.observe(self.grids.rank_of(grid, Some(&values)))
    }

    pub fn get_grid_size(&self, grid: &str) -> BmiResult<usize> {
        let values = self.values("get_grid_size")?;
        self.observe(self.grids.size_of(grid, Some(&values)))
    }

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    pub fn get_value(&self, name: &str) -> BmiResult<Value> {
        self.observe(self.values("get_value")?.get_value(name))
    }

    pub fn get_value_at_indices(&self, name: &str, indices: &[usize]) -> BmiResult<Value> {
        self.observe(
            self.values("get_value_at_indices")?
                .get_value_at_indices(name, indices),
        )
    }

    pub fn set_value(&mut self, name: &str, value: Value) -> BmiResult<()> {
        self.settle_read_failure();
        let engine = self.state.live_mut("set_value")?.engine_mut();
        let result = ValueAccessorMut::new(&self.variables, engine).set_value(name, value);
        self.poison_on_failure(result)
    }

    pub fn set_value_at_indices(
        &mut self,
        name: &str,
        indices: &[usize],
        values: &Value,
    ) -> BmiResult<()> {
        self.settle_read_failure();
        let engine = self.state.live_mut("set_value_at_indices")?.engine_mut();
        let result =
            ValueAccessorMut::new(&self.variables, engine).set_value_at_indices(name, indices, values);
        self.poison_on_failure(result)
    }

    // ------------------------------------------------------------------
    // Time
    // ------------------------------------------------------------------

    pub fn get_start_time(&self) -> BmiResult<f64> {
        self.observe(self.time.start_time(&self.values("get_start_time")?))
    }

    pub fn get_current_time(&self) -> BmiResult<f64> {
        self.observe(self.time.current_time(&self.values("get_current_time")?))
    }

    pub fn get_end_time(&self) -> BmiResult<f64> {
        self.observe(self.time.end_time(&self.values("get_end_time")?))
    }

    pub fn get_time_step(&self) -> BmiResult<f64> {
        self.observe(self.time.time_step(&self.values("get_time_step")?))
    }

    pub fn get_time_units(&self) -> &str {
        self.time.time_units()
    }

    /// Advance the engine by one time step.
    pub fn update(&mut self) -> BmiResult<()> {
        self.settle_read_failure();
        let engine = self.state.live_mut("update")?.engine_mut();
        let result = self.time.update(engine);
        self.poison_on_failure(result)
    }

    /// Advance the engine until the current time reaches `time`.
    ///
    /// Does nothing if `time` is not after the current time.
    pub fn update_until(&mut self, time: f64) -> BmiResult<()> {
        self.settle_read_failure();
        let engine = self.state.live_mut("update_until")?.engine_mut();
        let result = self.time.update_until(&self.variables, engine, time);
        self.poison_on_failure(result)
    }

    /// Write the engine outputs for the current time.
    pub fn publish_output(&mut self) -> BmiResult<()> {
        self.settle_read_failure();
        let engine = self.state.live_mut("publish_output")?.engine_mut();
        let result = engine.publish();
        self.poison_on_failure(result)
    }
}

impl<E: Engine> Drop for ModelAdapter<E> {
    fn drop(&mut self) {
        self.settle_read_failure();
        if let Lifecycle::Initialized(handle) = &mut self.state {
            if let Err(err) = handle.engine_mut().finalize() {
                log::warn!(
                    "{} failed to finalize engine '{}' on drop: {}",
                    self.component_name,
                    handle.binding_id(),
                    err
                );
            }
        }
    }
}
