//! The contract between the adapter and the wrapped numerical engine.
//!
//! The engine is opaque: the adapter only initializes it from a configuration file,
//! steps it, reads and writes values by internal name, and finalizes it.
//!
//! Engines usually hold process-wide state (module-level arrays in a compiled
//! library), so two adapters driving the same engine instance would overwrite each
//! other's values. Every engine therefore reports a [`Engine::binding_id`] naming the
//! underlying instance and the adapter takes an [`EngineBinding`] on it for as long
//! as the engine is initialized. A second binding to the same id is refused.

use crate::errors::{BmiError, BmiResult};
use crate::value::Value;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{LazyLock, Mutex};

/// A numerical engine that can be driven through the coupling interface.
pub trait Engine {
    /// Identifier of the underlying engine instance.
    ///
    /// Engines backed by the same memory must report the same id.
    fn binding_id(&self) -> &str;

    /// Load the configuration at `config_path` and prepare the first time step.
    fn initialize(&mut self, config_path: &Path) -> BmiResult<()>;

    /// Advance by exactly one internal time step.
    fn step(&mut self) -> BmiResult<()>;

    /// Advance until the engine's current time reaches `target_time`.
    fn step_until(&mut self, target_time: f64) -> BmiResult<()>;

    /// Materialise deferred outputs (e.g. write the output files for the current step).
    ///
    /// Engines that publish as part of [`Engine::step`] keep the default.
    fn publish(&mut self) -> BmiResult<()> {
        Ok(())
    }

    /// Release all engine resources.
    fn finalize(&mut self) -> BmiResult<()>;

    /// Copy of the value held under `internal_name`, or `None` if the engine has no such value.
    ///
    /// A value the engine holds but cannot hand over is a [`BmiError::EngineFailure`].
    fn read(&self, internal_name: &str) -> BmiResult<Option<Value>>;

    /// Replace the value held under `internal_name`.
    fn write(&mut self, internal_name: &str, value: Value) -> BmiResult<()>;
}

/// Engine ids currently bound to a live adapter.
static BOUND_ENGINES: LazyLock<Mutex<HashSet<String>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

/// Exclusive claim on an engine instance.
///
/// The claim is released when the binding is dropped.
#[derive(Debug)]
pub struct EngineBinding {
    id: String,
}

impl EngineBinding {
    /// Claim the engine instance named `id`.
    ///
    /// # Errors
    ///
    /// Returns [`BmiError::Lifecycle`] if another adapter already holds the instance.
    pub fn acquire(id: &str) -> BmiResult<Self> {
        let mut bound = BOUND_ENGINES.lock().expect("Binding table lock poisoned");
        if !bound.insert(id.to_string()) {
            log::warn!("Engine '{}' is already bound to another adapter", id);
            return Err(BmiError::Lifecycle {
                operation: format!("bind engine '{}'", id),
                phase: "bound to another adapter".to_string(),
            });
        }
        log::debug!("Bound engine '{}'", id);
        Ok(Self { id: id.to_string() })
    }

    /// Check whether an engine instance is currently claimed.
    pub fn is_bound(id: &str) -> bool {
        BOUND_ENGINES
            .lock()
            .expect("Binding table lock poisoned")
            .contains(id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for EngineBinding {
    fn drop(&mut self) {
        // Drop must not panic on a poisoned table
        let mut bound = match BOUND_ENGINES.lock() {
            Ok(bound) => bound,
            Err(poisoned) => poisoned.into_inner(),
        };
        bound.remove(&self.id);
        log::debug!("Released engine '{}'", self.id);
    }
}

/// A live, initialized engine together with its exclusive binding.
#[derive(Debug)]
pub struct EngineHandle<E> {
    engine: E,
    binding: EngineBinding,
}

impl<E: Engine> EngineHandle<E> {
    pub(crate) fn new(engine: E, binding: EngineBinding) -> Self {
        Self { engine, binding }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn binding_id(&self) -> &str {
        self.binding.id()
    }
}
