//! Engine doubles for unit tests.

use crate::engine::Engine;
use crate::errors::{BmiError, BmiResult};
use crate::value::Value;
use std::cell::Cell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

/// Engine holding plain named values.
///
/// Stepping adds `increment` to the value named by `clock` when one is set.
/// Engines created with the same `module` flag share one set of module arrays,
/// like two handles onto the same compiled library.
#[derive(Debug, Clone, PartialEq)]
pub struct MapEngine {
    id: String,
    values: HashMap<String, Value>,
    clock: Option<(String, f64)>,
    fail_on_step: bool,
    unreadable: Option<String>,
    module: Option<Rc<Cell<bool>>>,
    writes: usize,
    steps: usize,
    published: usize,
}

impl MapEngine {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            values: HashMap::new(),
            clock: None,
            fail_on_step: false,
            unreadable: None,
            module: None,
            writes: 0,
            steps: 0,
            published: 0,
        }
    }

    pub fn with_value(mut self, internal_name: &str, value: Value) -> Self {
        self.values.insert(internal_name.to_string(), value);
        self
    }

    pub fn with_clock(mut self, internal_name: &str, increment: f64) -> Self {
        self.clock = Some((internal_name.to_string(), increment));
        self
    }

    pub fn failing_on_step(mut self) -> Self {
        self.fail_on_step = true;
        self
    }

    /// Reading `internal_name` fails instead of returning the value.
    pub fn with_unreadable(mut self, internal_name: &str) -> Self {
        self.unreadable = Some(internal_name.to_string());
        self
    }

    /// Module arrays shared with every engine holding the same flag.
    ///
    /// The flag is set while the arrays are allocated.
    pub fn sharing_module(mut self, module: &Rc<Cell<bool>>) -> Self {
        self.module = Some(Rc::clone(module));
        self
    }

    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn published(&self) -> usize {
        self.published
    }
}

impl Engine for MapEngine {
    fn binding_id(&self) -> &str {
        &self.id
    }

    fn initialize(&mut self, _config_path: &Path) -> BmiResult<()> {
        if let Some(module) = &self.module {
            if module.get() {
                return Err(BmiError::engine(
                    "initialize",
                    "module arrays already allocated",
                ));
            }
            module.set(true);
        }
        Ok(())
    }

    fn step(&mut self) -> BmiResult<()> {
        if self.fail_on_step {
            return Err(BmiError::engine("step", "injected failure"));
        }
        self.steps += 1;
        if let Some((name, increment)) = &self.clock {
            let now = self
                .values
                .get(name)
                .and_then(Value::as_scalar)
                .unwrap_or_default();
            self.values
                .insert(name.clone(), Value::scalar(now + increment));
        }
        Ok(())
    }

    fn step_until(&mut self, target_time: f64) -> BmiResult<()> {
        let name = match &self.clock {
            Some((name, increment)) if *increment > 0.0 => name.clone(),
            _ => return self.step(),
        };
        while self
            .values
            .get(&name)
            .and_then(Value::as_scalar)
            .unwrap_or_default()
            < target_time
        {
            self.step()?;
        }
        Ok(())
    }

    fn publish(&mut self) -> BmiResult<()> {
        self.published += 1;
        Ok(())
    }

    fn finalize(&mut self) -> BmiResult<()> {
        if let Some(module) = &self.module {
            module.set(false);
        }
        Ok(())
    }

    fn read(&self, internal_name: &str) -> BmiResult<Option<Value>> {
        if self.unreadable.as_deref() == Some(internal_name) {
            return Err(BmiError::engine(
                format!("read '{}'", internal_name),
                "value could not be converted",
            ));
        }
        Ok(self.values.get(internal_name).cloned())
    }

    fn write(&mut self, internal_name: &str, value: Value) -> BmiResult<()> {
        self.writes += 1;
        self.values.insert(internal_name.to_string(), value);
        Ok(())
    }
}
