//! Model time and stepping.
//!
//! Time values are never cached by the adapter. Start, current and end time and the
//! step size are engine-held scalars read through the variable registry, so the
//! [`TimeController`] only needs to know which standard names hold them.

use crate::accessor::ValueAccessor;
use crate::engine::Engine;
use crate::errors::{BmiError, BmiResult};
use crate::variable::VariableRegistry;
use serde::{Deserialize, Serialize};

/// When engine outputs are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputPolicy {
    /// Publish after every single step.
    #[default]
    AfterEachUpdate,
    /// Only publish when [`crate::model::ModelAdapter::publish_output`] is called.
    ///
    /// `update_until` hands the whole interval to the engine in a single call.
    Deferred,
}

/// Standard names of the engine-held time scalars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeVariables {
    pub start: String,
    pub current: String,
    pub end: String,
    pub step: String,
}

impl Default for TimeVariables {
    fn default() -> Self {
        Self {
            start: "model__start_time".to_string(),
            current: "model__current_time".to_string(),
            end: "model__end_time".to_string(),
            step: "model__time_step".to_string(),
        }
    }
}

impl TimeVariables {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        [&self.start, &self.current, &self.end, &self.step]
            .into_iter()
            .map(String::as_str)
    }
}

/// Reads model time and advances the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeController {
    variables: TimeVariables,
    units: String,
    output_policy: OutputPolicy,
}

impl TimeController {
    pub fn new(variables: TimeVariables, units: impl Into<String>, output_policy: OutputPolicy) -> Self {
        Self {
            variables,
            units: units.into(),
            output_policy,
        }
    }

    pub fn variables(&self) -> &TimeVariables {
        &self.variables
    }

    pub fn output_policy(&self) -> OutputPolicy {
        self.output_policy
    }

    pub fn time_units(&self) -> &str {
        &self.units
    }

    pub fn start_time<E: Engine + ?Sized>(&self, values: &ValueAccessor<'_, E>) -> BmiResult<f64> {
        values.get_scalar(&self.variables.start)
    }

    pub fn current_time<E: Engine + ?Sized>(&self, values: &ValueAccessor<'_, E>) -> BmiResult<f64> {
        values.get_scalar(&self.variables.current)
    }

    pub fn end_time<E: Engine + ?Sized>(&self, values: &ValueAccessor<'_, E>) -> BmiResult<f64> {
        values.get_scalar(&self.variables.end)
    }

    pub fn time_step<E: Engine + ?Sized>(&self, values: &ValueAccessor<'_, E>) -> BmiResult<f64> {
        values.get_scalar(&self.variables.step)
    }

    /// Advance the engine by exactly one step.
    ///
    /// Outputs are published afterwards unless the policy is [`OutputPolicy::Deferred`].
    pub fn update<E: Engine + ?Sized>(&self, engine: &mut E) -> BmiResult<()> {
        engine.step()?;
        if self.output_policy == OutputPolicy::AfterEachUpdate {
            engine.publish()?;
        }
        Ok(())
    }

    /// Advance the engine until the current time reaches `target`.
    ///
    /// Targets at or before the current time leave the engine untouched.
    ///
    /// # Errors
    ///
    /// Returns [`BmiError::EngineFailure`] if the engine fails or stops advancing before
    /// reaching `target`.
    pub fn update_until<E: Engine + ?Sized>(
        &self,
        variables: &VariableRegistry,
        engine: &mut E,
        target: f64,
    ) -> BmiResult<()> {
        if !target.is_finite() {
            log::warn!("Ignoring update_until with non-finite target {}", target);
            return Ok(());
        }

        let mut current = self.current_time(&ValueAccessor::new(variables, &*engine))?;
        if target <= current {
            log::debug!("update_until({}) at time {}: nothing to do", target, current);
            return Ok(());
        }

        match self.output_policy {
            OutputPolicy::AfterEachUpdate => {
                while current < target {
                    self.update(engine)?;
                    let next = self.current_time(&ValueAccessor::new(variables, &*engine))?;
                    if next <= current {
                        return Err(BmiError::engine(
                            format!("update_until({})", target),
                            format!("time did not advance past {}", current),
                        ));
                    }
                    current = next;
                }
            }
            OutputPolicy::Deferred => {
                engine.step_until(target)?;
                current = self.current_time(&ValueAccessor::new(variables, &*engine))?;
                if current < target {
                    return Err(BmiError::engine(
                        format!("update_until({})", target),
                        format!("engine stopped at {}", current),
                    ));
                }
            }
        }
        log::debug!("Advanced to time {}", current);
        Ok(())
    }
}

impl Default for TimeController {
    fn default() -> Self {
        Self::new(TimeVariables::default(), "month", OutputPolicy::default())
    }
}
