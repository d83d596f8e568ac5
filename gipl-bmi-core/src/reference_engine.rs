//! A deterministic in-memory engine with the GIPL state layout.
//!
//! [`ReferenceEngine`] holds the same arrays and scalars as the GIPL engine and
//! advances them with a simple relaxation scheme: the surface layer of every site
//! relaxes toward the (snow-damped) air temperature of the current forcing slot and
//! each deeper layer relaxes toward the layer above it. It is not a permafrost model;
//! it exists so the adapter can be exercised without the compiled solver.
//!
//! The run configuration is a TOML file:
//!
//! ```toml
//! n_site = 5
//! n_grd = 3
//! n_time = 12
//! time_s = 0.0
//! time_e = 36.0
//! time_step = 1.0
//! initial_temperature = -2.0
//! depths = [0.0, 0.5, 1.0]            # optional, defaults to 0.5 m spacing
//! surface_temperature = [-20.0, ...]  # optional, one value per forcing slot
//! snow_depth = 0.2
//! snow_conductivity = 0.15
//! ```

use crate::engine::Engine;
use crate::errors::{BmiError, BmiResult};
use crate::value::Value;
use ndarray::{Array1, Array2, ArrayD, Ix1, Ix2};
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fraction of the air/surface difference removed per step.
const SURFACE_RELAXATION: f64 = 0.5;
/// Fraction of the difference to the layer above removed per step.
const DEPTH_RELAXATION: f64 = 0.25;

static NEXT_ENGINE: AtomicUsize = AtomicUsize::new(0);

fn default_snow_depth() -> f64 {
    0.0
}

fn default_snow_conductivity() -> f64 {
    0.15
}

/// Run configuration read by [`ReferenceEngine::initialize`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub n_site: usize,
    pub n_grd: usize,
    pub n_time: usize,
    #[serde(default)]
    pub time_s: f64,
    pub time_e: f64,
    pub time_step: f64,
    pub initial_temperature: f64,
    pub depths: Option<Vec<f64>>,
    pub surface_temperature: Option<Vec<f64>>,
    #[serde(default = "default_snow_depth")]
    pub snow_depth: f64,
    #[serde(default = "default_snow_conductivity")]
    pub snow_conductivity: f64,
}

impl RunConfig {
    fn validate(&self) -> Result<(), String> {
        if self.n_site == 0 || self.n_grd == 0 || self.n_time == 0 {
            return Err("n_site, n_grd and n_time must be positive".to_string());
        }
        if let Some(depths) = &self.depths {
            if depths.len() != self.n_grd {
                return Err(format!(
                    "expected {} depths, got {}",
                    self.n_grd,
                    depths.len()
                ));
            }
        }
        if let Some(forcing) = &self.surface_temperature {
            if forcing.len() != self.n_time {
                return Err(format!(
                    "expected {} surface temperatures, got {}",
                    self.n_time,
                    forcing.len()
                ));
            }
        }
        if self.time_e < self.time_s {
            return Err(format!(
                "end time {} is before start time {}",
                self.time_e, self.time_s
            ));
        }
        Ok(())
    }

    /// Default forcing: an annual cycle between -20 and +10 degC.
    fn surface_cycle(&self) -> Vec<f64> {
        match &self.surface_temperature {
            Some(values) => values.clone(),
            None => (0..self.n_time)
                .map(|i| {
                    let phase = 2.0 * std::f64::consts::PI * i as f64 / self.n_time as f64;
                    -5.0 - 15.0 * phase.cos()
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct State {
    temp: Array2<f64>,
    zdepth: Array1<f64>,
    zdepth_id: Array1<i64>,
    utemp_i: Array2<f64>,
    snd_i: Array2<f64>,
    stcon_i: Array2<f64>,
    time_s: f64,
    time_loop: f64,
    time_e: f64,
    time_step: f64,
    n_time: usize,
    steps_taken: usize,
}

impl State {
    fn from_config(config: &RunConfig) -> Self {
        let slots = config.n_time + 2;
        let cycle = config.surface_cycle();
        // Slot 0 and the last slot pad the cycle, as in the engine's forcing arrays
        let utemp_i = Array2::from_shape_fn((slots, config.n_site), |(t, _)| {
            cycle[(t + config.n_time - 1) % config.n_time]
        });
        let zdepth = match &config.depths {
            Some(depths) => Array1::from(depths.clone()),
            None => Array1::from_shape_fn(config.n_grd, |k| 0.5 * k as f64),
        };

        Self {
            temp: Array2::from_elem((config.n_site, config.n_grd), config.initial_temperature),
            zdepth,
            zdepth_id: Array1::from_shape_fn(config.n_grd, |k| k as i64 + 1),
            utemp_i,
            snd_i: Array2::from_elem((slots, config.n_site), config.snow_depth),
            stcon_i: Array2::from_elem((slots, config.n_site), config.snow_conductivity),
            time_s: config.time_s,
            time_loop: config.time_s,
            time_e: config.time_e,
            time_step: config.time_step,
            n_time: config.n_time,
            steps_taken: 0,
        }
    }

    fn step(&mut self) {
        let slot = self.steps_taken % self.n_time + 1;
        let (n_site, n_grd) = self.temp.dim();
        let previous = self.temp.clone();

        for site in 0..n_site {
            let conductivity = self.stcon_i[[slot, site]];
            let snow = self.snd_i[[slot, site]].max(0.0);
            // Snow cover damps the coupling between air and ground
            let coupling = if conductivity > 0.0 {
                conductivity / (conductivity + snow)
            } else {
                0.0
            };
            let air = self.utemp_i[[slot, site]];
            self.temp[[site, 0]] +=
                SURFACE_RELAXATION * coupling * (air - previous[[site, 0]]);
            for level in 1..n_grd {
                self.temp[[site, level]] +=
                    DEPTH_RELAXATION * (previous[[site, level - 1]] - previous[[site, level]]);
            }
        }

        self.steps_taken += 1;
        self.time_loop += self.time_step;
    }
}

/// Pure-Rust engine with the GIPL state layout.
#[derive(Debug, Clone)]
pub struct ReferenceEngine {
    binding_id: String,
    state: Option<State>,
    fail_after: Option<usize>,
    publish_count: usize,
    last_published: Option<f64>,
}

impl Default for ReferenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceEngine {
    /// Create an engine with a process-unique binding id.
    pub fn new() -> Self {
        let id = NEXT_ENGINE.fetch_add(1, Ordering::Relaxed);
        Self::with_binding_id(&format!("reference-engine-{}", id))
    }

    /// Create an engine that claims the instance `binding_id`.
    ///
    /// Engines sharing an id model handles onto the same underlying library.
    pub fn with_binding_id(binding_id: &str) -> Self {
        Self {
            binding_id: binding_id.to_string(),
            state: None,
            fail_after: None,
            publish_count: 0,
            last_published: None,
        }
    }

    /// Fail every step once `steps` steps have been taken.
    pub fn with_failure_after(mut self, steps: usize) -> Self {
        self.fail_after = Some(steps);
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Number of publishes since the last initialize.
    pub fn publish_count(&self) -> usize {
        self.publish_count
    }

    /// Current time at the most recent publish.
    pub fn last_published(&self) -> Option<f64> {
        self.last_published
    }

    fn state(&self, operation: &str) -> BmiResult<&State> {
        self.state
            .as_ref()
            .ok_or_else(|| BmiError::engine(operation, "engine is not initialized"))
    }

    fn state_mut(&mut self, operation: &str) -> BmiResult<&mut State> {
        self.state
            .as_mut()
            .ok_or_else(|| BmiError::engine(operation, "engine is not initialized"))
    }
}

impl Engine for ReferenceEngine {
    fn binding_id(&self) -> &str {
        &self.binding_id
    }

    fn initialize(&mut self, config_path: &Path) -> BmiResult<()> {
        let path = config_path.display().to_string();
        let content =
            std::fs::read_to_string(config_path).map_err(|e| BmiError::config(&path, e.to_string()))?;
        let config: RunConfig =
            toml::from_str(&content).map_err(|e| BmiError::config(&path, e.to_string()))?;
        config.validate().map_err(|reason| BmiError::config(&path, reason))?;

        log::debug!(
            "Reference engine '{}': {} sites, {} levels, {} forcing slots",
            self.binding_id,
            config.n_site,
            config.n_grd,
            config.n_time
        );
        self.state = Some(State::from_config(&config));
        self.publish_count = 0;
        self.last_published = None;
        Ok(())
    }

    fn step(&mut self) -> BmiResult<()> {
        let fail_after = self.fail_after;
        let state = self.state_mut("step")?;
        if let Some(limit) = fail_after {
            if state.steps_taken >= limit {
                return Err(BmiError::engine(
                    "step",
                    format!("solver diverged after {} steps", state.steps_taken),
                ));
            }
        }
        state.step();
        Ok(())
    }

    fn step_until(&mut self, target_time: f64) -> BmiResult<()> {
        let time_step = self.state("step_until")?.time_step;
        if time_step <= 0.0 {
            return Err(BmiError::engine(
                "step_until",
                format!("time step {} does not advance time", time_step),
            ));
        }
        while self.state("step_until")?.time_loop < target_time {
            self.step()?;
        }
        Ok(())
    }

    fn publish(&mut self) -> BmiResult<()> {
        let now = self.state("publish")?.time_loop;
        self.publish_count += 1;
        self.last_published = Some(now);
        Ok(())
    }

    fn finalize(&mut self) -> BmiResult<()> {
        self.state("finalize")?;
        self.state = None;
        log::debug!("Reference engine '{}' finalized", self.binding_id);
        Ok(())
    }

    fn read(&self, internal_name: &str) -> BmiResult<Option<Value>> {
        let Some(state) = self.state.as_ref() else {
            return Ok(None);
        };
        let value = match internal_name {
            "temp" => Value::Float(state.temp.clone().into_dyn()),
            "zdepth" => Value::Float(state.zdepth.clone().into_dyn()),
            "zdepth_id" => Value::Int(state.zdepth_id.clone().into_dyn()),
            "utemp_i" => Value::Float(state.utemp_i.clone().into_dyn()),
            "snd_i" => Value::Float(state.snd_i.clone().into_dyn()),
            "stcon_i" => Value::Float(state.stcon_i.clone().into_dyn()),
            "time_s" => Value::scalar(state.time_s),
            "time_loop" => Value::scalar(state.time_loop),
            "time_e" => Value::scalar(state.time_e),
            "time_step" => Value::scalar(state.time_step),
            "n_site" => Value::int_scalar(state.temp.nrows() as i64),
            "n_grd" => Value::int_scalar(state.temp.ncols() as i64),
            "n_time" => Value::int_scalar(state.n_time as i64),
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn write(&mut self, internal_name: &str, value: Value) -> BmiResult<()> {
        let state = self.state_mut("write")?;
        match internal_name {
            "temp" => state.temp = into_array2(internal_name, value, state.temp.dim())?,
            "zdepth" => state.zdepth = into_array1(internal_name, value, state.zdepth.len())?,
            "zdepth_id" => {
                state.zdepth_id = into_int_array1(internal_name, value, state.zdepth_id.len())?
            }
            "utemp_i" => state.utemp_i = into_array2(internal_name, value, state.utemp_i.dim())?,
            "snd_i" => state.snd_i = into_array2(internal_name, value, state.snd_i.dim())?,
            "stcon_i" => state.stcon_i = into_array2(internal_name, value, state.stcon_i.dim())?,
            "time_e" => state.time_e = into_scalar(internal_name, value)?,
            _ => {
                return Err(BmiError::engine(
                    format!("write '{}'", internal_name),
                    "value is not writable",
                ))
            }
        }
        Ok(())
    }
}

fn float_array(name: &str, value: Value) -> BmiResult<ArrayD<f64>> {
    match value {
        Value::Float(array) => Ok(array),
        Value::Int(_) => Err(BmiError::engine(
            format!("write '{}'", name),
            "expected float64 values",
        )),
    }
}

fn into_array2(name: &str, value: Value, dim: (usize, usize)) -> BmiResult<Array2<f64>> {
    float_array(name, value)?
        .into_dimensionality::<Ix2>()
        .ok()
        .filter(|array| array.dim() == dim)
        .ok_or_else(|| {
            BmiError::engine(
                format!("write '{}'", name),
                format!("expected shape {:?}", dim),
            )
        })
}

fn into_array1(name: &str, value: Value, len: usize) -> BmiResult<Array1<f64>> {
    float_array(name, value)?
        .into_dimensionality::<Ix1>()
        .ok()
        .filter(|array| array.len() == len)
        .ok_or_else(|| {
            BmiError::engine(
                format!("write '{}'", name),
                format!("expected {} values", len),
            )
        })
}

fn into_int_array1(name: &str, value: Value, len: usize) -> BmiResult<Array1<i64>> {
    let array = match value {
        Value::Int(array) => array,
        Value::Float(_) => {
            return Err(BmiError::engine(
                format!("write '{}'", name),
                "expected int64 values",
            ))
        }
    };
    array
        .into_dimensionality::<Ix1>()
        .ok()
        .filter(|array| array.len() == len)
        .ok_or_else(|| {
            BmiError::engine(
                format!("write '{}'", name),
                format!("expected {} values", len),
            )
        })
}

fn into_scalar(name: &str, value: Value) -> BmiResult<f64> {
    let array = float_array(name, value)?;
    if array.ndim() != 0 {
        return Err(BmiError::engine(
            format!("write '{}'", name),
            "expected a scalar",
        ));
    }
    array
        .iter()
        .next()
        .copied()
        .ok_or_else(|| BmiError::engine(format!("write '{}'", name), "expected a scalar"))
}
