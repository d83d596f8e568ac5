//! Engines implemented in Python.
//!
//! Any object with the methods of the GIPL extension module can be driven by the
//! adapter:
//!
//! - `initialize(path)`
//! - `update_model()` / `update_model_until(time)`
//! - `write_output()`
//! - `finalize()`
//! - `get_state(name)` returning a numpy array or a Python scalar, and `None` or a
//!   `KeyError` for names it does not hold
//! - `set_state(name, array)`

use crate::engine::Engine;
use crate::errors::{BmiError, BmiResult};
use crate::value::Value;
use numpy::{PyArrayDyn, PyArrayMethods, ToPyArray};
use pyo3::exceptions::{PyKeyError, PyTypeError};
use pyo3::prelude::*;
use std::path::Path;

/// A Python object acting as the engine.
#[derive(Debug)]
pub struct PyEngine {
    engine: Py<PyAny>,
    binding_id: String,
}

impl PyEngine {
    pub fn new(engine: Py<PyAny>, binding_id: String) -> Self {
        Self { engine, binding_id }
    }

    fn call(&self, operation: &str, method: &str) -> BmiResult<()> {
        Python::with_gil(|py| {
            self.engine
                .call_method0(py, method)
                .map(|_| ())
                .map_err(|e| BmiError::engine(operation, e.to_string()))
        })
    }
}

impl Engine for PyEngine {
    fn binding_id(&self) -> &str {
        &self.binding_id
    }

    fn initialize(&mut self, config_path: &Path) -> BmiResult<()> {
        let path = config_path.display().to_string();
        Python::with_gil(|py| {
            self.engine
                .call_method1(py, "initialize", (path.as_str(),))
                .map(|_| ())
                .map_err(|e| BmiError::config(path.as_str(), e.to_string()))
        })
    }

    fn step(&mut self) -> BmiResult<()> {
        self.call("update", "update_model")
    }

    fn step_until(&mut self, target_time: f64) -> BmiResult<()> {
        Python::with_gil(|py| {
            self.engine
                .call_method1(py, "update_model_until", (target_time,))
                .map(|_| ())
                .map_err(|e| BmiError::engine("update_until", e.to_string()))
        })
    }

    fn publish(&mut self) -> BmiResult<()> {
        self.call("write_output", "write_output")
    }

    fn finalize(&mut self) -> BmiResult<()> {
        self.call("finalize", "finalize")
    }

    fn read(&self, internal_name: &str) -> BmiResult<Option<Value>> {
        let failure = |e: PyErr| BmiError::engine(format!("read '{}'", internal_name), e.to_string());
        Python::with_gil(|py| {
            let state = match self.engine.call_method1(py, "get_state", (internal_name,)) {
                Ok(state) => state,
                Err(e) if e.is_instance_of::<PyKeyError>(py) => {
                    log::debug!("Engine has no value '{}': {}", internal_name, e);
                    return Ok(None);
                }
                Err(e) => return Err(failure(e)),
            };
            if state.is_none(py) {
                return Ok(None);
            }
            value_from_py(state.bind(py)).map(Some).map_err(failure)
        })
    }

    fn write(&mut self, internal_name: &str, value: Value) -> BmiResult<()> {
        Python::with_gil(|py| {
            self.engine
                .call_method1(py, "set_state", (internal_name, value_to_py(py, &value)))
                .map(|_| ())
                .map_err(|e| BmiError::engine(format!("write '{}'", internal_name), e.to_string()))
        })
    }
}

/// Convert a numpy array or Python number into a [`Value`].
///
/// `int32` arrays, as produced by Fortran default integers, are widened to `int64`.
pub fn value_from_py(obj: &Bound<'_, PyAny>) -> PyResult<Value> {
    if let Ok(array) = obj.downcast::<PyArrayDyn<f64>>() {
        return Ok(Value::Float(array.readonly().as_array().to_owned()));
    }
    if let Ok(array) = obj.downcast::<PyArrayDyn<i64>>() {
        return Ok(Value::Int(array.readonly().as_array().to_owned()));
    }
    if let Ok(array) = obj.downcast::<PyArrayDyn<i32>>() {
        return Ok(Value::Int(array.readonly().as_array().mapv(i64::from)));
    }
    if let Ok(value) = obj.extract::<i64>() {
        return Ok(Value::int_scalar(value));
    }
    if let Ok(value) = obj.extract::<f64>() {
        return Ok(Value::scalar(value));
    }
    if let Ok(values) = obj.extract::<Vec<f64>>() {
        return Ok(Value::from_vec(values));
    }
    Err(PyTypeError::new_err(format!(
        "Expected a float64 or integer numpy array or a number, got {}",
        obj.get_type()
    )))
}

/// Convert a [`Value`] into a numpy array of the same shape.
pub fn value_to_py(py: Python<'_>, value: &Value) -> PyObject {
    match value {
        Value::Float(array) => array.to_pyarray_bound(py).into_any().unbind(),
        Value::Int(array) => array.to_pyarray_bound(py).into_any().unbind(),
    }
}
