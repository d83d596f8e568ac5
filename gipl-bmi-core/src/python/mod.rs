//! Python bindings for the adapter.

use crate::errors::BmiError;
use crate::schema::SchemaConfig;
use pyo3::exceptions::{PyIndexError, PyKeyError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::{pymodule, Bound, PyResult};

mod adapter;
pub mod engine;

pub use adapter::PyBmiGipl;
pub use engine::PyEngine;

/// Python exception class raised for an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExceptionKind {
    Key,
    Index,
    Value,
    Runtime,
}

impl ExceptionKind {
    fn of(err: &BmiError) -> Self {
        match err {
            BmiError::UnknownVariable(_) | BmiError::UnknownGrid(_) => ExceptionKind::Key,
            BmiError::IndexOutOfRange { .. } => ExceptionKind::Index,
            BmiError::Config { .. }
            | BmiError::DuplicateName(_)
            | BmiError::DuplicateGrid(_)
            | BmiError::ShapeMismatch { .. }
            | BmiError::GridNotResolvable { .. }
            | BmiError::ReadOnly(_) => ExceptionKind::Value,
            BmiError::Lifecycle { .. }
            | BmiError::EngineFailure { .. }
            | BmiError::MissingEngineValue { .. } => ExceptionKind::Runtime,
        }
    }
}

impl From<BmiError> for PyErr {
    fn from(err: BmiError) -> PyErr {
        let message = err.to_string();
        match ExceptionKind::of(&err) {
            ExceptionKind::Key => PyKeyError::new_err(message),
            ExceptionKind::Index => PyIndexError::new_err(message),
            ExceptionKind::Value => PyValueError::new_err(message),
            ExceptionKind::Runtime => PyRuntimeError::new_err(message),
        }
    }
}

/// The standard GIPL schema as TOML, as a starting point for custom schemas.
#[pyfunction]
pub fn gipl_schema_toml() -> PyResult<String> {
    Ok(SchemaConfig::gipl().to_toml_string()?)
}

#[pymodule]
pub fn core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyBmiGipl>()?;
    m.add_function(wrap_pyfunction!(gipl_schema_toml, m)?)?;
    Ok(())
}
