use crate::model::ModelAdapter;
use crate::python::engine::{value_from_py, value_to_py, PyEngine};
use crate::schema::SchemaConfig;
use crate::standard_variables::gipl_schema;
use crate::value::{ElementType, Value};
use ndarray::Array1;
use pyo3::prelude::*;
use std::path::PathBuf;

/// Python wrapper for [`ModelAdapter`] around a Python engine object.
///
/// Exposes the Basic Model Interface. Values are returned as numpy arrays.
#[pyclass(name = "BmiGipl", module = "gipl_bmi.core")]
pub struct PyBmiGipl(pub ModelAdapter<PyEngine>);

/// Identifier of the engine instance a Python object refers to.
///
/// Extension modules are identified by their module name so that two adapters
/// cannot drive the same loaded library. Other objects are identified by address.
fn default_binding_id(engine: &Bound<'_, PyAny>) -> String {
    engine
        .getattr("__name__")
        .and_then(|name| name.extract::<String>())
        .unwrap_or_else(|_| format!("python-engine-{:p}", engine.as_ptr()))
}

/// Match the element type the variable is registered with.
///
/// Python integers passed for floating point variables are widened.
fn coerce(value: Value, element_type: ElementType) -> Value {
    match (value, element_type) {
        (Value::Int(array), ElementType::F64) => Value::Float(array.mapv(|v| v as f64)),
        (value, _) => value,
    }
}

/// Treat a bare number as a single-element array.
fn as_one_dimensional(value: Value) -> Value {
    match value {
        Value::Float(array) if array.ndim() == 0 => {
            Value::Float(Array1::from_iter(array.iter().copied()).into_dyn())
        }
        Value::Int(array) if array.ndim() == 0 => {
            Value::Int(Array1::from_iter(array.iter().copied()).into_dyn())
        }
        other => other,
    }
}

#[pymethods]
impl PyBmiGipl {
    /// Create an adapter around `engine`.
    ///
    /// # Arguments
    ///
    /// * `engine` - object with `initialize`, `update_model`, `update_model_until`,
    ///   `write_output`, `finalize`, `get_state` and `set_state` methods
    /// * `binding_id` - identifier of the engine instance, defaults to the module name
    /// * `schema_toml` - variable schema as TOML, defaults to the standard GIPL schema
    #[new]
    #[pyo3(signature = (engine, binding_id=None, schema_toml=None))]
    fn new(
        engine: &Bound<'_, PyAny>,
        binding_id: Option<String>,
        schema_toml: Option<&str>,
    ) -> PyResult<Self> {
        let binding_id = binding_id.unwrap_or_else(|| default_binding_id(engine));
        let schema = match schema_toml {
            Some(content) => SchemaConfig::from_toml_str(content)?.build()?,
            None => gipl_schema()?,
        };
        Ok(Self(ModelAdapter::new(
            PyEngine::new(engine.clone().unbind(), binding_id),
            schema,
        )))
    }

    /// Current lifecycle phase as a string.
    #[getter]
    fn phase(&self) -> String {
        self.0.phase().to_string()
    }

    fn initialize(&mut self, config_file: PathBuf) -> PyResult<()> {
        Ok(self.0.initialize(config_file)?)
    }

    fn update(&mut self) -> PyResult<()> {
        Ok(self.0.update()?)
    }

    fn update_until(&mut self, time: f64) -> PyResult<()> {
        Ok(self.0.update_until(time)?)
    }

    fn publish_output(&mut self) -> PyResult<()> {
        Ok(self.0.publish_output()?)
    }

    fn finalize(&mut self) -> PyResult<()> {
        Ok(self.0.finalize()?)
    }

    fn get_component_name(&self) -> String {
        self.0.get_component_name().to_string()
    }

    fn get_input_item_count(&self) -> usize {
        self.0.get_input_var_names().len()
    }

    fn get_output_item_count(&self) -> usize {
        self.0.get_output_var_names().len()
    }

    fn get_input_var_names(&self) -> Vec<String> {
        self.0
            .get_input_var_names()
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn get_output_var_names(&self) -> Vec<String> {
        self.0
            .get_output_var_names()
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn get_var_units(&self, name: &str) -> PyResult<String> {
        Ok(self.0.get_var_units(name)?.to_string())
    }

    fn get_var_grid(&self, name: &str) -> PyResult<String> {
        Ok(self.0.get_var_grid(name)?.to_string())
    }

    fn get_var_type(&self, name: &str) -> PyResult<String> {
        Ok(self.0.get_var_type(name)?.to_string())
    }

    fn get_var_itemsize(&self, name: &str) -> PyResult<usize> {
        Ok(self.0.get_var_itemsize(name)?)
    }

    fn get_var_nbytes(&self, name: &str) -> PyResult<usize> {
        Ok(self.0.get_var_nbytes(name)?)
    }

    fn get_grid_type(&self, grid: &str) -> PyResult<String> {
        Ok(self.0.get_grid_type(grid)?.to_string())
    }

    fn get_grid_shape(&self, grid: &str) -> PyResult<Vec<usize>> {
        Ok(self.0.get_grid_shape(grid)?)
    }

    fn get_grid_rank(&self, grid: &str) -> PyResult<usize> {
        Ok(self.0.get_grid_rank(grid)?)
    }

    fn get_grid_size(&self, grid: &str) -> PyResult<usize> {
        Ok(self.0.get_grid_size(grid)?)
    }

    /// Copy of a variable's value as a numpy array.
    fn get_value(&self, py: Python<'_>, name: &str) -> PyResult<PyObject> {
        let value = self.0.get_value(name)?;
        Ok(value_to_py(py, &value))
    }

    /// Elements at the given flat indices as a one-dimensional numpy array.
    fn get_value_at_indices(
        &self,
        py: Python<'_>,
        name: &str,
        indices: Vec<usize>,
    ) -> PyResult<PyObject> {
        let value = self.0.get_value_at_indices(name, &indices)?;
        Ok(value_to_py(py, &value))
    }

    fn set_value(&mut self, name: &str, value: &Bound<'_, PyAny>) -> PyResult<()> {
        let element_type = self.0.variables().element_type_of(name)?;
        let value = coerce(value_from_py(value)?, element_type);
        Ok(self.0.set_value(name, value)?)
    }

    fn set_value_at_indices(
        &mut self,
        name: &str,
        indices: Vec<usize>,
        values: &Bound<'_, PyAny>,
    ) -> PyResult<()> {
        let element_type = self.0.variables().element_type_of(name)?;
        let values = coerce(value_from_py(values)?, element_type);
        let values = as_one_dimensional(values);
        Ok(self.0.set_value_at_indices(name, &indices, &values)?)
    }

    fn get_start_time(&self) -> PyResult<f64> {
        Ok(self.0.get_start_time()?)
    }

    fn get_current_time(&self) -> PyResult<f64> {
        Ok(self.0.get_current_time()?)
    }

    fn get_end_time(&self) -> PyResult<f64> {
        Ok(self.0.get_end_time()?)
    }

    fn get_time_step(&self) -> PyResult<f64> {
        Ok(self.0.get_time_step()?)
    }

    fn get_time_units(&self) -> String {
        self.0.get_time_units().to_string()
    }

    fn __repr__(&self) -> String {
        format!(
            "<BmiGipl component={:?} phase={}>",
            self.0.get_component_name(),
            self.0.phase()
        )
    }
}
