//! Generic reads and writes of engine-held values.
//!
//! Every operation resolves the caller's name through the [`VariableRegistry`] once
//! and then addresses the engine by the resolved internal name. There is no
//! per-variable code: a variable becomes readable and writable as soon as it is
//! registered.
//!
//! Reads return independent copies. Writes are validated against the value the
//! engine currently holds (element type, shape and index bounds) before the engine
//! is touched, so a rejected write leaves the engine unchanged.

use crate::engine::Engine;
use crate::errors::{BmiError, BmiResult};
use crate::value::Value;
use crate::variable::{VariableDescriptor, VariableRegistry};

/// Read access to the values of an initialized engine.
pub struct ValueAccessor<'a, E: ?Sized> {
    variables: &'a VariableRegistry,
    engine: &'a E,
}

impl<'a, E: Engine + ?Sized> ValueAccessor<'a, E> {
    pub fn new(variables: &'a VariableRegistry, engine: &'a E) -> Self {
        Self { variables, engine }
    }

    pub fn variables(&self) -> &'a VariableRegistry {
        self.variables
    }

    /// Copy of the full value of a variable.
    pub fn get_value(&self, name: &str) -> BmiResult<Value> {
        let descriptor = self.variables.get(name)?;
        read(self.engine, name, descriptor)
    }

    /// Elements at the given positions of the flattened value.
    ///
    /// # Errors
    ///
    /// Returns [`BmiError::IndexOutOfRange`] if any index is not below the number of elements.
    pub fn get_value_at_indices(&self, name: &str, indices: &[usize]) -> BmiResult<Value> {
        self.get_value(name)?.gather(name, indices)
    }

    /// Value of a single-element variable as a float.
    pub fn get_scalar(&self, name: &str) -> BmiResult<f64> {
        let value = self.get_value(name)?;
        value.as_scalar().ok_or_else(|| BmiError::ShapeMismatch {
            name: name.to_string(),
            expected: "a single element".to_string(),
            found: value.describe(),
        })
    }

    /// Total size of a variable's value in bytes.
    pub fn get_nbytes(&self, name: &str) -> BmiResult<usize> {
        self.get_value(name).map(|v| v.nbytes())
    }
}

/// Read and write access to the values of an initialized engine.
pub struct ValueAccessorMut<'a, E: ?Sized> {
    variables: &'a VariableRegistry,
    engine: &'a mut E,
}

impl<'a, E: Engine + ?Sized> ValueAccessorMut<'a, E> {
    pub fn new(variables: &'a VariableRegistry, engine: &'a mut E) -> Self {
        Self { variables, engine }
    }

    /// Read-only view over the same engine.
    pub fn as_accessor(&self) -> ValueAccessor<'_, E> {
        ValueAccessor::new(self.variables, self.engine)
    }

    /// Replace the full value of a variable.
    ///
    /// # Errors
    ///
    /// * [`BmiError::ReadOnly`] for aliases and output-only variables
    /// * [`BmiError::ShapeMismatch`] if `value` differs from the held value in shape or element type
    pub fn set_value(&mut self, name: &str, value: Value) -> BmiResult<()> {
        let descriptor = self.variables.get_writable(name)?;
        let current = read(self.engine, name, descriptor)?;
        if !current.is_compatible_with(&value) {
            return Err(BmiError::ShapeMismatch {
                name: name.to_string(),
                expected: current.describe(),
                found: value.describe(),
            });
        }

        log::debug!("Setting '{}' ({})", name, descriptor.internal_name);
        self.engine.write(&descriptor.internal_name, value)
    }

    /// Overwrite the elements at the given positions of the flattened value.
    ///
    /// # Errors
    ///
    /// * [`BmiError::ReadOnly`] for aliases and output-only variables
    /// * [`BmiError::ShapeMismatch`] if `values` does not hold one element per index
    ///   or has a different element type
    /// * [`BmiError::IndexOutOfRange`] if any index is not below the number of elements
    pub fn set_value_at_indices(
        &mut self,
        name: &str,
        indices: &[usize],
        values: &Value,
    ) -> BmiResult<()> {
        let descriptor = self.variables.get_writable(name)?;
        let mut current = read(self.engine, name, descriptor)?;
        current.scatter(name, indices, values)?;

        log::debug!(
            "Setting {} element(s) of '{}' ({})",
            indices.len(),
            name,
            descriptor.internal_name
        );
        self.engine.write(&descriptor.internal_name, current)
    }
}

fn read<E: Engine + ?Sized>(
    engine: &E,
    name: &str,
    descriptor: &VariableDescriptor,
) -> BmiResult<Value> {
    engine
        .read(&descriptor.internal_name)?
        .ok_or_else(|| BmiError::MissingEngineValue {
            name: name.to_string(),
            internal_name: descriptor.internal_name.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridKind, GridRegistry};
    use crate::testing::MapEngine;
    use crate::value::ElementType;
    use crate::variable::Direction;
    use ndarray::{arr1, Array2};

    fn variables() -> VariableRegistry {
        let mut grids = GridRegistry::new();
        grids.register("scalar", GridKind::Point).unwrap();
        grids
            .register("site_by_depth", GridKind::Rectilinear)
            .unwrap();

        let mut variables = VariableRegistry::new();
        for descriptor in [
            VariableDescriptor::new(
                "soil_temperature",
                "temp",
                "deg_C",
                "site_by_depth",
                Direction::Both,
            ),
            VariableDescriptor::new("model__end_time", "time_e", "d", "scalar", Direction::Both),
            VariableDescriptor::new("model_soil_site__count", "n_site", "1", "scalar", Direction::Output)
                .with_element_type(ElementType::I64),
            VariableDescriptor::new("soil__moisture", "moist", "1", "site_by_depth", Direction::Input),
        ] {
            variables.register(&grids, descriptor).unwrap();
        }
        variables.register_alias("temp", "soil_temperature").unwrap();
        variables
    }

    fn engine() -> MapEngine {
        let temp = Array2::from_shape_fn((5, 3), |(s, k)| (s * 3 + k) as f64);
        MapEngine::new("accessor-tests")
            .with_value("temp", Value::Float(temp.into_dyn()))
            .with_value("time_e", Value::scalar(36.0))
            .with_value("n_site", Value::int_scalar(5))
    }

    #[test]
    fn get_returns_independent_copy() {
        let variables = variables();
        let engine = engine();
        let values = ValueAccessor::new(&variables, &engine);

        let mut copy = values.get_value("soil_temperature").unwrap();
        if let Value::Float(array) = &mut copy {
            array.fill(100.0);
        }
        let fresh = values.get_value("soil_temperature").unwrap();
        assert_eq!(fresh.to_flat_f64()[14], 14.0);
        assert_ne!(fresh, copy);
    }

    #[test]
    fn indices_match_flattened_value() {
        let variables = variables();
        let engine = engine();
        let values = ValueAccessor::new(&variables, &engine);

        let flat = values.get_value("soil_temperature").unwrap().to_flat_f64();
        let all: Vec<usize> = (0..flat.len()).collect();
        assert_eq!(
            values
                .get_value_at_indices("soil_temperature", &all)
                .unwrap()
                .to_flat_f64(),
            flat
        );
        assert!(values
            .get_value_at_indices("soil_temperature", &[])
            .unwrap()
            .is_empty());
        assert_eq!(
            values
                .get_value_at_indices("soil_temperature", &[14, 0, 7])
                .unwrap()
                .to_flat_f64(),
            vec![14.0, 0.0, 7.0]
        );
    }

    #[test]
    fn index_out_of_range_names_the_variable() {
        let variables = variables();
        let engine = engine();
        let values = ValueAccessor::new(&variables, &engine);

        assert_eq!(
            values.get_value_at_indices("soil_temperature", &[15]),
            Err(BmiError::IndexOutOfRange {
                name: "soil_temperature".to_string(),
                index: 15,
                len: 15
            })
        );
    }

    #[test]
    fn scalar_reads() {
        let variables = variables();
        let engine = engine();
        let values = ValueAccessor::new(&variables, &engine);

        assert_eq!(values.get_scalar("model__end_time").unwrap(), 36.0);
        assert_eq!(values.get_scalar("model_soil_site__count").unwrap(), 5.0);
        assert!(matches!(
            values.get_scalar("soil_temperature"),
            Err(BmiError::ShapeMismatch { .. })
        ));
        assert_eq!(values.get_nbytes("soil_temperature").unwrap(), 120);
    }

    #[test]
    fn missing_engine_value_is_reported() {
        let variables = variables();
        let engine = engine();
        let values = ValueAccessor::new(&variables, &engine);

        assert_eq!(
            values.get_value("soil__moisture"),
            Err(BmiError::MissingEngineValue {
                name: "soil__moisture".to_string(),
                internal_name: "moist".to_string()
            })
        );
    }

    #[test]
    fn set_value_round_trip() {
        let variables = variables();
        let mut engine = engine();
        let mut values = ValueAccessorMut::new(&variables, &mut engine);

        let new = Value::Float(Array2::from_elem((5, 3), -1.5).into_dyn());
        values.set_value("soil_temperature", new.clone()).unwrap();
        values.set_value("model__end_time", Value::scalar(21.0)).unwrap();

        let view = values.as_accessor();
        assert_eq!(view.get_value("soil_temperature").unwrap(), new);
        assert_eq!(view.get_scalar("model__end_time").unwrap(), 21.0);
    }

    #[test]
    fn set_value_rejects_incompatible_values() {
        let variables = variables();
        let mut engine = engine();
        let before = engine.clone();
        let mut values = ValueAccessorMut::new(&variables, &mut engine);

        let err = values
            .set_value(
                "soil_temperature",
                Value::Float(Array2::zeros((3, 5)).into_dyn()),
            )
            .unwrap_err();
        assert_eq!(
            err,
            BmiError::ShapeMismatch {
                name: "soil_temperature".to_string(),
                expected: "float64[5, 3]".to_string(),
                found: "float64[3, 5]".to_string()
            }
        );

        let err = values
            .set_value("model__end_time", Value::int_scalar(21))
            .unwrap_err();
        assert!(matches!(err, BmiError::ShapeMismatch { .. }));

        assert_eq!(engine, before);
    }

    #[test]
    fn writes_through_aliases_and_outputs_are_refused() {
        let variables = variables();
        let mut engine = engine();
        let mut values = ValueAccessorMut::new(&variables, &mut engine);

        assert_eq!(
            values.set_value("temp", Value::Float(Array2::zeros((5, 3)).into_dyn())),
            Err(BmiError::ReadOnly("temp".to_string()))
        );
        assert_eq!(
            values.set_value("model_soil_site__count", Value::int_scalar(2)),
            Err(BmiError::ReadOnly("model_soil_site__count".to_string()))
        );
        // Aliases still read
        assert_eq!(
            values.as_accessor().get_value("temp").unwrap().shape(),
            &[5, 3]
        );
    }

    #[test]
    fn set_at_indices_round_trip() {
        let variables = variables();
        let mut engine = engine();
        let mut values = ValueAccessorMut::new(&variables, &mut engine);

        values
            .set_value_at_indices(
                "soil_temperature",
                &[0, 1, 2],
                &Value::from_vec(vec![-1.0, -1.0, -1.0]),
            )
            .unwrap();
        let view = values.as_accessor();
        assert_eq!(
            view.get_value_at_indices("soil_temperature", &[0, 1, 2])
                .unwrap()
                .to_flat_f64(),
            vec![-1.0, -1.0, -1.0]
        );
        // Untouched elements keep their values
        assert_eq!(
            view.get_value_at_indices("soil_temperature", &[3])
                .unwrap()
                .to_flat_f64(),
            vec![3.0]
        );
    }

    #[test]
    fn set_at_indices_validates_before_writing() {
        let variables = variables();
        let mut engine = engine();
        let before = engine.clone();
        let mut values = ValueAccessorMut::new(&variables, &mut engine);

        let err = values
            .set_value_at_indices("soil_temperature", &[0, 1], &Value::from_vec(vec![1.0]))
            .unwrap_err();
        assert!(matches!(err, BmiError::ShapeMismatch { .. }));

        let err = values
            .set_value_at_indices("soil_temperature", &[0, 99], &Value::from_vec(vec![1.0, 2.0]))
            .unwrap_err();
        assert!(matches!(err, BmiError::IndexOutOfRange { index: 99, .. }));

        let ints = Value::Int(arr1(&[1]).into_dyn());
        let err = values
            .set_value_at_indices("soil_temperature", &[0], &ints)
            .unwrap_err();
        assert!(matches!(err, BmiError::ShapeMismatch { .. }));

        assert_eq!(engine, before);
        assert_eq!(engine.writes(), 0);
    }
}
