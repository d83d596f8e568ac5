//! Typed values exchanged with the engine.
//!
//! Every variable, scalar or not, is carried as an n-dimensional array of a single
//! element type. Scalars are rank-0 arrays with shape `[]` and one element.
//! Index-based access treats a value as its flattened, row-major element sequence.

use crate::errors::{BmiError, BmiResult};
use ndarray::{Array1, ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    F64,
    I64,
}

impl ElementType {
    /// Name of the type as reported through `get_var_type`.
    pub fn bmi_name(&self) -> &'static str {
        match self {
            ElementType::F64 => "float64",
            ElementType::I64 => "int64",
        }
    }

    /// Size of a single element in bytes.
    pub fn itemsize(&self) -> usize {
        match self {
            ElementType::F64 => std::mem::size_of::<f64>(),
            ElementType::I64 => std::mem::size_of::<i64>(),
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bmi_name())
    }
}

/// A value held by the engine, or a copy of one.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Float(ArrayD<f64>),
    Int(ArrayD<i64>),
}

impl Value {
    /// Rank-0 floating point value.
    pub fn scalar(value: f64) -> Self {
        Value::Float(ArrayD::from_elem(IxDyn(&[]), value))
    }

    /// Rank-0 integer value.
    pub fn int_scalar(value: i64) -> Self {
        Value::Int(ArrayD::from_elem(IxDyn(&[]), value))
    }

    /// One-dimensional floating point value.
    pub fn from_vec(values: Vec<f64>) -> Self {
        Value::Float(Array1::from(values).into_dyn())
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            Value::Float(_) => ElementType::F64,
            Value::Int(_) => ElementType::I64,
        }
    }

    /// Extent of every dimension. Empty for scalars.
    pub fn shape(&self) -> &[usize] {
        match self {
            Value::Float(a) => a.shape(),
            Value::Int(a) => a.shape(),
        }
    }

    pub fn rank(&self) -> usize {
        self.shape().len()
    }

    /// Number of elements in the flattened value.
    pub fn len(&self) -> usize {
        match self {
            Value::Float(a) => a.len(),
            Value::Int(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn nbytes(&self) -> usize {
        self.len() * self.element_type().itemsize()
    }

    pub fn as_float(&self) -> Option<&ArrayD<f64>> {
        match self {
            Value::Float(a) => Some(a),
            Value::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<&ArrayD<i64>> {
        match self {
            Value::Float(_) => None,
            Value::Int(a) => Some(a),
        }
    }

    /// Read a single-element value as a float.
    ///
    /// Integer values are widened. Returns `None` when the value holds more than one element.
    pub fn as_scalar(&self) -> Option<f64> {
        if self.len() != 1 {
            return None;
        }
        match self {
            Value::Float(a) => a.iter().next().copied(),
            Value::Int(a) => a.iter().next().map(|v| *v as f64),
        }
    }

    /// Flattened copy of the elements, widened to `f64`.
    pub fn to_flat_f64(&self) -> Vec<f64> {
        match self {
            Value::Float(a) => a.iter().copied().collect(),
            Value::Int(a) => a.iter().map(|v| *v as f64).collect(),
        }
    }

    /// Short description used in error messages, e.g. `float64[5, 3]`.
    pub fn describe(&self) -> String {
        format!("{}{:?}", self.element_type(), self.shape())
    }

    /// Whether `other` could replace this value without changing its layout.
    pub fn is_compatible_with(&self, other: &Value) -> bool {
        self.element_type() == other.element_type() && self.shape() == other.shape()
    }

    /// Collect the elements at the given flat positions into a one-dimensional value.
    pub fn gather(&self, name: &str, indices: &[usize]) -> BmiResult<Value> {
        match self {
            Value::Float(a) => gather_from(name, a, indices).map(Value::Float),
            Value::Int(a) => gather_from(name, a, indices).map(Value::Int),
        }
    }

    /// Write `values` into the given flat positions.
    ///
    /// Nothing is written unless every index is in range and `values` has the same
    /// element type and number of elements as `indices`.
    pub fn scatter(&mut self, name: &str, indices: &[usize], values: &Value) -> BmiResult<()> {
        if values.len() != indices.len() || values.element_type() != self.element_type() {
            return Err(BmiError::ShapeMismatch {
                name: name.to_string(),
                expected: format!("{}[{}]", self.element_type(), indices.len()),
                found: values.describe(),
            });
        }
        match (self, values) {
            (Value::Float(a), Value::Float(v)) => scatter_into(name, a, indices, v.iter().copied()),
            (Value::Int(a), Value::Int(v)) => scatter_into(name, a, indices, v.iter().copied()),
            // Element types were compared above
            _ => unreachable!("element types already checked"),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::scalar(value)
    }
}

impl From<ArrayD<f64>> for Value {
    fn from(value: ArrayD<f64>) -> Self {
        Value::Float(value)
    }
}

impl From<ArrayD<i64>> for Value {
    fn from(value: ArrayD<i64>) -> Self {
        Value::Int(value)
    }
}

fn check_indices(name: &str, indices: &[usize], len: usize) -> BmiResult<()> {
    match indices.iter().find(|&&i| i >= len) {
        Some(&index) => Err(BmiError::IndexOutOfRange {
            name: name.to_string(),
            index,
            len,
        }),
        None => Ok(()),
    }
}

fn gather_from<T: Copy>(name: &str, array: &ArrayD<T>, indices: &[usize]) -> BmiResult<ArrayD<T>> {
    check_indices(name, indices, array.len())?;

    let gathered: Vec<T> = match array.as_slice() {
        Some(flat) => indices.iter().map(|&i| flat[i]).collect(),
        None => {
            let flat: Vec<T> = array.iter().copied().collect();
            indices.iter().map(|&i| flat[i]).collect()
        }
    };
    Ok(Array1::from(gathered).into_dyn())
}

fn scatter_into<T: Copy>(
    name: &str,
    array: &mut ArrayD<T>,
    indices: &[usize],
    values: impl Iterator<Item = T>,
) -> BmiResult<()> {
    check_indices(name, indices, array.len())?;

    // Later duplicates win, matching sequential assignment
    let mut updates: Vec<Option<T>> = vec![None; array.len()];
    for (&index, value) in indices.iter().zip(values) {
        updates[index] = Some(value);
    }
    for (element, update) in array.iter_mut().zip(updates) {
        if let Some(value) = update {
            *element = value;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array2};

    fn grid_value() -> Value {
        Value::Float(arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).into_dyn())
    }

    #[test]
    fn scalar_has_rank_zero_and_one_element() {
        let v = Value::scalar(12.0);
        assert_eq!(v.rank(), 0);
        assert_eq!(v.shape(), &[] as &[usize]);
        assert_eq!(v.len(), 1);
        assert_eq!(v.as_scalar(), Some(12.0));
        assert_eq!(Value::int_scalar(7).as_scalar(), Some(7.0));
    }

    #[test]
    fn describe_includes_type_and_shape() {
        assert_eq!(grid_value().describe(), "float64[2, 3]");
        assert_eq!(Value::int_scalar(1).describe(), "int64[]");
    }

    #[test]
    fn gather_reads_row_major() {
        let v = grid_value();
        let picked = v.gather("temp", &[0, 4, 5]).unwrap();
        assert_eq!(picked.to_flat_f64(), vec![1.0, 5.0, 6.0]);
        assert_eq!(picked.shape(), &[3]);
    }

    #[test]
    fn gather_follows_logical_order_for_transposed_arrays() {
        let transposed = arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).reversed_axes();
        let v = Value::Float(transposed.into_dyn());
        // Logical layout is now [[1, 4], [2, 5], [3, 6]]
        let picked = v.gather("temp", &[1, 2]).unwrap();
        assert_eq!(picked.to_flat_f64(), vec![4.0, 2.0]);
    }

    #[test]
    fn gather_empty_selection() {
        let picked = grid_value().gather("temp", &[]).unwrap();
        assert!(picked.is_empty());
    }

    #[test]
    fn gather_rejects_out_of_range() {
        let err = grid_value().gather("temp", &[1, 6]).unwrap_err();
        assert_eq!(
            err,
            BmiError::IndexOutOfRange {
                name: "temp".to_string(),
                index: 6,
                len: 6
            }
        );
    }

    #[test]
    fn scatter_writes_positions() {
        let mut v = grid_value();
        v.scatter("temp", &[0, 5], &Value::from_vec(vec![-1.0, -6.0]))
            .unwrap();
        assert_eq!(
            v,
            Value::Float(arr2(&[[-1.0, 2.0, 3.0], [4.0, 5.0, -6.0]]).into_dyn())
        );
    }

    #[test]
    fn failed_scatter_leaves_value_untouched() {
        let mut v = grid_value();
        let before = v.clone();

        let err = v
            .scatter("temp", &[0, 9], &Value::from_vec(vec![0.0, 0.0]))
            .unwrap_err();
        assert!(matches!(err, BmiError::IndexOutOfRange { index: 9, .. }));

        let err = v
            .scatter("temp", &[0, 1], &Value::from_vec(vec![0.0]))
            .unwrap_err();
        assert!(matches!(err, BmiError::ShapeMismatch { .. }));

        let ints = Value::Int(Array1::from(vec![1, 2]).into_dyn());
        let err = v.scatter("temp", &[0, 1], &ints).unwrap_err();
        assert!(matches!(err, BmiError::ShapeMismatch { .. }));

        assert_eq!(v, before);
    }

    #[test]
    fn compatibility_requires_type_and_shape() {
        let v = grid_value();
        assert!(v.is_compatible_with(&Value::Float(Array2::zeros((2, 3)).into_dyn())));
        assert!(!v.is_compatible_with(&Value::Float(Array2::zeros((3, 2)).into_dyn())));
        assert!(!v.is_compatible_with(&Value::Int(Array2::zeros((2, 3)).into_dyn())));
    }

    #[test]
    fn nbytes_uses_itemsize() {
        assert_eq!(grid_value().nbytes(), 48);
        assert_eq!(ElementType::I64.bmi_name(), "int64");
    }
}
