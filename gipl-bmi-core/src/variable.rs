//! Variable registration system.
//!
//! The [`VariableRegistry`] maps standard names from a controlled vocabulary onto the
//! engine's internal identifiers. Every accessor, grid query and time query resolves
//! names through this table, so exposing a new engine variable is a single
//! registration rather than new accessor code.
//!
//! # Overview
//!
//! Each [`VariableDescriptor`] carries:
//! - The standard name (e.g. `soil__temperature`)
//! - The engine's internal name (e.g. `temp`)
//! - Units (e.g. `deg_C`)
//! - The grid the variable is laid out on
//! - Its [`Direction`], which decides whether it is listed as an input, an output or both
//!
//! Legacy names can be registered as read-only aliases of a canonical name. Aliases
//! resolve like the name they point to but are never listed and never written through.
//!
//! # Usage
//!
//! ```rust
//! use gipl_bmi_core::grid::{GridKind, GridRegistry};
//! use gipl_bmi_core::variable::{Direction, VariableDescriptor, VariableRegistry};
//!
//! let mut grids = GridRegistry::new();
//! grids.register("site_by_depth", GridKind::Rectilinear).unwrap();
//!
//! let mut variables = VariableRegistry::new();
//! variables
//!     .register(
//!         &grids,
//!         VariableDescriptor::new(
//!             "soil__temperature",
//!             "temp",
//!             "deg_C",
//!             "site_by_depth",
//!             Direction::Both,
//!         ),
//!     )
//!     .unwrap();
//! variables.register_alias("temp", "soil__temperature").unwrap();
//!
//! assert_eq!(variables.resolve("soil__temperature").unwrap(), "temp");
//! assert_eq!(variables.units_of("temp").unwrap(), "deg_C");
//! assert_eq!(variables.list_input_names(), vec!["soil__temperature"]);
//! ```

use crate::errors::{BmiError, BmiResult};
use crate::grid::{GridId, GridRegistry};
use crate::value::ElementType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether the caller provides a variable, reads it, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Set by the caller before stepping (e.g. surface forcing).
    Input,
    /// Computed by the engine.
    Output,
    /// Read and written by either side (e.g. prognostic soil temperature).
    Both,
}

impl Direction {
    pub fn is_input(&self) -> bool {
        matches!(self, Direction::Input | Direction::Both)
    }

    pub fn is_output(&self) -> bool {
        matches!(self, Direction::Output | Direction::Both)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => write!(f, "input"),
            Direction::Output => write!(f, "output"),
            Direction::Both => write!(f, "both"),
        }
    }
}

/// Definition of a variable exposed by the adapter.
///
/// Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDescriptor {
    /// Controlled-vocabulary name used by callers
    pub standard_name: String,
    /// Name of the value inside the engine
    pub internal_name: String,
    pub units: String,
    pub grid: GridId,
    pub direction: Direction,
    /// Element type reported through `get_var_type`
    pub element_type: ElementType,
}

impl VariableDescriptor {
    /// Create a floating point variable definition.
    pub fn new(
        standard_name: impl Into<String>,
        internal_name: impl Into<String>,
        units: impl Into<String>,
        grid: impl Into<GridId>,
        direction: Direction,
    ) -> Self {
        Self {
            standard_name: standard_name.into(),
            internal_name: internal_name.into(),
            units: units.into(),
            grid: grid.into(),
            direction,
            element_type: ElementType::F64,
        }
    }

    pub fn with_element_type(mut self, element_type: ElementType) -> Self {
        self.element_type = element_type;
        self
    }

    pub fn is_writable(&self) -> bool {
        self.direction.is_input()
    }
}

/// Registry of the variables exposed by an adapter.
///
/// Variables are kept in registration order so that the input and output name lists
/// are stable between calls and between runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableRegistry {
    variables: IndexMap<String, VariableDescriptor>,
    /// Legacy name -> canonical standard name
    aliases: IndexMap<String, String>,
}

impl VariableRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a variable definition.
    ///
    /// # Errors
    ///
    /// * [`BmiError::DuplicateName`] if the standard name is already used by a variable or alias
    /// * [`BmiError::UnknownGrid`] if the descriptor's grid is not in `grids`
    pub fn register(
        &mut self,
        grids: &GridRegistry,
        descriptor: VariableDescriptor,
    ) -> BmiResult<()> {
        let name = &descriptor.standard_name;
        if self.is_registered(name) {
            return Err(BmiError::DuplicateName(name.clone()));
        }
        if !grids.contains(descriptor.grid.as_str()) {
            return Err(BmiError::UnknownGrid(descriptor.grid.to_string()));
        }

        log::debug!(
            "Registering {} variable '{}' -> '{}' on grid '{}'",
            descriptor.direction,
            name,
            descriptor.internal_name,
            descriptor.grid
        );
        self.variables.insert(name.clone(), descriptor);
        Ok(())
    }

    /// Register a read-only alias for an already registered variable.
    ///
    /// # Errors
    ///
    /// * [`BmiError::DuplicateName`] if `alias` is already a variable or alias name
    /// * [`BmiError::UnknownVariable`] if `target` is not a registered standard name
    pub fn register_alias(
        &mut self,
        alias: impl Into<String>,
        target: impl Into<String>,
    ) -> BmiResult<()> {
        let alias = alias.into();
        let target = target.into();
        if self.is_registered(&alias) {
            return Err(BmiError::DuplicateName(alias));
        }
        if !self.variables.contains_key(&target) {
            return Err(BmiError::UnknownVariable(target));
        }
        log::debug!("Registering alias '{}' for '{}'", alias, target);
        self.aliases.insert(alias, target);
        Ok(())
    }

    /// Look up a variable by standard name or alias.
    pub fn get(&self, name: &str) -> BmiResult<&VariableDescriptor> {
        let canonical = self.aliases.get(name).map(String::as_str).unwrap_or(name);
        self.variables
            .get(canonical)
            .ok_or_else(|| BmiError::UnknownVariable(name.to_string()))
    }

    /// Look up a variable that is about to be written.
    ///
    /// # Errors
    ///
    /// Returns [`BmiError::ReadOnly`] for aliases and output-only variables.
    pub fn get_writable(&self, name: &str) -> BmiResult<&VariableDescriptor> {
        let descriptor = self.get(name)?;
        if self.is_alias(name) || !descriptor.is_writable() {
            return Err(BmiError::ReadOnly(name.to_string()));
        }
        Ok(descriptor)
    }

    /// Internal engine name for a standard name.
    pub fn resolve(&self, name: &str) -> BmiResult<&str> {
        self.get(name).map(|v| v.internal_name.as_str())
    }

    pub fn units_of(&self, name: &str) -> BmiResult<&str> {
        self.get(name).map(|v| v.units.as_str())
    }

    pub fn grid_of(&self, name: &str) -> BmiResult<&GridId> {
        self.get(name).map(|v| &v.grid)
    }

    pub fn direction_of(&self, name: &str) -> BmiResult<Direction> {
        self.get(name).map(|v| v.direction)
    }

    pub fn element_type_of(&self, name: &str) -> BmiResult<ElementType> {
        self.get(name).map(|v| v.element_type)
    }

    /// Standard names the caller may provide, in registration order.
    pub fn list_input_names(&self) -> Vec<&str> {
        self.variables
            .values()
            .filter(|v| v.direction.is_input())
            .map(|v| v.standard_name.as_str())
            .collect()
    }

    /// Standard names the engine produces, in registration order.
    pub fn list_output_names(&self) -> Vec<&str> {
        self.variables
            .values()
            .filter(|v| v.direction.is_output())
            .map(|v| v.standard_name.as_str())
            .collect()
    }

    /// Variables laid out on `grid`, in registration order.
    pub fn on_grid<'a>(&'a self, grid: &'a str) -> impl Iterator<Item = &'a VariableDescriptor> {
        self.variables
            .values()
            .filter(move |v| v.grid.as_str() == grid)
    }

    /// Check if a name is registered, either as a variable or as an alias.
    pub fn is_registered(&self, name: &str) -> bool {
        self.variables.contains_key(name) || self.aliases.contains_key(name)
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    /// Registered variables in registration order. Aliases are not included.
    pub fn iter(&self) -> impl Iterator<Item = &VariableDescriptor> {
        self.variables.values()
    }

    /// `(alias, standard name)` pairs in registration order.
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(a, t)| (a.as_str(), t.as_str()))
    }

    /// Get the count of registered variables, excluding aliases.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
