//! Declarative description of the grids and variables an adapter exposes.
//!
//! A [`SchemaConfig`] is the serialisable form (TOML) of the registries. Building it
//! produces a validated [`Schema`] which is handed to
//! [`ModelAdapter::new`](crate::model::ModelAdapter::new).
//!
//! # Example
//!
//! ```
//! use gipl_bmi_core::schema::SchemaConfig;
//!
//! let config = SchemaConfig::from_toml_str(
//!     r#"
//! component_name = "Toy"
//! time_units = "d"
//!
//! [[grids]]
//! id = "scalar"
//! kind = "point"
//!
//! [[variables]]
//! name = "model__current_time"
//! internal_name = "t"
//! units = "d"
//! grid = "scalar"
//! direction = "output"
//!
//! [time_variables]
//! start = "model__current_time"
//! current = "model__current_time"
//! end = "model__current_time"
//! step = "model__current_time"
//! "#,
//! )
//! .unwrap();
//!
//! let schema = config.build().unwrap();
//! assert_eq!(schema.component_name, "Toy");
//! assert_eq!(schema.variables.resolve("model__current_time").unwrap(), "t");
//! ```

use crate::errors::{BmiError, BmiResult};
use crate::grid::{GridKind, GridRegistry};
use crate::time::{OutputPolicy, TimeController, TimeVariables};
use crate::value::ElementType;
use crate::variable::{Direction, VariableDescriptor, VariableRegistry};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_component_name() -> String {
    "GIPL".to_string()
}

fn default_time_units() -> String {
    "month".to_string()
}

fn default_element_type() -> ElementType {
    ElementType::F64
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSpec {
    pub id: String,
    pub kind: GridKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSpec {
    /// Standard name
    pub name: String,
    pub internal_name: String,
    pub units: String,
    pub grid: String,
    pub direction: Direction,
    #[serde(default = "default_element_type")]
    pub element_type: ElementType,
}

/// Read-only legacy name for a variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasSpec {
    pub name: String,
    pub target: String,
}

/// Serialisable description of an adapter's registries and time handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default = "default_component_name")]
    pub component_name: String,
    #[serde(default = "default_time_units")]
    pub time_units: String,
    #[serde(default)]
    pub output_policy: OutputPolicy,
    #[serde(default)]
    pub grids: Vec<GridSpec>,
    #[serde(default)]
    pub variables: Vec<VariableSpec>,
    #[serde(default)]
    pub aliases: Vec<AliasSpec>,
    // Tables must follow plain values in TOML output
    #[serde(default)]
    pub time_variables: TimeVariables,
}

impl SchemaConfig {
    pub fn from_toml_str(content: &str) -> BmiResult<Self> {
        toml::from_str(content).map_err(|e| BmiError::config("<schema>", e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> BmiResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| BmiError::config(path.display().to_string(), e.to_string()))?;
        toml::from_str(&content)
            .map_err(|e| BmiError::config(path.display().to_string(), e.to_string()))
    }

    pub fn to_toml_string(&self) -> BmiResult<String> {
        toml::to_string(self).map_err(|e| BmiError::config("<schema>", e.to_string()))
    }

    /// Register every grid, variable and alias.
    ///
    /// # Errors
    ///
    /// Registration errors are returned unchanged. A time variable that is not a
    /// registered variable is reported as [`BmiError::UnknownVariable`].
    pub fn build(&self) -> BmiResult<Schema> {
        let mut grids = GridRegistry::new();
        for grid in &self.grids {
            grids.register(grid.id.as_str(), grid.kind)?;
        }

        let mut variables = VariableRegistry::new();
        for spec in &self.variables {
            variables.register(
                &grids,
                VariableDescriptor::new(
                    spec.name.as_str(),
                    spec.internal_name.as_str(),
                    spec.units.as_str(),
                    spec.grid.as_str(),
                    spec.direction,
                )
                .with_element_type(spec.element_type),
            )?;
        }
        for alias in &self.aliases {
            variables.register_alias(alias.name.as_str(), alias.target.as_str())?;
        }

        for name in self.time_variables.iter() {
            if !variables.is_registered(name) {
                return Err(BmiError::UnknownVariable(name.to_string()));
            }
        }

        Ok(Schema {
            component_name: self.component_name.clone(),
            grids,
            variables,
            time: TimeController::new(
                self.time_variables.clone(),
                self.time_units.as_str(),
                self.output_policy,
            ),
        })
    }
}

/// Validated registries ready to be attached to an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub component_name: String,
    pub grids: GridRegistry,
    pub variables: VariableRegistry,
    pub time: TimeController,
}

impl Schema {
    /// Rebuild the serialisable form.
    pub fn to_config(&self) -> SchemaConfig {
        SchemaConfig {
            component_name: self.component_name.clone(),
            time_units: self.time.time_units().to_string(),
            output_policy: self.time.output_policy(),
            grids: self
                .grids
                .iter()
                .map(|g| GridSpec {
                    id: g.id.to_string(),
                    kind: g.kind,
                })
                .collect(),
            variables: self
                .variables
                .iter()
                .map(|v| VariableSpec {
                    name: v.standard_name.clone(),
                    internal_name: v.internal_name.clone(),
                    units: v.units.clone(),
                    grid: v.grid.to_string(),
                    direction: v.direction,
                    element_type: v.element_type,
                })
                .collect(),
            aliases: self
                .variables
                .aliases()
                .map(|(name, target)| AliasSpec {
                    name: name.to_string(),
                    target: target.to_string(),
                })
                .collect(),
            time_variables: self.time.variables().clone(),
        }
    }
}
