//! Grid registration and lazy shape resolution.
//!
//! A grid only records its identifier and topology family. The extents of a grid
//! depend on the engine configuration (number of sites, soil layers and forcing
//! time slots), so they are read from the current value of a variable bound to the
//! grid every time they are requested.
//!
//! # Examples
//!
//! ```rust
//! use gipl_bmi_core::grid::{GridKind, GridRegistry};
//!
//! let mut grids = GridRegistry::new();
//! grids.register("site_by_depth", GridKind::Rectilinear).unwrap();
//!
//! assert_eq!(grids.kind_of("site_by_depth").unwrap(), GridKind::Rectilinear);
//! assert!(grids.kind_of("missing").is_err());
//! ```

use crate::accessor::ValueAccessor;
use crate::engine::Engine;
use crate::errors::{BmiError, BmiResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifier of a grid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GridId(String);

impl GridId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for GridId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GridId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for GridId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for GridId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Topology family of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridKind {
    /// Unconnected points, including single scalars.
    Point,
    /// Axis-aligned grid with arbitrary spacing along each axis (e.g. soil depth levels).
    Rectilinear,
    /// Axis-aligned grid with constant spacing along each axis (e.g. forcing time slots).
    UniformRectilinear,
}

impl GridKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GridKind::Point => "point",
            GridKind::Rectilinear => "rectilinear",
            GridKind::UniformRectilinear => "uniform_rectilinear",
        }
    }
}

impl fmt::Display for GridKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDescriptor {
    pub id: GridId,
    pub kind: GridKind,
}

/// Registry of the grids variables can be laid out on.
///
/// Grids are kept in registration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridRegistry {
    grids: IndexMap<GridId, GridDescriptor>,
}

impl GridRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new grid.
    ///
    /// # Errors
    ///
    /// Returns [`BmiError::DuplicateGrid`] if a grid with the same id already exists.
    pub fn register(&mut self, id: impl Into<GridId>, kind: GridKind) -> BmiResult<()> {
        let id = id.into();
        if self.grids.contains_key(&id) {
            return Err(BmiError::DuplicateGrid(id.to_string()));
        }
        log::debug!("Registering {} grid '{}'", kind, id);
        self.grids.insert(id.clone(), GridDescriptor { id, kind });
        Ok(())
    }

    pub fn get(&self, id: &str) -> BmiResult<&GridDescriptor> {
        self.grids
            .get(id)
            .ok_or_else(|| BmiError::UnknownGrid(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.grids.contains_key(id)
    }

    pub fn kind_of(&self, id: &str) -> BmiResult<GridKind> {
        self.get(id).map(|grid| grid.kind)
    }

    /// Extent of every dimension of a grid.
    ///
    /// The shape is taken from the current value of the first variable registered on
    /// the grid that the engine holds. `values` is `None` while no engine is attached.
    ///
    /// # Errors
    ///
    /// * [`BmiError::UnknownGrid`] if the grid is not registered
    /// * [`BmiError::GridNotResolvable`] if no engine is attached, no variable uses the
    ///   grid or the engine holds none of them
    /// * [`BmiError::EngineFailure`] if the engine fails while reading a value
    pub fn shape_of<E: Engine + ?Sized>(
        &self,
        id: &str,
        values: Option<&ValueAccessor<'_, E>>,
    ) -> BmiResult<Vec<usize>> {
        let grid = self.get(id)?;
        let not_resolvable = |reason: &str| BmiError::GridNotResolvable {
            grid: grid.id.to_string(),
            reason: reason.to_string(),
        };
        let values = values.ok_or_else(|| not_resolvable("the engine has not been initialized"))?;

        let mut bound = values.variables().on_grid(id).peekable();
        if bound.peek().is_none() {
            return Err(not_resolvable("no variable is bound to it"));
        }
        for variable in bound {
            match values.get_value(&variable.standard_name) {
                Ok(value) => return Ok(value.shape().to_vec()),
                Err(BmiError::MissingEngineValue { internal_name, .. }) => {
                    log::debug!(
                        "Grid '{}': engine holds no '{}', trying the next variable",
                        id,
                        internal_name
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Err(not_resolvable("the engine holds none of its variables"))
    }

    pub fn rank_of<E: Engine + ?Sized>(
        &self,
        id: &str,
        values: Option<&ValueAccessor<'_, E>>,
    ) -> BmiResult<usize> {
        self.shape_of(id, values).map(|shape| shape.len())
    }

    /// Total number of nodes in a grid. Rank-0 grids have a single node.
    pub fn size_of<E: Engine + ?Sized>(
        &self,
        id: &str,
        values: Option<&ValueAccessor<'_, E>>,
    ) -> BmiResult<usize> {
        // The empty product is 1, which covers rank-0 grids
        self.shape_of(id, values).map(|shape| shape.iter().product())
    }

    pub fn iter(&self) -> impl Iterator<Item = &GridDescriptor> {
        self.grids.values()
    }

    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }
}
