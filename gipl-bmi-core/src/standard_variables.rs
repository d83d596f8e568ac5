//! Standard variables exposed for the GIPL permafrost model.
//!
//! Names follow the CSDMS standard-name convention (`object__quantity`). Each name maps
//! onto the array or scalar the GIPL engine keeps in module state.
//!
//! # Usage
//!
//! ```rust
//! use gipl_bmi_core::standard_variables::{gipl_schema, VAR_SOIL_TEMPERATURE};
//!
//! assert_eq!(VAR_SOIL_TEMPERATURE.internal_name, "temp");
//!
//! let schema = gipl_schema().unwrap();
//! assert_eq!(schema.variables.resolve("soil__temperature").unwrap(), "temp");
//! // Legacy names remain readable
//! assert_eq!(schema.variables.resolve("utemp_i").unwrap(), "utemp_i");
//! ```
//!
//! # Grids
//!
//! - `scalar` - rank-0 model parameters and time values
//! - `depth` - soil levels, `n_grd`
//! - `site_by_depth` - soil temperature profile per site, `n_site x n_grd`
//! - `time_by_site` - surface forcing slots per site, `(n_time + 2) x n_site`

use crate::errors::BmiResult;
use crate::grid::GridKind;
use crate::schema::{AliasSpec, GridSpec, Schema, SchemaConfig, VariableSpec};
use crate::time::{OutputPolicy, TimeVariables};
use crate::value::ElementType;
use crate::variable::Direction;

pub const GRID_SCALAR: &str = "scalar";
pub const GRID_DEPTH: &str = "depth";
pub const GRID_SITE_BY_DEPTH: &str = "site_by_depth";
pub const GRID_TIME_BY_SITE: &str = "time_by_site";

/// Grids of the GIPL schema, in registration order.
pub static GIPL_GRIDS: [(&str, GridKind); 4] = [
    (GRID_SCALAR, GridKind::Point),
    (GRID_DEPTH, GridKind::Rectilinear),
    (GRID_SITE_BY_DEPTH, GridKind::Rectilinear),
    (GRID_TIME_BY_SITE, GridKind::UniformRectilinear),
];

/// Compile-time variable definition.
#[derive(Debug, Clone, Copy)]
pub struct StandardVariable {
    pub standard_name: &'static str,
    pub internal_name: &'static str,
    pub units: &'static str,
    pub grid: &'static str,
    pub direction: Direction,
    pub element_type: ElementType,
}

impl StandardVariable {
    pub const fn new(
        standard_name: &'static str,
        internal_name: &'static str,
        units: &'static str,
        grid: &'static str,
        direction: Direction,
        element_type: ElementType,
    ) -> Self {
        Self {
            standard_name,
            internal_name,
            units,
            grid,
            direction,
            element_type,
        }
    }

    pub fn to_spec(&self) -> VariableSpec {
        VariableSpec {
            name: self.standard_name.to_string(),
            internal_name: self.internal_name.to_string(),
            units: self.units.to_string(),
            grid: self.grid.to_string(),
            direction: self.direction,
            element_type: self.element_type,
        }
    }
}

/// Define a [`StandardVariable`] static.
///
/// `element_type` may be omitted for floating point variables.
macro_rules! define_standard_variable {
    (
        $var_name:ident,
        name = $name:expr,
        internal = $internal:expr,
        units = $units:expr,
        grid = $grid:expr,
        direction = $direction:expr $(,)?
    ) => {
        define_standard_variable!(
            $var_name,
            name = $name,
            internal = $internal,
            units = $units,
            grid = $grid,
            direction = $direction,
            element_type = ElementType::F64,
        );
    };
    (
        $var_name:ident,
        name = $name:expr,
        internal = $internal:expr,
        units = $units:expr,
        grid = $grid:expr,
        direction = $direction:expr,
        element_type = $element_type:expr $(,)?
    ) => {
        #[doc = concat!("Standard variable definition for ", $name)]
        pub static $var_name: StandardVariable =
            StandardVariable::new($name, $internal, $units, $grid, $direction, $element_type);
    };
}

// ============================================================================
// Soil state
// ============================================================================

define_standard_variable!(
    VAR_SOIL_TEMPERATURE,
    name = "soil__temperature",
    internal = "temp",
    units = "deg_C",
    grid = GRID_SITE_BY_DEPTH,
    direction = Direction::Both,
);

define_standard_variable!(
    VAR_SOIL_DEPTH,
    name = "soil__depth",
    internal = "zdepth",
    units = "m",
    grid = GRID_DEPTH,
    direction = Direction::Both,
);

define_standard_variable!(
    VAR_SOIL_DEPTH_LEVEL_INDEX,
    name = "soil__depth_level_index",
    internal = "zdepth_id",
    units = "1",
    grid = GRID_DEPTH,
    direction = Direction::Both,
    element_type = ElementType::I64,
);

// ============================================================================
// Surface forcing
// ============================================================================

define_standard_variable!(
    VAR_AIR_TEMPERATURE,
    name = "land_surface_air__temperature",
    internal = "utemp_i",
    units = "deg_C",
    grid = GRID_TIME_BY_SITE,
    direction = Direction::Input,
);

define_standard_variable!(
    VAR_SNOW_DEPTH,
    name = "snowpack__depth",
    internal = "snd_i",
    units = "m",
    grid = GRID_TIME_BY_SITE,
    direction = Direction::Input,
);

define_standard_variable!(
    VAR_SNOW_CONDUCTIVITY,
    name = "snowpack__thermal_conductivity",
    internal = "stcon_i",
    units = "W m-1 K-1",
    grid = GRID_TIME_BY_SITE,
    direction = Direction::Input,
);

// ============================================================================
// Time
// ============================================================================

define_standard_variable!(
    VAR_START_TIME,
    name = "model__start_time",
    internal = "time_s",
    units = "month",
    grid = GRID_SCALAR,
    direction = Direction::Output,
);

define_standard_variable!(
    VAR_CURRENT_TIME,
    name = "model__current_time",
    internal = "time_loop",
    units = "month",
    grid = GRID_SCALAR,
    direction = Direction::Output,
);

define_standard_variable!(
    VAR_END_TIME,
    name = "model__end_time",
    internal = "time_e",
    units = "month",
    grid = GRID_SCALAR,
    direction = Direction::Both,
);

define_standard_variable!(
    VAR_TIME_STEP,
    name = "model__time_step",
    internal = "time_step",
    units = "month",
    grid = GRID_SCALAR,
    direction = Direction::Output,
);

// ============================================================================
// Dimensions
// ============================================================================

define_standard_variable!(
    VAR_SITE_COUNT,
    name = "model_soil_site__count",
    internal = "n_site",
    units = "1",
    grid = GRID_SCALAR,
    direction = Direction::Output,
    element_type = ElementType::I64,
);

define_standard_variable!(
    VAR_LAYER_COUNT,
    name = "model_soil_layer__count",
    internal = "n_grd",
    units = "1",
    grid = GRID_SCALAR,
    direction = Direction::Output,
    element_type = ElementType::I64,
);

define_standard_variable!(
    VAR_TIME_STEP_COUNT,
    name = "model_time_step__count",
    internal = "n_time",
    units = "1",
    grid = GRID_SCALAR,
    direction = Direction::Output,
    element_type = ElementType::I64,
);

/// Every GIPL variable, in registration order.
pub static GIPL_VARIABLES: [&StandardVariable; 13] = [
    &VAR_SOIL_TEMPERATURE,
    &VAR_SOIL_DEPTH,
    &VAR_SOIL_DEPTH_LEVEL_INDEX,
    &VAR_AIR_TEMPERATURE,
    &VAR_SNOW_DEPTH,
    &VAR_SNOW_CONDUCTIVITY,
    &VAR_START_TIME,
    &VAR_CURRENT_TIME,
    &VAR_END_TIME,
    &VAR_TIME_STEP,
    &VAR_SITE_COUNT,
    &VAR_LAYER_COUNT,
    &VAR_TIME_STEP_COUNT,
];

/// Names used by earlier adapter revisions, kept as read-only aliases.
pub static LEGACY_ALIASES: [(&str, &StandardVariable); 5] = [
    ("temp", &VAR_SOIL_TEMPERATURE),
    ("zdepth", &VAR_SOIL_DEPTH),
    ("utemp_i", &VAR_AIR_TEMPERATURE),
    ("snd_i", &VAR_SNOW_DEPTH),
    ("stcon_i", &VAR_SNOW_CONDUCTIVITY),
];

impl SchemaConfig {
    /// Schema of the GIPL engine.
    pub fn gipl() -> Self {
        SchemaConfig {
            component_name: "GIPL".to_string(),
            time_units: "month".to_string(),
            output_policy: OutputPolicy::AfterEachUpdate,
            grids: GIPL_GRIDS
                .iter()
                .map(|(id, kind)| GridSpec {
                    id: id.to_string(),
                    kind: *kind,
                })
                .collect(),
            variables: GIPL_VARIABLES.iter().map(|v| v.to_spec()).collect(),
            aliases: LEGACY_ALIASES
                .iter()
                .map(|(alias, target)| AliasSpec {
                    name: alias.to_string(),
                    target: target.standard_name.to_string(),
                })
                .collect(),
            time_variables: TimeVariables {
                start: VAR_START_TIME.standard_name.to_string(),
                current: VAR_CURRENT_TIME.standard_name.to_string(),
                end: VAR_END_TIME.standard_name.to_string(),
                step: VAR_TIME_STEP.standard_name.to_string(),
            },
        }
    }
}

/// Built registries for the GIPL engine.
pub fn gipl_schema() -> BmiResult<Schema> {
    SchemaConfig::gipl().build()
}
