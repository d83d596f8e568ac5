pub mod accessor;
pub mod engine;
pub mod grid;
pub mod model;
pub mod python;
pub mod reference_engine;
pub mod schema;
pub mod standard_variables;
pub mod time;
pub mod value;
pub mod variable;

pub mod errors;

#[cfg(test)]
mod testing;
