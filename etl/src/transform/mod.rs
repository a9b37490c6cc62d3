//! Transformation module.
//!
//! - Columns: header canonicalization
//! - Numeric: number parsing and integer coercion policy
//! - Steps: the individual `Table -> Table` operations
//! - Chain: ordered execution of steps for one dataset

pub mod chain;
pub mod columns;
pub mod numeric;
pub mod steps;

pub use chain::TransformationChain;
pub use columns::normalize_column_name;
pub use numeric::{coerce_integer, is_numeric, parse_number};
pub use steps::{steps_description, Step};
