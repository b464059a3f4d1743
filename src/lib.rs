//! Process grids for distributed dense linear algebra
#![cfg_attr(feature = "strict", deny(warnings))]
#![warn(missing_docs)]

pub mod comm;
pub mod factor;
pub mod grid;
pub mod shape;
pub mod types;

pub use grid::ProcessGrid;
pub use shape::GridShape;
pub use types::{GridError, GridOrder, Result};
