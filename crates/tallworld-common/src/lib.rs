pub mod error;
pub mod types;

pub use error::TallWorldError;
pub use types::{ColumnCoord, CubeCoord, Result};
