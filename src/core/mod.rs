pub mod error;
pub mod types;
pub mod value;

pub use error::{DbError, Result};
pub use types::{Column, ForeignKey, Row, Schema, Snapshot};
pub use value::{DataType, Value};
