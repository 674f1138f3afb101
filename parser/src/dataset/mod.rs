//! Reading and writing of complete data sets.

pub mod read;
pub mod write;

pub use self::read::{DataSetReader, ParseOptions};
pub use self::write::DataSetWriter;
