pub mod error;
pub mod model;
pub mod parser;
pub mod writer;

pub use error::DmmlError;
pub use model::{AttributeMap, AttributeType, DbMap, TableMap};
pub use parser::{parse_bytes, parse_file, parse_str};
pub use writer::{describe_table, to_dmml};
