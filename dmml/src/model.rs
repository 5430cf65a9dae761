use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Decides how a value is written into a generated statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeType {
    /// Emitted between single quotes.
    String,
    /// Emitted verbatim.
    Numerical,
}

impl AttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::String => "STRING",
            AttributeType::Numerical => "NUMERICAL",
        }
    }

    pub fn is_quoted(&self) -> bool {
        matches!(self, AttributeType::String)
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributeType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "STRING" => Ok(AttributeType::String),
            "NUMERICAL" => Ok(AttributeType::Numerical),
            other => Err(format!("unknown attribute type '{other}'")),
        }
    }
}

/// One source column copied into one destination column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMap {
    source_attribute: String,
    destination_attribute: String,
    attribute_type: AttributeType,
}

impl AttributeMap {
    pub fn new(
        source_attribute: impl Into<String>,
        destination_attribute: impl Into<String>,
        attribute_type: AttributeType,
    ) -> Self {
        Self {
            source_attribute: source_attribute.into(),
            destination_attribute: destination_attribute.into(),
            attribute_type,
        }
    }

    pub fn source_attribute(&self) -> &str {
        &self.source_attribute
    }

    pub fn destination_attribute(&self) -> &str {
        &self.destination_attribute
    }

    pub fn attribute_type(&self) -> AttributeType {
        self.attribute_type
    }
}

/// Maps a source table onto a destination table.
///
/// The position of each [`AttributeMap`] is significant: the i-th source
/// attribute is the i-th selected column and feeds the i-th inserted column.
/// The timestamp columns form the synchronization cursor for the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMap {
    source_table: String,
    destination_table: String,
    source_timestamp_attribute: String,
    destination_timestamp_attribute: String,
    attribute_maps: Vec<AttributeMap>,
}

impl TableMap {
    pub fn new(
        source_table: impl Into<String>,
        destination_table: impl Into<String>,
        source_timestamp_attribute: impl Into<String>,
        destination_timestamp_attribute: impl Into<String>,
    ) -> Self {
        Self {
            source_table: source_table.into(),
            destination_table: destination_table.into(),
            source_timestamp_attribute: source_timestamp_attribute.into(),
            destination_timestamp_attribute: destination_timestamp_attribute.into(),
            attribute_maps: Vec::new(),
        }
    }

    /// Append an attribute map; its position is its column position.
    pub fn add_attribute_map(&mut self, attribute_map: AttributeMap) {
        self.attribute_maps.push(attribute_map);
    }

    pub fn with_attribute_map(mut self, attribute_map: AttributeMap) -> Self {
        self.add_attribute_map(attribute_map);
        self
    }

    pub fn source_table(&self) -> &str {
        &self.source_table
    }

    pub fn destination_table(&self) -> &str {
        &self.destination_table
    }

    pub fn source_timestamp_attribute(&self) -> &str {
        &self.source_timestamp_attribute
    }

    pub fn destination_timestamp_attribute(&self) -> &str {
        &self.destination_timestamp_attribute
    }

    pub fn attribute_maps(&self) -> &[AttributeMap] {
        &self.attribute_maps
    }
}

/// Ordered set of table maps; tables are synchronized in this order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbMap {
    table_maps: Vec<TableMap>,
}

impl DbMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table_map(&mut self, table_map: TableMap) {
        self.table_maps.push(table_map);
    }

    pub fn with_table_map(mut self, table_map: TableMap) -> Self {
        self.add_table_map(table_map);
        self
    }

    pub fn table_maps(&self) -> &[TableMap] {
        &self.table_maps
    }

    pub fn len(&self) -> usize {
        self.table_maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table_maps.is_empty()
    }
}
