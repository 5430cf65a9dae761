use std::fmt;

use crate::model::{AttributeMap, DbMap, TableMap};
use crate::parser::{
    ATTR_MAP_CLOSE, ATTR_MAP_OPEN, DATABASE_MAP_CLOSE, DATABASE_MAP_OPEN, DEST_CLOSE, DEST_OPEN,
    DEST_TIMESTAMP_CLOSE, DEST_TIMESTAMP_OPEN, SOURCE_CLOSE, SOURCE_OPEN, SOURCE_TIMESTAMP_CLOSE,
    SOURCE_TIMESTAMP_OPEN, TABLE_MAP_CLOSE, TABLE_MAP_OPEN, TYPE_CLOSE, TYPE_OPEN,
};

/// Serialize a mapping back into DMML.
///
/// Identifiers are written as-is, so a model whose names contain whitespace
/// will not parse back to itself.
pub fn to_dmml(map: &DbMap) -> String {
    map.to_string()
}

fn write_element(
    f: &mut fmt::Formatter<'_>,
    indent: usize,
    open: &str,
    value: &str,
    close: &str,
) -> fmt::Result {
    writeln!(f, "{:width$}{} {} {}", "", open, value, close, width = indent)
}

fn write_attribute_map(f: &mut fmt::Formatter<'_>, attribute: &AttributeMap) -> fmt::Result {
    writeln!(f, "    {ATTR_MAP_OPEN}")?;
    write_element(f, 6, SOURCE_OPEN, attribute.source_attribute(), SOURCE_CLOSE)?;
    write_element(f, 6, DEST_OPEN, attribute.destination_attribute(), DEST_CLOSE)?;
    write_element(f, 6, TYPE_OPEN, attribute.attribute_type().as_str(), TYPE_CLOSE)?;
    writeln!(f, "    {ATTR_MAP_CLOSE}")
}

impl fmt::Display for TableMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  {TABLE_MAP_OPEN}")?;
        write_element(f, 4, SOURCE_OPEN, self.source_table(), SOURCE_CLOSE)?;
        write_element(f, 4, DEST_OPEN, self.destination_table(), DEST_CLOSE)?;
        write_element(
            f,
            4,
            SOURCE_TIMESTAMP_OPEN,
            self.source_timestamp_attribute(),
            SOURCE_TIMESTAMP_CLOSE,
        )?;
        write_element(
            f,
            4,
            DEST_TIMESTAMP_OPEN,
            self.destination_timestamp_attribute(),
            DEST_TIMESTAMP_CLOSE,
        )?;
        for attribute in self.attribute_maps() {
            write_attribute_map(f, attribute)?;
        }
        writeln!(f, "  {TABLE_MAP_CLOSE}")
    }
}

impl fmt::Display for DbMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{DATABASE_MAP_OPEN}")?;
        for table in self.table_maps() {
            write!(f, "{table}")?;
        }
        writeln!(f, "{DATABASE_MAP_CLOSE}")
    }
}

/// One-line description of a table map, used in summaries and logs.
pub fn describe_table(table: &TableMap) -> String {
    let mut out = format!(
        "{} -> {} ({} -> {})",
        table.source_table(),
        table.destination_table(),
        table.source_timestamp_attribute(),
        table.destination_timestamp_attribute()
    );
    for attribute in table.attribute_maps() {
        out.push_str(&format!(
            "; {}:{} {}",
            attribute.source_attribute(),
            attribute.destination_attribute(),
            attribute.attribute_type()
        ));
    }
    out
}
