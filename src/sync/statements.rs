// ABOUTME: SQL text generation for timestamp-driven incremental sync
// ABOUTME: Builds high-water-mark, select, and insert statements from table maps

use anyhow::{bail, Result};
use dmml::{AttributeType, TableMap};

use crate::executor::Row;

/// High-water mark used when the destination table holds no rows yet.
pub const MIN_TIMESTAMP: &str = "0000-00-00 00:00:00";

// Values are spliced into the statement text. Untrusted data should go
// through parameterized statements instead; this layer only guarantees that
// string literals stay closed.

/// Query for the newest destination timestamp, e.g.
/// `select max(synced_at) from orders_copy`.
pub fn high_water_mark_query(table: &TableMap) -> String {
    format!(
        "select max({}) from {}",
        table.destination_timestamp_attribute(),
        table.destination_table()
    )
}

/// Extract the high-water mark from a [`high_water_mark_query`] result,
/// falling back to [`MIN_TIMESTAMP`] when there is no row or the aggregate is NULL.
pub fn high_water_mark_from_rows(rows: &[Row]) -> String {
    rows.first()
        .and_then(|row| row.get(0))
        .unwrap_or(MIN_TIMESTAMP)
        .to_string()
}

/// Select the mapped source columns of every row newer than `high_water_mark`.
///
/// The comparison is strict: a source row whose timestamp equals the mark is
/// never selected, even if it was written after the mark was taken.
pub fn select_query(table: &TableMap, high_water_mark: &str) -> String {
    let columns = table
        .attribute_maps()
        .iter()
        .map(|a| a.source_attribute())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "select {} from {} where {} > {}",
        columns,
        table.source_table(),
        table.source_timestamp_attribute(),
        quote_literal(high_water_mark)
    )
}

/// Insert one selected row into the destination table.
///
/// Column `i` of `row` lands in the destination attribute of attribute map `i`.
pub fn insert_statement(table: &TableMap, row: &Row) -> Result<String> {
    let attributes = table.attribute_maps();
    if row.len() < attributes.len() {
        bail!(
            "Row from {} has {} columns but {} attributes are mapped",
            table.source_table(),
            row.len(),
            attributes.len()
        );
    }

    let columns = attributes
        .iter()
        .map(|a| a.destination_attribute())
        .collect::<Vec<_>>()
        .join(",");
    let values = attributes
        .iter()
        .enumerate()
        .map(|(idx, a)| render_value(a.attribute_type(), row.get(idx)))
        .collect::<Vec<_>>()
        .join(",");

    Ok(format!(
        "insert into {}({}) values ({})",
        table.destination_table(),
        columns,
        values
    ))
}

/// Render one value as a SQL literal according to its attribute type.
pub fn render_value(attribute_type: AttributeType, value: Option<&str>) -> String {
    match (value, attribute_type) {
        (None, _) => "NULL".to_string(),
        (Some(v), AttributeType::String) => quote_literal(v),
        (Some(v), AttributeType::Numerical) => v.to_string(),
    }
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmml::AttributeMap;

    fn orders() -> TableMap {
        TableMap::new("orders", "orders_copy", "updated_at", "synced_at")
            .with_attribute_map(AttributeMap::new("id", "order_id", AttributeType::Numerical))
            .with_attribute_map(AttributeMap::new("status", "status", AttributeType::String))
    }

    fn row(values: &[Option<&str>]) -> Row {
        values.iter().copied().collect()
    }

    #[test]
    fn test_high_water_mark_query() {
        assert_eq!(
            high_water_mark_query(&orders()),
            "select max(synced_at) from orders_copy"
        );
    }

    #[test]
    fn test_high_water_mark_defaults_to_min_timestamp() {
        assert_eq!(high_water_mark_from_rows(&[]), MIN_TIMESTAMP);
        assert_eq!(high_water_mark_from_rows(&[row(&[None])]), MIN_TIMESTAMP);
        assert_eq!(
            high_water_mark_from_rows(&[row(&[Some("2024-01-01 00:00:00")])]),
            "2024-01-01 00:00:00"
        );
    }

    #[test]
    fn test_select_query_text() {
        assert_eq!(
            select_query(&orders(), "2024-01-01 00:00:00"),
            "select id, status from orders where updated_at > '2024-01-01 00:00:00'"
        );
    }

    #[test]
    fn test_select_query_with_sentinel() {
        assert_eq!(
            select_query(&orders(), MIN_TIMESTAMP),
            "select id, status from orders where updated_at > '0000-00-00 00:00:00'"
        );
    }

    #[test]
    fn test_insert_statement_text() {
        let statement = insert_statement(&orders(), &row(&[Some("42"), Some("shipped")])).unwrap();
        assert_eq!(
            statement,
            "insert into orders_copy(order_id,status) values (42,'shipped')"
        );
    }

    #[test]
    fn test_insert_statement_renders_null_unquoted() {
        let statement = insert_statement(&orders(), &row(&[Some("7"), None])).unwrap();
        assert_eq!(
            statement,
            "insert into orders_copy(order_id,status) values (7,NULL)"
        );
    }

    #[test]
    fn test_insert_statement_ignores_extra_columns() {
        let statement =
            insert_statement(&orders(), &row(&[Some("1"), Some("new"), Some("x")])).unwrap();
        assert_eq!(
            statement,
            "insert into orders_copy(order_id,status) values (1,'new')"
        );
    }

    #[test]
    fn test_insert_statement_rejects_short_row() {
        assert!(insert_statement(&orders(), &row(&[Some("1")])).is_err());
    }

    #[test]
    fn test_render_value_keeps_string_literal_closed() {
        assert_eq!(
            render_value(AttributeType::String, Some("o'brien")),
            "'o''brien'"
        );
        assert_eq!(render_value(AttributeType::Numerical, Some("3.25")), "3.25");
    }
}
