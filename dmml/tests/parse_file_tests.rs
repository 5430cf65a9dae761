use std::io::Write;

use dmml::{parse_file, to_dmml, AttributeType, DmmlError};
use tempfile::{tempdir, NamedTempFile};

const INVENTORY: &str = "<databasemap>
<tablemap>
<source> stock </source> <dest> stock_mirror </dest>
<sourcetimestamp> changed_at </sourcetimestamp> <desttimestamp> mirrored_at </desttimestamp>
<attrmap> <source> sku </source> <dest> sku </dest> <type> STRING </type> </attrmap>
<attrmap> <source> qty </source> <dest> quantity </dest> <type> NUMERICAL </type> </attrmap>
</tablemap>
</databasemap>
";

fn write_mapping(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn parses_mapping_from_disk() {
    let file = write_mapping(INVENTORY);
    let map = parse_file(file.path()).unwrap();

    assert_eq!(map.len(), 1);
    let table = &map.table_maps()[0];
    assert_eq!(table.source_table(), "stock");
    assert_eq!(table.destination_timestamp_attribute(), "mirrored_at");
    assert_eq!(table.attribute_maps()[1].destination_attribute(), "quantity");
    assert_eq!(
        table.attribute_maps()[1].attribute_type(),
        AttributeType::Numerical
    );
}

#[test]
fn missing_file_is_reported_as_not_found() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.dmml");

    let err = parse_file(&path).unwrap_err();
    assert!(err.is_file_not_found());
    match err {
        DmmlError::FileNotFound { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn invalid_file_yields_no_model() {
    let file = write_mapping("<databasemap> <tablemap> <source> stock </source>");
    let err = parse_file(file.path()).unwrap_err();
    assert!(err.is_invalid_mapping());
    assert!(err.to_string().starts_with("invalid mapping file"));
}

#[test]
fn non_utf8_file_is_an_invalid_mapping() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&[0xff, 0xfe, 0x00]).unwrap();
    file.flush().unwrap();

    let err = parse_file(file.path()).unwrap_err();
    assert!(err.is_invalid_mapping(), "{err:?}");
}

#[test]
fn directory_path_is_reported_as_not_found() {
    let dir = tempdir().unwrap();

    let err = parse_file(dir.path()).unwrap_err();
    assert!(err.is_file_not_found(), "{err:?}");
    assert!(err.to_string().starts_with("DMML file not found"));
}

#[test]
fn written_mapping_reloads_from_disk() {
    let original = parse_file(write_mapping(INVENTORY).path()).unwrap();
    let rewritten = write_mapping(&to_dmml(&original));
    assert_eq!(parse_file(rewritten.path()).unwrap(), original);
}

#[test]
fn model_serializes_to_json() {
    let map = parse_file(write_mapping(INVENTORY).path()).unwrap();
    let json = serde_json::to_value(&map).unwrap();
    assert_eq!(json["table_maps"][0]["source_table"], "stock");
    assert_eq!(
        json["table_maps"][0]["attribute_maps"][0]["attribute_type"],
        "STRING"
    );
}
