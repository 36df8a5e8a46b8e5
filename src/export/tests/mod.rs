use crate::client::{ByteStream, RecordService};
use crate::config::{ExportConfig, ExportFormat, OutputEncoding};
use crate::error::{Error, Result};
use crate::export::Exporter;
use crate::types::{FieldInfo, FieldKind, FieldValue, FileInfo, Record, Schema, SubRecord};
use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn field(code: &str, kind: FieldKind) -> FieldInfo {
    FieldInfo {
        code: code.to_string(),
        label: code.to_string(),
        kind,
        fields: Vec::new(),
    }
}

fn sub_table_info(code: &str, subs: &[(&str, FieldKind)]) -> FieldInfo {
    FieldInfo {
        code: code.to_string(),
        label: code.to_string(),
        kind: FieldKind::SubTable,
        fields: subs.iter().map(|(c, k)| field(c, *k)).collect(),
    }
}

fn text(value: &str) -> FieldValue {
    FieldValue::SingleLineText(value.to_string())
}

fn record(id: u64, revision: u64, fields: &[(&str, FieldValue)]) -> Record {
    Record {
        id,
        revision,
        fields: fields
            .iter()
            .map(|(c, v)| (c.to_string(), v.clone()))
            .collect(),
        source: json!({"$id": {"type": "__ID__", "value": id.to_string()}}),
    }
}

fn sub_row(id: u64, fields: &[(&str, FieldValue)]) -> SubRecord {
    SubRecord {
        id,
        fields: fields
            .iter()
            .map(|(c, v)| (c.to_string(), v.clone()))
            .collect(),
    }
}

/// In-memory record service: pages through a fixed record list according to
/// the query's `limit`/`offset` clauses and serves canned attachment bodies
struct InMemoryService {
    schema: Schema,
    records: Vec<Record>,
    downloads: HashMap<String, Vec<u8>>,
    fail_downloads: bool,
    queries: Mutex<Vec<String>>,
}

impl InMemoryService {
    fn new(schema: Schema, records: Vec<Record>) -> Self {
        Self {
            schema,
            records,
            downloads: HashMap::new(),
            fail_downloads: false,
            queries: Mutex::new(Vec::new()),
        }
    }

    fn with_download(mut self, key: &str, body: &[u8]) -> Self {
        self.downloads.insert(key.to_string(), body.to_vec());
        self
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    fn page_bounds(&self, query: &str) -> (usize, usize) {
        let total = self.records.len();
        let paged = Regex::new(r"limit\s+(\d+)\s+offset\s+(\d+)").unwrap();
        if let Some(caps) = paged.captures(query) {
            let limit: usize = caps[1].parse().unwrap();
            let offset: usize = caps[2].parse().unwrap();
            return (offset.min(total), (offset + limit).min(total));
        }
        let limited = Regex::new(r"limit\s+(\d+)").unwrap();
        if let Some(caps) = limited.captures(query) {
            let limit: usize = caps[1].parse().unwrap();
            return (0, limit.min(total));
        }
        (0, total)
    }
}

#[async_trait]
impl RecordService for InMemoryService {
    async fn field_metadata(&self) -> Result<Schema> {
        Ok(self.schema.clone())
    }

    async fn fetch_page(&self, _fields: Option<&[String]>, query: &str) -> Result<Vec<Record>> {
        self.queries.lock().unwrap().push(query.to_string());
        let (start, end) = self.page_bounds(query);
        Ok(self.records[start..end].to_vec())
    }

    async fn download(&self, file_key: &str) -> Result<ByteStream> {
        if self.fail_downloads {
            return Err(Error::MalformedResponse("download refused".to_string()));
        }
        let body = self
            .downloads
            .get(file_key)
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(std::io::Cursor::new(body)))
    }
}

async fn export_csv_string(service: InMemoryService, config: ExportConfig) -> String {
    let exporter = Exporter::new(service, config);
    let mut out = Vec::new();
    exporter.export(&mut out).await.unwrap();
    String::from_utf8(out).unwrap()
}

// ---------------------------------------------------------------------------
// CSV pipeline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn plain_record_exports_one_row_with_values_unchanged() {
    let schema = Schema {
        fields: vec![field("Name", FieldKind::SingleLineText)],
    };
    let records = vec![record(1, 5, &[("Name", text("Alice"))])];
    let out = export_csv_string(
        InMemoryService::new(schema, records),
        ExportConfig::default(),
    )
    .await;

    assert_eq!(out, "\"$id\",\"$revision\",\"Name\"\r\n\"1\",\"5\",\"Alice\"\r\n");
}

#[tokio::test]
async fn empty_result_produces_no_header() {
    let schema = Schema {
        fields: vec![field("Name", FieldKind::SingleLineText)],
    };
    let out = export_csv_string(
        InMemoryService::new(schema, Vec::new()),
        ExportConfig::default(),
    )
    .await;

    assert_eq!(out, "");
}

#[tokio::test]
async fn five_hundred_one_records_fetch_two_pages() {
    let schema = Schema {
        fields: vec![field("N", FieldKind::Number)],
    };
    let records: Vec<Record> = (1..=501u64)
        .map(|i| record(i, 1, &[("N", FieldValue::Number(i.to_string()))]))
        .collect();
    let service = InMemoryService::new(schema, records);
    let exporter = Exporter::new(service, ExportConfig::default());

    let mut out = Vec::new();
    let stats = exporter.export(&mut out).await.unwrap();
    let out = String::from_utf8(out).unwrap();

    assert_eq!(stats.pages, 2);
    assert_eq!(stats.records, 501);
    assert_eq!(stats.rows, 501);

    let lines: Vec<&str> = out.split("\r\n").filter(|l| !l.is_empty()).collect();
    // one header plus 501 data rows, ending with the second page's only row
    assert_eq!(lines.len(), 502);
    assert_eq!(lines[0], "\"$id\",\"$revision\",\"N\"");
    assert_eq!(lines[501], "\"501\",\"1\",\"501\"");

    let queries = exporter_queries(&exporter);
    assert_eq!(queries.len(), 2);
    assert!(queries[0].ends_with("limit 500 offset 0"));
    assert!(queries[1].ends_with("limit 500 offset 500"));
}

fn exporter_queries(exporter: &Exporter<InMemoryService>) -> Vec<String> {
    exporter.service().queries()
}

#[tokio::test]
async fn user_supplied_limit_fetches_exactly_once() {
    let schema = Schema {
        fields: vec![field("N", FieldKind::Number)],
    };
    let records: Vec<Record> = (1..=600u64)
        .map(|i| record(i, 1, &[("N", FieldValue::Number(i.to_string()))]))
        .collect();
    let service = InMemoryService::new(schema, records);
    let exporter = Exporter::new(
        service,
        ExportConfig {
            query: "limit 600".to_string(),
            ..Default::default()
        },
    );

    let mut out = Vec::new();
    let stats = exporter.export(&mut out).await.unwrap();

    // 600 > one page, yet the caller's limit is trusted as final
    assert_eq!(stats.pages, 1);
    assert_eq!(stats.records, 600);
    assert_eq!(exporter_queries(&exporter), ["limit 600"]);
}

#[tokio::test]
async fn subtable_record_expands_to_three_marked_rows() {
    let schema = Schema {
        fields: vec![
            field("Name", FieldKind::SingleLineText),
            sub_table_info("Items", &[("Qty", FieldKind::Number)]),
        ],
    };
    let records = vec![record(
        9,
        1,
        &[
            ("Name", text("Bob")),
            (
                "Items",
                FieldValue::SubTable(vec![
                    sub_row(41, &[("Qty", FieldValue::Number("2".to_string()))]),
                    sub_row(42, &[("Qty", FieldValue::Number("5".to_string()))]),
                    sub_row(43, &[]),
                ]),
            ),
        ],
    )];
    let out = export_csv_string(
        InMemoryService::new(schema, records),
        ExportConfig::default(),
    )
    .await;

    let expected = concat!(
        "*,\"$id\",\"$revision\",\"Name\",\"Items\",\"Qty\"\r\n",
        "*,\"9\",\"1\",\"Bob\",\"41\",\"2\"\r\n",
        ",\"9\",\"1\",\"Bob\",\"42\",\"5\"\r\n",
        ",\"9\",\"1\",\"Bob\",\"43\",\"\"\r\n",
    );
    assert_eq!(out, expected);
}

#[tokio::test]
async fn embedded_quotes_survive_a_csv_round_trip() {
    let schema = Schema {
        fields: vec![field("Name", FieldKind::SingleLineText)],
    };
    let original = "say \"hi\" twice";
    let records = vec![record(1, 1, &[("Name", text(original))])];
    let out = export_csv_string(
        InMemoryService::new(schema, records),
        ExportConfig::default(),
    )
    .await;

    let row = out.split("\r\n").nth(1).unwrap();
    let cell = row.split(',').nth(2).unwrap();
    assert_eq!(cell, "\"say \"\"hi\"\" twice\"");

    // standard CSV unquoting recovers the original value
    let unquoted = cell
        .strip_prefix('"')
        .unwrap()
        .strip_suffix('"')
        .unwrap()
        .replace("\"\"", "\"");
    assert_eq!(unquoted, original);
}

#[tokio::test]
async fn requested_fields_drive_column_order() {
    let schema = Schema {
        fields: vec![
            field("fieldA", FieldKind::SingleLineText),
            sub_table_info(
                "subtableX",
                &[
                    ("a", FieldKind::Number),
                    ("b", FieldKind::SingleLineText),
                ],
            ),
        ],
    };
    let records = vec![record(1, 1, &[("fieldA", text("x"))])];
    let config = ExportConfig {
        fields: Some(vec![
            "$id".to_string(),
            "fieldA".to_string(),
            "subtableX".to_string(),
            // bare sub-field and unknown codes drop silently
            "a".to_string(),
            "missing".to_string(),
        ]),
        ..Default::default()
    };
    let out = export_csv_string(InMemoryService::new(schema, records), config).await;

    let header = out.split("\r\n").next().unwrap();
    assert_eq!(
        header,
        "*,\"$id\",\"fieldA\",\"subtableX\",\"a\",\"b\""
    );
}

#[tokio::test]
async fn multi_line_join_uses_newline_inside_csv_cells() {
    let schema = Schema {
        fields: vec![field("Tags", FieldKind::CheckBox)],
    };
    let records = vec![record(
        1,
        1,
        &[(
            "Tags",
            FieldValue::CheckBox(vec!["red".to_string(), "blue".to_string()]),
        )],
    )];
    let out = export_csv_string(
        InMemoryService::new(schema, records),
        ExportConfig::default(),
    )
    .await;

    assert!(out.contains("\"red\nblue\""));
}

// ---------------------------------------------------------------------------
// Attachments
// ---------------------------------------------------------------------------

#[tokio::test]
async fn attachments_are_stored_and_cells_show_relative_paths() {
    let schema = Schema {
        fields: vec![
            field("Photo", FieldKind::File),
            sub_table_info("Docs", &[("Scan", FieldKind::File)]),
        ],
    };
    let records = vec![record(
        12,
        1,
        &[
            (
                "Photo",
                FieldValue::File(vec![FileInfo {
                    name: "a.png".to_string(),
                    file_key: "key-a".to_string(),
                    ..Default::default()
                }]),
            ),
            (
                "Docs",
                FieldValue::SubTable(vec![sub_row(
                    7,
                    &[(
                        "Scan",
                        FieldValue::File(vec![FileInfo {
                            name: "s.pdf".to_string(),
                            file_key: "key-s".to_string(),
                            ..Default::default()
                        }]),
                    )],
                )]),
            ),
        ],
    )];
    let service = InMemoryService::new(schema, records)
        .with_download("key-a", b"AAAA")
        .with_download("key-s", b"SS");

    let dir = TempDir::new().unwrap();
    let config = ExportConfig {
        attachment_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let out = export_csv_string(service, config).await;

    let photo = dir.path().join("Photo-12").join("a.png");
    let scan = dir.path().join("Scan-12-0").join("s.pdf");
    assert_eq!(std::fs::read(&photo).unwrap(), b"AAAA");
    assert_eq!(std::fs::read(&scan).unwrap(), b"SS");

    assert!(out.contains(&format!(
        "\"Photo-12{}a.png\"",
        std::path::MAIN_SEPARATOR
    )));
    assert!(out.contains(&format!(
        "\"Scan-12-0{}s.pdf\"",
        std::path::MAIN_SEPARATOR
    )));
}

#[tokio::test]
async fn attachments_untouched_without_a_target_directory() {
    let schema = Schema {
        fields: vec![field("Photo", FieldKind::File)],
    };
    let records = vec![record(
        3,
        1,
        &[(
            "Photo",
            FieldValue::File(vec![FileInfo {
                name: "a.png".to_string(),
                file_key: "key-a".to_string(),
                ..Default::default()
            }]),
        )],
    )];
    // no download bodies registered: the sink must never be invoked
    let service = InMemoryService::new(schema, records);
    let out = export_csv_string(service, ExportConfig::default()).await;

    assert!(out.contains("\"a.png\""));
}

#[tokio::test]
async fn download_failure_aborts_the_export() {
    let schema = Schema {
        fields: vec![field("Photo", FieldKind::File)],
    };
    let records = vec![record(
        3,
        1,
        &[(
            "Photo",
            FieldValue::File(vec![FileInfo {
                name: "a.png".to_string(),
                file_key: "key-a".to_string(),
                ..Default::default()
            }]),
        )],
    )];
    let mut service = InMemoryService::new(schema, records);
    service.fail_downloads = true;

    let dir = TempDir::new().unwrap();
    let config = ExportConfig {
        attachment_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let exporter = Exporter::new(service, config);
    let mut out = Vec::new();
    assert!(exporter.export(&mut out).await.is_err());
}

#[tokio::test]
async fn records_without_ids_use_the_emission_counter() {
    let schema = Schema {
        fields: vec![field("Photo", FieldKind::File)],
    };
    let first = record(
        0,
        0,
        &[(
            "Photo",
            FieldValue::File(vec![FileInfo {
                name: "a.png".to_string(),
                file_key: "key-a".to_string(),
                ..Default::default()
            }]),
        )],
    );
    let mut second = first.clone();
    second.fields.insert(
        "Photo".to_string(),
        FieldValue::File(vec![FileInfo {
            name: "b.png".to_string(),
            file_key: "key-b".to_string(),
            ..Default::default()
        }]),
    );
    let service = InMemoryService::new(schema, vec![first, second])
        .with_download("key-a", b"1")
        .with_download("key-b", b"2");

    let dir = TempDir::new().unwrap();
    let config = ExportConfig {
        attachment_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    export_csv_string(service, config).await;

    assert!(dir.path().join("Photo-0").join("a.png").exists());
    assert!(dir.path().join("Photo-1").join("b.png").exists());
}

// ---------------------------------------------------------------------------
// JSON mode
// ---------------------------------------------------------------------------

#[tokio::test]
async fn json_export_streams_native_records_unflattened() {
    let schema = Schema {
        fields: vec![field("Name", FieldKind::SingleLineText)],
    };
    let mut a = record(1, 1, &[("Name", text("x"))]);
    a.source = json!({"Name": {"type": "SINGLE_LINE_TEXT", "value": "x"}});
    let mut b = record(2, 1, &[("Name", text("y"))]);
    b.source = json!({"Name": {"type": "SINGLE_LINE_TEXT", "value": "y"}});

    let service = InMemoryService::new(schema, vec![a, b]);
    let exporter = Exporter::new(
        service,
        ExportConfig {
            format: ExportFormat::Json,
            ..Default::default()
        },
    );
    let mut out = Vec::new();
    let stats = exporter.export(&mut out).await.unwrap();
    let out = String::from_utf8(out).unwrap();

    assert_eq!(stats.records, 2);
    assert_eq!(
        out,
        concat!(
            "{\"records\": [\n",
            "{\"Name\":{\"type\":\"SINGLE_LINE_TEXT\",\"value\":\"x\"}},\n",
            "{\"Name\":{\"type\":\"SINGLE_LINE_TEXT\",\"value\":\"y\"}}",
            "\n]}"
        )
    );
}

// ---------------------------------------------------------------------------
// Transcoding
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shift_jis_export_re_encodes_the_whole_stream() {
    let schema = Schema {
        fields: vec![field("Name", FieldKind::SingleLineText)],
    };
    let records = vec![record(1, 1, &[("Name", text("テスト"))])];
    let service = InMemoryService::new(schema, records);
    let exporter = Exporter::new(
        service,
        ExportConfig {
            encoding: OutputEncoding::Sjis,
            ..Default::default()
        },
    );
    let mut out = Vec::new();
    exporter.export(&mut out).await.unwrap();

    // テスト in Shift_JIS
    let needle: &[u8] = &[0x83, 0x65, 0x83, 0x58, 0x83, 0x67];
    assert!(out.windows(needle.len()).any(|w| w == needle));
    // the re-encoded stream is no longer valid UTF-8
    assert!(std::str::from_utf8(&out).is_err());
}

#[tokio::test]
async fn utf16_export_carries_the_signature_once() {
    let schema = Schema {
        fields: vec![field("Name", FieldKind::SingleLineText)],
    };
    let records = vec![record(1, 1, &[("Name", text("A"))])];
    let service = InMemoryService::new(schema, records);
    let exporter = Exporter::new(
        service,
        ExportConfig {
            encoding: OutputEncoding::Utf16LeWithSignature,
            ..Default::default()
        },
    );
    let mut out = Vec::new();
    exporter.export(&mut out).await.unwrap();

    assert_eq!(&out[..2], &[0xFF, 0xFE]);
    // exactly one BOM in the whole stream
    let bom_count = out
        .chunks_exact(2)
        .filter(|pair| pair[0] == 0xFF && pair[1] == 0xFE)
        .count();
    assert_eq!(bom_count, 1);
}
