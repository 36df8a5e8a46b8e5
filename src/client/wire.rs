//! Wire-format decoding for the record service's JSON payloads
//!
//! Records arrive as `{code: {"type": T, "value": V}}` objects; form
//! metadata as an ordered `properties` array. Decoding is deliberately
//! lenient at the field level: a field with an unknown type tag or an
//! unparseable value is dropped from the typed map (its export cell renders
//! blank), while structurally broken payloads fail the whole request.

use crate::error::{Error, Result};
use crate::types::{Entity, FieldInfo, FieldKind, FieldValue, FileInfo, Record, Schema, SubRecord};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

/// Decode a form-metadata response (`{"properties": [...]}`), preserving the
/// service's field order
pub(crate) fn parse_schema(body: &Value) -> Result<Schema> {
    let properties = body
        .get("properties")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::MalformedResponse("missing 'properties' array".to_string()))?;

    Ok(Schema {
        fields: properties.iter().filter_map(parse_field_info).collect(),
    })
}

fn parse_field_info(entry: &Value) -> Option<FieldInfo> {
    let code = entry.get("code")?.as_str()?.to_string();
    let kind = FieldKind::from_wire(entry.get("type")?.as_str()?)?;
    let label = entry
        .get("label")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let fields = match kind {
        FieldKind::SubTable => entry
            .get("fields")
            .and_then(Value::as_array)
            .map(|subs| subs.iter().filter_map(parse_field_info).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    Some(FieldInfo {
        code,
        label,
        kind,
        fields,
    })
}

/// Decode a record-page response (`{"records": [...]}`)
pub(crate) fn parse_page(body: &Value) -> Result<Vec<Record>> {
    let records = body
        .get("records")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::MalformedResponse("missing 'records' array".to_string()))?;

    records.iter().map(parse_record).collect()
}

/// Decode one record object into its typed form, keeping the raw JSON
/// alongside for JSON-mode export
pub(crate) fn parse_record(body: &Value) -> Result<Record> {
    let entries = body
        .as_object()
        .ok_or_else(|| Error::MalformedResponse("record is not an object".to_string()))?;

    let mut record = Record {
        source: body.clone(),
        ..Default::default()
    };

    for (code, entry) in entries {
        let Some(kind) = entry
            .get("type")
            .and_then(Value::as_str)
            .and_then(FieldKind::from_wire)
        else {
            continue;
        };
        let value = entry.get("value").unwrap_or(&Value::Null);

        match kind {
            FieldKind::Id => record.id = uint_of(value),
            FieldKind::Revision => record.revision = uint_of(value),
            _ => {
                if let Some(typed) = parse_value(kind, value) {
                    record.fields.insert(code.clone(), typed);
                }
            }
        }
    }

    Ok(record)
}

/// Decode one `{type, value}` pair; `None` drops the field
fn parse_value(kind: FieldKind, value: &Value) -> Option<FieldValue> {
    Some(match kind {
        FieldKind::SingleLineText => FieldValue::SingleLineText(string_of(value)),
        FieldKind::MultiLineText => FieldValue::MultiLineText(string_of(value)),
        FieldKind::RichText => FieldValue::RichText(string_of(value)),
        FieldKind::Number => FieldValue::Number(string_of(value)),
        FieldKind::Calc => FieldValue::Calc(string_of(value)),
        FieldKind::RadioButton => FieldValue::RadioButton(string_of(value)),
        FieldKind::Link => FieldValue::Link(string_of(value)),
        FieldKind::Status => FieldValue::Status(string_of(value)),
        FieldKind::RecordNumber => FieldValue::RecordNumber(string_of(value)),

        FieldKind::CheckBox => FieldValue::CheckBox(string_list(value)),
        FieldKind::MultiSelect => FieldValue::MultiSelect(string_list(value)),
        FieldKind::Category => FieldValue::Category(string_list(value)),

        FieldKind::DropDown => FieldValue::DropDown(value.as_str().map(str::to_string)),

        FieldKind::File => FieldValue::File(
            value
                .as_array()
                .map(|files| files.iter().filter_map(parse_file).collect())
                .unwrap_or_default(),
        ),

        FieldKind::Date => FieldValue::Date(
            value
                .as_str()
                .filter(|s| !s.is_empty())
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()),
        ),
        FieldKind::Time => FieldValue::Time(value.as_str().and_then(parse_time)),
        FieldKind::DateTime => FieldValue::DateTime(
            value
                .as_str()
                .filter(|s| !s.is_empty())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok()),
        ),

        FieldKind::UserSelect => FieldValue::UserSelect(entity_list(value)),
        FieldKind::OrganizationSelect => FieldValue::OrganizationSelect(entity_list(value)),
        FieldKind::GroupSelect => FieldValue::GroupSelect(entity_list(value)),
        FieldKind::Assignee => FieldValue::Assignee(entity_list(value)),

        FieldKind::Creator => FieldValue::Creator(parse_entity(value)?),
        FieldKind::Modifier => FieldValue::Modifier(parse_entity(value)?),

        FieldKind::CreatedTime => FieldValue::CreatedTime(parse_utc(value)?),
        FieldKind::UpdatedTime => FieldValue::UpdatedTime(parse_utc(value)?),

        FieldKind::SubTable => FieldValue::SubTable(
            value
                .as_array()
                .map(|rows| rows.iter().filter_map(parse_sub_record).collect())
                .unwrap_or_default(),
        ),

        // handled by parse_record, never stored as field values
        FieldKind::Id | FieldKind::Revision => return None,
    })
}

fn parse_sub_record(row: &Value) -> Option<SubRecord> {
    let id = uint_of(row.get("id").unwrap_or(&Value::Null));
    let entries = row.get("value")?.as_object()?;

    let mut fields = HashMap::new();
    for (code, entry) in entries {
        let Some(kind) = entry
            .get("type")
            .and_then(Value::as_str)
            .and_then(FieldKind::from_wire)
        else {
            continue;
        };
        let value = entry.get("value").unwrap_or(&Value::Null);
        if let Some(typed) = parse_value(kind, value) {
            fields.insert(code.clone(), typed);
        }
    }

    Some(SubRecord { id, fields })
}

fn parse_file(entry: &Value) -> Option<FileInfo> {
    Some(FileInfo {
        name: entry.get("name")?.as_str()?.to_string(),
        file_key: entry
            .get("fileKey")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        content_type: entry
            .get("contentType")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        size: uint_of(entry.get("size").unwrap_or(&Value::Null)),
    })
}

fn parse_entity(value: &Value) -> Option<Entity> {
    let code = value.get("code")?.as_str()?.to_string();
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(Entity { code, name })
}

fn entity_list(value: &Value) -> Vec<Entity> {
    value
        .as_array()
        .map(|entities| entities.iter().filter_map(parse_entity).collect())
        .unwrap_or_default()
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    // the service emits HH:MM for time fields, HH:MM:SS appears in exports
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

fn parse_utc(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

fn string_of(value: &Value) -> String {
    value.as_str().unwrap_or_default().to_string()
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| items.iter().map(string_of).collect())
        .unwrap_or_default()
}

/// Numbers arrive as JSON strings (`"5"`) from the service; accept bare
/// numbers too
fn uint_of(value: &Value) -> u64 {
    match value {
        Value::String(s) => s.parse().unwrap_or(0),
        Value::Number(n) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}
