//! Core types for record-export
//!
//! The data model mirrors the record service's wire shapes: a record is a
//! map of field code to typed value, where a value may itself be an ordered
//! list of sub-records (a subtable). Field values form a closed sum type so
//! that display formatting stays exhaustive-checked.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, SecondsFormat, Utc};
use std::collections::HashMap;

/// Field code of the synthetic record-id column
pub const FIELD_ID: &str = "$id";

/// Field code of the synthetic revision column
pub const FIELD_REVISION: &str = "$revision";

/// Field type tags as used by the record service's form metadata
///
/// `Id` and `Revision` are synthetic: they never appear in form metadata but
/// are resolvable as the `$id` / `$revision` export columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Single-line text
    SingleLineText,
    /// Multi-line text
    MultiLineText,
    /// Rich (HTML) text
    RichText,
    /// Decimal number, kept as the service's string rendition
    Number,
    /// Calculated field
    Calc,
    /// Check box (multi-valued)
    CheckBox,
    /// Radio button
    RadioButton,
    /// Drop-down (single select, possibly unselected)
    DropDown,
    /// Multi select
    MultiSelect,
    /// File attachment list
    File,
    /// Link (URL, phone, mail)
    Link,
    /// Calendar date
    Date,
    /// Wall-clock time
    Time,
    /// Timezone-qualified timestamp
    DateTime,
    /// User selection
    UserSelect,
    /// Organization selection
    OrganizationSelect,
    /// Group selection
    GroupSelect,
    /// Category list
    Category,
    /// Process-management status
    Status,
    /// Process-management assignees
    Assignee,
    /// Record number
    RecordNumber,
    /// Record creator
    Creator,
    /// Record modifier
    Modifier,
    /// Record creation time
    CreatedTime,
    /// Record modification time
    UpdatedTime,
    /// Nested table of sub-records
    SubTable,
    /// Synthetic `$id` column
    Id,
    /// Synthetic `$revision` column
    Revision,
}

impl FieldKind {
    /// Map a wire type string to a kind; unknown strings yield `None` and
    /// the field is dropped by the decoder
    pub fn from_wire(s: &str) -> Option<Self> {
        Some(match s {
            "SINGLE_LINE_TEXT" => FieldKind::SingleLineText,
            "MULTI_LINE_TEXT" => FieldKind::MultiLineText,
            "RICH_TEXT" => FieldKind::RichText,
            "NUMBER" => FieldKind::Number,
            "CALC" => FieldKind::Calc,
            "CHECK_BOX" => FieldKind::CheckBox,
            "RADIO_BUTTON" => FieldKind::RadioButton,
            "DROP_DOWN" => FieldKind::DropDown,
            "MULTI_SELECT" => FieldKind::MultiSelect,
            "FILE" => FieldKind::File,
            "LINK" => FieldKind::Link,
            "DATE" => FieldKind::Date,
            "TIME" => FieldKind::Time,
            "DATETIME" => FieldKind::DateTime,
            "USER_SELECT" => FieldKind::UserSelect,
            "ORGANIZATION_SELECT" => FieldKind::OrganizationSelect,
            "GROUP_SELECT" => FieldKind::GroupSelect,
            "CATEGORY" => FieldKind::Category,
            "STATUS" => FieldKind::Status,
            "STATUS_ASSIGNEE" => FieldKind::Assignee,
            "RECORD_NUMBER" => FieldKind::RecordNumber,
            "CREATOR" => FieldKind::Creator,
            "MODIFIER" => FieldKind::Modifier,
            "CREATED_TIME" => FieldKind::CreatedTime,
            "UPDATED_TIME" => FieldKind::UpdatedTime,
            "SUBTABLE" => FieldKind::SubTable,
            "__ID__" => FieldKind::Id,
            "__REVISION__" => FieldKind::Revision,
            _ => return None,
        })
    }

    /// The wire type string for this kind
    pub fn as_wire(&self) -> &'static str {
        match self {
            FieldKind::SingleLineText => "SINGLE_LINE_TEXT",
            FieldKind::MultiLineText => "MULTI_LINE_TEXT",
            FieldKind::RichText => "RICH_TEXT",
            FieldKind::Number => "NUMBER",
            FieldKind::Calc => "CALC",
            FieldKind::CheckBox => "CHECK_BOX",
            FieldKind::RadioButton => "RADIO_BUTTON",
            FieldKind::DropDown => "DROP_DOWN",
            FieldKind::MultiSelect => "MULTI_SELECT",
            FieldKind::File => "FILE",
            FieldKind::Link => "LINK",
            FieldKind::Date => "DATE",
            FieldKind::Time => "TIME",
            FieldKind::DateTime => "DATETIME",
            FieldKind::UserSelect => "USER_SELECT",
            FieldKind::OrganizationSelect => "ORGANIZATION_SELECT",
            FieldKind::GroupSelect => "GROUP_SELECT",
            FieldKind::Category => "CATEGORY",
            FieldKind::Status => "STATUS",
            FieldKind::Assignee => "STATUS_ASSIGNEE",
            FieldKind::RecordNumber => "RECORD_NUMBER",
            FieldKind::Creator => "CREATOR",
            FieldKind::Modifier => "MODIFIER",
            FieldKind::CreatedTime => "CREATED_TIME",
            FieldKind::UpdatedTime => "UPDATED_TIME",
            FieldKind::SubTable => "SUBTABLE",
            FieldKind::Id => "__ID__",
            FieldKind::Revision => "__REVISION__",
        }
    }
}

/// A user, organization or group reference inside a field value
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Entity {
    /// Login name / organization code / group code
    pub code: String,
    /// Display name
    pub name: String,
}

impl Entity {
    /// Create an entity from its code, with an empty display name
    pub fn from_code(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: String::new(),
        }
    }
}

/// One attached file inside a file field
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileInfo {
    /// File name as shown by the service; rewritten to the local relative
    /// path once an attachment sink has stored the file
    pub name: String,
    /// Opaque key used to download the file body
    pub file_key: String,
    /// MIME type reported by the service
    pub content_type: String,
    /// Size in bytes reported by the service
    pub size: u64,
}

/// One row of a subtable, with its own id and field map
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubRecord {
    /// Row id assigned by the service
    pub id: u64,
    /// Field code to value mapping for this row
    pub fields: HashMap<String, FieldValue>,
}

/// A typed field value
///
/// One variant per service field type, each carrying its typed payload.
/// [`FieldValue::render`] is the single place where values become display
/// strings; keeping the type closed makes the formatting rules
/// exhaustive-checked.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// Single-line text
    SingleLineText(String),
    /// Multi-line text
    MultiLineText(String),
    /// Rich text (raw HTML)
    RichText(String),
    /// Decimal number as the service renders it
    Number(String),
    /// Calculated value as the service renders it
    Calc(String),
    /// Checked options, in service order
    CheckBox(Vec<String>),
    /// Selected radio option
    RadioButton(String),
    /// Selected drop-down option, `None` when unselected
    DropDown(Option<String>),
    /// Selected options, in service order
    MultiSelect(Vec<String>),
    /// Attached files
    File(Vec<FileInfo>),
    /// Link value
    Link(String),
    /// Date, `None` when unset
    Date(Option<NaiveDate>),
    /// Time of day, `None` when unset
    Time(Option<NaiveTime>),
    /// Timestamp, `None` when unset
    DateTime(Option<DateTime<FixedOffset>>),
    /// Selected users
    UserSelect(Vec<Entity>),
    /// Selected organizations
    OrganizationSelect(Vec<Entity>),
    /// Selected groups
    GroupSelect(Vec<Entity>),
    /// Categories
    Category(Vec<String>),
    /// Process-management status
    Status(String),
    /// Process-management assignees
    Assignee(Vec<Entity>),
    /// Record number
    RecordNumber(String),
    /// Record creator
    Creator(Entity),
    /// Record modifier
    Modifier(Entity),
    /// Record creation time
    CreatedTime(DateTime<Utc>),
    /// Record modification time
    UpdatedTime(DateTime<Utc>),
    /// Subtable rows
    SubTable(Vec<SubRecord>),
}

impl FieldValue {
    /// The field kind this value belongs to
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::SingleLineText(_) => FieldKind::SingleLineText,
            FieldValue::MultiLineText(_) => FieldKind::MultiLineText,
            FieldValue::RichText(_) => FieldKind::RichText,
            FieldValue::Number(_) => FieldKind::Number,
            FieldValue::Calc(_) => FieldKind::Calc,
            FieldValue::CheckBox(_) => FieldKind::CheckBox,
            FieldValue::RadioButton(_) => FieldKind::RadioButton,
            FieldValue::DropDown(_) => FieldKind::DropDown,
            FieldValue::MultiSelect(_) => FieldKind::MultiSelect,
            FieldValue::File(_) => FieldKind::File,
            FieldValue::Link(_) => FieldKind::Link,
            FieldValue::Date(_) => FieldKind::Date,
            FieldValue::Time(_) => FieldKind::Time,
            FieldValue::DateTime(_) => FieldKind::DateTime,
            FieldValue::UserSelect(_) => FieldKind::UserSelect,
            FieldValue::OrganizationSelect(_) => FieldKind::OrganizationSelect,
            FieldValue::GroupSelect(_) => FieldKind::GroupSelect,
            FieldValue::Category(_) => FieldKind::Category,
            FieldValue::Status(_) => FieldKind::Status,
            FieldValue::Assignee(_) => FieldKind::Assignee,
            FieldValue::RecordNumber(_) => FieldKind::RecordNumber,
            FieldValue::Creator(_) => FieldKind::Creator,
            FieldValue::Modifier(_) => FieldKind::Modifier,
            FieldValue::CreatedTime(_) => FieldKind::CreatedTime,
            FieldValue::UpdatedTime(_) => FieldKind::UpdatedTime,
            FieldValue::SubTable(_) => FieldKind::SubTable,
        }
    }

    /// Render this value as a display string
    ///
    /// Multi-valued fields join their parts with `delimiter`; an empty
    /// delimiter falls back to `,`. Absent optionals render as the empty
    /// string. A subtable rendered directly (not expanded into columns)
    /// renders as the empty string.
    pub fn render(&self, delimiter: &str) -> String {
        let delimiter = if delimiter.is_empty() { "," } else { delimiter };

        match self {
            FieldValue::SingleLineText(s)
            | FieldValue::MultiLineText(s)
            | FieldValue::RichText(s)
            | FieldValue::Number(s)
            | FieldValue::Calc(s)
            | FieldValue::RadioButton(s)
            | FieldValue::Link(s)
            | FieldValue::Status(s)
            | FieldValue::RecordNumber(s) => s.clone(),

            FieldValue::CheckBox(items)
            | FieldValue::MultiSelect(items)
            | FieldValue::Category(items) => items.join(delimiter),

            FieldValue::DropDown(selected) => selected.clone().unwrap_or_default(),

            FieldValue::File(files) => files
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(delimiter),

            FieldValue::Date(d) => d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
            FieldValue::Time(t) => t.map(|t| t.format("%H:%M:%S").to_string()).unwrap_or_default(),
            FieldValue::DateTime(t) => t
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default(),

            FieldValue::UserSelect(entities)
            | FieldValue::OrganizationSelect(entities)
            | FieldValue::GroupSelect(entities)
            | FieldValue::Assignee(entities) => entities
                .iter()
                .map(|e| e.code.as_str())
                .collect::<Vec<_>>()
                .join(delimiter),

            FieldValue::Creator(entity) | FieldValue::Modifier(entity) => entity.code.clone(),

            FieldValue::CreatedTime(t) | FieldValue::UpdatedTime(t) => {
                t.to_rfc3339_opts(SecondsFormat::Secs, true)
            }

            // unsupported as a scalar cell
            FieldValue::SubTable(_) => String::new(),
        }
    }

    /// Borrow the subtable rows if this value is a subtable
    pub fn as_sub_table(&self) -> Option<&[SubRecord]> {
        match self {
            FieldValue::SubTable(rows) => Some(rows),
            _ => None,
        }
    }
}

/// One remote field's metadata entry
#[derive(Clone, Debug, PartialEq)]
pub struct FieldInfo {
    /// Field code (unique within the app's form)
    pub code: String,
    /// Human-readable label
    pub label: String,
    /// Field type
    pub kind: FieldKind,
    /// Sub-field metadata; non-empty only when `kind` is
    /// [`FieldKind::SubTable`]
    pub fields: Vec<FieldInfo>,
}

/// Ordered form metadata for one app
///
/// Order matters: full-column resolution emits columns in this order, so the
/// schema must preserve the service's form order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema {
    /// Fields in form order
    pub fields: Vec<FieldInfo>,
}

impl Schema {
    /// Look up a top-level field by code
    pub fn field(&self, code: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.code == code)
    }
}

/// One logical record as returned by the record service
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    /// Record id; 0 when the service did not supply one
    pub id: u64,
    /// Revision; 0 when the service did not supply one
    pub revision: u64,
    /// Field code to typed value mapping
    pub fields: HashMap<String, FieldValue>,
    /// The record's unmodified wire JSON object, used verbatim by JSON
    /// export; `Null` for records built in-process
    pub source: serde_json::Value,
}

impl Record {
    /// Borrow the rows of the subtable stored under `code`, if present
    pub fn sub_table(&self, code: &str) -> Option<&[SubRecord]> {
        self.fields.get(code).and_then(FieldValue::as_sub_table)
    }

    /// Number of rows in the subtable stored under `code` (0 when absent)
    pub fn sub_table_len(&self, code: &str) -> usize {
        self.sub_table(code).map(<[SubRecord]>::len).unwrap_or(0)
    }
}
