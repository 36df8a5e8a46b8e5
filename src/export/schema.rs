//! Column resolution
//!
//! Derives the ordered export column list from form metadata, once per run.
//! A subtable never exports as a single column: it expands into a column for
//! the subtable's own row id followed by one column per sub-field, which is
//! what drives the row-flattening pass.

use crate::types::{FIELD_ID, FIELD_REVISION, FieldKind, Schema};

/// One resolved export column
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    /// Field code this column reads (`$id` / `$revision` are synthetic)
    pub code: String,
    /// Field type driving the rendering rules
    pub kind: FieldKind,
    /// True when the column reads a field inside a subtable row
    pub is_sub_field: bool,
    /// Owning subtable code; empty unless `is_sub_field`
    pub table: String,
}

impl Column {
    fn plain(code: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            code: code.into(),
            kind,
            is_sub_field: false,
            table: String::new(),
        }
    }

    fn sub_field(code: impl Into<String>, kind: FieldKind, table: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            kind,
            is_sub_field: true,
            table: table.into(),
        }
    }
}

/// Ordered column list, fixed for the whole export run
pub type Columns = Vec<Column>;

/// Resolve every exportable column: `$id`, `$revision`, then each field in
/// form order, subtables expanded in place. Fields with an empty code are
/// skipped.
pub fn resolve_all(schema: &Schema) -> Columns {
    let mut columns = vec![
        Column::plain(FIELD_ID, FieldKind::Id),
        Column::plain(FIELD_REVISION, FieldKind::Revision),
    ];

    for field in &schema.fields {
        if field.code.is_empty() {
            continue;
        }
        if field.kind == FieldKind::SubTable {
            // row id for the subtable itself
            columns.push(Column::plain(field.code.as_str(), FieldKind::SubTable));
            for sub in &field.fields {
                columns.push(Column::sub_field(sub.code.as_str(), sub.kind, field.code.as_str()));
            }
        } else {
            columns.push(Column::plain(field.code.as_str(), field.kind));
        }
    }

    columns
}

/// Resolve a requested subset of columns, in request order
///
/// A code naming a subtable expands to the subtable id column plus all of
/// its sub-fields. A code naming a sub-field directly is dropped, as is any
/// code that does not resolve against the metadata.
pub fn resolve_partial(schema: &Schema, requested: &[String]) -> Columns {
    let mut columns = Vec::new();

    for code in requested {
        let Some(column) = resolve_code(schema, code) else {
            continue;
        };
        if column.is_sub_field {
            continue;
        }
        if column.kind == FieldKind::SubTable {
            columns.push(Column::plain(code.as_str(), FieldKind::SubTable));
            if let Some(field) = schema.field(code) {
                for sub in &field.fields {
                    columns.push(Column::sub_field(sub.code.as_str(), sub.kind, code.as_str()));
                }
            }
        } else {
            columns.push(column);
        }
    }

    columns
}

/// Resolve one code against the metadata, including the synthetic
/// `$id`/`$revision` columns and fields nested inside subtables
fn resolve_code(schema: &Schema, code: &str) -> Option<Column> {
    if code == FIELD_ID {
        return Some(Column::plain(code, FieldKind::Id));
    }
    if code == FIELD_REVISION {
        return Some(Column::plain(code, FieldKind::Revision));
    }

    for field in &schema.fields {
        if field.code == code {
            return Some(Column::plain(code, field.kind));
        }
        if field.kind == FieldKind::SubTable {
            for sub in &field.fields {
                if sub.code == code {
                    return Some(Column::sub_field(code, sub.kind, field.code.as_str()));
                }
            }
        }
    }

    None
}

/// Whether any resolved column reads from inside a subtable; controls the
/// `*` marker column in CSV output
pub fn has_sub_table(columns: &[Column]) -> bool {
    columns.iter().any(|c| c.is_sub_field)
}
