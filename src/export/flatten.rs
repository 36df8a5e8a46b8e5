//! Record flattening
//!
//! Expands one logical record into its physical output rows. The expansion
//! itself is a pure function of (record, columns); attachment downloads are
//! computed separately as an explicit job list (see
//! [`attachment_jobs`]) and evaluated by the attachment sink before the pure
//! pass, so rewritten file names flow into the rendered cells.
//!
//! A record expands to `max(1, longest referenced subtable)` rows. Plain
//! field values (and `$id`/`$revision`) repeat on every physical row of
//! their record, not only the first; multi-row consumers relying on
//! first-row-only values must handle this.

use crate::export::schema::Column;
use crate::types::{FieldKind, Record};

/// Multi-value join delimiter used inside flattened CSV cells
pub(crate) const CELL_DELIMITER: &str = "\n";

/// One flattened physical row
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct FlatRow {
    /// Rendered cells aligned to the column list; `None` is an entirely
    /// absent cell (no quotes in CSV), distinct from an empty string
    pub(crate) cells: Vec<Option<String>>,
    /// True for the first physical row of the logical record; drives the
    /// `*` marker cell
    pub(crate) first: bool,
}

/// Number of physical rows this record expands to
pub(crate) fn row_count(record: &Record, columns: &[Column]) -> usize {
    let mut count = 1;
    for column in columns {
        if column.is_sub_field {
            count = count.max(record.sub_table_len(&column.table));
        }
    }
    count
}

/// Flatten one record into display-ready rows
///
/// Pure: no I/O, no mutation. Run the attachment sink first when file cells
/// should show downloaded paths.
pub(crate) fn flatten(record: &Record, columns: &[Column], delimiter: &str) -> Vec<FlatRow> {
    (0..row_count(record, columns))
        .map(|j| FlatRow {
            cells: columns
                .iter()
                .map(|column| cell(record, column, j, delimiter))
                .collect(),
            first: j == 0,
        })
        .collect()
}

fn cell(record: &Record, column: &Column, j: usize, delimiter: &str) -> Option<String> {
    match column.kind {
        FieldKind::Id => Some(record.id.to_string()),
        FieldKind::Revision => Some(record.revision.to_string()),
        // the subtable's own id column, blank past the table's length
        FieldKind::SubTable if !column.is_sub_field => record
            .sub_table(&column.code)
            .and_then(|rows| rows.get(j))
            .map(|row| row.id.to_string()),
        _ if column.is_sub_field => {
            let rows = record.sub_table(&column.table).unwrap_or_default();
            if j < rows.len() {
                // in-bounds rows render even when the sub-field is unset
                Some(
                    rows[j]
                        .fields
                        .get(&column.code)
                        .map(|value| value.render(delimiter))
                        .unwrap_or_default(),
                )
            } else {
                None
            }
        }
        _ => record
            .fields
            .get(&column.code)
            .map(|value| value.render(delimiter)),
    }
}

/// One pending attachment download
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct AttachmentJob {
    /// `(subtable code, row index)` when the file field lives in a subtable
    pub(crate) table: Option<(String, usize)>,
    /// File field code
    pub(crate) code: String,
    /// Directory name under the configured attachment root:
    /// `<code>-<ident>` for plain fields, `<code>-<ident>-<row>` for
    /// subtable cells
    pub(crate) dir: String,
}

/// Compute the attachment downloads this record triggers, in emission order
///
/// Plain file fields trigger once (at the first physical row); file cells
/// inside a subtable trigger once per in-bounds sub-row. `row_ident` is the
/// record id, or the zero-based emission counter for records without one.
pub(crate) fn attachment_jobs(
    record: &Record,
    columns: &[Column],
    row_ident: u64,
) -> Vec<AttachmentJob> {
    let mut jobs = Vec::new();

    for j in 0..row_count(record, columns) {
        for column in columns {
            if column.kind != FieldKind::File {
                continue;
            }
            if column.is_sub_field {
                if j < record.sub_table_len(&column.table) {
                    jobs.push(AttachmentJob {
                        table: Some((column.table.clone(), j)),
                        code: column.code.clone(),
                        dir: format!("{}-{}-{}", column.code, row_ident, j),
                    });
                }
            } else if j == 0 && record.fields.contains_key(&column.code) {
                jobs.push(AttachmentJob {
                    table: None,
                    code: column.code.clone(),
                    dir: format!("{}-{}", column.code, row_ident),
                });
            }
        }
    }

    jobs
}
