//! Table rendering for CLI output using comfy-table.
//!
//! | Command | Table Function |
//! |---------|----------------|
//! | `kbpick ls` | `render_resources_table()` |
//! | `kbpick connections` | `render_connections_table()` |

use chrono::{DateTime, Utc};
use comfy_table::presets::NOTHING;
use comfy_table::{Cell, ColumnConstraint, Table, Width};

use super::format::{format_relative_time, truncate_str};

/// Columns other than NAME take roughly this much of the terminal width.
const FIXED_COLUMNS_WIDTH: usize = 48;

/// Narrowest NAME column before names get truncated anyway.
const MIN_NAME_WIDTH: usize = 20;

/// One directory entry for `kbpick ls`.
#[derive(Debug, Clone)]
pub struct ResourceRow {
    pub id: String,
    pub name: String,
    pub is_folder: bool,
    pub modified_at: DateTime<Utc>,
    /// Status label; `None` renders as `-`.
    pub status: Option<String>,
}

/// One drive connection for `kbpick connections`.
#[derive(Debug, Clone)]
pub struct ConnectionRow {
    pub id: String,
    pub name: Option<String>,
    pub provider: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Render a directory listing.
///
/// Rows are rendered in the given order; callers sort beforehand.
///
/// # Example Output
///
/// ```text
/// TYPE   NAME          MODIFIED     STATUS    ID
/// dir    2024/         2d ago       -         1a2b3c
/// file   report.pdf    2025-01-15   indexed   4d5e6f
/// ```
pub fn render_resources_table(rows: &[ResourceRow], width: usize) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let name_width = width.saturating_sub(FIXED_COLUMNS_WIDTH).max(MIN_NAME_WIDTH);

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(vec![
        Cell::new("TYPE"),
        Cell::new("NAME"),
        Cell::new("MODIFIED"),
        Cell::new("STATUS"),
        Cell::new("ID"),
    ]);
    table.set_constraints(vec![
        ColumnConstraint::LowerBoundary(Width::Fixed(4)),  // TYPE
        ColumnConstraint::LowerBoundary(Width::Fixed(12)), // NAME
        ColumnConstraint::LowerBoundary(Width::Fixed(10)), // MODIFIED
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),  // STATUS
    ]);

    for row in rows {
        let (kind, name) = if row.is_folder {
            ("dir", format!("{}/", row.name))
        } else {
            ("file", row.name.clone())
        };
        table.add_row(vec![
            Cell::new(kind),
            Cell::new(truncate_str(&name, name_width)),
            Cell::new(format_relative_time(row.modified_at)),
            Cell::new(row.status.as_deref().unwrap_or("-")),
            Cell::new(truncate_str(&row.id, 16)),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Render the connections available to the account.
///
/// `active` marks the connection being browsed with `*`.
pub fn render_connections_table(rows: &[ConnectionRow], active: Option<&str>) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(vec![
        Cell::new(""),
        Cell::new("ID"),
        Cell::new("NAME"),
        Cell::new("PROVIDER"),
        Cell::new("CREATED"),
    ]);

    for row in rows {
        let marker = if active == Some(row.id.as_str()) { "*" } else { "" };
        let created = row
            .created_at
            .map(format_relative_time)
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(marker),
            Cell::new(&row.id),
            Cell::new(row.name.as_deref().map(|n| truncate_str(n, 32)).unwrap_or_else(|| "-".to_string())),
            Cell::new(row.provider.as_deref().unwrap_or("-")),
            Cell::new(created),
        ]);
    }

    table.trim_fmt().to_string()
}
