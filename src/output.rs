//! Terminal rendering of snapshots, log lines and file listings.

use ark_console_client::{
    logs::LogEntry,
    stats::StatsSource,
    transport::LogFile,
    LiveStatsSnapshot,
};
use chrono::Local;
use comfy_table::{
    presets,
    Attribute,
    Cell,
    Color,
    ContentArrangement,
    Table,
};

const MISSING: &str = "-";

/// One row per server: `(name, latest snapshot, degraded)`.
pub fn stats_table(rows: &[(String, Option<LiveStatsSnapshot>, bool)]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            ["Server", "Status", "Players", "Day", "Time", "Map", "Version", "Source", "Updated"]
                .into_iter()
                .map(|title| Cell::new(title).add_attribute(Attribute::Bold).fg(Color::Cyan)),
        );

    for (name, snapshot, degraded) in rows {
        let name = Cell::new(name).add_attribute(Attribute::Bold);
        let Some(snapshot) = snapshot else {
            table.add_row(vec![name, Cell::new("Waiting").fg(Color::DarkGrey)]);
            continue;
        };

        let mut status = snapshot.status.clone();
        if let Some(error) = &snapshot.error {
            status.push_str(&format!(": {error}"));
        }
        if *degraded {
            status.push_str(" (degraded)");
        }

        table.add_row(vec![
            name,
            Cell::new(status).fg(status_color(snapshot)),
            Cell::new(snapshot.players),
            Cell::new(snapshot.current_day),
            Cell::new(if snapshot.cached {
                format!("{} (cached)", snapshot.current_time)
            } else {
                snapshot.current_time.clone()
            }),
            Cell::new(snapshot.map.as_deref().unwrap_or(MISSING)),
            Cell::new(snapshot.version.as_deref().unwrap_or(MISSING)),
            Cell::new(snapshot.source),
            Cell::new(snapshot.last_updated.with_timezone(&Local).format("%H:%M:%S")),
        ]);
    }

    table
}

fn status_color(snapshot: &LiveStatsSnapshot) -> Color {
    match snapshot.source {
        StatsSource::Unavailable => Color::Red,
        _ if !snapshot.rcon_errors.is_empty() => Color::Yellow,
        _ => Color::Green,
    }
}

pub fn log_files_table(files: &[LogFile]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("File").add_attribute(Attribute::Bold).fg(Color::Cyan),
            Cell::new("Size").add_attribute(Attribute::Bold).fg(Color::Cyan),
        ]);
    for file in files {
        table.add_row(vec![Cell::new(&file.name), Cell::new(format_bytes(file.size))]);
    }
    table
}

fn format_bytes(bytes: u64) -> String {
    if bytes >= 1024 * 1024 * 1024 {
        format!("{:.1}GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    } else if bytes >= 1024 * 1024 {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else {
        format!("{}B", bytes)
    }
}

/// `HH:MM:SS [level] message`, with the file name in front for game log lines.
pub fn log_line(entry: &LogEntry, file: Option<&str>) -> String {
    let time = entry.timestamp.with_timezone(&Local).format("%H:%M:%S");
    match file {
        Some(file) => format!("{time} [{}] {file}: {}", entry.level, entry.message),
        None => format!("{time} [{}] {}", entry.level, entry.message),
    }
}
