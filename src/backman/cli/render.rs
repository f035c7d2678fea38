use backman::commands::{CmdMessage, MessageLevel};
use backman::model::{format_duration, parse_timestamp, BackupRecord};
use colored::Colorize;
use unicode_width::UnicodeWidthStr;

const HEADERS: [&str; 9] = [
    "TIMESTAMP",
    "DATE",
    "STATUS",
    "DATABASE",
    "TYPE",
    "OBJECT FILTERING",
    "PLUGIN",
    "DURATION",
    "DATE DELETED",
];
const DATE_FORMAT: &str = "%a %b %d %Y %H:%M:%S";

pub(super) fn print_messages(messages: &[CmdMessage]) {
    for message in messages {
        match message.level {
            MessageLevel::Info => println!("{}", message.content.dimmed()),
            MessageLevel::Success => println!("{}", message.content.green()),
            MessageLevel::Warning => println!("{}", message.content.yellow()),
            MessageLevel::Error => eprintln!("{}", message.content.red()),
        }
    }
}

pub(super) fn print_backups(backups: &[BackupRecord]) {
    if backups.is_empty() {
        println!("No backups found.");
        return;
    }
    print!("{}", render_backup_table(backups));
}

pub(super) fn print_report(report: &str) {
    print!("{}", report);
    if !report.ends_with('\n') {
        println!();
    }
}

fn backup_row(record: &BackupRecord) -> Vec<String> {
    let date = parse_timestamp(&record.timestamp)
        .map(|dt| dt.format(DATE_FORMAT).to_string())
        .unwrap_or_default();
    let duration = record
        .duration()
        .map(format_duration)
        .unwrap_or_default();
    vec![
        record.timestamp.clone(),
        date,
        record.status.to_string(),
        record.database_name.clone(),
        record.backup_type().to_string(),
        record.object_filtering().to_string(),
        record.plugin.clone(),
        duration,
        record.date_deleted.to_string(),
    ]
}

pub(super) fn render_backup_table(backups: &[BackupRecord]) -> String {
    let rows: Vec<Vec<String>> = backups.iter().map(backup_row).collect();
    render_table(&HEADERS, &rows)
}

/// Left-aligned columns separated by " | ", widths measured in terminal cells.
fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.width());
        }
    }

    let mut out = render_line(headers, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&format!("-{}-\n", rule.join("-+-")));
    for row in rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push_str(&render_line(&cells, &widths));
    }
    out
}

fn render_line(cells: &[&str], widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{}{}", cell, " ".repeat(width.saturating_sub(cell.width()))))
        .collect();
    format!(" {}\n", padded.join(" | ").trim_end())
}
