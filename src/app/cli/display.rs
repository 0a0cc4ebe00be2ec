//! CLI display utilities for formatting output

use crate::core::styles::StyleRole;
use crate::scanner::api::{ScanImage, ScannerDescriptor};
use prettytable::{format, Cell, Row, Table};
use serde::Serialize;
use std::path::PathBuf;

fn cell(text: &str, role: StyleRole, use_color: bool) -> Cell {
    let cell = Cell::new(text);
    match role.to_prettytable_spec() {
        Some(spec) if use_color => cell.style_spec(spec),
        _ => cell,
    }
}

/// Scanner list as a borderless table
pub fn scanner_table(scanners: &[ScannerDescriptor], use_color: bool) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_CLEAN);
    table.set_titles(Row::new(
        ["ID", "Name", "Transport"]
            .iter()
            .map(|title| cell(title, StyleRole::Header, use_color))
            .collect(),
    ));
    for scanner in scanners {
        table.add_row(Row::new(vec![
            cell(&scanner.id, StyleRole::Id, use_color),
            cell(&scanner.display_name, StyleRole::Value, use_color),
            cell(scanner.transport().as_str(), StyleRole::Dim, use_color),
        ]));
    }
    table
}

pub fn display_scanner_table(scanners: &[ScannerDescriptor], use_color: bool) {
    if scanners.is_empty() {
        eprintln!("No scanners found.");
        return;
    }
    let table = scanner_table(scanners, use_color);
    if use_color && table.print_tty(true).is_ok() {
        return;
    }
    print!("{}", table);
}

pub fn scanners_json(scanners: &[ScannerDescriptor]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(scanners)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageJson<'a> {
    index: usize,
    mime_type: &'a str,
    size: usize,
    data_url: String,
}

/// Scanned pages as `{"pages": [...]}` with data URLs
pub fn pages_json(images: &[ScanImage]) -> serde_json::Result<String> {
    let pages: Vec<PageJson> = images
        .iter()
        .enumerate()
        .map(|(index, image)| PageJson {
            index: index + 1,
            mime_type: image.mime_type,
            size: image.len(),
            data_url: image.to_data_url(),
        })
        .collect();
    serde_json::to_string_pretty(&serde_json::json!({ "pages": pages }))
}

/// One line per written page plus a total
pub fn written_pages_summary(paths: &[PathBuf], use_color: bool) -> String {
    let mut lines: Vec<String> = paths
        .iter()
        .map(|path| StyleRole::Literal.paint(&path.display().to_string(), use_color))
        .collect();
    let noun = if paths.len() == 1 { "page" } else { "pages" };
    lines.push(StyleRole::Success.paint(
        &format!("Scanned {} {}", paths.len(), noun),
        use_color,
    ));
    lines.join("\n")
}
