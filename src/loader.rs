use std::fs;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use log::{error, info};

use crate::config::ReportConfig;
use crate::error::{ReportError, Result};
use crate::types::{Cell, Sheet, Table, Workbook};
use crate::util::excel_serial_to_date;

/// Case-insensitive extension check against `allowed`.
pub fn allowed_file(path: &Path, allowed: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Locate the workbook: first a marked file in the upload directory, then
/// the fixed fallback names in the working directory.
pub fn find_workbook(config: &ReportConfig, root: &Path) -> Option<PathBuf> {
    let upload_dir = root.join(&config.upload_dir);
    if let Ok(entries) = fs::read_dir(&upload_dir) {
        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && allowed_file(p, &config.allowed_extensions))
            .filter(|p| {
                let name = p
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default()
                    .to_uppercase();
                config.workbook_markers.iter().any(|m| name.contains(&m.to_uppercase()))
            })
            .collect();
        // Directory order is platform dependent.
        candidates.sort();
        if let Some(found) = candidates.into_iter().next() {
            return Some(found);
        }
    }

    let found = config
        .fallback_workbooks
        .iter()
        .map(|name| root.join(name))
        .find(|p| p.is_file());
    if found.is_none() {
        error!(
            "No workbook found in {} or {}",
            upload_dir.display(),
            root.display()
        );
    }
    found
}

fn cell_from_data(cell: &Data) -> Cell {
    match cell {
        Data::String(v) => Cell::Text(v.to_string()),
        Data::Float(v) => Cell::Number(*v),
        Data::Int(v) => Cell::Number(*v as f64),
        Data::Bool(v) => Cell::Text(v.to_string()),
        Data::DateTime(v) => match excel_serial_to_date(v.as_f64()) {
            Some(d) => Cell::Date(d),
            None => Cell::Number(v.as_f64()),
        },
        Data::DateTimeIso(v) => Cell::Text(v.to_string()),
        Data::DurationIso(v) => Cell::Text(v.to_string()),
        Data::Error(v) => Cell::Text(format!("{v:?}")),
        Data::Empty => Cell::Empty,
    }
}

/// Build a table from sheet rows: the first non-empty row is the header.
pub fn table_from_rows(rows: Vec<Vec<Cell>>) -> Table {
    let mut rows = rows.into_iter().skip_while(|r| r.iter().all(Cell::is_blank));
    let Some(header) = rows.next() else {
        return Table::default();
    };
    let columns: Vec<String> = header.iter().map(|c| c.to_string().trim().to_string()).collect();
    let data = rows.filter(|r| !r.iter().all(Cell::is_blank)).collect();
    Table::new(columns, data)
}

/// Read every sheet of an `.xlsx`/`.xls` workbook into memory.
pub fn load_workbook(path: &Path) -> Result<Workbook> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| ReportError::Workbook(format!("failed to open {}: {e}", path.display())))?;

    let names = workbook.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| ReportError::Workbook(format!("failed to read sheet {name}: {e}")))?;
        let rows: Vec<Vec<Cell>> = range
            .rows()
            .map(|r| r.iter().map(cell_from_data).collect())
            .collect();
        sheets.push(Sheet {
            name,
            table: table_from_rows(rows),
        });
    }
    info!("Loaded workbook {} ({} sheets)", path.display(), sheets.len());
    Ok(Workbook::new(sheets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn exts() -> Vec<String> {
        vec!["xlsx".to_string(), "xls".to_string()]
    }

    #[test]
    fn extension_check_ignores_case() {
        assert!(allowed_file(Path::new("INADIMPLENCIA GERAL.XLSX"), &exts()));
        assert!(allowed_file(Path::new("dados.xls"), &exts()));
        assert!(!allowed_file(Path::new("dados.csv"), &exts()));
        assert!(!allowed_file(Path::new("xlsx"), &exts()));
    }

    #[test]
    fn header_is_first_non_empty_row() {
        let table = table_from_rows(vec![
            vec![Cell::Empty, Cell::text(" ")],
            vec![Cell::text("RCA "), Cell::text("VALOR")],
            vec![Cell::Number(976.0), Cell::Number(10.0)],
            vec![Cell::Empty, Cell::Empty],
        ]);
        assert_eq!(table.columns, vec!["RCA".to_string(), "VALOR".to_string()]);
        assert_eq!(table.len(), 1);
        assert!(table_from_rows(vec![]).columns.is_empty());
    }

    #[test]
    fn upload_dir_wins_over_fallback_names() {
        let root = tempfile::tempdir().unwrap();
        let config = ReportConfig::default();
        assert_eq!(find_workbook(&config, root.path()), None);

        File::create(root.path().join("RESUMO_VENDAS.xlsx")).unwrap();
        assert_eq!(
            find_workbook(&config, root.path()),
            Some(root.path().join("RESUMO_VENDAS.xlsx"))
        );

        let uploads = root.path().join("uploads");
        fs::create_dir(&uploads).unwrap();
        File::create(uploads.join("notes.txt")).unwrap();
        File::create(uploads.join("outro.xlsx")).unwrap();
        File::create(uploads.join("Inadimplencia Geral 2026.xlsx")).unwrap();
        assert_eq!(
            find_workbook(&config, root.path()),
            Some(uploads.join("Inadimplencia Geral 2026.xlsx"))
        );
    }
}
