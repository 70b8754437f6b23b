use std::path::{Path, PathBuf};

use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use crate::error::Result;
use crate::pipeline::Report;

pub const RECORDS_FILE: &str = "inadimplencia_titulos.csv";
pub const METRICS_FILE: &str = "inadimplencia_vendedores.csv";
pub const SUMMARY_FILE: &str = "inadimplencia_resumo.json";

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Write the records table, the metrics table and the summary into `dir`.
/// Returns the written paths in that order.
pub fn export_report(report: &Report, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let records = dir.join(RECORDS_FILE);
    let metrics = dir.join(METRICS_FILE);
    let summary = dir.join(SUMMARY_FILE);
    write_csv(&records, &report.records)?;
    write_csv(&metrics, &report.metrics)?;
    write_json(&summary, &report.summary)?;
    Ok(vec![records, metrics, summary])
}

/// Markdown table of the first `max_rows` rows, for console previews.
pub fn render_table<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}\n", render_table(rows, max_rows));
    if rows.len() > max_rows {
        println!("({} more rows not shown)\n", rows.len() - max_rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportConfig;
    use crate::metrics::metrics_rows;
    use crate::pipeline::{build_report, BuildContext};
    use crate::types::{Cell, Sheet, Table as SheetTable, Workbook};
    use chrono::NaiveDate;

    fn report() -> Report {
        let workbook = Workbook::new(vec![Sheet {
            name: "BASE_INADI".to_string(),
            table: SheetTable::new(
                vec!["RCA".into(), "VALOR".into(), "DIAS".into()],
                vec![
                    vec![Cell::Number(1.0), Cell::Number(100.0), Cell::Number(5.0)],
                    vec![Cell::Number(2.0), Cell::Number(0.0), Cell::Number(9.0)],
                ],
            ),
        }]);
        let ctx = BuildContext::new(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        build_report(&workbook, &ReportConfig::default(), &ctx).unwrap()
    }

    #[test]
    fn export_writes_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = export_report(&report(), dir.path()).unwrap();
        assert_eq!(paths.len(), 3);

        let metrics = std::fs::read_to_string(dir.path().join(METRICS_FILE)).unwrap();
        let mut lines = metrics.lines();
        assert_eq!(
            lines.next().unwrap(),
            "COD_VENDEDOR,NOME_VENDEDOR,VALOR_TOTAL_INADIMPLENCIA,QTD_TITULOS,VALOR_PAGO,\
             DIAS_ATRASO_MEDIO,VALOR_EM_ABERTO,%_INADIMPLENCIA"
        );
        // Zero total leaves the percentage cell empty.
        assert!(lines.any(|l| l.starts_with("2,") && l.ends_with(',')));

        let summary: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join(SUMMARY_FILE)).unwrap())
                .unwrap();
        assert_eq!(summary["total_titles"], 2);
    }

    #[test]
    fn preview_limits_rows() {
        let rows = metrics_rows(&report().metrics);
        let text = render_table(&rows, 1);
        assert!(text.contains("Salesperson"));
        assert_eq!(text.lines().count(), 3);
        assert_eq!(render_table::<crate::types::MetricsRow>(&[], 5), "(no rows)");
    }
}
