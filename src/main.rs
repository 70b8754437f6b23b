// Entry point and high-level CLI flow.
//
// - Option [1] finds and loads the workbook, builds the report and prints
//   diagnostics (selected sheets, row counts, warnings).
// - Option [2] previews the per-salesperson table and exports the records,
//   the metrics and a JSON summary.
// - Option [3] shows the titles of a single salesperson.
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;

use delinquency_report::config::DEFAULT_CONFIG_FILE;
use delinquency_report::metrics::{metrics_rows, title_rows};
use delinquency_report::util::{format_brl, format_int, format_percent};
use delinquency_report::{build_report, loader, output, BuildContext, Report, ReportConfig};

// The last built report, so it can be previewed and exported several times
// in one run without reloading the workbook.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState { report: None }));

struct AppState {
    report: Option<Report>,
}

/// Read a single trimmed line after printing `prompt`.
fn read_line(prompt: &str) -> String {
    print!("{prompt}");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Ask the user whether to go back to the menu after generating reports.
///
/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        match read_line("Back to Report Selection (Y/N): ").to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn load_report(config: &ReportConfig) -> Result<Report> {
    let root = Path::new(".");
    let path = loader::find_workbook(config, root).ok_or_else(|| {
        anyhow!(
            "no workbook found; place it in '{}' or name it one of {:?}",
            config.upload_dir.display(),
            config.fallback_workbooks
        )
    })?;
    let workbook = loader::load_workbook(&path)
        .with_context(|| format!("failed to load workbook: {}", path.display()))?;
    build_report(&workbook, config, &BuildContext::today())
        .with_context(|| format!("cannot process file: {}", path.display()))
}

/// Handle option [1]: load the workbook and build the report.
fn handle_load(config: &ReportConfig) {
    match load_report(config) {
        Ok(report) => {
            println!(
                "Processing workbook... (sheet '{}', {} titles, {} salespeople)",
                report.delinquency_sheet,
                format_int(report.records.len()),
                format_int(report.metrics.len())
            );
            match &report.reference_sheet {
                Some(name) => println!("Salesperson reference: sheet '{name}'"),
                None => println!("Salesperson reference: none"),
            }
            for warning in &report.warnings {
                println!("Warning: {warning}");
            }
            if report.is_empty() {
                println!("Note: the delinquency sheet has no rows.");
            }
            println!();
            let mut state = APP_STATE.lock().unwrap_or_else(PoisonError::into_inner);
            state.report = Some(report);
        }
        Err(e) => {
            eprintln!("Failed to load file: {e:#}\n");
        }
    }
}

/// Handle option [2]: preview the salesperson table and export everything.
fn handle_generate_reports(config: &ReportConfig) {
    let state = APP_STATE.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(report) = state.report.as_ref() else {
        println!("Error: No data loaded. Please load the workbook first (option 1).\n");
        return;
    };

    println!("Delinquency by Salesperson");
    println!("(Sorted by average days overdue, lowest first)\n");
    output::preview_table_rows(&metrics_rows(&report.metrics), config.preview_rows);

    let s = &report.summary;
    println!(
        "Period {} to {}: {} titles, {} delinquent, {} open ({})\n",
        s.period.start.format("%d/%m/%Y"),
        s.period.end.format("%d/%m/%Y"),
        format_int(s.total_titles),
        format_brl(s.total_delinquent_value),
        format_brl(s.total_open_value),
        format_percent(s.delinquency_percent)
    );

    match output::export_report(report, &config.output_dir) {
        Ok(paths) => {
            for p in paths {
                println!("(Exported to {})", p.display());
            }
            println!();
        }
        Err(e) => eprintln!("Write error: {e}"),
    }
}

/// Handle option [3]: titles of one salesperson.
fn handle_salesperson() {
    let state = APP_STATE.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(report) = state.report.as_ref() else {
        println!("Error: No data loaded. Please load the workbook first (option 1).\n");
        return;
    };
    let code = read_line("Salesperson code: ");
    let records = report.records_for_salesperson(&code);
    if records.is_empty() {
        println!("No titles for salesperson {code}.\n");
        return;
    }
    println!("\nTitles for {} ({})\n", records[0].unified_salesperson_name, code);
    output::preview_table_rows(&title_rows(&records), records.len());
}

fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = match ReportConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration in {}: {e}", config_path.display());
            std::process::exit(2);
        }
    };

    loop {
        println!("Delinquency Report");
        println!("[1] Load the workbook");
        println!("[2] Generate Reports");
        println!("[3] Salesperson Detail\n");
        match read_line("Enter choice: ").as_str() {
            "1" => handle_load(&config),
            "2" => {
                println!();
                handle_generate_reports(&config);
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "3" => handle_salesperson(),
            _ => println!("Invalid choice. Please enter 1, 2 or 3.\n"),
        }
    }
}
