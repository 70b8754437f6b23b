use chrono::NaiveDate;
use log::{info, warn};

use crate::columns::{map_columns, records_from_table};
use crate::config::ReportConfig;
use crate::error::{ReportError, Result};
use crate::identity::{apply_identity, try_build_identity_map, IdentityMap};
use crate::metrics::{aggregate, generate_summary, records_for_salesperson};
use crate::sheets::resolve_sheet;
use crate::types::{DelinquencyRecord, SalespersonMetrics, SummaryStats, Workbook};
use crate::util::report_period;

/// Per-build inputs that are not part of the workbook.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext {
    /// Reference date for derived due dates and overdue days.
    pub today: NaiveDate,
}

impl BuildContext {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today() -> Self {
        Self::new(chrono::Local::now().date_naive())
    }
}

/// Everything the renderer needs from one build.
#[derive(Debug)]
pub struct Report {
    pub delinquency_sheet: String,
    pub reference_sheet: Option<String>,
    pub records: Vec<DelinquencyRecord>,
    pub metrics: Vec<SalespersonMetrics>,
    pub summary: SummaryStats,
    /// Soft errors that degraded the build.
    pub warnings: Vec<ReportError>,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records_for_salesperson(&self, code: &str) -> Vec<&DelinquencyRecord> {
        records_for_salesperson(&self.records, code)
    }
}

/// Resolve the reference sheet and build the identity map. Never fails:
/// problems come back as a soft error next to an empty map.
fn load_identity_map(
    workbook: &Workbook,
    sheet_names: &[String],
    config: &ReportConfig,
) -> (Option<String>, IdentityMap, Option<ReportError>) {
    let resolution = match resolve_sheet(sheet_names, &config.reference_sheets) {
        Ok(r) if !r.fallback_used => r,
        _ => {
            let err = ReportError::ReferenceTableUnavailable(format!(
                "no sheet matches {:?}",
                config.reference_sheets
            ));
            return (None, IdentityMap::empty(), Some(err));
        }
    };
    let Some(table) = workbook.table(&resolution.name) else {
        let err = ReportError::ReferenceTableUnavailable(format!(
            "sheet '{}' could not be read",
            resolution.name
        ));
        return (None, IdentityMap::empty(), Some(err));
    };
    match try_build_identity_map(table) {
        Ok(map) => (Some(resolution.name), map, None),
        Err(err) => (Some(resolution.name), IdentityMap::empty(), Some(err)),
    }
}

/// Turn a loaded workbook into normalized records and per-salesperson
/// metrics.
///
/// Hard errors (no sheets, missing required columns, bad values, and an
/// empty sheet when `allow_empty_report` is off) abort the build with nothing
/// partial returned. Soft errors are logged and listed on the report.
pub fn build_report(workbook: &Workbook, config: &ReportConfig, ctx: &BuildContext) -> Result<Report> {
    let period = report_period(ctx.today);
    info!(
        "Building delinquency report for {} to {}",
        period.start.format("%d/%m/%Y"),
        period.end.format("%d/%m/%Y")
    );

    let sheet_names = workbook.sheet_names();
    let mut warnings = Vec::new();

    let base = resolve_sheet(&sheet_names, &config.delinquency_sheets)?;
    if let Some(w) = base.fallback_warning("delinquency") {
        warnings.push(w);
    }
    let raw = workbook
        .table(&base.name)
        .ok_or_else(|| ReportError::Workbook(format!("sheet '{}' could not be read", base.name)))?;

    if raw.is_empty() && !config.allow_empty_report {
        return Err(ReportError::EmptyInput);
    }

    let (reference_sheet, identity_map, reference_warning) =
        load_identity_map(workbook, &sheet_names, config);
    if let Some(w) = reference_warning {
        warn!("{w}; keeping salesperson identities as given");
        warnings.push(w);
    }

    // A blank tab may not even carry a header row, so there is nothing to map.
    if raw.is_empty() {
        warn!("Sheet '{}' has no rows", base.name);
        return Ok(Report {
            delinquency_sheet: base.name,
            reference_sheet,
            records: Vec::new(),
            metrics: Vec::new(),
            summary: generate_summary(&[], ctx.today),
            warnings,
        });
    }
    info!("Columns available: {:?}", raw.columns);

    let mapped = map_columns(raw, &config.legacy_columns, &config.defaults, ctx.today)?;
    let records = records_from_table(&mapped)?;
    let records = apply_identity(records, &identity_map);

    let metrics = aggregate(&records);
    let summary = generate_summary(&records, ctx.today);
    info!(
        "Loaded {} titles for {} salespeople",
        records.len(),
        metrics.len()
    );

    Ok(Report {
        delinquency_sheet: base.name,
        reference_sheet,
        records,
        metrics,
        summary,
        warnings,
    })
}
