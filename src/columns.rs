//! Column mapping for the delinquency-base sheet.
//!
//! Two steps, always in this order:
//!
//! 1. [`rename_legacy_columns`] turns supplier headers (`RCA`, `VALOR`, ...)
//!    into canonical ones, never clobbering a canonical column that is
//!    already present.
//! 2. [`apply_derivations`] walks an ordered list of [`DerivationRule`]s and
//!    synthesizes every canonical field still missing. Rules may read
//!    columns produced by earlier rules, so `DATA_VENCIMENTO` can be derived
//!    from `DIAS_ATRASO` only after the rename made `DIAS_ATRASO` visible.
//!
//! [`records_from_table`] then reads the fully-populated table into typed
//! [`DelinquencyRecord`]s.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use log::{debug, info};

use crate::config::DefaultValues;
use crate::error::{ReportError, Result};
use crate::types::{Cell, DelinquencyRecord, Table};
use crate::util::{
    date_from_cell, date_text_from_cell, days_diff, days_from_cell, decimal_from_cell, format_iso,
};

pub const SALESPERSON_CODE: &str = "COD_VENDEDOR";
pub const SALESPERSON_NAME: &str = "NOME_VENDEDOR";
pub const REFERENCE_NAME: &str = "NOME_RCA";
pub const CLIENT_CODE: &str = "COD_CLIENTE";
pub const CLIENT_NAME: &str = "NOME_CLIENTE";
pub const INVOICE_VALUE: &str = "VALOR_TITULO";
pub const PAID_VALUE: &str = "VALOR_PAGO";
pub const OVERDUE_DAYS: &str = "DIAS_ATRASO";
pub const DUE_DATE: &str = "DATA_VENCIMENTO";
pub const PAYMENT_DATE: &str = "DATA_PAGAMENTO";
pub const TITLE_STATUS: &str = "STATUS_TITULO";
pub const NOTES: &str = "OBSERVACOES";

pub const CANONICAL_FIELDS: &[&str] = &[
    SALESPERSON_CODE,
    SALESPERSON_NAME,
    CLIENT_CODE,
    CLIENT_NAME,
    INVOICE_VALUE,
    PAID_VALUE,
    OVERDUE_DAYS,
    DUE_DATE,
    PAYMENT_DATE,
    TITLE_STATUS,
    NOTES,
];

/// How a missing field gets its values. Each variant but `Literal` and
/// `Null` reads one source column.
#[derive(Debug, Clone, PartialEq)]
pub enum Derive {
    CopyColumn(String),
    /// `prefix` followed by the source cell, e.g. `"Salesperson 976"`.
    PrefixColumn { prefix: String, column: String },
    Literal(Cell),
    /// `today - <days column>` as an ISO date.
    DaysBeforeToday(String),
    /// `today - <date column>` in whole days.
    DaysSince(String),
    Null,
}

impl Derive {
    pub fn dependency(&self) -> Option<&str> {
        match self {
            Derive::CopyColumn(c)
            | Derive::PrefixColumn { column: c, .. }
            | Derive::DaysBeforeToday(c)
            | Derive::DaysSince(c) => Some(c),
            Derive::Literal(_) | Derive::Null => None,
        }
    }

    /// Values for every row. A source cell that cannot be turned into the
    /// derived value is an `InvalidValue` naming that cell.
    fn values(&self, table: &Table, today: NaiveDate) -> Result<Vec<Cell>> {
        let dependency = self.dependency();
        let source = dependency.and_then(|c| table.column_index(c));
        let invalid = |row: usize, cell: &Cell| ReportError::InvalidValue {
            row: row + 1,
            column: dependency.unwrap_or_default().to_string(),
            value: cell.to_string(),
        };
        (0..table.len())
            .map(|row| -> Result<Cell> {
                let src = source.map(|col| table.cell(row, col));
                let value = match (self, src) {
                    (Derive::CopyColumn(_), Some(cell)) => cell.clone(),
                    (Derive::PrefixColumn { prefix, .. }, Some(cell)) => {
                        Cell::Text(format!("{prefix}{}", cell.as_code()))
                    }
                    (Derive::DaysBeforeToday(_), Some(cell)) => {
                        let due = days_from_cell(cell)
                            .and_then(Duration::try_days)
                            .and_then(|d| today.checked_sub_signed(d))
                            .ok_or_else(|| invalid(row, cell))?;
                        Cell::Text(format_iso(due))
                    }
                    (Derive::DaysSince(_), Some(cell)) if cell.is_blank() => Cell::Empty,
                    (Derive::DaysSince(_), Some(cell)) => {
                        let due = date_from_cell(cell).ok_or_else(|| invalid(row, cell))?;
                        Cell::Number(days_diff(due, today) as f64)
                    }
                    (Derive::Literal(value), _) => value.clone(),
                    _ => Cell::Empty,
                };
                Ok(value)
            })
            .collect()
    }
}

/// A canonical field plus the strategies that can fill it, tried in order.
/// The first strategy whose dependency column exists wins.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivationRule {
    pub field: String,
    pub strategies: Vec<Derive>,
}

impl DerivationRule {
    fn new(field: &str, strategies: Vec<Derive>) -> Self {
        Self {
            field: field.to_string(),
            strategies,
        }
    }
}

/// The default rule list, in evaluation order.
pub fn default_rules(defaults: &DefaultValues) -> Vec<DerivationRule> {
    vec![
        DerivationRule::new(
            SALESPERSON_NAME,
            vec![
                Derive::CopyColumn(REFERENCE_NAME.to_string()),
                Derive::PrefixColumn {
                    prefix: defaults.salesperson_prefix.clone(),
                    column: SALESPERSON_CODE.to_string(),
                },
            ],
        ),
        DerivationRule::new(CLIENT_CODE, vec![Derive::Literal(Cell::text(&defaults.client_code))]),
        DerivationRule::new(CLIENT_NAME, vec![Derive::Literal(Cell::text(&defaults.client_name))]),
        DerivationRule::new(DUE_DATE, vec![Derive::DaysBeforeToday(OVERDUE_DAYS.to_string())]),
        DerivationRule::new(OVERDUE_DAYS, vec![Derive::DaysSince(DUE_DATE.to_string())]),
        DerivationRule::new(TITLE_STATUS, vec![Derive::Literal(Cell::text(&defaults.title_status))]),
        DerivationRule::new(PAID_VALUE, vec![Derive::Literal(Cell::Number(0.0))]),
        DerivationRule::new(PAYMENT_DATE, vec![Derive::Null]),
        DerivationRule::new(NOTES, vec![Derive::Literal(Cell::text(""))]),
    ]
}

/// Rename legacy headers to canonical ones. A legacy column is left alone
/// when its canonical target already exists.
pub fn rename_legacy_columns(table: &mut Table, legacy: &BTreeMap<String, String>) {
    for (from, to) in legacy {
        let Some(idx) = table.column_index(from) else {
            continue;
        };
        if table.has_column(to) {
            debug!("Keeping '{}': canonical column {} already present", from, to);
            continue;
        }
        table.rename_column(idx, to);
    }
}

/// Fill every field named by `rules` that the table lacks.
pub fn apply_derivations(table: &mut Table, rules: &[DerivationRule], today: NaiveDate) -> Result<()> {
    for rule in rules {
        if table.has_column(&rule.field) {
            continue;
        }
        let strategy = rule
            .strategies
            .iter()
            .find(|s| s.dependency().map_or(true, |dep| table.has_column(dep)))
            .ok_or_else(|| ReportError::MissingRequiredColumn {
                field: rule.field.clone(),
                requires: rule
                    .strategies
                    .iter()
                    .filter_map(Derive::dependency)
                    .collect::<Vec<_>>()
                    .join(" or "),
            })?;
        debug!("Deriving {} via {:?}", rule.field, strategy);
        let values = strategy.values(table, today)?;
        table.push_column(&rule.field, values);
    }
    Ok(())
}

/// Rename then derive. Fails without touching the caller's table when a
/// required field cannot be produced.
pub fn map_columns(
    raw: &Table,
    legacy: &BTreeMap<String, String>,
    defaults: &DefaultValues,
    today: NaiveDate,
) -> Result<Table> {
    let mut table = raw.clone();
    rename_legacy_columns(&mut table, legacy);
    apply_derivations(&mut table, &default_rules(defaults), today)?;
    info!("Columns after mapping: {:?}", table.columns);
    Ok(table)
}

fn require(table: &Table, field: &str) -> Result<usize> {
    table
        .column_index(field)
        .ok_or_else(|| ReportError::MissingRequiredColumn {
            field: field.to_string(),
            requires: "a source column".to_string(),
        })
}

/// Read a mapped table into records. Unified identity starts out equal to
/// the raw identity; the identity unifier rewrites it.
pub fn records_from_table(table: &Table) -> Result<Vec<DelinquencyRecord>> {
    let code = require(table, SALESPERSON_CODE)?;
    let name = require(table, SALESPERSON_NAME)?;
    let client_code = require(table, CLIENT_CODE)?;
    let client_name = require(table, CLIENT_NAME)?;
    let value = require(table, INVOICE_VALUE)?;
    let paid = require(table, PAID_VALUE)?;
    let days = require(table, OVERDUE_DAYS)?;
    let due = require(table, DUE_DATE)?;
    let payment = require(table, PAYMENT_DATE)?;
    let status = require(table, TITLE_STATUS)?;
    let notes = require(table, NOTES)?;

    let invalid = |row: usize, column: &str, cell: &Cell| ReportError::InvalidValue {
        row: row + 1,
        column: column.to_string(),
        value: cell.to_string(),
    };

    let mut records = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let value_cell = table.cell(row, value);
        let invoice_value =
            decimal_from_cell(value_cell).ok_or_else(|| invalid(row, INVOICE_VALUE, value_cell))?;
        let paid_cell = table.cell(row, paid);
        let paid_value =
            decimal_from_cell(paid_cell).ok_or_else(|| invalid(row, PAID_VALUE, paid_cell))?;
        let days_cell = table.cell(row, days);
        let overdue_days =
            days_from_cell(days_cell).ok_or_else(|| invalid(row, OVERDUE_DAYS, days_cell))?;

        let salesperson_code = table.cell(row, code).as_code();
        let salesperson_name = table.cell(row, name).to_string().trim().to_string();
        records.push(DelinquencyRecord {
            unified_salesperson_code: salesperson_code.clone(),
            unified_salesperson_name: salesperson_name.clone(),
            salesperson_code,
            salesperson_name,
            client_code: table.cell(row, client_code).as_code(),
            client_name: table.cell(row, client_name).to_string().trim().to_string(),
            invoice_value,
            paid_value,
            overdue_days,
            due_date: date_text_from_cell(table.cell(row, due)).unwrap_or_default(),
            payment_date: date_text_from_cell(table.cell(row, payment)),
            title_status: table.cell(row, status).to_string().trim().to_string(),
            notes: table.cell(row, notes).to_string(),
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportConfig;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn legacy_sheet() -> Table {
        Table::new(
            vec!["RCA", "VALOR", "DIAS", "CLIENTE", "DUPLIC", "NOME_RCA"]
                .into_iter()
                .map(String::from)
                .collect(),
            vec![
                vec![
                    Cell::Number(976.0),
                    Cell::Number(1000.0),
                    Cell::Number(15.0),
                    Cell::text("Cliente A"),
                    Cell::text("001"),
                    Cell::text("João Silva"),
                ],
                vec![
                    Cell::Number(515.0),
                    Cell::text("2.500,00"),
                    Cell::Number(30.0),
                    Cell::text("Cliente B"),
                    Cell::text("002"),
                    Cell::text("Maria Santos"),
                ],
            ],
        )
    }

    fn map(raw: &Table) -> Result<Table> {
        let config = ReportConfig::default();
        map_columns(raw, &config.legacy_columns, &config.defaults, today())
    }

    #[test]
    fn legacy_headers_become_canonical() {
        let table = map(&legacy_sheet()).unwrap();
        for field in CANONICAL_FIELDS {
            assert!(table.has_column(field), "missing {field}");
        }
        assert_eq!(table.columns[0], SALESPERSON_CODE);
        assert_eq!(table.columns[1], INVOICE_VALUE);
    }

    #[test]
    fn canonical_column_is_not_clobbered_by_legacy_one() {
        let raw = Table::new(
            vec!["VALOR".into(), "VALOR_TITULO".into()],
            vec![vec![Cell::Number(1.0), Cell::Number(2.0)]],
        );
        let mut table = raw.clone();
        rename_legacy_columns(&mut table, &ReportConfig::default().legacy_columns);
        assert_eq!(table.columns, raw.columns);
    }

    #[test]
    fn derived_fields_take_defaults() {
        let table = map(&legacy_sheet()).unwrap();
        let records = records_from_table(&table).unwrap();
        let first = &records[0];
        assert_eq!(first.salesperson_code, "976");
        assert_eq!(first.salesperson_name, "João Silva");
        assert_eq!(first.client_code, "001");
        assert_eq!(first.due_date, "2026-10-04");
        assert_eq!(first.title_status, "OPEN");
        assert_eq!(first.paid_value, Decimal::ZERO);
        assert_eq!(first.payment_date, None);
        assert_eq!(first.notes, "");
        assert_eq!(records[1].invoice_value, dec!(2500.00));
    }

    #[test]
    fn name_falls_back_to_prefixed_code() {
        let mut raw = legacy_sheet();
        raw.columns.pop();
        for row in &mut raw.rows {
            row.pop();
        }
        let records = records_from_table(&map(&raw).unwrap()).unwrap();
        assert_eq!(records[0].salesperson_name, "Salesperson 976");
        assert_eq!(records[1].salesperson_name, "Salesperson 515");
    }

    #[test]
    fn overdue_days_derived_from_due_date() {
        let raw = Table::new(
            vec!["COD_VENDEDOR".into(), "VALOR_TITULO".into(), "DATA_VENCIMENTO".into()],
            vec![vec![Cell::text("10"), Cell::Number(50.0), Cell::text("09/10/2026")]],
        );
        let records = records_from_table(&map(&raw).unwrap()).unwrap();
        assert_eq!(records[0].overdue_days, 10);
        assert_eq!(records[0].due_date, "2026-10-09");
    }

    #[test]
    fn missing_days_and_due_date_is_a_hard_failure() {
        let raw = Table::new(
            vec!["RCA".into(), "VALOR".into()],
            vec![vec![Cell::text("976"), Cell::Number(10.0)]],
        );
        let err = map(&raw).unwrap_err();
        match err {
            ReportError::MissingRequiredColumn { field, requires } => {
                assert_eq!(field, DUE_DATE);
                assert_eq!(requires, OVERDUE_DAYS);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unparseable_value_names_the_row() {
        let mut raw = legacy_sheet();
        raw.rows[1][1] = Cell::text("dois mil");
        let err = records_from_table(&map(&raw).unwrap()).unwrap_err();
        assert!(matches!(
            err,
            ReportError::InvalidValue { row: 2, ref column, .. } if column == INVOICE_VALUE
        ));
    }

    #[test]
    fn out_of_range_days_are_rejected() {
        let mut raw = legacy_sheet();
        raw.rows[0][2] = Cell::Number(1e9);
        let err = map(&raw).unwrap_err();
        assert!(matches!(
            err,
            ReportError::InvalidValue { row: 1, ref column, .. } if column == OVERDUE_DAYS
        ));

        raw.rows[0][2] = Cell::Number(1e17);
        assert!(matches!(map(&raw), Err(ReportError::InvalidValue { .. })));
    }

    #[test]
    fn unparseable_due_date_is_not_zero_days() {
        let raw = Table::new(
            vec!["COD_VENDEDOR".into(), "VALOR_TITULO".into(), "DATA_VENCIMENTO".into()],
            vec![
                vec![Cell::text("10"), Cell::Number(50.0), Cell::text("09/10/2026")],
                vec![Cell::text("11"), Cell::Number(20.0), Cell::text("sem data")],
            ],
        );
        match map(&raw).unwrap_err() {
            ReportError::InvalidValue { row, column, value } => {
                assert_eq!(row, 2);
                assert_eq!(column, DUE_DATE);
                assert_eq!(value, "sem data");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rule_dependencies_are_explicit() {
        let rules = default_rules(&DefaultValues::default());
        let due = rules.iter().position(|r| r.field == DUE_DATE).unwrap();
        let days = rules.iter().position(|r| r.field == OVERDUE_DAYS).unwrap();
        assert!(due < days);
        assert_eq!(rules[due].strategies[0].dependency(), Some(OVERDUE_DAYS));
    }
}
