use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tabled::Tabled;

use crate::normalize::normalize;

/// A single spreadsheet cell as handed over by the workbook loader.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Cell rendered as an identifier: trimmed text, or an integral number
    /// without its `.0`.
    pub fn as_code(&self) -> String {
        match self {
            Cell::Text(s) => s.trim().to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => write!(f, "{s}"),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// A header row plus data rows. Rows may be shorter than the header;
/// missing trailing cells read as `Cell::Empty`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the column whose normalized name equals `name`'s.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let key = normalize(name);
        self.columns.iter().position(|c| normalize(c) == key)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&Cell::Empty)
    }

    pub fn rename_column(&mut self, idx: usize, name: &str) {
        if let Some(col) = self.columns.get_mut(idx) {
            *col = name.to_string();
        }
    }

    /// Append a column, one value per existing row.
    pub fn push_column(&mut self, name: &str, values: Vec<Cell>) {
        let width = self.columns.len();
        self.columns.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.resize(width, Cell::Empty);
            row.push(value);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub table: Table,
}

/// Materialized workbook: sheets in workbook order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.sheets.iter().find(|s| s.name == name).map(|s| &s.table)
    }
}

/// One overdue title after normalization and identity unification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelinquencyRecord {
    #[serde(rename = "COD_VENDEDOR")]
    pub salesperson_code: String,
    #[serde(rename = "NOME_VENDEDOR")]
    pub salesperson_name: String,
    #[serde(rename = "COD_UNIFICADO")]
    pub unified_salesperson_code: String,
    #[serde(rename = "NOME_UNIFICADO")]
    pub unified_salesperson_name: String,
    #[serde(rename = "COD_CLIENTE")]
    pub client_code: String,
    #[serde(rename = "NOME_CLIENTE")]
    pub client_name: String,
    #[serde(rename = "VALOR_TITULO")]
    pub invoice_value: Decimal,
    #[serde(rename = "VALOR_PAGO")]
    pub paid_value: Decimal,
    #[serde(rename = "DIAS_ATRASO")]
    pub overdue_days: i64,
    #[serde(rename = "DATA_VENCIMENTO")]
    pub due_date: String,
    #[serde(rename = "DATA_PAGAMENTO")]
    pub payment_date: Option<String>,
    #[serde(rename = "STATUS_TITULO")]
    pub title_status: String,
    #[serde(rename = "OBSERVACOES")]
    pub notes: String,
}

/// Canonical identity of one real salesperson.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnifiedIdentity {
    pub code: String,
    pub name: String,
}

/// Aggregated delinquency figures for one unified salesperson.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalespersonMetrics {
    #[serde(rename = "COD_VENDEDOR")]
    pub unified_salesperson_code: String,
    #[serde(rename = "NOME_VENDEDOR")]
    pub unified_salesperson_name: String,
    #[serde(rename = "VALOR_TOTAL_INADIMPLENCIA")]
    pub total_delinquent_value: Decimal,
    #[serde(rename = "QTD_TITULOS")]
    pub title_count: usize,
    #[serde(rename = "VALOR_PAGO")]
    pub total_paid_value: Decimal,
    #[serde(rename = "DIAS_ATRASO_MEDIO")]
    pub mean_overdue_days: Decimal,
    #[serde(rename = "VALOR_EM_ABERTO")]
    pub open_value: Decimal,
    /// `None` when the group's invoiced total is zero.
    #[serde(rename = "%_INADIMPLENCIA")]
    pub delinquency_percent: Option<Decimal>,
}

/// Console rendering of a `SalespersonMetrics` row.
#[derive(Debug, Clone, Tabled)]
pub struct MetricsRow {
    #[tabled(rename = "Code")]
    pub code: String,
    #[tabled(rename = "Salesperson")]
    pub name: String,
    #[tabled(rename = "Titles")]
    pub titles: String,
    #[tabled(rename = "Delinquent")]
    pub total: String,
    #[tabled(rename = "Paid")]
    pub paid: String,
    #[tabled(rename = "Open")]
    pub open: String,
    #[tabled(rename = "AvgDays")]
    pub mean_days: String,
    #[tabled(rename = "Delinquency")]
    pub percent: String,
    #[tabled(rename = "Band")]
    pub band: String,
    #[tabled(rename = "Color")]
    pub color: String,
}

/// Console rendering of one title in the salesperson detail view.
#[derive(Debug, Clone, Tabled)]
pub struct TitleRow {
    #[tabled(rename = "Client")]
    pub client_code: String,
    #[tabled(rename = "ClientName")]
    pub client_name: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Paid")]
    pub paid: String,
    #[tabled(rename = "Days")]
    pub overdue_days: i64,
    #[tabled(rename = "Due")]
    pub due_date: String,
    #[tabled(rename = "Status")]
    pub status: String,
}

/// The window the report covers: yesterday back one year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub period: ReportPeriod,
    pub total_titles: usize,
    pub total_salespeople: usize,
    pub total_clients: usize,
    pub total_delinquent_value: Decimal,
    pub total_paid_value: Decimal,
    pub total_open_value: Decimal,
    pub delinquency_percent: Option<Decimal>,
    pub mean_overdue_days: Decimal,
}
