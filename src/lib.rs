//! # Delinquency Report
//!
//! Turns a supplier's overdue-receivables workbook into a normalized table of
//! titles and a per-salesperson delinquency table.
//!
//! The pipeline:
//!
//! 1. [`sheets::resolve_sheet`] picks the delinquency-base and
//!    salesperson-reference sheets from ranked candidate names.
//! 2. [`columns::map_columns`] renames legacy headers and derives missing
//!    fields; [`columns::records_from_table`] types the rows.
//! 3. [`identity::build_identity_map`] and [`identity::apply_identity`]
//!    collapse salespeople who sell under several codes.
//! 4. [`metrics::aggregate`] groups by unified salesperson and sorts by mean
//!    overdue days.
//!
//! [`pipeline::build_report`] runs all of it on an in-memory [`Workbook`].
//! The core is synchronous and holds no process-wide state.

pub mod columns;
pub mod config;
pub mod error;
pub mod identity;
pub mod loader;
pub mod metrics;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod sheets;
pub mod types;
pub mod util;

pub use config::{DefaultValues, ReportConfig};
pub use error::{ReportError, Result};
pub use identity::IdentityMap;
pub use pipeline::{build_report, BuildContext, Report};
pub use types::{
    Cell, DelinquencyRecord, SalespersonMetrics, Sheet, SummaryStats, Table, UnifiedIdentity,
    Workbook,
};
