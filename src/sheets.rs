use std::collections::HashMap;

use log::{info, warn};

use crate::error::{ReportError, Result};
use crate::normalize::normalize;

/// Outcome of picking a sheet for one logical role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetResolution {
    /// Sheet name exactly as it appears in the workbook.
    pub name: String,
    /// True when no candidate matched and the first sheet was taken.
    pub fallback_used: bool,
}

impl SheetResolution {
    /// The soft error describing a fallback, if one happened.
    pub fn fallback_warning(&self, role: &str) -> Option<ReportError> {
        self.fallback_used.then(|| ReportError::SheetNotResolved {
            role: role.to_string(),
            fallback: self.name.clone(),
        })
    }
}

/// Pick the first candidate (in priority order) present among `available`,
/// comparing normalized names. Falls back to the first available sheet.
///
/// An empty workbook is a hard error.
pub fn resolve_sheet(available: &[String], candidates: &[String]) -> Result<SheetResolution> {
    let first = available.first().ok_or(ReportError::EmptyWorkbook)?;

    // First spelling wins when two sheets normalize to the same key.
    let mut by_key: HashMap<String, &String> = HashMap::new();
    for name in available {
        by_key.entry(normalize(name)).or_insert(name);
    }

    for candidate in candidates {
        if let Some(sheet) = by_key.get(&normalize(candidate)) {
            info!("Sheet '{}' selected for candidate '{}'", sheet, candidate);
            return Ok(SheetResolution {
                name: (*sheet).clone(),
                fallback_used: false,
            });
        }
    }

    warn!(
        "No sheet matched {:?}; falling back to '{}'. Available sheets: {:?}",
        candidates, first, available
    );
    Ok(SheetResolution {
        name: first.clone(),
        fallback_used: true,
    })
}
