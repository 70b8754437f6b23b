//! Salesperson identity unification.
//!
//! One person can sell under two internal codes. The salesperson-reference
//! sheet says which codes belong together, in one of two shapes:
//!
//! - **Explicit**: a code column plus "same code as" and "same person as"
//!   columns pointing at the canonical identity.
//! - **Same name**: only code and name columns. Codes sharing a name are
//!   merged under the first code seen for that name. Two different people
//!   with an identical display name are merged too; the sheet carries
//!   nothing that could tell them apart.

use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};

use crate::error::{ReportError, Result};
use crate::normalize::header_key;
use crate::types::{DelinquencyRecord, Table, UnifiedIdentity};

const CODE_HEADERS: &[&str] = &["RCA", "COD", "CODIGO"];
const NAME_HEADERS: &[&str] = &["NOME RCA", "NOME"];
const SAME_CODE_HEADERS: &[&str] = &["MESMO COD", "MESMO CODIGO", "CODIGO UNIFICADO", "COD UNIFICADO"];
const SAME_PERSON_HEADERS: &[&str] = &[
    "MESMO VEND",
    "MESMO VENDEDOR",
    "NOME UNIFICADO",
    "VENDEDOR UNIFICADO",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceShape {
    Explicit,
    SameName,
}

/// Raw salesperson code -> unified identity. Built once per report and
/// never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityMap {
    unified: HashMap<String, UnifiedIdentity>,
    display_names: HashMap<String, String>,
}

impl IdentityMap {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, code: &str) -> Option<&UnifiedIdentity> {
        self.unified.get(code)
    }

    /// Name the reference sheet gives to `code`, if any.
    pub fn display_name(&self, code: &str) -> Option<&str> {
        self.display_names.get(code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.unified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unified.is_empty() && self.display_names.is_empty()
    }

    /// Unified identity of `code`, or `code` itself under `fallback_name`.
    pub fn resolve(&self, code: &str, fallback_name: &str) -> UnifiedIdentity {
        self.get(code).cloned().unwrap_or_else(|| UnifiedIdentity {
            code: code.to_string(),
            name: fallback_name.to_string(),
        })
    }
}

#[derive(Debug, Default)]
struct ReferenceColumns {
    code: Option<usize>,
    name: Option<usize>,
    same_code: Option<usize>,
    same_person: Option<usize>,
}

/// Find the column for one role: exact key matches first, then headers
/// containing a candidate. Among containment matches, headers that also
/// contain one of `avoid` lose to those that do not, so "RCA" picks
/// `CODIGO RCA` over `NOME RCA`. Columns already claimed by another role
/// are skipped.
fn find_column(
    keys: &[String],
    candidates: &[&str],
    avoid: &[&str],
    claimed: &mut HashSet<usize>,
) -> Option<usize> {
    let free = |i: &usize| !claimed.contains(i);
    let exact = candidates
        .iter()
        .find_map(|cand| (0..keys.len()).find(|i| free(i) && keys[*i] == *cand));
    let containing = |skip_avoided: bool| {
        candidates.iter().find_map(|cand| {
            (0..keys.len()).find(|i| {
                free(i)
                    && keys[*i].contains(cand)
                    && !(skip_avoided && avoid.iter().any(|a| keys[*i].contains(a)))
            })
        })
    };
    let found = exact
        .or_else(|| containing(true))
        .or_else(|| containing(false));
    if let Some(idx) = found {
        claimed.insert(idx);
    }
    found
}

fn detect_columns(table: &Table) -> ReferenceColumns {
    let keys: Vec<String> = table.columns.iter().map(|c| header_key(c)).collect();
    let mut claimed = HashSet::new();
    // Unification columns first, so "COD UNIFICADO" is not taken as the raw code.
    let same_code = find_column(&keys, SAME_CODE_HEADERS, &[], &mut claimed);
    let same_person = find_column(&keys, SAME_PERSON_HEADERS, &[], &mut claimed);
    let code = find_column(&keys, CODE_HEADERS, NAME_HEADERS, &mut claimed);
    let name = find_column(&keys, NAME_HEADERS, &[], &mut claimed);
    ReferenceColumns {
        code,
        name,
        same_code,
        same_person,
    }
}

/// Build the identity map, or explain why the reference table is unusable.
pub fn try_build_identity_map(reference: &Table) -> Result<IdentityMap> {
    let cols = detect_columns(reference);
    let Some(code_col) = cols.code else {
        return Err(unavailable("no salesperson code column"));
    };

    let shape = match (cols.same_code, cols.same_person, cols.name) {
        (Some(_), Some(_), _) => ReferenceShape::Explicit,
        (_, _, Some(_)) => ReferenceShape::SameName,
        _ => {
            return Err(unavailable(
                "neither unification columns nor a name column",
            ))
        }
    };
    debug!("Reference table shape: {:?} ({:?})", shape, reference.columns);

    let name_of = |row: usize| -> Option<String> {
        let name = reference.cell(row, cols.name?).to_string().trim().to_string();
        (!name.is_empty()).then_some(name)
    };

    let mut map = IdentityMap::empty();
    let mut pivots: HashMap<String, String> = HashMap::new();
    for row in 0..reference.len() {
        let code = reference.cell(row, code_col).as_code();
        if code.is_empty() {
            continue;
        }
        if let Some(name) = name_of(row) {
            map.display_names.insert(code.clone(), name);
        }

        let identity = match shape {
            ReferenceShape::Explicit => {
                let same_code = cols.same_code.map(|c| reference.cell(row, c).as_code());
                let same_person = cols
                    .same_person
                    .map(|c| reference.cell(row, c).to_string().trim().to_string());
                let target_code = same_code.filter(|c| !c.is_empty()).unwrap_or_else(|| code.clone());
                let Some(target_name) = same_person.filter(|n| !n.is_empty()).or_else(|| name_of(row))
                else {
                    continue;
                };
                UnifiedIdentity {
                    code: target_code,
                    name: target_name,
                }
            }
            ReferenceShape::SameName => {
                let Some(name) = name_of(row) else {
                    continue;
                };
                let pivot = pivots.entry(name.clone()).or_insert_with(|| code.clone()).clone();
                UnifiedIdentity { code: pivot, name }
            }
        };
        map.unified.insert(code, identity);
    }

    info!(
        "Identity map built from {} reference rows: {} codes mapped",
        reference.len(),
        map.len()
    );
    Ok(map)
}

fn unavailable(reason: &str) -> ReportError {
    ReportError::ReferenceTableUnavailable(reason.to_string())
}

/// Build the identity map; an unusable reference table yields an empty map.
pub fn build_identity_map(reference: &Table) -> IdentityMap {
    try_build_identity_map(reference).unwrap_or_else(|err| {
        warn!("{err}; keeping salesperson identities as given");
        IdentityMap::empty()
    })
}

/// Attach unified identities. Names are first refreshed from the reference
/// sheet; codes missing from the map keep their own code and name.
pub fn apply_identity(records: Vec<DelinquencyRecord>, map: &IdentityMap) -> Vec<DelinquencyRecord> {
    records
        .into_iter()
        .map(|mut record| {
            if let Some(name) = map.display_name(&record.salesperson_code) {
                record.salesperson_name = name.to_string();
            }
            let identity = map.resolve(&record.salesperson_code, &record.salesperson_name);
            record.unified_salesperson_code = identity.code;
            record.unified_salesperson_name = identity.name;
            record
        })
        .collect()
}
