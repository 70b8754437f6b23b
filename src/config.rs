use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::columns::{self, CANONICAL_FIELDS};
use crate::error::{ReportError, Result};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "inadimplencia.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory searched first for the uploaded workbook.
    pub upload_dir: PathBuf,
    /// Substrings (upper case) that mark a file name as the workbook.
    pub workbook_markers: Vec<String>,
    /// Fixed file names tried in the working directory when the upload
    /// directory has no match.
    pub fallback_workbooks: Vec<String>,
    pub allowed_extensions: Vec<String>,
    /// Ranked candidate names for the delinquency-base sheet.
    pub delinquency_sheets: Vec<String>,
    /// Ranked candidate names for the salesperson-reference sheet.
    pub reference_sheets: Vec<String>,
    /// Legacy header -> canonical header.
    pub legacy_columns: BTreeMap<String, String>,
    pub defaults: DefaultValues,
    pub output_dir: PathBuf,
    /// When false an empty delinquency sheet fails the build with
    /// `EmptyInput` instead of producing an empty report.
    pub allow_empty_report: bool,
    pub preview_rows: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        let legacy_columns = [
            ("RCA", columns::SALESPERSON_CODE),
            ("VALOR", columns::INVOICE_VALUE),
            ("DIAS", columns::OVERDUE_DAYS),
            ("CLIENTE", columns::CLIENT_NAME),
            ("VENC", columns::DUE_DATE),
            ("DUPLIC", columns::CLIENT_CODE),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();

        Self {
            upload_dir: PathBuf::from("uploads"),
            workbook_markers: strings(&["INADIMPLENCIA GERAL", "RESUMO_VENDAS"]),
            fallback_workbooks: strings(&["INADIMPLENCIA GERAL.xlsx", "RESUMO_VENDAS.xlsx"]),
            allowed_extensions: strings(&["xlsx", "xls"]),
            delinquency_sheets: strings(&[
                "BASEINADI",
                "BASEINAD",
                "BASEINADIMPLENCIA",
                "INADIMPLENCIA",
                "INAD",
            ]),
            reference_sheets: strings(&[
                "BASERCA",
                "RCA",
                "BASEVENDEDOR",
                "VENDEDORES",
                "VENDEDOR",
                "RCABASE",
            ]),
            legacy_columns,
            defaults: DefaultValues::default(),
            output_dir: PathBuf::from("."),
            allow_empty_report: true,
            preview_rows: 10,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Synthesized values
// ---------------------------------------------------------------------------

/// Values written into canonical fields the source sheet lacks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DefaultValues {
    /// Prefixed to the salesperson code when no name column exists.
    pub salesperson_prefix: String,
    pub client_code: String,
    pub client_name: String,
    pub title_status: String,
}

impl Default for DefaultValues {
    fn default() -> Self {
        Self {
            salesperson_prefix: "Salesperson ".to_string(),
            client_code: "Client".to_string(),
            client_name: "Client".to_string(),
            title_status: "OPEN".to_string(),
        }
    }
}

impl ReportConfig {
    pub fn from_toml(input: &str) -> Result<Self> {
        let config: ReportConfig =
            toml::from_str(input).map_err(|e| ReportError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read `path` if it exists, otherwise fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.delinquency_sheets.is_empty() {
            return Err(ReportError::Config(
                "delinquency_sheets must list at least one candidate".to_string(),
            ));
        }
        if self.reference_sheets.is_empty() {
            return Err(ReportError::Config(
                "reference_sheets must list at least one candidate".to_string(),
            ));
        }
        if self.allowed_extensions.is_empty() {
            return Err(ReportError::Config(
                "allowed_extensions must not be empty".to_string(),
            ));
        }
        for (from, to) in &self.legacy_columns {
            if !CANONICAL_FIELDS.contains(&to.as_str()) {
                return Err(ReportError::Config(format!(
                    "legacy column '{from}' maps to unknown field '{to}'"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        let config = ReportConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.legacy_columns["RCA"], "COD_VENDEDOR");
        assert_eq!(config.defaults.title_status, "OPEN");
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = ReportConfig::from_toml(
            r#"
            allow_empty_report = false
            reference_sheets = ["EQUIPE"]

            [defaults]
            title_status = "EM ABERTO"
            "#,
        )
        .unwrap();
        assert!(!config.allow_empty_report);
        assert_eq!(config.reference_sheets, vec!["EQUIPE".to_string()]);
        assert_eq!(config.defaults.title_status, "EM ABERTO");
        assert_eq!(config.defaults.salesperson_prefix, "Salesperson ");
        assert_eq!(config.delinquency_sheets[0], "BASEINADI");
    }

    #[test]
    fn unknown_rename_target_is_rejected() {
        let err = ReportConfig::from_toml(
            r#"
            [legacy_columns]
            VLR = "VALOR_BRUTO"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ReportError::Config(_)));
    }

    #[test]
    fn empty_candidates_are_rejected() {
        let err = ReportConfig::from_toml("delinquency_sheets = []").unwrap_err();
        assert!(err.to_string().contains("delinquency_sheets"));
    }

    #[test]
    fn load_reads_file_or_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert_eq!(ReportConfig::load(&missing).unwrap().preview_rows, 10);

        let path = dir.path().join("inadimplencia.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "preview_rows = 3").unwrap();
        assert_eq!(ReportConfig::load(&path).unwrap().preview_rows, 3);
    }
}
