//! TOML configuration. Every field has a default, so an absent or empty file is valid.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::models::{AcademicYear, AssessmentKind, SlotKey};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub auth: AuthConfig,
    pub identity: IdentityConfig,
    pub ingest: IngestConfig,
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub shared_password: String,
    pub admin_account: String,
    pub account_domain: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            shared_password: "testing123".to_string(),
            admin_account: "admin@ses.com".to_string(),
            account_domain: "@ses.com".to_string(),
        }
    }
}

/// Academic-title abbreviations stripped from the end of canonical identifiers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub titles: Vec<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        let titles = [
            "spd", "ssi", "ssn", "ssos", "shum", "sip", "skom", "sh", "se", "mpd", "mhum", "msn",
            "msi", "mkom", "mh", "ss",
        ];
        Self {
            titles: titles.iter().map(|t| t.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Zero-based physical row holding the column labels.
    pub header_row: usize,
    /// Zero-based column holding the teacher name, whatever its label says.
    pub name_column: usize,
    /// Cleaned names that mark legend or summary rows rather than teachers.
    pub excluded_names: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        let mut excluded_names: Vec<String> = ('A'..='K').map(|c| c.to_string()).collect();
        excluded_names.extend(
            ["Jumlah", "Total", "Ban", "25%", "0.25", "0.75", "SB"]
                .iter()
                .map(|s| s.to_string()),
        );
        Self {
            header_row: 2,
            name_column: 1,
            excluded_names,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub kind: AssessmentKind,
    pub year: AcademicYear,
    pub path: PathBuf,
}

impl SourceConfig {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.kind, self.year)
    }
}

impl DashboardConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Sources to load, resolved against `data_dir`. Without an explicit
    /// `[[sources]]` list, one workbook per kind and year is expected,
    /// named after the kind's title.
    pub fn resolved_sources(&self, data_dir: &Path) -> Vec<SourceConfig> {
        if !self.sources.is_empty() {
            return self
                .sources
                .iter()
                .map(|source| SourceConfig {
                    kind: source.kind,
                    year: source.year,
                    path: data_dir.join(&source.path),
                })
                .collect();
        }

        let mut sources = Vec::new();
        for kind in AssessmentKind::ALL {
            for year in AcademicYear::ALL {
                sources.push(SourceConfig {
                    kind,
                    year,
                    path: data_dir.join(format!("{} {}.xlsx", kind.title(), year)),
                });
            }
        }
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_path_yields_defaults() {
        let config = DashboardConfig::load(None).unwrap();
        assert_eq!(config.auth.admin_account, "admin@ses.com");
        assert_eq!(config.ingest.header_row, 2);
        assert!(config.ingest.excluded_names.iter().any(|n| n == "Jumlah"));
        assert!(config.identity.titles.iter().any(|t| t == "mpd"));
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[auth]
shared_password = "rahasia"

[identity]
titles = ["spd", "dr"]

[[sources]]
kind = "lesson-plan-review"
year = "2022-2023"
path = "rpp.csv"
"#
        )
        .unwrap();

        let config = DashboardConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.auth.shared_password, "rahasia");
        assert_eq!(config.auth.account_domain, "@ses.com");
        assert_eq!(config.identity.titles, vec!["spd", "dr"]);

        let sources = config.resolved_sources(Path::new("/data"));
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].path, PathBuf::from("/data/rpp.csv"));
        assert_eq!(sources[0].key(), SlotKey::new(AssessmentKind::LessonPlanReview, AcademicYear::Y2022));
    }

    #[test]
    fn default_sources_cover_every_slot() {
        let sources = DashboardConfig::default().resolved_sources(Path::new("data"));
        assert_eq!(sources.len(), 6);
        assert!(sources[0]
            .path
            .ends_with("Penilaian Rencana Pelaksanaan Pembelajaran 2020-2021.xlsx"));
    }

    #[test]
    fn malformed_file_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[auth\nshared_password = 1").unwrap();
        let err = DashboardConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
