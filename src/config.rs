//! Configuration file handling.
//!
//! Reads from `<config dir>/jobstack/config.toml`. Every key is optional.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::db::Database;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Overrides the database location in the data directory.
    pub database_path: Option<PathBuf>,
    /// Relative directory the generated PDF paths point into.
    pub job_description_dir: String,
    pub scraper: ScraperConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub selectors: SelectorConfig,
}

/// CSS selectors tried in order for each field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub company: Vec<String>,
    pub job_title: Vec<String>,
    pub location: Vec<String>,
    pub person: Vec<String>,
    pub phone: Vec<String>,
    pub email: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            job_description_dir: "job_descriptions".to_string(),
            scraper: ScraperConfig::default(),
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            user_agent: concat!("jobstack/", env!("CARGO_PKG_VERSION")).to_string(),
            selectors: SelectorConfig::default(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            company: strings(&[
                "[itemprop='hiringOrganization'] [itemprop='name']",
                "[itemprop='hiringOrganization']",
                "[data-test='company-name']",
                ".company-name",
                ".company",
                "meta[property='og:site_name']",
            ]),
            job_title: strings(&[
                "h1[itemprop='title']",
                "[itemprop='title']",
                "[data-test='job-title']",
                ".job-title",
                "h1",
            ]),
            location: strings(&[
                "[itemprop='jobLocation'] [itemprop='addressLocality']",
                "[itemprop='jobLocation']",
                "[data-test='job-location']",
                ".job-location",
                ".location",
            ]),
            person: strings(&[
                "[itemprop='contactPoint'] [itemprop='name']",
                "[data-test='contact-person']",
                ".contact-person",
                ".contact-name",
            ]),
            phone: strings(&[
                "[itemprop='telephone']",
                "[data-test='contact-phone']",
                ".contact-phone",
            ]),
            email: strings(&[
                "[itemprop='email']",
                "[data-test='contact-email']",
                ".contact-email",
            ]),
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// A custom path must exist; a missing default file yields the defaults.
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self> {
        let is_custom = custom_path.is_some();
        let config_path = match custom_path {
            Some(path) => path,
            None => match Self::config_path() {
                Some(path) => path,
                None => return Ok(Config::default()),
            },
        };

        if !config_path.exists() {
            if is_custom {
                anyhow::bail!("Config file not found: {}", config_path.display());
            }
            tracing::debug!("No config at {}, using defaults", config_path.display());
            return Ok(Config::default());
        }

        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
        let config = Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        tracing::info!("Loaded config from {}", config_path.display());
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(Database::default_path)
    }

    fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "jobstack")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Where the log file goes.
    pub fn log_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobstack") {
            proj_dirs.data_dir().join("jobstack.log")
        } else {
            PathBuf::from("jobstack.log")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.job_description_dir, "job_descriptions");
        assert_eq!(config.scraper.timeout_secs, 15);
        assert!(config.database_path.is_none());
        assert!(!config.scraper.selectors.company.is_empty());
    }

    #[test]
    fn test_partial_config_overrides_only_given_keys() {
        let config = Config::parse(
            r#"
            database_path = "/tmp/positions.db"
            job_description_dir = "docs/jobs"

            [scraper]
            timeout_secs = 5

            [scraper.selectors]
            location = [".place"]
            "#,
        )
        .unwrap();

        assert_eq!(config.database_path(), PathBuf::from("/tmp/positions.db"));
        assert_eq!(config.job_description_dir, "docs/jobs");
        assert_eq!(config.scraper.timeout_secs, 5);
        assert!(config.scraper.user_agent.starts_with("jobstack/"));
        assert_eq!(config.scraper.selectors.location, vec![".place".to_string()]);
        assert_eq!(
            config.scraper.selectors.company,
            SelectorConfig::default().company
        );
    }

    #[test]
    fn test_missing_custom_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(Some(dir.path().join("missing.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_custom_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "job_description_dir = \"pdfs\"\n").unwrap();

        let config = Config::load(Some(path)).unwrap();
        assert_eq!(config.job_description_dir, "pdfs");
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        assert!(Config::parse("scraper = 3").is_err());
    }
}
