//! Runtime settings
//!
//! Built once at process start from environment variables (optionally seeded
//! from a `.env` file) and handed to each component explicitly.

use crate::error::LicenseCheckError;
use crate::Result;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_OUTPUT_FILE: &str = "licensing_results.xlsx";
const DEFAULT_OUTPUT_DIR: &str = "./output";
const DEFAULT_DOWNLOAD_DIR: &str = "./temp";
pub const DEFAULT_LOG_DIR: &str = "./logs";
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONFIDENCE_THRESHOLD: u8 = 70;

const SHAREPOINT_KEYS: [&str; 6] = [
    "SHAREPOINT_URL",
    "SHAREPOINT_SITE",
    "SHAREPOINT_LIBRARY",
    "SHAREPOINT_FILE",
    "SHAREPOINT_USERNAME",
    "SHAREPOINT_PASSWORD",
];

/// Remote document store location and credentials.
#[derive(Clone)]
pub struct SharePointSettings {
    pub base_url: String,
    pub site_path: String,
    pub library: String,
    pub file_name: String,
    pub username: String,
    pub password: String,
}

impl SharePointSettings {
    pub fn site_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.site_path
        )
    }
}

impl std::fmt::Debug for SharePointSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharePointSettings")
            .field("base_url", &self.base_url)
            .field("site_path", &self.site_path)
            .field("library", &self.library)
            .field("file_name", &self.file_name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// LLM gateway (OpenAI-compatible chat completions)
#[derive(Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// `None` when no SHAREPOINT_* key is set; a local input file is then required.
    pub sharepoint: Option<SharePointSettings>,
    pub llm: LlmSettings,
    pub output_dir: PathBuf,
    pub output_file: String,
    pub download_dir: PathBuf,
    pub log_dir: PathBuf,
    pub max_retries: u32,
    pub request_timeout: Duration,
    /// Informational only; never gates a verdict.
    pub confidence_threshold: u8,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let sharepoint = load_sharepoint(&get)?;

        let mut missing = Vec::new();
        let llm_base_url = get("LLM_BASE_URL");
        let llm_api_key = get("LLM_API_KEY");
        if llm_base_url.is_none() {
            missing.push("LLM_BASE_URL");
        }
        if llm_api_key.is_none() {
            missing.push("LLM_API_KEY");
        }
        if !missing.is_empty() {
            return Err(LicenseCheckError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        let llm = LlmSettings {
            base_url: llm_base_url.unwrap_or_default(),
            api_key: llm_api_key.unwrap_or_default(),
            model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
        };

        let settings = Self {
            sharepoint,
            llm,
            output_dir: get("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            output_file: get("OUTPUT_FILE").unwrap_or_else(|| DEFAULT_OUTPUT_FILE.to_string()),
            download_dir: get("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DOWNLOAD_DIR)),
            log_dir: get("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            max_retries: parse_or("MAX_RETRIES", get("MAX_RETRIES"), DEFAULT_MAX_RETRIES)?,
            request_timeout: Duration::from_secs(parse_or(
                "REQUEST_TIMEOUT",
                get("REQUEST_TIMEOUT"),
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            confidence_threshold: parse_or(
                "CONFIDENCE_THRESHOLD",
                get("CONFIDENCE_THRESHOLD"),
                DEFAULT_CONFIDENCE_THRESHOLD,
            )?,
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(LicenseCheckError::Config(
                "MAX_RETRIES must be >= 1".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(LicenseCheckError::Config(
                "REQUEST_TIMEOUT must be >= 1".to_string(),
            ));
        }
        if self.confidence_threshold > 100 {
            return Err(LicenseCheckError::Config(
                "CONFIDENCE_THRESHOLD must be within 0-100".to_string(),
            ));
        }
        if self.output_file.trim().is_empty() {
            return Err(LicenseCheckError::Config(
                "OUTPUT_FILE must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_file)
    }
}

fn load_sharepoint<G>(get: &G) -> Result<Option<SharePointSettings>>
where
    G: Fn(&str) -> Option<String>,
{
    let values: Vec<Option<String>> = SHAREPOINT_KEYS.iter().map(|k| get(k)).collect();

    if values.iter().all(Option::is_none) {
        return Ok(None);
    }

    let missing: Vec<&str> = SHAREPOINT_KEYS
        .iter()
        .zip(&values)
        .filter(|(_, v)| v.is_none())
        .map(|(k, _)| *k)
        .collect();

    if !missing.is_empty() {
        return Err(LicenseCheckError::Config(format!(
            "incomplete SharePoint settings, missing: {}",
            missing.join(", ")
        )));
    }

    let mut values = values.into_iter().map(Option::unwrap_or_default);
    let mut next = || values.next().unwrap_or_default();

    Ok(Some(SharePointSettings {
        base_url: next(),
        site_path: next(),
        library: next(),
        file_name: next(),
        username: next(),
        password: next(),
    }))
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| {
            LicenseCheckError::Config(format!("{} has invalid value '{}'", key, value))
        }),
    }
}
