//! Core data models for licensing verification

use crate::error::LicenseCheckError;
use crate::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator used when flattening source/link lists into a single cell.
pub const LIST_SEPARATOR: &str = "; ";

/// Output column order of the results workbook.
pub const RESULT_COLUMNS: [&str; 9] = [
    "Name",
    "Version",
    "Original Status",
    "Verified Status",
    "Search Date",
    "Sources",
    "Links",
    "Confidence",
    "Summary",
];

const SEARCH_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

//
// ================= Status =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum VerifiedStatus {
    /// Commercial licensing is required
    Yes,
    /// Free or open source for corporate use
    No,
    /// Verification could not be completed
    Error,
}

impl fmt::Display for VerifiedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerifiedStatus::Yes => "Yes",
            VerifiedStatus::No => "No",
            VerifiedStatus::Error => "Error",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for VerifiedStatus {
    type Err = LicenseCheckError;

    /// Parses a rendered status cell, accepting Portuguese spellings too.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "yes" | "sim" => Ok(VerifiedStatus::Yes),
            "no" | "não" | "nao" => Ok(VerifiedStatus::No),
            "error" | "erro" => Ok(VerifiedStatus::Error),
            other => Err(LicenseCheckError::Malformed(format!(
                "unknown verification status '{}'",
                other
            ))),
        }
    }
}

//
// ================= Input =================
//

/// One software entry read from the input workbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    name: String,
    version: Option<String>,
    declared_status: Option<String>,
}

impl InputRecord {
    pub fn new(
        name: impl Into<String>,
        version: Option<String>,
        declared_status: Option<String>,
    ) -> Result<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(LicenseCheckError::Malformed(
                "software name must not be empty".to_string(),
            ));
        }

        Ok(Self {
            name,
            version: non_blank(version),
            declared_status: non_blank(declared_status),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Status as declared in the source sheet. Informational only.
    pub fn declared_status(&self) -> Option<&str> {
        self.declared_status.as_deref()
    }
}

impl fmt::Display for InputRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} {}", self.name, version),
            None => write!(f, "{}", self.name),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

//
// ================= Verdict =================
//

/// Licensing verdict extracted from one agent reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: VerifiedStatus,
    pub confidence: u8,
    pub sources: Vec<String>,
    pub links: Vec<String>,
    pub summary: Option<String>,
}

//
// ================= Result =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub name: String,
    pub version: Option<String>,
    pub declared_status: Option<String>,

    pub verified_status: VerifiedStatus,
    /// Always within 0..=100
    pub confidence: u8,
    pub sources_used: Vec<String>,
    pub source_links: Vec<String>,
    pub summary: Option<String>,
    pub timestamp: DateTime<Local>,
}

impl VerificationResult {
    pub fn from_verdict(record: &InputRecord, verdict: Verdict) -> Self {
        Self {
            name: record.name.clone(),
            version: record.version.clone(),
            declared_status: record.declared_status.clone(),
            verified_status: verdict.status,
            confidence: verdict.confidence.min(100),
            sources_used: verdict.sources,
            source_links: verdict.links,
            summary: verdict.summary,
            timestamp: Local::now(),
        }
    }

    /// Error record: zero confidence and no sources.
    pub fn error(record: &InputRecord, message: impl Into<String>) -> Self {
        Self::from_verdict(
            record,
            Verdict {
                status: VerifiedStatus::Error,
                confidence: 0,
                sources: Vec::new(),
                links: Vec::new(),
                summary: Some(message.into()),
            },
        )
    }

    /// Flatten into the fixed output column layout.
    pub fn to_row(&self) -> ResultRow {
        ResultRow {
            name: self.name.clone(),
            version: self.version.clone().unwrap_or_default(),
            original_status: self.declared_status.clone().unwrap_or_default(),
            verified_status: self.verified_status.to_string(),
            search_date: self.timestamp.format(SEARCH_DATE_FORMAT).to_string(),
            sources: self.sources_used.join(LIST_SEPARATOR),
            links: self.source_links.join(LIST_SEPARATOR),
            confidence: self.confidence,
            summary: self.summary.clone().unwrap_or_default(),
        }
    }
}

//
// ================= Output Row =================
//

/// Flat row projection, one field per entry of [`RESULT_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub name: String,
    pub version: String,
    pub original_status: String,
    pub verified_status: String,
    pub search_date: String,
    pub sources: String,
    pub links: String,
    pub confidence: u8,
    pub summary: String,
}

impl ResultRow {
    pub fn status(&self) -> Result<VerifiedStatus> {
        self.verified_status.parse()
    }

    pub fn source_list(&self) -> Vec<String> {
        split_joined(&self.sources)
    }

    pub fn link_list(&self) -> Vec<String> {
        split_joined(&self.links)
    }
}

/// Inverse of joining with [`LIST_SEPARATOR`].
pub fn split_joined(cell: &str) -> Vec<String> {
    if cell.is_empty() {
        return Vec::new();
    }
    cell.split(LIST_SEPARATOR).map(str::to_string).collect()
}
