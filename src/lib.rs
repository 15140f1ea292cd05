//! Software License Check Agent
//!
//! Verifies whether corporate software requires commercial licensing:
//! - Downloads the software inventory workbook from SharePoint
//! - Asks a web-search-augmented LLM agent about each entry, with retries
//! - Coerces free-text replies into structured verdicts
//! - Writes a styled results workbook
//!
//! RUN:
//! FETCH → PARSE → VERIFY (per record) → WRITE → SUMMARY

pub mod backoff;
pub mod config;
pub mod error;
pub mod exit_codes;
pub mod llm;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod reader;
pub mod sharepoint;
pub mod tools;
pub mod verification;
pub mod writer;

pub use error::Result;

// Re-export common types
pub use config::Settings;
pub use models::*;
pub use orchestrator::{InputSource, Orchestrator, RunStats};
pub use verification::{RecordVerifier, VerificationAgent};
