//! Run orchestrator
//!
//! FETCH → PARSE → VERIFY (sequential, paced) → WRITE → SUMMARY
//!
//! Setup and teardown failures end the run with [`exit_codes::FAILURE`];
//! per-record failures never do.

use crate::backoff::Pacer;
use crate::config::Settings;
use crate::exit_codes;
use crate::models::{InputRecord, VerificationResult, VerifiedStatus};
use crate::reader::SpreadsheetReader;
use crate::sharepoint::DocumentSource;
use crate::verification::RecordVerifier;
use crate::writer::ResultWriter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Pause between consecutive records.
pub const INTER_RECORD_DELAY: Duration = Duration::from_secs(1);

/// Where the input workbook comes from.
pub enum InputSource {
    /// Download from the document store into the download directory.
    Remote {
        source: Box<dyn DocumentSource>,
        library: String,
        file_name: String,
    },
    /// Already on disk.
    Local(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub total: usize,
    /// Records that went through verification, including converted failures.
    pub processed: usize,
    /// Records whose verification call failed and was converted here.
    pub errors: usize,
    pub yes: usize,
    pub no: usize,
    pub error_status: usize,
    /// Non-error results under the confidence threshold. Informational.
    pub below_threshold: usize,
}

impl RunStats {
    /// Tally one result. Returns whether it fell below `threshold`.
    fn record(&mut self, result: &VerificationResult, threshold: u8) -> bool {
        self.processed += 1;
        match result.verified_status {
            VerifiedStatus::Yes => self.yes += 1,
            VerifiedStatus::No => self.no += 1,
            VerifiedStatus::Error => self.error_status += 1,
        }

        let below = result.verified_status != VerifiedStatus::Error && result.confidence < threshold;
        if below {
            self.below_threshold += 1;
        }
        below
    }
}

pub struct Orchestrator {
    settings: Arc<Settings>,
    input: InputSource,
    verifier: Box<dyn RecordVerifier>,
    pacer: Arc<dyn Pacer>,
    output_path: PathBuf,
    run_id: Uuid,
    stats: RunStats,
}

impl Orchestrator {
    pub fn new(
        settings: Arc<Settings>,
        input: InputSource,
        verifier: Box<dyn RecordVerifier>,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        let output_path = settings.output_path();
        Self {
            settings,
            input,
            verifier,
            pacer,
            output_path,
            run_id: Uuid::new_v4(),
            stats: RunStats::default(),
        }
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Execute one full run and return the process exit code.
    pub async fn run(&mut self) -> i32 {
        let started = Instant::now();
        info!(run_id = %self.run_id, "Starting software license verification");

        // ========================
        // 1. FETCH
        // ========================
        let Some(input_path) = self.acquire_input().await else {
            return exit_codes::FAILURE;
        };

        // ========================
        // 2. PARSE
        // ========================
        let records = match SpreadsheetReader::new(&input_path).read_records() {
            Ok(records) => records,
            Err(e) => {
                error!(path = %input_path.display(), error = %e, "Failed to read input workbook");
                return exit_codes::FAILURE;
            }
        };

        if records.is_empty() {
            error!(path = %input_path.display(), "No software entries found in input");
            return exit_codes::FAILURE;
        }

        // ========================
        // 3. VERIFY
        // ========================
        let results = self.process_records(&records).await;

        // ========================
        // 4. WRITE
        // ========================
        let writer = ResultWriter::new(&self.output_path);
        if !writer.write_results(&results) {
            error!(path = %self.output_path.display(), "Failed to save results");
            return exit_codes::FAILURE;
        }

        // ========================
        // 5. SUMMARY
        // ========================
        self.log_summary(started.elapsed());
        exit_codes::OK
    }

    async fn acquire_input(&mut self) -> Option<PathBuf> {
        match &mut self.input {
            InputSource::Local(path) => {
                info!(path = %path.display(), "Using local input workbook");
                Some(path.clone())
            }
            InputSource::Remote {
                source,
                library,
                file_name,
            } => {
                if !source.authenticate().await {
                    error!("Document store authentication failed");
                    return None;
                }

                let local_path = self.settings.download_dir.join(file_name.as_str());
                if !source.download(library, file_name, &local_path).await {
                    error!(file_name = %file_name, "Failed to download input workbook");
                    return None;
                }
                Some(local_path)
            }
        }
    }

    /// Verify every record in order, pausing between records.
    ///
    /// Always yields exactly one result per record.
    pub async fn process_records(&mut self, records: &[InputRecord]) -> Vec<VerificationResult> {
        self.stats.total = records.len();
        let threshold = self.settings.confidence_threshold;
        let mut results = Vec::with_capacity(records.len());

        for (i, record) in records.iter().enumerate() {
            info!(
                index = i + 1,
                total = records.len(),
                software = %record,
                "Processing record"
            );

            let result = match self.verifier.verify_record(record).await {
                Ok(result) => result,
                Err(e) => {
                    error!(software = %record, error = %e, "Verification raised an error");
                    self.stats.errors += 1;
                    VerificationResult::error(record, format!("Error: {}", e))
                }
            };

            if self.stats.record(&result, threshold) {
                warn!(
                    software = %record,
                    confidence = result.confidence,
                    threshold,
                    "Confidence below threshold"
                );
            }
            results.push(result);

            if i + 1 < records.len() {
                self.pacer.pause(INTER_RECORD_DELAY).await;
            }
        }

        results
    }

    fn log_summary(&self, elapsed: Duration) {
        let s = &self.stats;
        info!(
            run_id = %self.run_id,
            total = s.total,
            processed = s.processed,
            errors = s.errors,
            "Run summary"
        );
        info!(
            yes = s.yes,
            no = s.no,
            error = s.error_status,
            below_threshold = s.below_threshold,
            "Verdict breakdown"
        );
        info!(
            elapsed_secs = elapsed.as_secs_f64(),
            output = %self.output_path.display(),
            "Verification complete"
        );
    }
}
