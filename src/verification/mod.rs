//! Licensing verification agent
//!
//! For one input record, runs the search agent through a bounded retry loop
//! and turns its reply into exactly one [`VerificationResult`]. Every failure
//! path resolves to a result record; `Error` status is reserved for records
//! whose attempts were all exhausted.

use crate::backoff::{retry_with_backoff, Pacer};
use crate::models::{InputRecord, VerificationResult};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

pub mod extraction;
pub mod prompts;
pub mod search_agent;

pub use extraction::{extract_verdict, Extraction, ExtractionMethod};
pub use search_agent::{AgentRequest, LicenseAgent, SearchAgent};

/// Per-record verification seam used by the orchestrator.
#[async_trait]
pub trait RecordVerifier: Send + Sync {
    async fn verify_record(&self, record: &InputRecord) -> Result<VerificationResult>;
}

pub struct VerificationAgent {
    agent: Box<dyn LicenseAgent>,
    pacer: Arc<dyn Pacer>,
    max_attempts: u32,
}

impl VerificationAgent {
    pub fn new(agent: Box<dyn LicenseAgent>, pacer: Arc<dyn Pacer>, max_attempts: u32) -> Self {
        Self {
            agent,
            pacer,
            max_attempts,
        }
    }

    /// Verify one record with up to `max_attempts` agent invocations.
    pub async fn verify(&self, record: &InputRecord, max_attempts: u32) -> VerificationResult {
        let max_attempts = max_attempts.max(1);
        let request = AgentRequest::for_record(record);

        info!(software = %record, "Verifying licensing");

        let outcome = retry_with_backoff(
            "license verification",
            max_attempts,
            self.pacer.as_ref(),
            |attempt| self.attempt(&request, attempt, max_attempts),
        )
        .await;

        match outcome {
            Ok(extraction) => {
                let result = VerificationResult::from_verdict(record, extraction.verdict);
                info!(
                    software = %record,
                    status = %result.verified_status,
                    confidence = result.confidence,
                    method = ?extraction.method,
                    "Verification complete"
                );
                result
            }
            Err(e) => {
                error!(software = %record, error = %e, "Verification failed");
                VerificationResult::error(
                    record,
                    format!(
                        "Verification failed after {} attempt(s): {}",
                        max_attempts, e
                    ),
                )
            }
        }
    }

    async fn attempt(
        &self,
        request: &AgentRequest,
        attempt: u32,
        max_attempts: u32,
    ) -> Result<Extraction> {
        debug!(attempt, max_attempts, "Invoking agent");
        let output = self.agent.invoke(request).await?;
        Ok(extract_verdict(&output))
    }
}

#[async_trait]
impl RecordVerifier for VerificationAgent {
    async fn verify_record(&self, record: &InputRecord) -> Result<VerificationResult> {
        Ok(self.verify(record, self.max_attempts).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::RecordingPacer;
    use crate::error::LicenseCheckError;
    use crate::models::VerifiedStatus;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    struct ScriptedAgent {
        replies: Mutex<VecDeque<Result<String>>>,
        requests: Mutex<Vec<AgentRequest>>,
    }

    impl ScriptedAgent {
        fn new(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LicenseAgent for Arc<ScriptedAgent> {
        async fn invoke(&self, request: &AgentRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LicenseCheckError::Llm("gateway timeout".to_string())))
        }
    }

    fn setup(replies: Vec<Result<String>>) -> (VerificationAgent, Arc<ScriptedAgent>, Arc<RecordingPacer>) {
        let agent = ScriptedAgent::new(replies);
        let pacer = Arc::new(RecordingPacer::default());
        let verifier = VerificationAgent::new(Box::new(agent.clone()), pacer.clone(), 3);
        (verifier, agent, pacer)
    }

    fn record() -> InputRecord {
        InputRecord::new("Oracle Database", Some("19c".to_string()), Some("Não".to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let (verifier, agent, pacer) = setup(vec![Ok(
            r#"{"status_licenciamento": "Sim", "nivel_confianca": 97, "fontes": ["Oracle"], "links": ["https://oracle.com/license"], "resumo": "Proprietary"}"#.to_string(),
        )]);

        let result = verifier.verify(&record(), 3).await;

        assert_eq!(result.verified_status, VerifiedStatus::Yes);
        assert_eq!(result.confidence, 97);
        assert_eq!(result.declared_status.as_deref(), Some("Não"));
        assert_eq!(agent.calls(), 1);
        assert!(pacer.pauses().is_empty());
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let (verifier, agent, pacer) = setup(vec![
            Err(LicenseCheckError::Llm("502".to_string())),
            Err(LicenseCheckError::Search("rate limited".to_string())),
            Ok(r#"{"status_licenciamento": "Não", "nivel_confianca": 60}"#.to_string()),
        ]);

        let result = verifier.verify(&record(), 3).await;

        assert_eq!(result.verified_status, VerifiedStatus::No);
        assert_eq!(result.confidence, 60);
        assert_eq!(agent.calls(), 3);
        assert_eq!(pacer.pauses(), vec![Duration::from_secs(2), Duration::from_secs(4)]);
    }

    #[tokio::test]
    async fn test_all_attempts_fail_yields_error_result() {
        let (verifier, agent, pacer) = setup(vec![]);

        let result = verifier.verify(&record(), 3).await;

        assert_eq!(result.verified_status, VerifiedStatus::Error);
        assert_eq!(result.confidence, 0);
        assert!(result.sources_used.is_empty());
        assert!(result.source_links.is_empty());
        assert!(result.summary.unwrap().contains("gateway timeout"));
        assert_eq!(agent.calls(), 3);
        assert_eq!(pacer.pauses(), vec![Duration::from_secs(2), Duration::from_secs(4)]);
    }

    #[tokio::test]
    async fn test_unstructured_reply_is_not_retried() {
        let (verifier, agent, _) = setup(vec![Ok(
            "It is free software, see https://www.7-zip.org/license.txt".to_string(),
        )]);

        let result = verifier.verify(&record(), 3).await;

        assert_eq!(result.verified_status, VerifiedStatus::No);
        assert_eq!(result.confidence, 40);
        assert_eq!(result.source_links, vec!["https://www.7-zip.org/license.txt"]);
        assert_eq!(agent.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_reply_uses_heuristic_without_retry() {
        let (verifier, agent, pacer) = setup(vec![Ok(String::new())]);

        let result = verifier.verify(&record(), 3).await;

        assert_eq!(result.verified_status, VerifiedStatus::No);
        assert_eq!(result.confidence, 40);
        assert_eq!(agent.calls(), 1);
        assert!(pacer.pauses().is_empty());
    }

    #[tokio::test]
    async fn test_request_carries_name_and_version_placeholder() {
        let (verifier, agent, _) = setup(vec![Ok("{}".to_string())]);
        let unversioned = InputRecord::new("PuTTY", None, None).unwrap();

        let _ = verifier.verify_record(&unversioned).await.unwrap();

        let requests = agent.requests.lock().unwrap();
        assert!(requests[0].user.contains("Name: PuTTY"));
        assert!(requests[0].user.contains("Version: N/A"));
        assert!(requests[0].system.contains("status_licenciamento"));
    }
}
