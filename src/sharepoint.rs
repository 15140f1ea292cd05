//! Remote document store
//!
//! Authenticates against a SharePoint site through its REST API and
//! downloads the input workbook. Both operations retry with `2^attempt`
//! second backoff and report a plain success flag.

use crate::backoff::{retry_with_backoff, Pacer};
use crate::config::SharePointSettings;
use crate::error::LicenseCheckError;
use crate::Result;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const ODATA_JSON: &str = "application/json;odata=nometadata";

/// Document store boundary
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn authenticate(&mut self) -> bool;
    async fn download(&self, library: &str, file_name: &str, local_path: &Path) -> bool;
}

#[derive(Debug, Clone)]
struct SiteSession {
    title: String,
}

#[derive(Debug, Deserialize)]
struct WebInfo {
    #[serde(rename = "Title", default)]
    title: String,
}

pub struct SharePointClient {
    http: Client,
    settings: SharePointSettings,
    max_retries: u32,
    pacer: Arc<dyn Pacer>,
    session: Option<SiteSession>,
}

impl SharePointClient {
    pub fn new(
        settings: SharePointSettings,
        timeout: Duration,
        max_retries: u32,
        pacer: Arc<dyn Pacer>,
    ) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            settings,
            max_retries,
            pacer,
            session: None,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    fn web_url(&self) -> String {
        format!("{}/_api/web", self.settings.site_url())
    }

    fn file_url(&self, library: &str, file_name: &str) -> String {
        format!(
            "{}/lists/GetByTitle('{}')/RootFolder/Files('{}')/$value",
            self.web_url(),
            odata_literal(library),
            odata_literal(file_name)
        )
    }

    async fn open_session(&self) -> Result<SiteSession> {
        let response = self
            .http
            .get(self.web_url())
            .basic_auth(&self.settings.username, Some(&self.settings.password))
            .header(ACCEPT, ODATA_JSON)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LicenseCheckError::DocumentStore(describe_status(status)));
        }

        let web: WebInfo = response.json().await?;
        Ok(SiteSession { title: web.title })
    }

    async fn fetch_file(&self, url: &str, local_path: &Path) -> Result<u64> {
        let response = self
            .http
            .get(url)
            .basic_auth(&self.settings.username, Some(&self.settings.password))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LicenseCheckError::DocumentStore(describe_status(status)));
        }

        let bytes = response.bytes().await?;

        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(local_path, &bytes)?;

        info!(
            path = %local_path.display(),
            bytes = bytes.len(),
            sha256 = %sha256_hex(&bytes),
            "Workbook downloaded"
        );

        Ok(bytes.len() as u64)
    }
}

#[async_trait]
impl DocumentSource for SharePointClient {
    async fn authenticate(&mut self) -> bool {
        info!(site = %self.settings.site_url(), user = %self.settings.username, "Authenticating to SharePoint");

        let this = &*self;
        let outcome = retry_with_backoff(
            "sharepoint authentication",
            this.max_retries,
            this.pacer.as_ref(),
            |_| this.open_session(),
        )
        .await;

        match outcome {
            Ok(session) => {
                info!(site_title = %session.title, "SharePoint authentication succeeded");
                self.session = Some(session);
                true
            }
            Err(e) => {
                error!(error = %e, "SharePoint authentication failed after all attempts");
                false
            }
        }
    }

    async fn download(&self, library: &str, file_name: &str, local_path: &Path) -> bool {
        if !self.is_authenticated() {
            error!("Client not authenticated; call authenticate() first");
            return false;
        }

        let url = self.file_url(library, file_name);
        info!(library, file_name, "Downloading workbook");

        let outcome = retry_with_backoff(
            "sharepoint download",
            self.max_retries,
            self.pacer.as_ref(),
            |_| self.fetch_file(&url, local_path),
        )
        .await;

        match outcome {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, file_name, "Download failed after all attempts");
                false
            }
        }
    }
}

/// Quote-escape a value for an OData string literal.
fn odata_literal(value: &str) -> String {
    value.replace('\'', "''")
}

fn describe_status(status: StatusCode) -> String {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            format!("access denied ({})", status)
        }
        StatusCode::NOT_FOUND => "resource not found (404)".to_string(),
        other => format!("unexpected status {}", other),
    }
}

/// Hex-encoded SHA-256 of a downloaded payload.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::RecordingPacer;

    fn settings() -> SharePointSettings {
        SharePointSettings {
            base_url: "https://corp.sharepoint.com/".to_string(),
            site_path: "/sites/compliance".to_string(),
            library: "Shared Documents".to_string(),
            file_name: "software.xlsx".to_string(),
            username: "svc".to_string(),
            password: "pw".to_string(),
        }
    }

    fn client(pacer: Arc<RecordingPacer>) -> SharePointClient {
        SharePointClient::new(settings(), Duration::from_secs(5), 3, pacer).unwrap()
    }

    #[test]
    fn test_rest_urls() {
        let client = client(Arc::new(RecordingPacer::default()));
        assert_eq!(
            client.web_url(),
            "https://corp.sharepoint.com/sites/compliance/_api/web"
        );
        assert_eq!(
            client.file_url("Shared Documents", "Bob's list.xlsx"),
            "https://corp.sharepoint.com/sites/compliance/_api/web/lists/GetByTitle('Shared Documents')/RootFolder/Files('Bob''s list.xlsx')/$value"
        );
    }

    #[tokio::test]
    async fn test_download_requires_authentication() {
        let pacer = Arc::new(RecordingPacer::default());
        let client = client(pacer.clone());
        let dir = tempfile::tempdir().unwrap();

        let ok = client
            .download("Shared Documents", "software.xlsx", &dir.path().join("software.xlsx"))
            .await;

        assert!(!ok);
        assert!(!client.is_authenticated());
        assert!(pacer.pauses().is_empty());
    }

    fn unreachable_client(pacer: Arc<RecordingPacer>) -> SharePointClient {
        let mut settings = settings();
        settings.base_url = "http://127.0.0.1:1".to_string();
        SharePointClient::new(settings, Duration::from_secs(5), 3, pacer).unwrap()
    }

    #[tokio::test]
    async fn test_authentication_retries_then_fails() {
        let pacer = Arc::new(RecordingPacer::default());
        let mut client = unreachable_client(pacer.clone());

        assert!(!client.authenticate().await);
        assert!(!client.is_authenticated());
        assert_eq!(
            pacer.pauses(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[tokio::test]
    async fn test_download_retries_then_fails() {
        let pacer = Arc::new(RecordingPacer::default());
        let mut client = unreachable_client(pacer.clone());
        client.session = Some(SiteSession {
            title: "Compliance".to_string(),
        });
        let dir = tempfile::tempdir().unwrap();
        let local_path = dir.path().join("software.xlsx");

        let ok = client
            .download("Shared Documents", "software.xlsx", &local_path)
            .await;

        assert!(!ok);
        assert!(!local_path.exists());
        assert_eq!(
            pacer.pauses(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[test]
    fn test_status_descriptions() {
        assert!(describe_status(StatusCode::UNAUTHORIZED).contains("access denied"));
        assert!(describe_status(StatusCode::NOT_FOUND).contains("404"));
        assert!(describe_status(StatusCode::BAD_GATEWAY).contains("502"));
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
