//! Bundled default collaborator implementations.
//!
//! `spec.md` §1 explicitly scopes document content parsing/plugin
//! execution and platform identity discovery out of the core — they are
//! contracts (`DocumentExecutor`/`DocumentParser`/`PlatformIdentity`), not
//! algorithms this subsystem owns. The CLI binary still needs *something*
//! concrete to wire up, so this module provides minimal, honest defaults:
//! a shell-command executor (grounded on the teacher's `sa_tools::exec`
//! spawn idiom) and an environment-derived platform identity. Production
//! deployments are expected to swap these for the real SSM document
//! interpreter and instance-metadata client.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use sa_domain::model::{Association, AssociationStatus, ComplianceEntry};
use sa_domain::{Error, Result};
use tokio::process::Command;

use crate::collaborators::{ComplianceUploader, DocumentExecutor, DocumentParser, PlatformIdentity};

/// Reads `instance_id`/`region` from the environment, falling back to the
/// local hostname — a stand-in for real IMDS-backed discovery.
pub struct EnvPlatformIdentity {
    instance_id: String,
    region: String,
}

impl EnvPlatformIdentity {
    pub fn from_env() -> Self {
        let instance_id = std::env::var("SA_INSTANCE_ID").unwrap_or_else(|_| {
            hostname_fallback().unwrap_or_else(|| "mi-unknown".to_string())
        });
        let region = std::env::var("SA_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        Self { instance_id, region }
    }
}

fn hostname_fallback() -> Option<String> {
    std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[async_trait]
impl PlatformIdentity for EnvPlatformIdentity {
    async fn instance_id(&self) -> Result<String> {
        Ok(self.instance_id.clone())
    }

    fn region(&self) -> String {
        self.region.clone()
    }

    fn is_managed_instance(&self) -> bool {
        true
    }
}

/// Accepts any document whose body is non-empty. Real document-state
/// construction (parameter substitution, plugin resolution) is the
/// excluded black box; this only guards against an obviously malformed
/// association reaching the Task Pool.
pub struct PassthroughDocumentParser;

impl DocumentParser for PassthroughDocumentParser {
    fn parse_document_for_payload(&self, association: &Association) -> Result<()> {
        match &association.document {
            Some(body) if body.trim().is_empty() => Err(Error::Other(format!(
                "association {} has an empty document body",
                association.association_id
            ))),
            _ => Ok(()),
        }
    }

    fn initialize_document_state(&self, _association: &Association) -> Result<()> {
        Ok(())
    }
}

/// Runs the association's `document` field as a shell command. A thin
/// stand-in for the real plugin-dispatch executor — adequate for
/// `AWS-RunShellScript`-shaped documents, nothing more.
pub struct ShellDocumentExecutor {
    timeout: Duration,
}

impl ShellDocumentExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl DocumentExecutor for ShellDocumentExecutor {
    async fn execute(&self, association: &Association, document_id: &str) -> Result<AssociationStatus> {
        let Some(command) = &association.document else {
            tracing::debug!(document_id, "no document body; treating as a no-op success");
            return Ok(AssociationStatus::Success);
        };

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        for (key, values) in &association.parameters {
            if let Some(first) = values.first() {
                cmd.env(format!("SSM_PARAM_{}", key.to_uppercase()), first);
            }
        }

        let run = tokio::time::timeout(self.timeout, cmd.output()).await;
        match run {
            Err(_) => Ok(AssociationStatus::TimedOut),
            Ok(Err(e)) => Err(Error::Other(format!("spawning document {document_id}: {e}"))),
            Ok(Ok(output)) => {
                if output.status.success() {
                    Ok(AssociationStatus::Success)
                } else {
                    Ok(AssociationStatus::Failed)
                }
            }
        }
    }
}

/// Delivers compliance entries over HTTP to the same control plane the
/// bundled `HttpControlPlaneClient` talks to.
pub struct HttpComplianceUploader {
    http: Client,
    base_url: String,
}

impl HttpComplianceUploader {
    pub fn new(base_url: impl Into<String>, request_timeout_ms: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(request_timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ComplianceUploader for HttpComplianceUploader {
    async fn upload(&self, entry: &ComplianceEntry) -> Result<()> {
        let url = format!("{}/v1/compliance-items", self.base_url);
        let resp = self
            .http
            .put(&url)
            .json(entry)
            .send()
            .await
            .map_err(|e| Error::ControlPlane(format!("compliance upload: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::ControlPlane(format!(
                "compliance upload returned {status}: {body}"
            )));
        }
        Ok(())
    }
}
