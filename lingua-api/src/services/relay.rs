/// Relay of public form submissions to the spreadsheet endpoints
///
/// Contact and newsletter forms are not stored locally. Each submission is
/// posted as JSON to a configured web-app URL that appends a spreadsheet row.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::RelayConfig;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("No relay endpoint configured for {0}")]
    NotConfigured(FormKind),

    #[error("Relay request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Relay endpoint answered {0}")]
    Status(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormKind {
    Contact,
    Newsletter,
}

impl std::fmt::Display for FormKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormKind::Contact => write!(f, "contact"),
            FormKind::Newsletter => write!(f, "newsletter"),
        }
    }
}

/// One form submission, already validated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormSubmission {
    pub kind: FormKind,
    pub fields: serde_json::Value,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

#[async_trait]
pub trait FormRelay: Send + Sync {
    async fn submit(&self, submission: FormSubmission) -> Result<(), RelayError>;
}

pub struct HttpFormRelay {
    client: reqwest::Client,
    contact_url: Option<String>,
    newsletter_url: Option<String>,
}

impl HttpFormRelay {
    /// # Errors
    ///
    /// Fails only if the HTTP client cannot be built.
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            contact_url: config.contact_url.clone(),
            newsletter_url: config.newsletter_url.clone(),
        })
    }

    fn endpoint(&self, kind: FormKind) -> Option<&str> {
        match kind {
            FormKind::Contact => self.contact_url.as_deref(),
            FormKind::Newsletter => self.newsletter_url.as_deref(),
        }
    }
}

#[async_trait]
impl FormRelay for HttpFormRelay {
    async fn submit(&self, submission: FormSubmission) -> Result<(), RelayError> {
        let kind = submission.kind;
        let url = self.endpoint(kind).ok_or(RelayError::NotConfigured(kind))?;

        debug!(form = %kind, "Relaying form submission");
        let response = self.client.post(url).json(&submission).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Status(status.as_u16()));
        }

        info!(form = %kind, "Form submission relayed");
        Ok(())
    }
}
