use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub attachment: Option<EmailAttachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> anyhow::Result<()>;
}

/// Sends mail through a JSON-over-HTTP email API.
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct AttachmentPayload<'a> {
    filename: &'a str,
    content_type: &'a str,
    content_base64: String,
}

#[derive(Serialize)]
struct EmailPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
    attachments: Vec<AttachmentPayload<'a>>,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build email HTTP client")?;
        Ok(Self {
            client,
            api_url,
            api_key,
            from,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> anyhow::Result<()> {
        let attachments = email
            .attachment
            .iter()
            .map(|a| AttachmentPayload {
                filename: &a.filename,
                content_type: &a.content_type,
                content_base64: base64::engine::general_purpose::STANDARD.encode(&a.data),
            })
            .collect();

        let payload = EmailPayload {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            html_body: &email.html_body,
            attachments,
        };

        self.client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("failed to call email API")?
            .error_for_status()
            .context("email API returned error")?;

        Ok(())
    }
}
