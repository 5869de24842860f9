use serde::{Deserialize, Serialize};

use crate::models::queue_model::QueueStatus;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    #[serde(
        serialize_with = "serialize_base64",
        deserialize_with = "deserialize_base64"
    )]
    pub data: Vec<u8>,
}

fn serialize_base64<S>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&base64::encode(data))
}

fn deserialize_base64<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    base64::decode(&s).map_err(serde::de::Error::custom)
}

/// POST /api/email-queue
#[derive(Debug, Clone, Deserialize)]
pub struct EnqueueEmailRequest {
    pub recipients: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    pub subject: String,
    pub html_body: String,
    #[serde(default)]
    pub attachments: Vec<EmailAttachment>,
    pub mandato_id: Option<String>,
    pub max_attempts: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnqueueEmailResponse {
    pub success: bool,
    pub id: String,
}

/// Fila de `email_queue`. Los destinatarios se guardan unidos por ';'.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EmailQueueItem {
    pub id: String,
    pub recipients: String,
    pub cc: Option<String>,
    pub subject: String,
    pub html_body: String,
    #[serde(skip_serializing)]
    pub attachments: Option<String>,
    pub mandato_id: Option<String>,
    pub status: QueueStatus,
    pub attempts: i64,
    pub max_attempts: i64,
    pub last_error: Option<String>,
    pub next_retry_at: Option<String>,
    pub sending_started_at: Option<String>,
    pub sent_at: Option<String>,
    pub provider_message_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl EmailQueueItem {
    pub fn recipient_list(&self) -> Vec<String> {
        split_addresses(&self.recipients)
    }

    pub fn cc_list(&self) -> Vec<String> {
        self.cc.as_deref().map(split_addresses).unwrap_or_default()
    }

    pub fn attachment_list(&self) -> Result<Vec<EmailAttachment>, serde_json::Error> {
        match self.attachments.as_deref() {
            None | Some("") => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(raw),
        }
    }

    pub fn to_outgoing(&self) -> Result<OutgoingEmail, serde_json::Error> {
        Ok(OutgoingEmail {
            to: self.recipient_list(),
            cc: self.cc_list(),
            subject: self.subject.clone(),
            html_body: self.html_body.clone(),
            attachments: self.attachment_list()?,
        })
    }
}

fn split_addresses(joined: &str) -> Vec<String> {
    joined
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lo que recibe el `EmailSender` para un envío concreto.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub html_body: String,
    pub attachments: Vec<EmailAttachment>,
}
