//! services/ai_task_service.rs
//! Extracción de tareas a partir de texto libre con un modelo de lenguaje
//! (gateway compatible con chat-completions).

use std::sync::Arc;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::app_config::LlmConfig;
use crate::models::task_model::ParsedTasks;

#[derive(Debug, thiserror::Error)]
pub enum AiTaskError {
    #[error("Límite de peticiones alcanzado, inténtalo en unos minutos")]
    RateLimited,
    #[error("Créditos de IA agotados")]
    CreditsExhausted,
    #[error("Error del gateway de IA ({status}): {message}")]
    Gateway { status: u16, message: String },
    #[error("Respuesta de la IA no válida: {0}")]
    InvalidResponse(String),
    #[error("Parseo de tareas con IA no configurado")]
    NotConfigured,
    #[error("Petición inválida: {0}")]
    BadRequest(String),
}

impl ResponseError for AiTaskError {
    fn status_code(&self) -> StatusCode {
        match self {
            AiTaskError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AiTaskError::CreditsExhausted => StatusCode::PAYMENT_REQUIRED,
            AiTaskError::Gateway { .. } | AiTaskError::InvalidResponse(_) => {
                StatusCode::BAD_GATEWAY
            }
            AiTaskError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            AiTaskError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "error": self.to_string(),
        }))
    }
}

/// Respuesta cruda del gateway: código HTTP y cuerpo sin interpretar.
#[derive(Debug, Clone)]
pub struct GatewayReply {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn chat(&self, system: &str, user: &str) -> Result<GatewayReply, AiTaskError>;
}

pub struct HttpLlmGateway {
    http: Client,
    config: LlmConfig,
}

impl HttpLlmGateway {
    pub fn new(config: LlmConfig) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl LlmGateway for HttpLlmGateway {
    async fn chat(&self, system: &str, user: &str) -> Result<GatewayReply, AiTaskError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.gateway_url.trim_end_matches('/')
        );
        let payload = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "response_format": { "type": "json_object" },
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AiTaskError::Gateway {
                status: 0,
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| AiTaskError::Gateway {
            status,
            message: e.to_string(),
        })?;
        Ok(GatewayReply { status, body })
    }
}

/// Sin clave configurada: cualquier llamada devuelve `NotConfigured`.
pub struct DisabledLlmGateway;

#[async_trait]
impl LlmGateway for DisabledLlmGateway {
    async fn chat(&self, _system: &str, _user: &str) -> Result<GatewayReply, AiTaskError> {
        Err(AiTaskError::NotConfigured)
    }
}

#[derive(Clone)]
pub struct AiTaskService {
    gateway: Arc<dyn LlmGateway>,
}

impl AiTaskService {
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self { gateway }
    }

    pub async fn parse_tasks(&self, text: &str) -> Result<ParsedTasks, AiTaskError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AiTaskError::BadRequest("el texto está vacío".to_string()));
        }

        let system = system_prompt(&Utc::now().format("%Y-%m-%d").to_string());
        let reply = self.gateway.chat(&system, text).await?;
        let parsed = map_gateway_response(reply.status, &reply.body)?;
        log::info!("(ai_tasks) {} tareas extraídas", parsed.tasks.len());
        Ok(parsed)
    }
}

pub fn system_prompt(today: &str) -> String {
    format!(
        "Eres un asistente de un despacho de M&A. Hoy es {today}. \
         Extrae del texto del usuario las tareas accionables y responde \
         únicamente con JSON con la forma \
         {{\"tasks\": [{{\"title\": string, \"description\": string|null, \
         \"due_date\": \"YYYY-MM-DD\"|null, \"priority\": \"baja\"|\"media\"|\"alta\"|\"urgente\", \
         \"assignee\": string|null}}], \"summary\": string}}. \
         Convierte las fechas relativas (\"el viernes\", \"en dos semanas\") a fechas absolutas \
         a partir de hoy. No inventes responsables ni fechas que no aparezcan en el texto."
    )
}

/// Traduce la respuesta del gateway: 429 y 402 tienen error propio, el resto
/// de códigos no 2xx son errores de gateway y un 2xx se interpreta como
/// `choices[0].message.content`.
pub fn map_gateway_response(status: u16, body: &str) -> Result<ParsedTasks, AiTaskError> {
    match status {
        429 => return Err(AiTaskError::RateLimited),
        402 => return Err(AiTaskError::CreditsExhausted),
        200..=299 => {}
        _ => {
            log::error!("(ai_tasks) Gateway respondió {}: {}", status, body);
            return Err(AiTaskError::Gateway {
                status,
                message: gateway_message(body),
            });
        }
    }

    let envelope: Value = serde_json::from_str(body)
        .map_err(|e| AiTaskError::InvalidResponse(format!("cuerpo no es JSON: {e}")))?;
    let content = envelope
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| AiTaskError::InvalidResponse("respuesta sin contenido".to_string()))?;

    let content = strip_code_fences(content);
    if content.is_empty() {
        return Err(AiTaskError::InvalidResponse("contenido vacío".to_string()));
    }
    serde_json::from_str::<ParsedTasks>(content)
        .map_err(|e| AiTaskError::InvalidResponse(format!("JSON de tareas inválido: {e}")))
}

fn gateway_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(300).collect())
}

/// Quita los bloques ```json ... ``` con los que algunos modelos envuelven
/// la respuesta.
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
