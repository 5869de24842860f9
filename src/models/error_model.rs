//! models/error_model.rs
//! Errores compartidos entre servicios y handlers.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::{json, Value};

/// Error de base de datos con el mensaje original y metadatos de contexto
/// (operación y tabla) para poder rastrear dónde falló.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct DatabaseError {
    pub message: String,
    pub context: Value,
    #[source]
    pub source: sqlx::Error,
}

impl DatabaseError {
    pub fn new(operation: &str, table: &str, source: sqlx::Error) -> Self {
        Self {
            message: format!("Error de base de datos en {operation} ({table}): {source}"),
            context: json!({ "operation": operation, "table": table }),
            source,
        }
    }
}

/// Extensión para adjuntar contexto a los resultados de sqlx.
pub trait DbResultExt<T> {
    fn db_context(self, operation: &str, table: &str) -> Result<T, DatabaseError>;
}

impl<T> DbResultExt<T> for Result<T, sqlx::Error> {
    fn db_context(self, operation: &str, table: &str) -> Result<T, DatabaseError> {
        self.map_err(|e| DatabaseError::new(operation, table, e))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("No encontrado: {0}")]
    NotFound(String),
    #[error("Petición inválida: {0}")]
    BadRequest(String),
    #[error("No autorizado")]
    Unauthorized,
    #[error("Conflicto: {0}")]
    Conflict(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = json!({
            "success": false,
            "error": self.to_string(),
        });
        match self {
            ApiError::Database(db) => {
                log::error!("{} {}", db.message, db.context);
                body["context"] = db.context.clone();
            }
            ApiError::Internal(e) => log::error!("Error interno: {:?}", e),
            _ => {}
        }
        HttpResponse::build(self.status_code()).json(body)
    }
}
