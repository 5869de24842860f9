//! handlers/auth.rs
//! Comprobación del token bearer de los endpoints de procesos.

use actix_web::{http::header, HttpRequest};

use crate::config::app_config::AppConfig;
use crate::models::error_model::{ApiError, ApiResult};

/// Exige `Authorization: Bearer <API_TOKEN>`. Sin token configurado no se
/// comprueba nada (se avisa al arrancar).
pub fn require_bearer(req: &HttpRequest, config: &AppConfig) -> ApiResult<()> {
    let Some(expected) = config.api_token.as_deref() else {
        return Ok(());
    };

    let provided = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match provided {
        Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => Ok(()),
        Some(_) => {
            log::warn!("Token inválido en {}", req.path());
            Err(ApiError::Unauthorized)
        }
        None => Err(ApiError::Unauthorized),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
