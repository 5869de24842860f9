//! models/mod.rs
//! Módulo raíz para modelos/estructuras compartidas.

use chrono::{DateTime, SecondsFormat, Utc};

pub mod crm_model;
pub mod document_model;
pub mod email_model;
pub mod error_model;
pub mod import_model;
pub mod operation_model;
pub mod pdf_model;
pub mod queue_model;
pub mod search_model;
pub mod sync_model;
pub mod task_model;

/// Formato único para todas las columnas de fecha/hora (RFC3339, UTC, milisegundos).
/// Al tener ancho fijo, las comparaciones de texto en SQLite respetan el orden temporal.
pub fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_timestamp() -> String {
    timestamp(Utc::now())
}
