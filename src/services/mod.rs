//! services/mod.rs
//! Módulo que agrupa distintos "servicios" o "capas de negocio" de la app.

pub mod ai_task_service;
pub mod crm_service;
pub mod document_service;
pub mod email_queue_service;
pub mod email_service;
pub mod import_service;
pub mod operation_service;
pub mod pdf_service;
pub mod queue_store;
pub mod search_service;
pub mod sync_queue_service;
pub mod task_service;
