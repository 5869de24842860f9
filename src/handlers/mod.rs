//! handlers/mod.rs
//! Módulo que agrupa los distintos handlers HTTP.
pub mod ai_handler;
pub mod auth;
pub mod crm_handler;
pub mod document_handler;
pub mod email_queue_handler;
pub mod import_handler;
pub mod operation_handler;
pub mod search_handler;
pub mod sync_handler;
pub mod task_handler;
