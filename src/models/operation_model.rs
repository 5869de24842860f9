use serde::{Deserialize, Serialize};

/// Tipos de operación que registran su ejecución en `operations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    EmailQueue,
    CrmSync,
    CsvImport,
    AiParseTasks,
    Document,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::EmailQueue => "email_queue",
            OperationType::CrmSync => "crm_sync",
            OperationType::CsvImport => "csv_import",
            OperationType::AiParseTasks => "ai_parse_tasks",
            OperationType::Document => "document",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OperationRecord {
    pub id: String,
    pub operation_type: String,
    pub status: String, // "pending", "running", "done", "failed"
    pub error_message: Option<String>,
    pub is_async: bool,
    pub created_at: String,
    pub updated_at: String,
    pub metadata: Option<String>, // JSON adicional
}

/// Request para crear una operación
#[derive(Debug, Clone)]
pub struct CreateOperationRequest {
    pub operation_type: OperationType,
    pub is_async: bool,
    pub metadata: Option<serde_json::Value>,
}

/// Para listar operaciones con paginación
#[derive(Debug, Clone, Serialize)]
pub struct ListOperationsResponse {
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub items: Vec<OperationRecord>,
}
