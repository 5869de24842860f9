//! models/task_model.rs
//! Tareas (manuales o creadas a partir de la salida de la IA).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TareaEstado {
    Pendiente,
    EnProgreso,
    Completada,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TareaPrioridad {
    Baja,
    #[default]
    Media,
    Alta,
    Urgente,
}

impl TareaPrioridad {
    /// Acepta también las variantes en inglés que a veces devuelve el modelo.
    pub fn parse_lenient(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "baja" | "low" => Some(TareaPrioridad::Baja),
            "media" | "medium" | "normal" => Some(TareaPrioridad::Media),
            "alta" | "high" => Some(TareaPrioridad::Alta),
            "urgente" | "urgent" | "critical" => Some(TareaPrioridad::Urgente),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TareaOrigen {
    Manual,
    Ia,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Tarea {
    pub id: String,
    pub titulo: String,
    pub descripcion: Option<String>,
    pub estado: TareaEstado,
    pub prioridad: TareaPrioridad,
    pub fecha_vencimiento: Option<String>,
    pub asignado_a: Option<String>,
    pub mandato_id: Option<String>,
    pub origen: TareaOrigen,
    pub completada_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// POST /api/tareas
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTareaRequest {
    pub titulo: String,
    pub descripcion: Option<String>,
    #[serde(default)]
    pub prioridad: TareaPrioridad,
    pub fecha_vencimiento: Option<chrono::NaiveDate>,
    pub asignado_a: Option<String>,
    pub mandato_id: Option<String>,
}

/// PATCH /api/tareas/{id}/estado
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTareaEstadoRequest {
    pub estado: TareaEstado,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TareaFilter {
    pub mandato_id: Option<String>,
    pub estado: Option<TareaEstado>,
    pub asignado_a: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Tarea tal y como la devuelve el modelo de lenguaje. Los campos son
/// laxos a propósito: la validación se hace al persistir.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParsedTask {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParsedTasks {
    #[serde(default)]
    pub tasks: Vec<ParsedTask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// POST /api/ai/parse-tasks
#[derive(Debug, Clone, Deserialize)]
pub struct ParseTasksRequest {
    pub text: String,
    pub mandato_id: Option<String>,
    #[serde(default)]
    pub create: bool,
    pub default_assignee: Option<String>,
}

/// POST /api/ai/create-tasks
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTasksRequest {
    pub tasks: Vec<ParsedTask>,
    pub mandato_id: Option<String>,
    pub default_assignee: Option<String>,
}

/// Contexto con el que se crean las tareas que vienen de la IA.
#[derive(Debug, Clone, Default)]
pub struct TaskCreationContext {
    pub mandato_id: Option<String>,
    pub default_assignee: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TaskCreationFailure {
    pub index: usize,
    pub title: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateTasksResult {
    pub total: usize,
    pub created: Vec<Tarea>,
    pub failed: Vec<TaskCreationFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParseTasksResponse {
    pub success: bool,
    pub parsed: ParsedTasks,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<CreateTasksResult>,
}
