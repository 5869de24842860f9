//! handlers/ai_handler.rs
//! Extracción de tareas con IA.

use actix_web::{web, HttpRequest, HttpResponse};

use crate::config::app_config::AppConfig;
use crate::handlers::auth::require_bearer;
use crate::models::operation_model::OperationType;
use crate::models::task_model::{
    CreateTasksRequest, ParseTasksRequest, ParseTasksResponse, TaskCreationContext,
};
use crate::services::ai_task_service::AiTaskService;
use crate::services::operation_service::OperationService;
use crate::services::task_service::TaskService;

/// POST /api/ai/parse-tasks
///
/// Con `create: true` las tareas extraídas se guardan y la respuesta incluye
/// el resultado de la creación.
pub async fn parse_tasks_endpoint(
    req: HttpRequest,
    config: web::Data<AppConfig>,
    ai: web::Data<AiTaskService>,
    tasks: web::Data<TaskService>,
    op_service: web::Data<OperationService>,
    body: web::Json<ParseTasksRequest>,
) -> actix_web::Result<HttpResponse> {
    require_bearer(&req, &config)?;
    let body = body.into_inner();

    let parsed = op_service
        .track(OperationType::AiParseTasks, ai.parse_tasks(&body.text))
        .await?;

    let created = if body.create {
        let ctx = TaskCreationContext {
            mandato_id: body.mandato_id,
            default_assignee: body.default_assignee,
        };
        Some(tasks.create_from_parsed(&parsed.tasks, &ctx).await)
    } else {
        None
    };

    Ok(HttpResponse::Ok().json(ParseTasksResponse {
        success: true,
        parsed,
        created,
    }))
}

/// POST /api/ai/create-tasks
pub async fn create_tasks_endpoint(
    req: HttpRequest,
    config: web::Data<AppConfig>,
    tasks: web::Data<TaskService>,
    body: web::Json<CreateTasksRequest>,
) -> actix_web::Result<HttpResponse> {
    require_bearer(&req, &config)?;
    let body = body.into_inner();
    let ctx = TaskCreationContext {
        mandato_id: body.mandato_id,
        default_assignee: body.default_assignee,
    };
    let result = tasks.create_from_parsed(&body.tasks, &ctx).await;
    Ok(HttpResponse::Ok().json(result))
}
