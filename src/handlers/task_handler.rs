//! handlers/task_handler.rs

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::models::error_model::ApiResult;
use crate::models::task_model::{CreateTareaRequest, TareaFilter, UpdateTareaEstadoRequest};
use crate::services::task_service::TaskService;

/// POST /api/tareas
pub async fn create_tarea_endpoint(
    tasks: web::Data<TaskService>,
    body: web::Json<CreateTareaRequest>,
) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Created().json(tasks.create(body.into_inner()).await?))
}

/// GET /api/tareas?mandato_id=&estado=&asignado_a=
pub async fn list_tareas_endpoint(
    tasks: web::Data<TaskService>,
    query: web::Query<TareaFilter>,
) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(tasks.list(&query).await?))
}

/// GET /api/tareas/{id}
pub async fn get_tarea_endpoint(
    tasks: web::Data<TaskService>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(tasks.get(&path.into_inner()).await?))
}

/// POST /api/tareas/{id}/completar
pub async fn complete_tarea_endpoint(
    tasks: web::Data<TaskService>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(tasks.complete(&path.into_inner()).await?))
}

/// PATCH /api/tareas/{id}/estado
pub async fn update_tarea_estado_endpoint(
    tasks: web::Data<TaskService>,
    path: web::Path<String>,
    body: web::Json<UpdateTareaEstadoRequest>,
) -> ApiResult<HttpResponse> {
    let tarea = tasks.update_estado(&path.into_inner(), body.estado).await?;
    Ok(HttpResponse::Ok().json(tarea))
}

/// DELETE /api/tareas/{id}
pub async fn delete_tarea_endpoint(
    tasks: web::Data<TaskService>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    tasks.delete(&id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "id": id })))
}
