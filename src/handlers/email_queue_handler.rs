//! handlers/email_queue_handler.rs
//! Panel y procesador de la cola de emails.

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::config::app_config::AppConfig;
use crate::handlers::auth::require_bearer;
use crate::models::email_model::{EnqueueEmailRequest, EnqueueEmailResponse};
use crate::models::error_model::{ApiError, ApiResult};
use crate::models::operation_model::OperationType;
use crate::models::queue_model::QueueListQuery;
use crate::services::email_queue_service::EmailQueueService;
use crate::services::operation_service::OperationService;

/// POST /api/email-queue
pub async fn enqueue_email_endpoint(
    queue: web::Data<EmailQueueService>,
    body: web::Json<EnqueueEmailRequest>,
) -> ApiResult<HttpResponse> {
    let id = queue.enqueue(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(EnqueueEmailResponse { success: true, id }))
}

/// GET /api/email-queue?status=&limit=&offset=
pub async fn list_email_queue_endpoint(
    queue: web::Data<EmailQueueService>,
    query: web::Query<QueueListQuery>,
) -> ApiResult<HttpResponse> {
    let status = query.status_filter().map_err(ApiError::BadRequest)?;
    let items = queue
        .list(status, query.limit.unwrap_or(50), query.offset.unwrap_or(0))
        .await?;
    Ok(HttpResponse::Ok().json(items))
}

/// GET /api/email-queue/stats
pub async fn email_queue_stats_endpoint(
    queue: web::Data<EmailQueueService>,
) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(queue.stats().await?))
}

/// GET /api/email-queue/{id}
pub async fn get_email_endpoint(
    queue: web::Data<EmailQueueService>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(queue.get(&path.into_inner()).await?))
}

/// POST /api/email-queue/process
pub async fn process_email_queue_endpoint(
    req: HttpRequest,
    config: web::Data<AppConfig>,
    queue: web::Data<EmailQueueService>,
    op_service: web::Data<OperationService>,
) -> ApiResult<HttpResponse> {
    require_bearer(&req, &config)?;
    let summary = op_service
        .track(OperationType::EmailQueue, queue.process_queue())
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "summary": summary })))
}

/// POST /api/email-queue/{id}/retry
pub async fn retry_email_endpoint(
    queue: web::Data<EmailQueueService>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    queue.retry(&id).await?;
    log::info!("(email_queue) Reintento manual de {}", id);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "id": id })))
}

/// POST /api/email-queue/retry-failed
pub async fn retry_all_failed_endpoint(
    req: HttpRequest,
    config: web::Data<AppConfig>,
    queue: web::Data<EmailQueueService>,
) -> ApiResult<HttpResponse> {
    require_bearer(&req, &config)?;
    let reset = queue.retry_all_failed().await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "reset": reset })))
}

/// POST /api/email-queue/{id}/cancel
pub async fn cancel_email_endpoint(
    queue: web::Data<EmailQueueService>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    queue.cancel(&id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "id": id })))
}
