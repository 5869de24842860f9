//! handlers/sync_handler.rs
//! Cola de sincronización con Brevo.

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::config::app_config::AppConfig;
use crate::handlers::auth::require_bearer;
use crate::models::error_model::{ApiError, ApiResult};
use crate::models::operation_model::OperationType;
use crate::models::queue_model::QueueListQuery;
use crate::models::sync_model::EnqueueSyncRequest;
use crate::services::operation_service::OperationService;
use crate::services::sync_queue_service::SyncQueueService;

/// GET /api/crm-sync
pub async fn list_sync_queue_endpoint(
    sync: web::Data<SyncQueueService>,
    query: web::Query<QueueListQuery>,
) -> ApiResult<HttpResponse> {
    let status = query.status_filter().map_err(ApiError::BadRequest)?;
    let items = sync
        .list(status, query.limit.unwrap_or(50), query.offset.unwrap_or(0))
        .await?;
    Ok(HttpResponse::Ok().json(items))
}

/// GET /api/crm-sync/stats
pub async fn sync_stats_endpoint(sync: web::Data<SyncQueueService>) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(sync.stats().await?))
}

/// POST /api/crm-sync
pub async fn enqueue_sync_endpoint(
    req: HttpRequest,
    config: web::Data<AppConfig>,
    sync: web::Data<SyncQueueService>,
    body: web::Json<EnqueueSyncRequest>,
) -> ApiResult<HttpResponse> {
    require_bearer(&req, &config)?;
    let body = body.into_inner();
    let id = sync
        .enqueue(body.entity_type, &body.entity_id, body.action, body.payload)
        .await?;
    Ok(HttpResponse::Created().json(json!({ "success": true, "id": id })))
}

/// POST /api/crm-sync/process
pub async fn process_sync_queue_endpoint(
    req: HttpRequest,
    config: web::Data<AppConfig>,
    sync: web::Data<SyncQueueService>,
    op_service: web::Data<OperationService>,
) -> ApiResult<HttpResponse> {
    require_bearer(&req, &config)?;
    let summary = op_service
        .track(OperationType::CrmSync, sync.process_queue())
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "summary": summary })))
}

/// POST /api/crm-sync/{id}/retry
pub async fn retry_sync_endpoint(
    sync: web::Data<SyncQueueService>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    sync.retry(&id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "id": id })))
}
