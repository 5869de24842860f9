//! handlers/operation_handler.rs
//! Consulta del registro de ejecuciones de procesos.
use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::models::error_model::{ApiError, ApiResult};
use crate::services::operation_service::OperationService;

#[derive(Deserialize)]
pub struct PaginationQuery {
    page: Option<u64>,
    page_size: Option<u64>,
}

/// GET /api/operations
pub async fn list_operations_endpoint(
    op_service: web::Data<OperationService>,
    query: web::Query<PaginationQuery>,
) -> ApiResult<HttpResponse> {
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(20);

    let list = op_service.list_operations(page, page_size).await?;
    Ok(HttpResponse::Ok().json(list))
}

/// GET /api/operations/{id}
pub async fn get_operation_endpoint(
    op_service: web::Data<OperationService>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let op_id = path.into_inner();

    match op_service.get_operation(&op_id).await? {
        Some(record) => Ok(HttpResponse::Ok().json(record)),
        None => Err(ApiError::NotFound(format!("operación {op_id}"))),
    }
}
