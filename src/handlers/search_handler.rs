//! handlers/search_handler.rs

use actix_web::{web, HttpResponse};

use crate::models::error_model::ApiResult;
use crate::models::search_model::SearchQuery;
use crate::services::search_service::SearchService;

/// GET /api/search?q=&limit=
pub async fn search_endpoint(
    search: web::Data<SearchService>,
    query: web::Query<SearchQuery>,
) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(search.search(&query).await?))
}
