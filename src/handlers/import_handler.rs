//! handlers/import_handler.rs
//! Importación CSV. El cuerpo es el fichero tal cual (text/csv).

use actix_web::{web, HttpRequest, HttpResponse};
use bytes::Bytes;

use crate::config::app_config::AppConfig;
use crate::handlers::auth::require_bearer;
use crate::models::error_model::{ApiError, ApiResult};
use crate::models::import_model::{ImportEntity, ImportQuery};
use crate::models::operation_model::OperationType;
use crate::services::import_service::ImportService;
use crate::services::operation_service::OperationService;

/// POST /api/import/{contactos|empresas}?dry_run=
pub async fn import_csv_endpoint(
    req: HttpRequest,
    config: web::Data<AppConfig>,
    importer: web::Data<ImportService>,
    op_service: web::Data<OperationService>,
    path: web::Path<String>,
    query: web::Query<ImportQuery>,
    body: Bytes,
) -> ApiResult<HttpResponse> {
    require_bearer(&req, &config)?;

    let entity = match path.as_str() {
        "contactos" => ImportEntity::Contactos,
        "empresas" => ImportEntity::Empresas,
        other => {
            return Err(ApiError::NotFound(format!("importación de '{other}'")));
        }
    };
    let csv = std::str::from_utf8(&body)
        .map_err(|_| ApiError::BadRequest("el fichero no está en UTF-8".to_string()))?;

    let report = op_service
        .track(
            OperationType::CsvImport,
            importer.import(entity, csv, query.dry_run),
        )
        .await?;
    Ok(HttpResponse::Ok().json(report))
}
