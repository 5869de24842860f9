//! handlers/document_handler.rs
//! Documentos legales: vista previa HTML, PDF y descarga de copias guardadas.

use actix_files::NamedFile;
use actix_web::{web, HttpResponse};

use crate::models::document_model::DocumentRequest;
use crate::models::error_model::{ApiError, ApiResult};
use crate::models::operation_model::OperationType;
use crate::services::document_service::DocumentService;
use crate::services::operation_service::OperationService;
use crate::services::pdf_service::PdfService;

/// POST /api/documents/preview
pub async fn preview_document_endpoint(
    documents: web::Data<DocumentService>,
    body: web::Json<DocumentRequest>,
) -> ApiResult<HttpResponse> {
    let preview = documents.preview(&body.documento)?;
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .append_header(("X-Document-Pages", preview.pages.to_string()))
        .body(preview.html))
}

/// POST /api/documents
pub async fn generate_document_endpoint(
    documents: web::Data<DocumentService>,
    op_service: web::Data<OperationService>,
    body: web::Json<DocumentRequest>,
) -> ApiResult<HttpResponse> {
    let req = body.into_inner();
    let document = op_service
        .track(OperationType::Document, documents.generate(&req))
        .await?;

    let mut response = HttpResponse::Ok();
    response
        .content_type("application/pdf")
        .append_header((
            "Content-Disposition",
            format!("inline; filename=\"{}\"", document.file_name),
        ))
        .append_header(("Cache-Control", "public, must-revalidate, max-age=0"))
        .append_header(("X-Document-Pages", document.pages.to_string()));
    if let Some(stored) = &document.stored_as {
        response.append_header(("X-Stored-As", stored.clone()));
    }
    Ok(response.body(document.bytes))
}

/// GET /api/documents/files/{name}
/// Sirve una copia guardada con `store_local`.
pub async fn serve_document_endpoint(
    pdf: web::Data<PdfService>,
    path: web::Path<String>,
) -> ApiResult<NamedFile> {
    let name = path.into_inner();
    if name.contains('/') || name.contains('\\') || name.starts_with('.') {
        return Err(ApiError::BadRequest("nombre de fichero inválido".to_string()));
    }
    NamedFile::open(pdf.output_dir().join(&name))
        .map_err(|_| ApiError::NotFound(format!("documento {name}")))
}
