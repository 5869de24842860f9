//! handlers/crm_handler.rs
//! Empresas, contactos, mandatos, pipeline y calendario.

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::models::crm_model::{
    CalendarQuery, ContactoInput, EmpresaInput, ListFilter, MandatoInput, MoveStageRequest,
};
use crate::models::error_model::ApiResult;
use crate::models::sync_model::{SyncAction, SyncEntityType};
use crate::services::crm_service::CrmService;
use crate::services::sync_queue_service::SyncQueueService;

fn deleted(id: String) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "id": id }))
}

// ----------------------------------------------------------------------
// Empresas
// ----------------------------------------------------------------------

/// POST /api/empresas
pub async fn create_empresa_endpoint(
    crm: web::Data<CrmService>,
    sync: web::Data<SyncQueueService>,
    body: web::Json<EmpresaInput>,
) -> ApiResult<HttpResponse> {
    let empresa = crm.create_empresa(body.into_inner()).await?;
    sync.enqueue_quietly(SyncEntityType::Empresa, &empresa.id, SyncAction::Upsert, None)
        .await;
    Ok(HttpResponse::Created().json(empresa))
}

/// GET /api/empresas?q=&limit=&offset=
pub async fn list_empresas_endpoint(
    crm: web::Data<CrmService>,
    query: web::Query<ListFilter>,
) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(crm.list_empresas(&query).await?))
}

/// GET /api/empresas/{id}
pub async fn get_empresa_endpoint(
    crm: web::Data<CrmService>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(crm.get_empresa(&path.into_inner()).await?))
}

/// PUT /api/empresas/{id}
pub async fn update_empresa_endpoint(
    crm: web::Data<CrmService>,
    sync: web::Data<SyncQueueService>,
    path: web::Path<String>,
    body: web::Json<EmpresaInput>,
) -> ApiResult<HttpResponse> {
    let empresa = crm.update_empresa(&path.into_inner(), body.into_inner()).await?;
    sync.enqueue_quietly(SyncEntityType::Empresa, &empresa.id, SyncAction::Upsert, None)
        .await;
    Ok(HttpResponse::Ok().json(empresa))
}

/// DELETE /api/empresas/{id}
pub async fn delete_empresa_endpoint(
    crm: web::Data<CrmService>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    crm.delete_empresa(&id).await?;
    Ok(deleted(id))
}

// ----------------------------------------------------------------------
// Contactos
// ----------------------------------------------------------------------

/// POST /api/contactos
pub async fn create_contacto_endpoint(
    crm: web::Data<CrmService>,
    sync: web::Data<SyncQueueService>,
    body: web::Json<ContactoInput>,
) -> ApiResult<HttpResponse> {
    let contacto = crm.create_contacto(body.into_inner()).await?;
    if contacto.email.is_some() {
        sync.enqueue_quietly(SyncEntityType::Contacto, &contacto.id, SyncAction::Upsert, None)
            .await;
    }
    Ok(HttpResponse::Created().json(contacto))
}

/// GET /api/contactos?q=&empresa_id=&limit=&offset=
pub async fn list_contactos_endpoint(
    crm: web::Data<CrmService>,
    query: web::Query<ListFilter>,
) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(crm.list_contactos(&query).await?))
}

/// GET /api/contactos/{id}
pub async fn get_contacto_endpoint(
    crm: web::Data<CrmService>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(crm.get_contacto(&path.into_inner()).await?))
}

/// PUT /api/contactos/{id}
///
/// Brevo identifica los contactos por email: si cambia, se da de baja el
/// anterior antes de subir el nuevo.
pub async fn update_contacto_endpoint(
    crm: web::Data<CrmService>,
    sync: web::Data<SyncQueueService>,
    path: web::Path<String>,
    body: web::Json<ContactoInput>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let previous = crm.get_contacto(&id).await?;
    let contacto = crm.update_contacto(&id, body.into_inner()).await?;
    if let Some(old_email) = previous
        .email
        .filter(|old| contacto.email.as_deref() != Some(old.as_str()))
    {
        sync.enqueue_quietly(
            SyncEntityType::Contacto,
            &id,
            SyncAction::Delete,
            Some(json!({ "email": old_email })),
        )
        .await;
    }
    if contacto.email.is_some() {
        sync.enqueue_quietly(SyncEntityType::Contacto, &contacto.id, SyncAction::Upsert, None)
            .await;
    }
    Ok(HttpResponse::Ok().json(contacto))
}

/// DELETE /api/contactos/{id}
///
/// Si el contacto tenía email se encola también su baja en Brevo, con el
/// email guardado en el payload porque la fila ya no existirá.
pub async fn delete_contacto_endpoint(
    crm: web::Data<CrmService>,
    sync: web::Data<SyncQueueService>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let contacto = crm.get_contacto(&id).await?;
    crm.delete_contacto(&id).await?;
    if let Some(email) = contacto.email {
        sync.enqueue_quietly(
            SyncEntityType::Contacto,
            &id,
            SyncAction::Delete,
            Some(json!({ "email": email })),
        )
        .await;
    }
    Ok(deleted(id))
}

// ----------------------------------------------------------------------
// Mandatos
// ----------------------------------------------------------------------

/// POST /api/mandatos
pub async fn create_mandato_endpoint(
    crm: web::Data<CrmService>,
    body: web::Json<MandatoInput>,
) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Created().json(crm.create_mandato(body.into_inner()).await?))
}

/// GET /api/mandatos?q=&estado=&tipo=&empresa_id=&limit=&offset=
pub async fn list_mandatos_endpoint(
    crm: web::Data<CrmService>,
    query: web::Query<ListFilter>,
) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(crm.list_mandatos(&query).await?))
}

/// GET /api/mandatos/{id}
pub async fn get_mandato_endpoint(
    crm: web::Data<CrmService>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(crm.get_mandato(&path.into_inner()).await?))
}

/// PUT /api/mandatos/{id}
pub async fn update_mandato_endpoint(
    crm: web::Data<CrmService>,
    path: web::Path<String>,
    body: web::Json<MandatoInput>,
) -> ApiResult<HttpResponse> {
    let mandato = crm.update_mandato(&path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(mandato))
}

/// PATCH /api/mandatos/{id}/estado
pub async fn move_mandato_endpoint(
    crm: web::Data<CrmService>,
    path: web::Path<String>,
    body: web::Json<MoveStageRequest>,
) -> ApiResult<HttpResponse> {
    let mandato = crm.move_mandato(&path.into_inner(), body.estado).await?;
    Ok(HttpResponse::Ok().json(mandato))
}

/// DELETE /api/mandatos/{id}
pub async fn delete_mandato_endpoint(
    crm: web::Data<CrmService>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    crm.delete_mandato(&id).await?;
    Ok(deleted(id))
}

/// GET /api/pipeline
pub async fn pipeline_endpoint(crm: web::Data<CrmService>) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(crm.pipeline().await?))
}

/// GET /api/calendar?desde=&hasta=
pub async fn calendar_endpoint(
    crm: web::Data<CrmService>,
    query: web::Query<CalendarQuery>,
) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(crm.calendar(&query).await?))
}
