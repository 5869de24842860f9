//! app.rs
use crate::handlers::{
    ai_handler, crm_handler, document_handler, email_queue_handler, import_handler,
    operation_handler, search_handler, sync_handler, task_handler,
};
use actix_web::web;

/// Límite del cuerpo para JSON con adjuntos en base64 y ficheros CSV.
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().limit(MAX_BODY_BYTES))
        .app_data(web::PayloadConfig::default().limit(MAX_BODY_BYTES))
        .service(
            web::scope("/api")
                .service(
                    web::scope("/operations")
                        .route(
                            "",
                            web::get().to(operation_handler::list_operations_endpoint),
                        )
                        .route(
                            "/{id}",
                            web::get().to(operation_handler::get_operation_endpoint),
                        ),
                )
                .service(
                    web::scope("/empresas")
                        .route("", web::post().to(crm_handler::create_empresa_endpoint))
                        .route("", web::get().to(crm_handler::list_empresas_endpoint))
                        .route("/{id}", web::get().to(crm_handler::get_empresa_endpoint))
                        .route("/{id}", web::put().to(crm_handler::update_empresa_endpoint))
                        .route(
                            "/{id}",
                            web::delete().to(crm_handler::delete_empresa_endpoint),
                        ),
                )
                .service(
                    web::scope("/contactos")
                        .route("", web::post().to(crm_handler::create_contacto_endpoint))
                        .route("", web::get().to(crm_handler::list_contactos_endpoint))
                        .route("/{id}", web::get().to(crm_handler::get_contacto_endpoint))
                        .route(
                            "/{id}",
                            web::put().to(crm_handler::update_contacto_endpoint),
                        )
                        .route(
                            "/{id}",
                            web::delete().to(crm_handler::delete_contacto_endpoint),
                        ),
                )
                .service(
                    web::scope("/mandatos")
                        .route("", web::post().to(crm_handler::create_mandato_endpoint))
                        .route("", web::get().to(crm_handler::list_mandatos_endpoint))
                        .route("/{id}", web::get().to(crm_handler::get_mandato_endpoint))
                        .route("/{id}", web::put().to(crm_handler::update_mandato_endpoint))
                        .route(
                            "/{id}",
                            web::delete().to(crm_handler::delete_mandato_endpoint),
                        )
                        .route(
                            "/{id}/estado",
                            web::patch().to(crm_handler::move_mandato_endpoint),
                        ),
                )
                .route("/pipeline", web::get().to(crm_handler::pipeline_endpoint))
                .route("/calendar", web::get().to(crm_handler::calendar_endpoint))
                .route("/search", web::get().to(search_handler::search_endpoint))
                .service(
                    web::scope("/email-queue")
                        .route(
                            "",
                            web::post().to(email_queue_handler::enqueue_email_endpoint),
                        )
                        .route(
                            "",
                            web::get().to(email_queue_handler::list_email_queue_endpoint),
                        )
                        .route(
                            "/stats",
                            web::get().to(email_queue_handler::email_queue_stats_endpoint),
                        )
                        .route(
                            "/process",
                            web::post().to(email_queue_handler::process_email_queue_endpoint),
                        )
                        .route(
                            "/retry-failed",
                            web::post().to(email_queue_handler::retry_all_failed_endpoint),
                        )
                        .route(
                            "/{id}",
                            web::get().to(email_queue_handler::get_email_endpoint),
                        )
                        .route(
                            "/{id}/retry",
                            web::post().to(email_queue_handler::retry_email_endpoint),
                        )
                        .route(
                            "/{id}/cancel",
                            web::post().to(email_queue_handler::cancel_email_endpoint),
                        ),
                )
                .service(
                    web::scope("/crm-sync")
                        .route("", web::get().to(sync_handler::list_sync_queue_endpoint))
                        .route("", web::post().to(sync_handler::enqueue_sync_endpoint))
                        .route("/stats", web::get().to(sync_handler::sync_stats_endpoint))
                        .route(
                            "/process",
                            web::post().to(sync_handler::process_sync_queue_endpoint),
                        )
                        .route(
                            "/{id}/retry",
                            web::post().to(sync_handler::retry_sync_endpoint),
                        ),
                )
                .service(
                    web::scope("/ai")
                        .route(
                            "/parse-tasks",
                            web::post().to(ai_handler::parse_tasks_endpoint),
                        )
                        .route(
                            "/create-tasks",
                            web::post().to(ai_handler::create_tasks_endpoint),
                        ),
                )
                .service(
                    web::scope("/tareas")
                        .route("", web::post().to(task_handler::create_tarea_endpoint))
                        .route("", web::get().to(task_handler::list_tareas_endpoint))
                        .route("/{id}", web::get().to(task_handler::get_tarea_endpoint))
                        .route(
                            "/{id}",
                            web::delete().to(task_handler::delete_tarea_endpoint),
                        )
                        .route(
                            "/{id}/completar",
                            web::post().to(task_handler::complete_tarea_endpoint),
                        )
                        .route(
                            "/{id}/estado",
                            web::patch().to(task_handler::update_tarea_estado_endpoint),
                        ),
                )
                .route(
                    "/import/{entity}",
                    web::post().to(import_handler::import_csv_endpoint),
                )
                .service(
                    web::scope("/documents")
                        .route(
                            "",
                            web::post().to(document_handler::generate_document_endpoint),
                        )
                        .route(
                            "/preview",
                            web::post().to(document_handler::preview_document_endpoint),
                        )
                        .route(
                            "/files/{name}",
                            web::get().to(document_handler::serve_document_endpoint),
                        ),
                ),
        );
}
