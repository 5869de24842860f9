//! tests/import_tests.rs
//! Importación CSV de contactos y empresas.

use crate::models::crm_model::ListFilter;
use crate::models::error_model::ApiError;
use crate::models::import_model::{ImportEntity, ImportRowError};
use crate::models::queue_model::QueueStatus;
use crate::services::crm_service::CrmService;
use crate::services::import_service::{
    detect_delimiter, parse_csv_line, parse_decimal, ImportService,
};
use crate::services::sync_queue_service::SyncQueueService;
use crate::tests::support::{fast_settings, seed_contacto, seed_empresa, test_pool, FakeSyncClient};

async fn setup() -> (CrmService, SyncQueueService, ImportService) {
    let pool = test_pool().await;
    let crm = CrmService::new(pool.clone());
    let sync = SyncQueueService::new(pool, crm.clone(), FakeSyncClient::ok(), fast_settings());
    let import = ImportService::new(crm.clone(), sync.clone());
    (crm, sync, import)
}

#[test]
fn csv_line_handles_quotes_and_escaped_quotes() {
    assert_eq!(
        parse_csv_line(r#"Ana, "García, López" ,ana@x.es"#, ','),
        vec!["Ana", "García, López", "ana@x.es"]
    );
    assert_eq!(
        parse_csv_line(r#""Talleres ""El Puerto"" SL";B1;"#, ';'),
        vec!["Talleres \"El Puerto\" SL", "B1", ""]
    );
    assert_eq!(parse_csv_line("", ','), vec![""]);
}

#[test]
fn delimiter_detection_prefers_semicolon_only_when_dominant() {
    assert_eq!(detect_delimiter("nombre;cif;sector"), ';');
    assert_eq!(detect_delimiter("nombre,cif,sector"), ',');
    assert_eq!(detect_delimiter("\"Pérez, Hijos\";B1;x"), ';');
    assert_eq!(detect_delimiter("solo"), ',');
}

#[test]
fn decimals_follow_the_last_separator() {
    assert_eq!(parse_decimal("2.500,75"), Some(2500.75));
    assert_eq!(parse_decimal("1,500.5"), Some(1500.5));
    assert_eq!(parse_decimal("1500,5"), Some(1500.5));
    assert_eq!(parse_decimal("1.500.000,25"), Some(1_500_000.25));
    assert_eq!(parse_decimal(" 1 500 000 "), Some(1_500_000.0));
    assert_eq!(parse_decimal("1500"), Some(1500.0));

    // Un separador repetido no dice cuál es el decimal
    assert_eq!(parse_decimal("1.500.000"), None);
    assert_eq!(parse_decimal("1,500,000"), None);
    assert_eq!(parse_decimal("NaN"), None);
    assert_eq!(parse_decimal("inf"), None);
}

#[actix_rt::test]
async fn empresas_import_reads_spanish_thousands() {
    let (crm, _sync, import) = setup().await;
    let csv = "Alfa SL;B1;;;;;2.500,75;10\n\
               Beta SL;B2;;;;;1.500.000;\n";

    let report = import
        .import(ImportEntity::Empresas, csv, false)
        .await
        .expect("importación");
    assert_eq!(report.imported, 1);
    assert_eq!(
        report.errors,
        vec![ImportRowError {
            line: 2,
            message: "facturación no numérica: 1.500.000".to_string(),
        }]
    );

    let empresas = crm.list_empresas(&ListFilter::default()).await.expect("empresas");
    assert_eq!(empresas.len(), 1);
    assert_eq!(empresas[0].nombre, "Alfa SL");
    assert_eq!(empresas[0].facturacion, Some(2500.75));
}

#[actix_rt::test]
async fn contactos_import_reports_rows_and_dedups() {
    let (crm, sync, import) = setup().await;
    seed_contacto(&crm, "Carla", Some("carla@existente.es"), None).await;

    let csv = "\u{feff}nombre;apellidos;email;telefono;cargo;empresa\n\
               Ana;García;ANA@alfa.es;600111222;CEO;Alfa SL\n\
               Bruno;;bruno@beta;;;\n\
               ;Sin nombre;x@y.es;;;\n\
               Ana;García;ana@alfa.es;;;\n\
               Carla;Ruiz;carla@existente.es;;;\n\
               \n\
               \"Pérez; Hijos\";;;;;\n";

    let report = import
        .import(ImportEntity::Contactos, csv, false)
        .await
        .expect("importación");

    assert_eq!(report.total_rows, 6);
    assert_eq!(report.imported, 2);
    assert_eq!(report.skipped, 2);
    assert_eq!(
        report.errors.iter().map(|e| e.line).collect::<Vec<_>>(),
        vec![3, 4]
    );
    assert!(report.errors[0].message.contains("bruno@beta"));
    assert!(!report.dry_run);

    let ana = crm
        .list_contactos(&ListFilter {
            q: Some("ana@alfa.es".to_string()),
            ..ListFilter::default()
        })
        .await
        .expect("buscar");
    assert_eq!(ana.len(), 1);
    let empresa_id = ana[0].empresa_id.clone().expect("empresa asignada");
    assert_eq!(crm.get_empresa(&empresa_id).await.expect("empresa").nombre, "Alfa SL");

    let quoted = crm
        .list_contactos(&ListFilter {
            q: Some("Pérez; Hijos".to_string()),
            ..ListFilter::default()
        })
        .await
        .expect("buscar");
    assert_eq!(quoted.len(), 1);

    // Dos contactos y la empresa creada al vuelo
    let pending = sync
        .list(Some(QueueStatus::Pending), 50, 0)
        .await
        .expect("cola");
    assert_eq!(pending.len(), 3);
}

#[actix_rt::test]
async fn contacto_reuses_existing_empresa_by_name() {
    let (crm, _sync, import) = setup().await;
    let empresa_id = seed_empresa(&crm, "Conservas del Sur", None).await;

    let report = import
        .import(
            ImportEntity::Contactos,
            "Lucía,Ferrer,lucia@conservas.es,,,conservas del sur",
            false,
        )
        .await
        .expect("importación");
    assert_eq!(report.imported, 1);

    let empresas = crm.list_empresas(&ListFilter::default()).await.expect("empresas");
    assert_eq!(empresas.len(), 1);
    let contactos = crm.list_contactos(&ListFilter::default()).await.expect("contactos");
    assert_eq!(contactos[0].empresa_id.as_deref(), Some(empresa_id.as_str()));
}

#[actix_rt::test]
async fn dry_run_validates_without_writing() {
    let (crm, sync, import) = setup().await;
    let csv = "nombre,cif,sector,ciudad,pais,web,facturacion,empleados\n\
               Metalúrgica Norte,b123,Industrial,Bilbao,España,,\"1500000,5\",40\n\
               Talleres Sur,,Automoción,Sevilla,España,,,\n";

    let report = import
        .import(ImportEntity::Empresas, csv, true)
        .await
        .expect("simulación");
    assert!(report.dry_run);
    assert_eq!(report.imported, 2);
    assert!(report.errors.is_empty());

    assert!(crm.list_empresas(&ListFilter::default()).await.expect("empresas").is_empty());
    assert_eq!(sync.stats().await.expect("stats").total, 0);
}

#[actix_rt::test]
async fn empresas_import_validates_numbers_and_dedups_by_cif() {
    let (crm, _sync, import) = setup().await;
    seed_empresa(&crm, "Nombre Distinto", Some("B99999999")).await;

    let csv = "Metalúrgica Norte;b12345678;Industrial;Bilbao;España;;1500000,5;40\n\
               Duplicada;b99999999;;;;;;\n\
               Mala facturación;;;;;;mucho;\n\
               Malos empleados;;;;;;;-3\n\
               Metalúrgica Norte;B12345678;;;;;;\n";

    let report = import
        .import(ImportEntity::Empresas, csv, false)
        .await
        .expect("importación");
    assert_eq!(report.total_rows, 5);
    assert_eq!(report.imported, 1);
    assert_eq!(report.skipped, 2);
    assert_eq!(
        report.errors,
        vec![
            ImportRowError {
                line: 3,
                message: "facturación no numérica: mucho".to_string(),
            },
            ImportRowError {
                line: 4,
                message: "número de empleados inválido: -3".to_string(),
            },
        ]
    );

    let empresas = crm
        .list_empresas(&ListFilter {
            q: Some("Metalúrgica".to_string()),
            ..ListFilter::default()
        })
        .await
        .expect("empresas");
    assert_eq!(empresas.len(), 1);
    assert_eq!(empresas[0].cif.as_deref(), Some("B12345678"));
    assert_eq!(empresas[0].facturacion, Some(1_500_000.5));
    assert_eq!(empresas[0].empleados, Some(40));
}

#[actix_rt::test]
async fn empty_file_is_rejected() {
    let (_crm, _sync, import) = setup().await;
    let result = import.import(ImportEntity::Contactos, "\u{feff}\n  \n", false).await;
    assert!(matches!(result, Err(ApiError::BadRequest(_))));
}
