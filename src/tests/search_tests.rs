//! tests/search_tests.rs

use crate::models::search_model::SearchQuery;
use crate::services::crm_service::CrmService;
use crate::services::search_service::SearchService;
use crate::tests::support::{seed_contacto, seed_empresa, seed_mandato, test_pool};

fn query(q: &str) -> SearchQuery {
    SearchQuery {
        q: q.to_string(),
        limit: None,
    }
}

#[actix_rt::test]
async fn short_queries_return_nothing() {
    let crm = CrmService::new(test_pool().await);
    seed_empresa(&crm, "A", None).await;
    let search = SearchService::new(crm);

    let results = search.search(&query(" a ")).await.expect("búsqueda");
    assert_eq!(results.total, 0);
    assert!(results.empresas.is_empty());
}

#[actix_rt::test]
async fn searches_the_three_entities() {
    let crm = CrmService::new(test_pool().await);
    let empresa = seed_empresa(&crm, "Atlas Industrial SL", None).await;
    seed_empresa(&crm, "Boreal Foods", None).await;
    seed_contacto(&crm, "Marta", Some("marta@atlas.es"), Some(&empresa)).await;
    seed_contacto(&crm, "Pedro", Some("pedro@boreal.es"), None).await;
    seed_mandato(&crm, "Proyecto Atlas", Some(5_000_000.0)).await;
    let search = SearchService::new(crm);

    let results = search.search(&query("atlas")).await.expect("búsqueda");
    assert_eq!(results.empresas.len(), 1);
    assert_eq!(results.contactos.len(), 1);
    assert_eq!(results.contactos[0].nombre, "Marta");
    assert_eq!(results.mandatos.len(), 1);
    assert_eq!(results.total, 3);
}

#[actix_rt::test]
async fn limit_applies_per_entity() {
    let crm = CrmService::new(test_pool().await);
    for i in 0..4 {
        seed_empresa(&crm, &format!("Grupo Norte {i}"), None).await;
    }
    let search = SearchService::new(crm);

    let results = search
        .search(&SearchQuery {
            q: "norte".to_string(),
            limit: Some(2),
        })
        .await
        .expect("búsqueda");
    assert_eq!(results.empresas.len(), 2);
    assert_eq!(results.total, 2);
}

#[actix_rt::test]
async fn wildcards_are_matched_literally() {
    let crm = CrmService::new(test_pool().await);
    seed_empresa(&crm, "Descuentos 100% SA", None).await;
    seed_empresa(&crm, "Distribuciones 1000 SL", None).await;
    let search = SearchService::new(crm);

    let results = search.search(&query("100%")).await.expect("búsqueda");
    assert_eq!(results.empresas.len(), 1);
    assert_eq!(results.empresas[0].nombre, "Descuentos 100% SA");

    let underscore = search.search(&query("1_0")).await.expect("búsqueda");
    assert_eq!(underscore.total, 0);
}
