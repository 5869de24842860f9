//! services/search_service.rs
//! Búsqueda global: mandatos, contactos y empresas en paralelo.

use crate::models::crm_model::ListFilter;
use crate::models::error_model::ApiResult;
use crate::models::search_model::{SearchQuery, SearchResults};
use crate::services::crm_service::CrmService;

pub const MIN_QUERY_LEN: usize = 2;
const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 50;

#[derive(Clone, Debug)]
pub struct SearchService {
    crm: CrmService,
}

impl SearchService {
    pub fn new(crm: CrmService) -> Self {
        Self { crm }
    }

    pub async fn search(&self, query: &SearchQuery) -> ApiResult<SearchResults> {
        let q = query.q.trim();
        if q.chars().count() < MIN_QUERY_LEN {
            return Ok(SearchResults::default());
        }

        let filter = ListFilter {
            q: Some(q.to_string()),
            limit: Some(query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)),
            ..ListFilter::default()
        };

        let (mandatos, contactos, empresas) = tokio::try_join!(
            self.crm.list_mandatos(&filter),
            self.crm.list_contactos(&filter),
            self.crm.list_empresas(&filter),
        )?;

        let total = mandatos.len() + contactos.len() + empresas.len();
        log::debug!("(search) '{}' -> {} resultados", q, total);
        Ok(SearchResults {
            mandatos,
            contactos,
            empresas,
            total,
        })
    }
}
