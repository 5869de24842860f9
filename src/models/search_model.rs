//! models/search_model.rs

use serde::{Deserialize, Serialize};

use crate::models::crm_model::{Contacto, Empresa, Mandato};

#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub mandatos: Vec<Mandato>,
    pub contactos: Vec<Contacto>,
    pub empresas: Vec<Empresa>,
    pub total: usize,
}
