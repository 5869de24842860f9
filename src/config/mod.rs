//! config/mod.rs
//! Configuración de la aplicación (entorno + valores por defecto).

pub mod app_config;
pub mod document_config;
