//! models/pdf_model.rs
//! Parámetros de renderizado HTML -> PDF (wkhtmltopdf).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PdfMargins {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum PdfPagePreset {
    #[default]
    A4,
    Letter,
    Legal,
    A3,
}

#[derive(Debug, Clone)]
pub struct PdfRequest {
    pub file_name: String,
    /// HTML que vamos a renderizar.
    pub html: String,
    pub page_size: PdfPagePreset,
    pub margins: PdfMargins,
    /// Guarda una copia en disco además de devolver los bytes.
    pub store_local: bool,
}

/// Resultado de `PdfService::generate_pdf`.
#[derive(Debug, Clone)]
pub struct PdfOutput {
    pub bytes: Vec<u8>,
    /// Nombre del fichero guardado en disco, si se pidió guardarlo.
    pub stored_as: Option<String>,
}
