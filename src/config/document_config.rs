//! config/document_config.rs
//! Maquetación por defecto de los documentos legales generados.

use serde::{Deserialize, Serialize};

use crate::models::pdf_model::{PdfMargins, PdfPagePreset};

/// Dimensiones de la página "lógica" con la que se pagina el texto antes
/// de mandarlo a wkhtmltopdf. Los valores por defecto corresponden a A4
/// con cuerpo de 11pt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentLayout {
    pub chars_per_line: usize,
    pub lines_per_page: usize,
    /// Líneas que ocupa un título (incluido el espacio posterior).
    pub heading_lines: usize,
    /// Líneas en blanco entre párrafos.
    pub paragraph_spacing: usize,
    pub page_preset: PdfPagePreset,
    pub margins: PdfMargins,
}

impl Default for DocumentLayout {
    fn default() -> Self {
        DocumentLayout {
            chars_per_line: 90,
            lines_per_page: 48,
            heading_lines: 2,
            paragraph_spacing: 1,
            page_preset: PdfPagePreset::A4,
            margins: PdfMargins {
                top: 20.0,
                bottom: 20.0,
                left: 25.0,
                right: 25.0,
            },
        }
    }
}
