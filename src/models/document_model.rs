//! models/document_model.rs
//! Documentos legales del proceso de venta (NDA, LOI, teaser).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Nda,
    Loi,
    Teaser,
}

impl DocumentKind {
    pub fn default_file_name(&self) -> &'static str {
        match self {
            DocumentKind::Nda => "acuerdo_confidencialidad.pdf",
            DocumentKind::Loi => "carta_de_intenciones.pdf",
            DocumentKind::Teaser => "teaser.pdf",
        }
    }
}

/// Acuerdo de confidencialidad.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NdaFields {
    pub parte_reveladora: String,
    pub cif_reveladora: String,
    pub parte_receptora: String,
    pub cif_receptora: String,
    pub proyecto: String,
    pub ciudad: String,
    pub fecha: String,
    #[serde(default = "default_nda_months")]
    pub duracion_meses: u32,
    #[serde(default = "default_jurisdiccion")]
    pub jurisdiccion: String,
}

fn default_nda_months() -> u32 {
    24
}

fn default_jurisdiccion() -> String {
    "Madrid".to_string()
}

/// Carta de intenciones (oferta no vinculante).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoiFields {
    pub comprador: String,
    pub vendedor: String,
    pub empresa_objetivo: String,
    pub precio: String,
    pub forma_pago: String,
    #[serde(default = "default_exclusividad")]
    pub exclusividad_dias: u32,
    pub ciudad: String,
    pub fecha: String,
    #[serde(default)]
    pub condiciones: String,
}

fn default_exclusividad() -> u32 {
    60
}

/// Teaser anónimo: no nombra a la compañía.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeaserFields {
    pub codigo_proyecto: String,
    pub sector: String,
    pub ubicacion: String,
    pub descripcion: String,
    pub facturacion: String,
    pub ebitda: String,
    pub empleados: String,
    pub motivo_operacion: String,
    #[serde(default)]
    pub contacto_asesor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tipo", content = "campos", rename_all = "lowercase")]
pub enum DocumentFields {
    Nda(NdaFields),
    Loi(LoiFields),
    Teaser(TeaserFields),
}

impl DocumentFields {
    pub fn kind(&self) -> DocumentKind {
        match self {
            DocumentFields::Nda(_) => DocumentKind::Nda,
            DocumentFields::Loi(_) => DocumentKind::Loi,
            DocumentFields::Teaser(_) => DocumentKind::Teaser,
        }
    }

    /// Pares campo/valor para interpolar en la plantilla.
    pub fn values(&self) -> Vec<(&'static str, String)> {
        match self {
            DocumentFields::Nda(f) => vec![
                ("parte_reveladora", f.parte_reveladora.clone()),
                ("cif_reveladora", f.cif_reveladora.clone()),
                ("parte_receptora", f.parte_receptora.clone()),
                ("cif_receptora", f.cif_receptora.clone()),
                ("proyecto", f.proyecto.clone()),
                ("ciudad", f.ciudad.clone()),
                ("fecha", f.fecha.clone()),
                ("duracion_meses", f.duracion_meses.to_string()),
                ("jurisdiccion", f.jurisdiccion.clone()),
            ],
            DocumentFields::Loi(f) => vec![
                ("comprador", f.comprador.clone()),
                ("vendedor", f.vendedor.clone()),
                ("empresa_objetivo", f.empresa_objetivo.clone()),
                ("precio", f.precio.clone()),
                ("forma_pago", f.forma_pago.clone()),
                ("exclusividad_dias", f.exclusividad_dias.to_string()),
                ("ciudad", f.ciudad.clone()),
                ("fecha", f.fecha.clone()),
                ("condiciones", f.condiciones.clone()),
            ],
            DocumentFields::Teaser(f) => vec![
                ("codigo_proyecto", f.codigo_proyecto.clone()),
                ("sector", f.sector.clone()),
                ("ubicacion", f.ubicacion.clone()),
                ("descripcion", f.descripcion.clone()),
                ("facturacion", f.facturacion.clone()),
                ("ebitda", f.ebitda.clone()),
                ("empleados", f.empleados.clone()),
                ("motivo_operacion", f.motivo_operacion.clone()),
                ("contacto_asesor", f.contacto_asesor.clone()),
            ],
        }
    }
}

/// POST /api/documents y /api/documents/preview
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentRequest {
    pub documento: DocumentFields,
    pub file_name: Option<String>,
    pub mandato_id: Option<String>,
    #[serde(default)]
    pub store_local: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentPreview {
    pub kind: DocumentKind,
    pub pages: usize,
    pub html: String,
}

/// PDF generado. Solo los metadatos se serializan (registro de operaciones).
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedDocument {
    pub kind: DocumentKind,
    pub file_name: String,
    pub pages: usize,
    pub size_bytes: usize,
    pub stored_as: Option<String>,
    pub mandato_id: Option<String>,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}
