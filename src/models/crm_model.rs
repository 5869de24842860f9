//! models/crm_model.rs
//! Empresas, contactos y mandatos (deals de M&A).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Empresa {
    pub id: String,
    pub nombre: String,
    pub cif: Option<String>,
    pub sector: Option<String>,
    pub ciudad: Option<String>,
    pub pais: Option<String>,
    pub web: Option<String>,
    pub facturacion: Option<f64>,
    pub empleados: Option<i64>,
    pub notas: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmpresaInput {
    pub nombre: Option<String>,
    pub cif: Option<String>,
    pub sector: Option<String>,
    pub ciudad: Option<String>,
    pub pais: Option<String>,
    pub web: Option<String>,
    pub facturacion: Option<f64>,
    pub empleados: Option<i64>,
    pub notas: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Contacto {
    pub id: String,
    pub nombre: String,
    pub apellidos: Option<String>,
    pub email: Option<String>,
    pub telefono: Option<String>,
    pub cargo: Option<String>,
    pub empresa_id: Option<String>,
    pub notas: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Contacto {
    pub fn nombre_completo(&self) -> String {
        match self.apellidos.as_deref() {
            Some(a) if !a.trim().is_empty() => format!("{} {}", self.nombre, a),
            _ => self.nombre.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactoInput {
    pub nombre: Option<String>,
    pub apellidos: Option<String>,
    pub email: Option<String>,
    pub telefono: Option<String>,
    pub cargo: Option<String>,
    pub empresa_id: Option<String>,
    pub notas: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum MandatoTipo {
    /// Buy-side
    Compra,
    /// Sell-side
    Venta,
}

impl MandatoTipo {
    pub fn as_str(&self) -> &'static str {
        match self {
            MandatoTipo::Compra => "compra",
            MandatoTipo::Venta => "venta",
        }
    }
}

/// Columnas del tablero Kanban, en orden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PipelineStage {
    Prospeccion,
    Teaser,
    Nda,
    Cim,
    Ofertas,
    DueDiligence,
    Cierre,
    Ganado,
    Perdido,
}

impl PipelineStage {
    pub const ORDERED: [PipelineStage; 9] = [
        PipelineStage::Prospeccion,
        PipelineStage::Teaser,
        PipelineStage::Nda,
        PipelineStage::Cim,
        PipelineStage::Ofertas,
        PipelineStage::DueDiligence,
        PipelineStage::Cierre,
        PipelineStage::Ganado,
        PipelineStage::Perdido,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Prospeccion => "prospeccion",
            PipelineStage::Teaser => "teaser",
            PipelineStage::Nda => "nda",
            PipelineStage::Cim => "cim",
            PipelineStage::Ofertas => "ofertas",
            PipelineStage::DueDiligence => "due_diligence",
            PipelineStage::Cierre => "cierre",
            PipelineStage::Ganado => "ganado",
            PipelineStage::Perdido => "perdido",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PipelineStage::Prospeccion => "Prospección",
            PipelineStage::Teaser => "Teaser enviado",
            PipelineStage::Nda => "NDA firmado",
            PipelineStage::Cim => "CIM / Cuaderno de venta",
            PipelineStage::Ofertas => "Ofertas / LOI",
            PipelineStage::DueDiligence => "Due diligence",
            PipelineStage::Cierre => "Cierre",
            PipelineStage::Ganado => "Ganado",
            PipelineStage::Perdido => "Perdido",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Mandato {
    pub id: String,
    pub nombre: String,
    pub tipo: MandatoTipo,
    pub estado: PipelineStage,
    pub empresa_id: Option<String>,
    pub valor_estimado: Option<f64>,
    pub responsable: Option<String>,
    pub descripcion: Option<String>,
    pub fecha_inicio: Option<String>,
    pub fecha_cierre_prevista: Option<String>,
    pub estado_actualizado_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MandatoInput {
    pub nombre: Option<String>,
    pub tipo: Option<MandatoTipo>,
    pub estado: Option<PipelineStage>,
    pub empresa_id: Option<String>,
    pub valor_estimado: Option<f64>,
    pub responsable: Option<String>,
    pub descripcion: Option<String>,
    pub fecha_inicio: Option<NaiveDate>,
    pub fecha_cierre_prevista: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoveStageRequest {
    pub estado: PipelineStage,
}

/// Filtros comunes de listado (`?q=&limit=&offset=` más los propios de cada entidad).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListFilter {
    pub q: Option<String>,
    pub estado: Option<PipelineStage>,
    pub tipo: Option<MandatoTipo>,
    pub empresa_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListFilter {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 500;

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    pub fn like_pattern(&self) -> Option<String> {
        self.q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(like_pattern)
    }
}

/// `%texto%` con los comodines de LIKE escapados (se usa `ESCAPE '\'`).
pub fn like_pattern(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len() + 2);
    escaped.push('%');
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineColumn {
    pub estado: PipelineStage,
    pub titulo: &'static str,
    pub total_valor: f64,
    pub mandatos: Vec<Mandato>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarQuery {
    pub desde: NaiveDate,
    pub hasta: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarEventKind {
    Tarea,
    CierreMandato,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarEvent {
    pub fecha: NaiveDate,
    pub tipo: CalendarEventKind,
    pub titulo: String,
    pub referencia_id: String,
    pub mandato_id: Option<String>,
}
