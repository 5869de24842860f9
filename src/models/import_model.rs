//! models/import_model.rs
//! Importación de contactos y empresas desde CSV.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportEntity {
    Contactos,
    Empresas,
}

impl ImportEntity {
    /// Orden fijo de columnas esperado en el fichero.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            ImportEntity::Contactos => &["nombre", "apellidos", "email", "telefono", "cargo", "empresa"],
            ImportEntity::Empresas => &[
                "nombre",
                "cif",
                "sector",
                "ciudad",
                "pais",
                "web",
                "facturacion",
                "empleados",
            ],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportQuery {
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImportRowError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub total_rows: usize,
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<ImportRowError>,
    pub dry_run: bool,
}
