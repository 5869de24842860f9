//! services/import_service.rs
//! Importación de contactos y empresas desde CSV con columnas en orden fijo.

use std::collections::HashSet;

use crate::models::crm_model::{ContactoInput, EmpresaInput};
use crate::models::error_model::{ApiError, ApiResult};
use crate::models::import_model::{ImportEntity, ImportReport, ImportRowError};
use crate::models::sync_model::{SyncAction, SyncEntityType};
use crate::services::crm_service::CrmService;
use crate::services::sync_queue_service::SyncQueueService;

/// Divide una línea respetando comillas dobles; `""` dentro de un campo
/// entrecomillado es una comilla literal.
pub fn parse_csv_line(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else if c == '"' {
            in_quotes = true;
        } else if c == delimiter {
            fields.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(c);
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// `;` si la primera línea tiene más puntos y coma que comas (Excel en
/// configuración regional española), `,` en otro caso.
pub fn detect_delimiter(first_line: &str) -> char {
    let commas = first_line.matches(',').count();
    let semicolons = first_line.matches(';').count();
    if semicolons > commas {
        ';'
    } else {
        ','
    }
}

fn is_header(fields: &[String], entity: ImportEntity) -> bool {
    let expected = entity.columns();
    fields.len() >= 2
        && fields
            .iter()
            .zip(expected.iter())
            .take(2)
            .all(|(got, want)| got.trim().eq_ignore_ascii_case(want))
}

fn field(fields: &[String], index: usize) -> Option<String> {
    fields
        .get(index)
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
}

fn valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Acepta `1500000`, `1500000.5`, `1500000,5` y cifras con separador de
/// miles (`2.500,75`, `1,500.5`). Si aparecen los dos separadores el último
/// es el decimal. Un mismo separador repetido sin el otro (`1.500.000`) es
/// ambiguo y se rechaza.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let (decimal, thousands) = match (compact.rfind(','), compact.rfind('.')) {
        (Some(comma), Some(dot)) if comma < dot => ('.', ','),
        (Some(_), _) => (',', '.'),
        _ => ('.', ','),
    };
    if compact.matches(decimal).count() > 1 {
        return None;
    }
    let normalized: String = compact
        .chars()
        .filter(|c| *c != thousands)
        .map(|c| if c == decimal { '.' } else { c })
        .collect();
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Fila ya validada, lista para insertar.
enum ImportRow {
    Contacto {
        input: ContactoInput,
        empresa: Option<String>,
    },
    Empresa(EmpresaInput),
}

fn validate_contacto(fields: &[String]) -> Result<ImportRow, String> {
    let nombre = field(fields, 0).ok_or("el nombre es obligatorio")?;
    let email = field(fields, 2).map(|e| e.to_lowercase());
    if let Some(email) = &email {
        if !valid_email(email) {
            return Err(format!("email inválido: {email}"));
        }
    }
    Ok(ImportRow::Contacto {
        input: ContactoInput {
            nombre: Some(nombre),
            apellidos: field(fields, 1),
            email,
            telefono: field(fields, 3),
            cargo: field(fields, 4),
            ..ContactoInput::default()
        },
        empresa: field(fields, 5),
    })
}

fn validate_empresa(fields: &[String]) -> Result<ImportRow, String> {
    let nombre = field(fields, 0).ok_or("el nombre es obligatorio")?;
    let facturacion = match field(fields, 6) {
        Some(raw) => Some(parse_decimal(&raw).ok_or(format!("facturación no numérica: {raw}"))?),
        None => None,
    };
    let empleados = match field(fields, 7) {
        Some(raw) => Some(
            raw.parse::<i64>()
                .ok()
                .filter(|n| *n >= 0)
                .ok_or(format!("número de empleados inválido: {raw}"))?,
        ),
        None => None,
    };
    Ok(ImportRow::Empresa(EmpresaInput {
        nombre: Some(nombre),
        cif: field(fields, 1).map(|c| c.to_uppercase()),
        sector: field(fields, 2),
        ciudad: field(fields, 3),
        pais: field(fields, 4),
        web: field(fields, 5),
        facturacion,
        empleados,
        notas: None,
    }))
}

/// Clave de deduplicación dentro del propio fichero.
fn row_key(row: &ImportRow) -> String {
    match row {
        ImportRow::Contacto { input, .. } => match &input.email {
            Some(email) => format!("email:{email}"),
            None => format!(
                "nombre:{} {}",
                input.nombre.as_deref().unwrap_or_default().to_lowercase(),
                input.apellidos.as_deref().unwrap_or_default().to_lowercase()
            ),
        },
        ImportRow::Empresa(input) => match &input.cif {
            Some(cif) => format!("cif:{cif}"),
            None => format!(
                "nombre:{}",
                input.nombre.as_deref().unwrap_or_default().to_lowercase()
            ),
        },
    }
}

#[derive(Clone)]
pub struct ImportService {
    crm: CrmService,
    sync: SyncQueueService,
}

impl ImportService {
    pub fn new(crm: CrmService, sync: SyncQueueService) -> Self {
        Self { crm, sync }
    }

    pub async fn import(
        &self,
        entity: ImportEntity,
        csv: &str,
        dry_run: bool,
    ) -> ApiResult<ImportReport> {
        let csv = csv.trim_start_matches('\u{feff}');
        let first_line = csv
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("el fichero CSV está vacío".to_string()))?;
        let delimiter = detect_delimiter(first_line);

        let mut report = ImportReport {
            dry_run,
            ..ImportReport::default()
        };
        let mut seen = HashSet::new();
        let mut header_checked = false;

        for (idx, line) in csv.lines().enumerate() {
            let line_no = idx + 1;
            if line.trim().is_empty() {
                continue;
            }
            let fields = parse_csv_line(line, delimiter);
            if !header_checked {
                header_checked = true;
                if is_header(&fields, entity) {
                    continue;
                }
            }

            report.total_rows += 1;
            let validated = match entity {
                ImportEntity::Contactos => validate_contacto(&fields),
                ImportEntity::Empresas => validate_empresa(&fields),
            };
            let row = match validated {
                Ok(row) => row,
                Err(message) => {
                    report.errors.push(ImportRowError {
                        line: line_no,
                        message,
                    });
                    continue;
                }
            };

            if !seen.insert(row_key(&row)) {
                report.skipped += 1;
                continue;
            }

            match self.import_row(row, dry_run).await {
                Ok(true) => report.imported += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => report.errors.push(ImportRowError {
                    line: line_no,
                    message: e.to_string(),
                }),
            }
        }

        log::info!(
            "(import) {:?}: {} filas, {} importadas, {} omitidas, {} errores{}",
            entity,
            report.total_rows,
            report.imported,
            report.skipped,
            report.errors.len(),
            if dry_run { " (simulación)" } else { "" }
        );
        Ok(report)
    }

    /// Devuelve `false` si la fila ya existía y se ha omitido.
    async fn import_row(&self, row: ImportRow, dry_run: bool) -> ApiResult<bool> {
        match row {
            ImportRow::Empresa(input) => {
                let nombre = input.nombre.clone().unwrap_or_default();
                if self
                    .crm
                    .find_empresa_duplicate(&nombre, input.cif.as_deref())
                    .await?
                    .is_some()
                {
                    return Ok(false);
                }
                if !dry_run {
                    let empresa = self.crm.create_empresa(input).await?;
                    self.sync
                        .enqueue_quietly(SyncEntityType::Empresa, &empresa.id, SyncAction::Upsert, None)
                        .await;
                }
                Ok(true)
            }
            ImportRow::Contacto { mut input, empresa } => {
                let nombre = input.nombre.clone().unwrap_or_default();
                if self
                    .crm
                    .find_contacto_duplicate(input.email.as_deref(), &nombre, input.apellidos.as_deref())
                    .await?
                    .is_some()
                {
                    return Ok(false);
                }
                if dry_run {
                    return Ok(true);
                }
                if let Some(empresa_nombre) = empresa {
                    input.empresa_id = Some(self.resolve_empresa(&empresa_nombre).await?);
                }
                let contacto = self.crm.create_contacto(input).await?;
                self.sync
                    .enqueue_quietly(SyncEntityType::Contacto, &contacto.id, SyncAction::Upsert, None)
                    .await;
                Ok(true)
            }
        }
    }

    /// Id de la empresa con ese nombre; si no existe se crea.
    async fn resolve_empresa(&self, nombre: &str) -> ApiResult<String> {
        if let Some(empresa) = self.crm.find_empresa_duplicate(nombre, None).await? {
            return Ok(empresa.id);
        }
        let empresa = self
            .crm
            .create_empresa(EmpresaInput {
                nombre: Some(nombre.to_string()),
                ..EmpresaInput::default()
            })
            .await?;
        log::info!("(import) Empresa '{}' creada desde contacto", nombre);
        self.sync
            .enqueue_quietly(SyncEntityType::Empresa, &empresa.id, SyncAction::Upsert, None)
            .await;
        Ok(empresa.id)
    }
}
