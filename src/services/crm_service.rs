//! services/crm_service.rs
//! Directorio de empresas y contactos, mandatos, tablero del pipeline y calendario.

use chrono::NaiveDate;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::models::crm_model::{
    CalendarEvent, CalendarEventKind, CalendarQuery, Contacto, ContactoInput, Empresa,
    EmpresaInput, ListFilter, Mandato, MandatoInput, PipelineColumn, PipelineStage,
};
use crate::models::error_model::{ApiError, ApiResult, DbResultExt};
use crate::models::now_timestamp;

pub(crate) const EMPRESA_COLUMNS: &str = "id, nombre, cif, sector, ciudad, pais, web, facturacion, \
                                          empleados, notas, created_at, updated_at";
pub(crate) const CONTACTO_COLUMNS: &str =
    "id, nombre, apellidos, email, telefono, cargo, empresa_id, notas, created_at, updated_at";
pub(crate) const MANDATO_COLUMNS: &str = "id, nombre, tipo, estado, empresa_id, valor_estimado, \
                                          responsable, descripcion, fecha_inicio, \
                                          fecha_cierre_prevista, estado_actualizado_at, \
                                          created_at, updated_at";

/// Normaliza texto opcional: recorta y convierte vacío en `None`.
fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, field: &str) -> ApiResult<String> {
    clean(value).ok_or_else(|| ApiError::BadRequest(format!("el campo '{field}' es obligatorio")))
}

#[derive(Clone, Debug)]
pub struct CrmService {
    db_pool: Pool<Sqlite>,
}

impl CrmService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        Self { db_pool }
    }

    // ------------------------------------------------------------------
    // Empresas
    // ------------------------------------------------------------------

    pub async fn create_empresa(&self, input: EmpresaInput) -> ApiResult<Empresa> {
        let nombre = required(input.nombre, "nombre")?;
        let id = Uuid::new_v4().to_string();
        let now = now_timestamp();

        sqlx::query(
            r#"
            INSERT INTO empresas (
                id, nombre, cif, sector, ciudad, pais, web, facturacion,
                empleados, notas, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
            "#,
        )
        .bind(&id)
        .bind(&nombre)
        .bind(clean(input.cif).map(|c| c.to_uppercase()))
        .bind(clean(input.sector))
        .bind(clean(input.ciudad))
        .bind(clean(input.pais))
        .bind(clean(input.web))
        .bind(input.facturacion)
        .bind(input.empleados)
        .bind(clean(input.notas))
        .bind(&now)
        .execute(&self.db_pool)
        .await
        .db_context("insert", "empresas")?;

        self.get_empresa(&id).await
    }

    pub async fn get_empresa(&self, id: &str) -> ApiResult<Empresa> {
        self.find_empresa(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("empresa {id}")))
    }

    pub async fn find_empresa(&self, id: &str) -> ApiResult<Option<Empresa>> {
        let sql = format!("SELECT {EMPRESA_COLUMNS} FROM empresas WHERE id = ?1");
        Ok(sqlx::query_as::<_, Empresa>(&sql)
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await
            .db_context("select", "empresas")?)
    }

    pub async fn list_empresas(&self, filter: &ListFilter) -> ApiResult<Vec<Empresa>> {
        let sql = format!(
            r#"
            SELECT {EMPRESA_COLUMNS} FROM empresas
            WHERE (?1 IS NULL
                   OR nombre LIKE ?1 ESCAPE '\'
                   OR cif LIKE ?1 ESCAPE '\'
                   OR sector LIKE ?1 ESCAPE '\'
                   OR ciudad LIKE ?1 ESCAPE '\')
            ORDER BY nombre COLLATE NOCASE
            LIMIT ?2 OFFSET ?3
            "#
        );
        Ok(sqlx::query_as::<_, Empresa>(&sql)
            .bind(filter.like_pattern())
            .bind(filter.limit())
            .bind(filter.offset())
            .fetch_all(&self.db_pool)
            .await
            .db_context("list", "empresas")?)
    }

    pub async fn update_empresa(&self, id: &str, input: EmpresaInput) -> ApiResult<Empresa> {
        let result = sqlx::query(
            r#"
            UPDATE empresas SET
                nombre = COALESCE(?2, nombre),
                cif = COALESCE(?3, cif),
                sector = COALESCE(?4, sector),
                ciudad = COALESCE(?5, ciudad),
                pais = COALESCE(?6, pais),
                web = COALESCE(?7, web),
                facturacion = COALESCE(?8, facturacion),
                empleados = COALESCE(?9, empleados),
                notas = COALESCE(?10, notas),
                updated_at = ?11
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(clean(input.nombre))
        .bind(clean(input.cif).map(|c| c.to_uppercase()))
        .bind(clean(input.sector))
        .bind(clean(input.ciudad))
        .bind(clean(input.pais))
        .bind(clean(input.web))
        .bind(input.facturacion)
        .bind(input.empleados)
        .bind(clean(input.notas))
        .bind(now_timestamp())
        .execute(&self.db_pool)
        .await
        .db_context("update", "empresas")?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!("empresa {id}")));
        }
        self.get_empresa(id).await
    }

    pub async fn delete_empresa(&self, id: &str) -> ApiResult<()> {
        self.delete_from("empresas", id).await
    }

    /// Búsqueda para deduplicar: por CIF si lo hay, si no por nombre exacto
    /// (sin distinguir mayúsculas).
    pub async fn find_empresa_duplicate(
        &self,
        nombre: &str,
        cif: Option<&str>,
    ) -> ApiResult<Option<Empresa>> {
        if let Some(cif) = cif.map(str::trim).filter(|c| !c.is_empty()) {
            let sql = format!("SELECT {EMPRESA_COLUMNS} FROM empresas WHERE UPPER(cif) = UPPER(?1) LIMIT 1");
            let by_cif = sqlx::query_as::<_, Empresa>(&sql)
                .bind(cif)
                .fetch_optional(&self.db_pool)
                .await
                .db_context("dedup", "empresas")?;
            if by_cif.is_some() {
                return Ok(by_cif);
            }
        }
        let sql = format!(
            "SELECT {EMPRESA_COLUMNS} FROM empresas WHERE nombre = ?1 COLLATE NOCASE LIMIT 1"
        );
        Ok(sqlx::query_as::<_, Empresa>(&sql)
            .bind(nombre.trim())
            .fetch_optional(&self.db_pool)
            .await
            .db_context("dedup", "empresas")?)
    }

    // ------------------------------------------------------------------
    // Contactos
    // ------------------------------------------------------------------

    async fn ensure_empresa_exists(&self, empresa_id: Option<&str>) -> ApiResult<()> {
        if let Some(empresa_id) = empresa_id {
            if self.find_empresa(empresa_id).await?.is_none() {
                return Err(ApiError::BadRequest(format!(
                    "la empresa {empresa_id} no existe"
                )));
            }
        }
        Ok(())
    }

    pub async fn create_contacto(&self, input: ContactoInput) -> ApiResult<Contacto> {
        let nombre = required(input.nombre, "nombre")?;
        let email = clean(input.email).map(|e| e.to_lowercase());
        if let Some(email) = &email {
            if !email.contains('@') {
                return Err(ApiError::BadRequest(format!("email inválido: {email}")));
            }
        }
        let empresa_id = clean(input.empresa_id);
        self.ensure_empresa_exists(empresa_id.as_deref()).await?;

        let id = Uuid::new_v4().to_string();
        let now = now_timestamp();
        sqlx::query(
            r#"
            INSERT INTO contactos (
                id, nombre, apellidos, email, telefono, cargo, empresa_id,
                notas, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            "#,
        )
        .bind(&id)
        .bind(&nombre)
        .bind(clean(input.apellidos))
        .bind(email)
        .bind(clean(input.telefono))
        .bind(clean(input.cargo))
        .bind(empresa_id)
        .bind(clean(input.notas))
        .bind(&now)
        .execute(&self.db_pool)
        .await
        .db_context("insert", "contactos")?;

        self.get_contacto(&id).await
    }

    pub async fn get_contacto(&self, id: &str) -> ApiResult<Contacto> {
        self.find_contacto(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("contacto {id}")))
    }

    pub async fn find_contacto(&self, id: &str) -> ApiResult<Option<Contacto>> {
        let sql = format!("SELECT {CONTACTO_COLUMNS} FROM contactos WHERE id = ?1");
        Ok(sqlx::query_as::<_, Contacto>(&sql)
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await
            .db_context("select", "contactos")?)
    }

    pub async fn list_contactos(&self, filter: &ListFilter) -> ApiResult<Vec<Contacto>> {
        let sql = format!(
            r#"
            SELECT {CONTACTO_COLUMNS} FROM contactos
            WHERE (?1 IS NULL
                   OR nombre LIKE ?1 ESCAPE '\'
                   OR apellidos LIKE ?1 ESCAPE '\'
                   OR email LIKE ?1 ESCAPE '\'
                   OR cargo LIKE ?1 ESCAPE '\')
              AND (?2 IS NULL OR empresa_id = ?2)
            ORDER BY nombre COLLATE NOCASE, apellidos COLLATE NOCASE
            LIMIT ?3 OFFSET ?4
            "#
        );
        Ok(sqlx::query_as::<_, Contacto>(&sql)
            .bind(filter.like_pattern())
            .bind(filter.empresa_id.as_deref())
            .bind(filter.limit())
            .bind(filter.offset())
            .fetch_all(&self.db_pool)
            .await
            .db_context("list", "contactos")?)
    }

    pub async fn update_contacto(&self, id: &str, input: ContactoInput) -> ApiResult<Contacto> {
        let empresa_id = clean(input.empresa_id);
        self.ensure_empresa_exists(empresa_id.as_deref()).await?;

        let result = sqlx::query(
            r#"
            UPDATE contactos SET
                nombre = COALESCE(?2, nombre),
                apellidos = COALESCE(?3, apellidos),
                email = COALESCE(?4, email),
                telefono = COALESCE(?5, telefono),
                cargo = COALESCE(?6, cargo),
                empresa_id = COALESCE(?7, empresa_id),
                notas = COALESCE(?8, notas),
                updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(clean(input.nombre))
        .bind(clean(input.apellidos))
        .bind(clean(input.email).map(|e| e.to_lowercase()))
        .bind(clean(input.telefono))
        .bind(clean(input.cargo))
        .bind(empresa_id)
        .bind(clean(input.notas))
        .bind(now_timestamp())
        .execute(&self.db_pool)
        .await
        .db_context("update", "contactos")?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!("contacto {id}")));
        }
        self.get_contacto(id).await
    }

    pub async fn delete_contacto(&self, id: &str) -> ApiResult<()> {
        self.delete_from("contactos", id).await
    }

    /// Dedup de contactos: por email si lo hay; si no, por nombre y apellidos.
    pub async fn find_contacto_duplicate(
        &self,
        email: Option<&str>,
        nombre: &str,
        apellidos: Option<&str>,
    ) -> ApiResult<Option<Contacto>> {
        let found = match email.map(str::trim).filter(|e| !e.is_empty()) {
            Some(email) => {
                let sql = format!(
                    "SELECT {CONTACTO_COLUMNS} FROM contactos WHERE email = ?1 COLLATE NOCASE LIMIT 1"
                );
                sqlx::query_as::<_, Contacto>(&sql)
                    .bind(email)
                    .fetch_optional(&self.db_pool)
                    .await
            }
            None => {
                let sql = format!(
                    r#"
                    SELECT {CONTACTO_COLUMNS} FROM contactos
                    WHERE nombre = ?1 COLLATE NOCASE
                      AND COALESCE(apellidos, '') = ?2 COLLATE NOCASE
                    LIMIT 1
                    "#
                );
                sqlx::query_as::<_, Contacto>(&sql)
                    .bind(nombre.trim())
                    .bind(apellidos.map(str::trim).unwrap_or(""))
                    .fetch_optional(&self.db_pool)
                    .await
            }
        };
        Ok(found.db_context("dedup", "contactos")?)
    }

    // ------------------------------------------------------------------
    // Mandatos y pipeline
    // ------------------------------------------------------------------

    pub async fn create_mandato(&self, input: MandatoInput) -> ApiResult<Mandato> {
        let nombre = required(input.nombre, "nombre")?;
        let tipo = input
            .tipo
            .ok_or_else(|| ApiError::BadRequest("el campo 'tipo' es obligatorio".to_string()))?;
        let empresa_id = clean(input.empresa_id);
        self.ensure_empresa_exists(empresa_id.as_deref()).await?;
        let estado = input.estado.unwrap_or(PipelineStage::Prospeccion);

        let id = Uuid::new_v4().to_string();
        let now = now_timestamp();
        sqlx::query(
            r#"
            INSERT INTO mandatos (
                id, nombre, tipo, estado, empresa_id, valor_estimado, responsable,
                descripcion, fecha_inicio, fecha_cierre_prevista, estado_actualizado_at,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11, ?11)
            "#,
        )
        .bind(&id)
        .bind(&nombre)
        .bind(tipo)
        .bind(estado)
        .bind(empresa_id)
        .bind(input.valor_estimado)
        .bind(clean(input.responsable))
        .bind(clean(input.descripcion))
        .bind(input.fecha_inicio.map(|d| d.to_string()))
        .bind(input.fecha_cierre_prevista.map(|d| d.to_string()))
        .bind(&now)
        .execute(&self.db_pool)
        .await
        .db_context("insert", "mandatos")?;

        self.get_mandato(&id).await
    }

    pub async fn get_mandato(&self, id: &str) -> ApiResult<Mandato> {
        let sql = format!("SELECT {MANDATO_COLUMNS} FROM mandatos WHERE id = ?1");
        sqlx::query_as::<_, Mandato>(&sql)
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await
            .db_context("select", "mandatos")?
            .ok_or_else(|| ApiError::NotFound(format!("mandato {id}")))
    }

    pub async fn list_mandatos(&self, filter: &ListFilter) -> ApiResult<Vec<Mandato>> {
        let sql = format!(
            r#"
            SELECT {MANDATO_COLUMNS} FROM mandatos
            WHERE (?1 IS NULL
                   OR nombre LIKE ?1 ESCAPE '\'
                   OR descripcion LIKE ?1 ESCAPE '\'
                   OR responsable LIKE ?1 ESCAPE '\')
              AND (?2 IS NULL OR estado = ?2)
              AND (?3 IS NULL OR tipo = ?3)
              AND (?4 IS NULL OR empresa_id = ?4)
            ORDER BY updated_at DESC
            LIMIT ?5 OFFSET ?6
            "#
        );
        Ok(sqlx::query_as::<_, Mandato>(&sql)
            .bind(filter.like_pattern())
            .bind(filter.estado)
            .bind(filter.tipo)
            .bind(filter.empresa_id.as_deref())
            .bind(filter.limit())
            .bind(filter.offset())
            .fetch_all(&self.db_pool)
            .await
            .db_context("list", "mandatos")?)
    }

    pub async fn update_mandato(&self, id: &str, input: MandatoInput) -> ApiResult<Mandato> {
        let empresa_id = clean(input.empresa_id);
        self.ensure_empresa_exists(empresa_id.as_deref()).await?;
        let current = self.get_mandato(id).await?;
        let now = now_timestamp();
        let estado_cambiado = input.estado.filter(|e| *e != current.estado);

        sqlx::query(
            r#"
            UPDATE mandatos SET
                nombre = COALESCE(?2, nombre),
                tipo = COALESCE(?3, tipo),
                estado = COALESCE(?4, estado),
                empresa_id = COALESCE(?5, empresa_id),
                valor_estimado = COALESCE(?6, valor_estimado),
                responsable = COALESCE(?7, responsable),
                descripcion = COALESCE(?8, descripcion),
                fecha_inicio = COALESCE(?9, fecha_inicio),
                fecha_cierre_prevista = COALESCE(?10, fecha_cierre_prevista),
                estado_actualizado_at = CASE WHEN ?4 IS NULL THEN estado_actualizado_at ELSE ?11 END,
                updated_at = ?11
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(clean(input.nombre))
        .bind(input.tipo)
        .bind(estado_cambiado)
        .bind(empresa_id)
        .bind(input.valor_estimado)
        .bind(clean(input.responsable))
        .bind(clean(input.descripcion))
        .bind(input.fecha_inicio.map(|d| d.to_string()))
        .bind(input.fecha_cierre_prevista.map(|d| d.to_string()))
        .bind(&now)
        .execute(&self.db_pool)
        .await
        .db_context("update", "mandatos")?;

        self.get_mandato(id).await
    }

    /// Mueve un mandato a otra columna del pipeline.
    pub async fn move_mandato(&self, id: &str, estado: PipelineStage) -> ApiResult<Mandato> {
        let current = self.get_mandato(id).await?;
        if current.estado == estado {
            return Ok(current);
        }

        let now = now_timestamp();
        sqlx::query(
            "UPDATE mandatos SET estado = ?2, estado_actualizado_at = ?3, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(estado)
        .bind(&now)
        .execute(&self.db_pool)
        .await
        .db_context("move_stage", "mandatos")?;

        log::info!(
            "Mandato {} movido de '{}' a '{}'",
            id,
            current.estado.as_str(),
            estado.as_str()
        );
        self.get_mandato(id).await
    }

    pub async fn delete_mandato(&self, id: &str) -> ApiResult<()> {
        self.delete_from("mandatos", id).await
    }

    /// Tablero Kanban: una columna por etapa, en orden, aunque esté vacía.
    pub async fn pipeline(&self) -> ApiResult<Vec<PipelineColumn>> {
        let sql = format!(
            "SELECT {MANDATO_COLUMNS} FROM mandatos ORDER BY estado_actualizado_at DESC, created_at DESC"
        );
        let mut mandatos = sqlx::query_as::<_, Mandato>(&sql)
            .fetch_all(&self.db_pool)
            .await
            .db_context("pipeline", "mandatos")?;

        let columns = PipelineStage::ORDERED
            .into_iter()
            .map(|stage| {
                let (in_stage, rest): (Vec<Mandato>, Vec<Mandato>) = std::mem::take(&mut mandatos)
                    .into_iter()
                    .partition(|m| m.estado == stage);
                mandatos = rest;
                PipelineColumn {
                    estado: stage,
                    titulo: stage.label(),
                    total_valor: in_stage.iter().filter_map(|m| m.valor_estimado).sum(),
                    mandatos: in_stage,
                }
            })
            .collect();
        Ok(columns)
    }

    /// Eventos del calendario (vencimientos de tareas y cierres previstos) en
    /// el rango [desde, hasta], ordenados por fecha.
    pub async fn calendar(&self, query: &CalendarQuery) -> ApiResult<Vec<CalendarEvent>> {
        if query.desde > query.hasta {
            return Err(ApiError::BadRequest(
                "'desde' no puede ser posterior a 'hasta'".to_string(),
            ));
        }
        let desde = query.desde.to_string();
        let hasta = query.hasta.to_string();

        let tareas: Vec<(String, String, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT id, titulo, fecha_vencimiento, mandato_id FROM tareas
            WHERE fecha_vencimiento IS NOT NULL
              AND fecha_vencimiento >= ?1 AND fecha_vencimiento <= ?2
            "#,
        )
        .bind(&desde)
        .bind(&hasta)
        .fetch_all(&self.db_pool)
        .await
        .db_context("calendar", "tareas")?;

        let cierres: Vec<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT id, nombre, fecha_cierre_prevista FROM mandatos
            WHERE fecha_cierre_prevista IS NOT NULL
              AND fecha_cierre_prevista >= ?1 AND fecha_cierre_prevista <= ?2
            "#,
        )
        .bind(&desde)
        .bind(&hasta)
        .fetch_all(&self.db_pool)
        .await
        .db_context("calendar", "mandatos")?;

        let mut events: Vec<CalendarEvent> = Vec::with_capacity(tareas.len() + cierres.len());
        for (id, titulo, fecha, mandato_id) in tareas {
            let Ok(fecha) = fecha.parse::<NaiveDate>() else {
                log::warn!("Tarea {} con fecha inválida: {}", id, fecha);
                continue;
            };
            events.push(CalendarEvent {
                fecha,
                tipo: CalendarEventKind::Tarea,
                titulo,
                referencia_id: id,
                mandato_id,
            });
        }
        for (id, nombre, fecha) in cierres {
            let Ok(fecha) = fecha.parse::<NaiveDate>() else {
                log::warn!("Mandato {} con fecha de cierre inválida: {}", id, fecha);
                continue;
            };
            events.push(CalendarEvent {
                fecha,
                tipo: CalendarEventKind::CierreMandato,
                titulo: format!("Cierre previsto: {nombre}"),
                mandato_id: Some(id.clone()),
                referencia_id: id,
            });
        }

        events.sort_by(|a, b| a.fecha.cmp(&b.fecha).then_with(|| a.titulo.cmp(&b.titulo)));
        Ok(events)
    }

    async fn delete_from(&self, table: &'static str, id: &str) -> ApiResult<()> {
        let sql = format!("DELETE FROM {table} WHERE id = ?1");
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.db_pool)
            .await
            .db_context("delete", table)?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!("{table} {id}")));
        }
        Ok(())
    }
}
