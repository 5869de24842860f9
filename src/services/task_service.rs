//! services/task_service.rs
//! Tareas: alta manual, listado, completado y creación a partir de la IA.

use chrono::NaiveDate;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::models::error_model::{ApiError, ApiResult, DbResultExt};
use crate::models::now_timestamp;
use crate::models::task_model::{
    CreateTareaRequest, CreateTasksResult, ParsedTask, Tarea, TareaEstado, TareaFilter,
    TareaOrigen, TareaPrioridad, TaskCreationContext, TaskCreationFailure,
};

const TAREA_COLUMNS: &str = "id, titulo, descripcion, estado, prioridad, fecha_vencimiento, \
                             asignado_a, mandato_id, origen, completada_at, created_at, updated_at";

const MAX_TITLE_LEN: usize = 200;

/// Datos ya validados de una tarea a insertar.
struct NewTarea {
    titulo: String,
    descripcion: Option<String>,
    prioridad: TareaPrioridad,
    fecha_vencimiento: Option<NaiveDate>,
    asignado_a: Option<String>,
    mandato_id: Option<String>,
    origen: TareaOrigen,
}

#[derive(Clone, Debug)]
pub struct TaskService {
    db_pool: Pool<Sqlite>,
    /// Responsable por defecto configurado a nivel de despliegue.
    default_assignee: Option<String>,
}

impl TaskService {
    pub fn new(db_pool: Pool<Sqlite>, default_assignee: Option<String>) -> Self {
        Self {
            db_pool,
            default_assignee,
        }
    }

    async fn insert(&self, tarea: NewTarea) -> ApiResult<Tarea> {
        let id = Uuid::new_v4().to_string();
        let now = now_timestamp();
        sqlx::query(
            r#"
            INSERT INTO tareas (
                id, titulo, descripcion, estado, prioridad, fecha_vencimiento,
                asignado_a, mandato_id, origen, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, 'pendiente', ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            "#,
        )
        .bind(&id)
        .bind(&tarea.titulo)
        .bind(&tarea.descripcion)
        .bind(tarea.prioridad)
        .bind(tarea.fecha_vencimiento.map(|d| d.to_string()))
        .bind(&tarea.asignado_a)
        .bind(&tarea.mandato_id)
        .bind(tarea.origen)
        .bind(&now)
        .execute(&self.db_pool)
        .await
        .db_context("insert", "tareas")?;

        self.get(&id).await
    }

    pub async fn create(&self, req: CreateTareaRequest) -> ApiResult<Tarea> {
        let titulo = validate_title(&req.titulo).map_err(ApiError::BadRequest)?;
        self.insert(NewTarea {
            titulo,
            descripcion: req.descripcion.filter(|d| !d.trim().is_empty()),
            prioridad: req.prioridad,
            fecha_vencimiento: req.fecha_vencimiento,
            asignado_a: req
                .asignado_a
                .filter(|a| !a.trim().is_empty())
                .or_else(|| self.default_assignee.clone()),
            mandato_id: req.mandato_id,
            origen: TareaOrigen::Manual,
        })
        .await
    }

    pub async fn get(&self, id: &str) -> ApiResult<Tarea> {
        let sql = format!("SELECT {TAREA_COLUMNS} FROM tareas WHERE id = ?1");
        sqlx::query_as::<_, Tarea>(&sql)
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await
            .db_context("select", "tareas")?
            .ok_or_else(|| ApiError::NotFound(format!("tarea {id}")))
    }

    pub async fn list(&self, filter: &TareaFilter) -> ApiResult<Vec<Tarea>> {
        let sql = format!(
            r#"
            SELECT {TAREA_COLUMNS} FROM tareas
            WHERE (?1 IS NULL OR mandato_id = ?1)
              AND (?2 IS NULL OR estado = ?2)
              AND (?3 IS NULL OR asignado_a = ?3)
            ORDER BY fecha_vencimiento IS NULL, fecha_vencimiento ASC, created_at DESC
            LIMIT ?4 OFFSET ?5
            "#
        );
        Ok(sqlx::query_as::<_, Tarea>(&sql)
            .bind(filter.mandato_id.as_deref())
            .bind(filter.estado)
            .bind(filter.asignado_a.as_deref())
            .bind(filter.limit.unwrap_or(100).clamp(1, 500))
            .bind(filter.offset.unwrap_or(0).max(0))
            .fetch_all(&self.db_pool)
            .await
            .db_context("list", "tareas")?)
    }

    pub async fn complete(&self, id: &str) -> ApiResult<Tarea> {
        let now = now_timestamp();
        let result = sqlx::query(
            r#"
            UPDATE tareas
            SET estado = 'completada', completada_at = COALESCE(completada_at, ?2), updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&now)
        .execute(&self.db_pool)
        .await
        .db_context("complete", "tareas")?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!("tarea {id}")));
        }
        self.get(id).await
    }

    pub async fn update_estado(&self, id: &str, estado: TareaEstado) -> ApiResult<Tarea> {
        if estado == TareaEstado::Completada {
            return self.complete(id).await;
        }
        let result = sqlx::query(
            "UPDATE tareas SET estado = ?2, completada_at = NULL, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(estado)
        .bind(now_timestamp())
        .execute(&self.db_pool)
        .await
        .db_context("update_estado", "tareas")?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!("tarea {id}")));
        }
        self.get(id).await
    }

    pub async fn delete(&self, id: &str) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM tareas WHERE id = ?1")
            .bind(id)
            .execute(&self.db_pool)
            .await
            .db_context("delete", "tareas")?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!("tarea {id}")));
        }
        Ok(())
    }

    /// Responsable final de una tarea de la IA: el de la propia tarea, si no
    /// el de la petición, si no el configurado por defecto.
    pub fn resolve_assignee(&self, task: &ParsedTask, ctx: &TaskCreationContext) -> Option<String> {
        let non_empty = |v: &Option<String>| v.as_ref().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        non_empty(&task.assignee)
            .or_else(|| non_empty(&ctx.default_assignee))
            .or_else(|| non_empty(&self.default_assignee))
    }

    /// Persiste las tareas devueltas por la IA una a una. Una tarea inválida o
    /// un error de base de datos se anota como fallo y se sigue con las demás.
    pub async fn create_from_parsed(
        &self,
        tasks: &[ParsedTask],
        ctx: &TaskCreationContext,
    ) -> CreateTasksResult {
        let mut created = Vec::with_capacity(tasks.len());
        let mut failed = Vec::new();

        for (index, task) in tasks.iter().enumerate() {
            let outcome = match build_from_parsed(task) {
                Ok((titulo, fecha_vencimiento, prioridad)) => {
                    self.insert(NewTarea {
                        titulo,
                        descripcion: task
                            .description
                            .clone()
                            .filter(|d| !d.trim().is_empty()),
                        prioridad,
                        fecha_vencimiento,
                        asignado_a: self.resolve_assignee(task, ctx),
                        mandato_id: ctx.mandato_id.clone(),
                        origen: TareaOrigen::Ia,
                    })
                    .await
                    .map_err(|e| e.to_string())
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(tarea) => created.push(tarea),
                Err(error) => {
                    log::warn!("(ai_tasks) Tarea {} no creada: {}", index, error);
                    failed.push(TaskCreationFailure {
                        index,
                        title: task.title.clone(),
                        error,
                    });
                }
            }
        }

        log::info!(
            "(ai_tasks) {} tareas creadas, {} fallidas de {}",
            created.len(),
            failed.len(),
            tasks.len()
        );
        CreateTasksResult {
            total: tasks.len(),
            created,
            failed,
        }
    }
}

fn validate_title(title: &str) -> Result<String, String> {
    let title = title.trim();
    if title.is_empty() {
        return Err("la tarea no tiene título".to_string());
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(format!("el título supera {MAX_TITLE_LEN} caracteres"));
    }
    Ok(title.to_string())
}

fn build_from_parsed(
    task: &ParsedTask,
) -> Result<(String, Option<NaiveDate>, TareaPrioridad), String> {
    let titulo = validate_title(&task.title)?;
    let fecha = match task.due_date.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| format!("fecha de vencimiento inválida: {raw}"))?,
        ),
    };
    let prioridad = task
        .priority
        .as_deref()
        .and_then(TareaPrioridad::parse_lenient)
        .unwrap_or_default();
    Ok((titulo, fecha, prioridad))
}
