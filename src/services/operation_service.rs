//! services/operation_service.rs
//! Registro de operaciones (tabla `operations`).

use std::fmt::Display;
use std::future::Future;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::models::now_timestamp;
use crate::models::operation_model::{
    CreateOperationRequest, ListOperationsResponse, OperationRecord, OperationType,
};

const OPERATION_COLUMNS: &str =
    "id, operation_type, status, error_message, is_async, created_at, updated_at, metadata";

/// Registro de ejecuciones de procesos (colas, importaciones, IA, documentos).
#[derive(Clone, Debug)]
pub struct OperationService {
    db_pool: Pool<Sqlite>,
}

impl OperationService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        OperationService { db_pool }
    }

    /// Corre migraciones con sqlx
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db_pool)
            .await
            .context("Fallo al ejecutar migraciones")?;
        Ok(())
    }

    /// Crea la operación en DB con estado "pending" y devuelve su id.
    pub async fn create_operation(&self, req: CreateOperationRequest) -> Result<String> {
        let op_id = Uuid::new_v4().to_string();
        let now = now_timestamp();
        let metadata = req.metadata.map(|m| m.to_string());

        sqlx::query(
            r#"
            INSERT INTO operations (
                id, operation_type, status, error_message,
                is_async, created_at, updated_at, metadata
            )
            VALUES (?1, ?2, 'pending', NULL, ?3, ?4, ?4, ?5)
            "#,
        )
        .bind(&op_id)
        .bind(req.operation_type.as_str())
        .bind(req.is_async)
        .bind(&now)
        .bind(metadata)
        .execute(&self.db_pool)
        .await
        .context("Fallo al insertar operation")?;

        Ok(op_id)
    }

    /// Crea la operación directamente en "running".
    pub async fn start_operation(&self, req: CreateOperationRequest) -> Result<String> {
        let op_id = self.create_operation(req).await?;
        self.update_operation(&op_id, "running", None, None).await?;
        Ok(op_id)
    }

    /// Actualiza estado, error y (si se pasa) los metadatos.
    pub async fn update_operation(
        &self,
        op_id: &str,
        new_status: &str,
        error_message: Option<&str>,
        metadata: Option<&Value>,
    ) -> Result<()> {
        let now = now_timestamp();
        let metadata = metadata.map(|m| m.to_string());
        sqlx::query(
            r#"
            UPDATE operations
            SET status = ?2,
                error_message = ?3,
                metadata = COALESCE(?4, metadata),
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(op_id)
        .bind(new_status)
        .bind(error_message)
        .bind(metadata)
        .bind(now)
        .execute(&self.db_pool)
        .await
        .context("Fallo al actualizar operación")?;

        Ok(())
    }

    pub async fn mark_operation_done(&self, op_id: &str, result: &Value) -> Result<()> {
        self.update_operation(op_id, "done", None, Some(result))
            .await
    }

    pub async fn mark_operation_failed(&self, op_id: &str, error: String) -> Result<()> {
        self.update_operation(op_id, "failed", Some(&error), None)
            .await
    }

    /// Ejecuta `job` registrándolo como operación: "running" al empezar y
    /// "done" (con el resultado serializado como metadatos) o "failed" al
    /// terminar. Un fallo del propio registro solo se loguea.
    pub async fn track<T, E, F>(&self, operation_type: OperationType, job: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        T: Serialize,
        E: Display,
    {
        let op_id = match self
            .start_operation(CreateOperationRequest {
                operation_type,
                is_async: false,
                metadata: None,
            })
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                log::error!("No se pudo registrar la operación {}: {:?}", operation_type.as_str(), e);
                None
            }
        };

        let result = job.await;

        if let Some(op_id) = op_id {
            let update = match &result {
                Ok(value) => {
                    let metadata = serde_json::to_value(value).unwrap_or(Value::Null);
                    self.mark_operation_done(&op_id, &metadata).await
                }
                Err(e) => self.mark_operation_failed(&op_id, e.to_string()).await,
            };
            if let Err(e) = update {
                log::error!("No se pudo cerrar la operación {}: {:?}", op_id, e);
            }
        }
        result
    }

    /// Obtiene la info de una operación
    pub async fn get_operation(&self, op_id: &str) -> Result<Option<OperationRecord>> {
        let sql = format!("SELECT {OPERATION_COLUMNS} FROM operations WHERE id = ?1");
        let record = sqlx::query_as::<_, OperationRecord>(&sql)
            .bind(op_id)
            .fetch_optional(&self.db_pool)
            .await
            .context("Fallo al consultar operación")?;
        Ok(record)
    }

    /// Lista operaciones con paginación
    pub async fn list_operations(
        &self,
        page: u64,
        page_size: u64,
    ) -> Result<ListOperationsResponse> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 200);
        let offset = (page - 1) * page_size;

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM operations")
            .fetch_one(&self.db_pool)
            .await?;

        let sql = format!(
            "SELECT {OPERATION_COLUMNS} FROM operations ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"
        );
        let items = sqlx::query_as::<_, OperationRecord>(&sql)
            .bind(page_size as i64)
            .bind(offset as i64)
            .fetch_all(&self.db_pool)
            .await?;

        Ok(ListOperationsResponse {
            total: total as u64,
            page,
            page_size,
            items,
        })
    }
}
