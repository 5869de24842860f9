//! services/pdf_service.rs
//! Conversión HTML -> PDF con wkhtmltopdf.

use crate::models::pdf_model::{PdfOutput, PdfPagePreset, PdfRequest};
use anyhow::{anyhow, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{
    process::Command,
    sync::{Semaphore, SemaphorePermit},
    time::timeout,
};
use uuid::Uuid;

/// Cantidad máxima de wkhtmltopdf simultáneos
const MAX_CONCURRENT_PROCESSES: usize = 4;
/// Tiempo máximo para generar un PDF
const PDF_GENERATION_TIMEOUT: Duration = Duration::from_secs(120);
const TEMP_DIR_PREFIX: &str = "crm_docs_";
pub const DOCUMENTS_DIR: &str = "./files/documents";

#[derive(Clone)]
pub struct PdfService {
    semaphore: Arc<Semaphore>,
    /// `None` si wkhtmltopdf no está instalado; la generación falla pero la
    /// vista previa HTML sigue funcionando.
    wkhtmltopdf_path: Option<Arc<PathBuf>>,
    output_dir: Arc<PathBuf>,
}

impl PdfService {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let wkhtmltopdf_path = match which::which("wkhtmltopdf") {
            Ok(path) => Some(Arc::new(path)),
            Err(e) => {
                log::warn!("No se encontró wkhtmltopdf ({}); la generación de PDF está desactivada", e);
                None
            }
        };

        Self {
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_PROCESSES)),
            wkhtmltopdf_path,
            output_dir: Arc::new(output_dir.into()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.wkhtmltopdf_path.is_some()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Genera un PDF en memoria. Con `store_local` se guarda además una
    /// copia en el directorio de documentos.
    pub async fn generate_pdf(&self, req: PdfRequest) -> Result<PdfOutput> {
        let start = Instant::now();
        let binary = self
            .wkhtmltopdf_path
            .clone()
            .ok_or_else(|| anyhow!("wkhtmltopdf no está disponible"))?;

        let _guard = self.acquire_permit().await?;

        // El directorio temporal se borra entero al salir de scope.
        let work_dir = tempfile::Builder::new()
            .prefix(TEMP_DIR_PREFIX)
            .tempdir()
            .context("No se pudo crear el directorio temporal")?;
        let html_path = work_dir.path().join("documento.html");
        let pdf_path = work_dir.path().join("documento.pdf");

        fs::write(&html_path, &req.html)
            .with_context(|| format!("Error escribiendo HTML temporal en {:?}", html_path))?;

        let bytes = self
            .run_wkhtmltopdf(&binary, &req, &html_path, &pdf_path)
            .await?;

        let stored_as = if req.store_local {
            Some(self.store(&req.file_name, &bytes)?)
        } else {
            None
        };

        log::info!(
            "PDF '{}' generado en {:.2}s ({} bytes)",
            req.file_name,
            start.elapsed().as_secs_f32(),
            bytes.len()
        );
        Ok(PdfOutput { bytes, stored_as })
    }

    /// Guarda el PDF como `<uuid>_<nombre>` y devuelve ese nombre.
    fn store(&self, file_name: &str, bytes: &[u8]) -> Result<String> {
        fs::create_dir_all(&*self.output_dir)
            .with_context(|| format!("No se pudo crear {:?}", self.output_dir))?;
        let unique_name = format!("{}_{}", Uuid::new_v4(), sanitize_file_name(file_name));
        let local_path = self.output_dir.join(&unique_name);
        fs::write(&local_path, bytes)
            .with_context(|| format!("No se pudo guardar PDF en {:?}", local_path))?;
        log::info!("PDF guardado localmente en {:?}", local_path);
        Ok(unique_name)
    }

    async fn acquire_permit(&self) -> Result<SemaphorePermit> {
        timeout(Duration::from_secs(5), self.semaphore.acquire())
            .await
            .context("Timeout esperando permiso en PdfService")?
            .map_err(|_| anyhow!("No se pudo adquirir el semaphore"))
    }

    async fn run_wkhtmltopdf(
        &self,
        binary: &Path,
        req: &PdfRequest,
        html_path: &Path,
        pdf_path: &Path,
    ) -> Result<Vec<u8>> {
        let mut cmd = Command::new(binary);

        let preset = match req.page_size {
            PdfPagePreset::A4 => "A4",
            PdfPagePreset::Letter => "Letter",
            PdfPagePreset::Legal => "Legal",
            PdfPagePreset::A3 => "A3",
        };
        cmd.arg("--page-size").arg(preset);

        let margins = &req.margins;
        cmd.arg("--margin-top").arg(format!("{}mm", margins.top));
        cmd.arg("--margin-bottom").arg(format!("{}mm", margins.bottom));
        cmd.arg("--margin-left").arg(format!("{}mm", margins.left));
        cmd.arg("--margin-right").arg(format!("{}mm", margins.right));

        cmd.arg("--encoding").arg("utf-8");
        cmd.arg("--print-media-type");
        cmd.arg("--quiet");
        cmd.arg(html_path);
        cmd.arg(pdf_path);

        cmd.stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let output = timeout(PDF_GENERATION_TIMEOUT, cmd.output())
            .await
            .context("Timeout ejecutando wkhtmltopdf")?
            .context("No se pudo lanzar wkhtmltopdf")?;

        if !output.status.success() {
            let stderr_msg = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("wkhtmltopdf falló: {}", stderr_msg));
        }

        fs::read(pdf_path).with_context(|| format!("Error leyendo PDF final en {:?}", pdf_path))
    }
}

/// Deja solo caracteres seguros para un nombre de fichero y fuerza `.pdf`.
pub fn sanitize_file_name(name: &str) -> String {
    let base: String = name
        .trim()
        .trim_end_matches(".pdf")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let base = base.trim_matches('_');
    if base.is_empty() {
        "documento.pdf".to_string()
    } else {
        format!("{base}.pdf")
    }
}
