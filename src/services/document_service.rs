//! services/document_service.rs
//! Documentos legales (NDA, LOI, teaser): plantilla fija, interpolación de
//! campos, paginación y conversión a PDF.

use crate::config::document_config::DocumentLayout;
use crate::models::document_model::{
    DocumentFields, DocumentKind, DocumentPreview, DocumentRequest, GeneratedDocument,
};
use crate::models::error_model::{ApiError, ApiResult};
use crate::models::pdf_model::PdfRequest;
use crate::services::pdf_service::{sanitize_file_name, PdfService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Heading,
    Paragraph,
}

/// Bloque de plantilla. `only_if` omite el bloque cuando ese campo está vacío.
struct TemplateBlock {
    kind: BlockKind,
    text: &'static str,
    only_if: Option<&'static str>,
}

const fn heading(text: &'static str) -> TemplateBlock {
    TemplateBlock {
        kind: BlockKind::Heading,
        text,
        only_if: None,
    }
}

const fn paragraph(text: &'static str) -> TemplateBlock {
    TemplateBlock {
        kind: BlockKind::Paragraph,
        text,
        only_if: None,
    }
}

const fn optional(field: &'static str, text: &'static str) -> TemplateBlock {
    TemplateBlock {
        kind: BlockKind::Paragraph,
        text,
        only_if: Some(field),
    }
}

const NDA_TEMPLATE: &[TemplateBlock] = &[
    heading("ACUERDO DE CONFIDENCIALIDAD"),
    paragraph("En {{ciudad}}, a {{fecha}}."),
    heading("REUNIDOS"),
    paragraph(
        "De una parte, {{parte_reveladora}}, con CIF {{cif_reveladora}} (en adelante, la \
         \"Parte Reveladora\"). De otra parte, {{parte_receptora}}, con CIF {{cif_receptora}} \
         (en adelante, la \"Parte Receptora\"). Ambas partes se reconocen capacidad legal \
         suficiente para otorgar el presente acuerdo.",
    ),
    heading("EXPONEN"),
    paragraph(
        "Que la Parte Receptora está interesada en analizar una posible operación corporativa \
         relacionada con el proyecto {{proyecto}} y que, para ello, necesita acceder a \
         información de carácter confidencial de la Parte Reveladora.",
    ),
    heading("CLÁUSULAS"),
    paragraph(
        "Primera. Información Confidencial. Tendrá la consideración de Información Confidencial \
         toda información financiera, comercial, técnica, laboral o de cualquier otra naturaleza \
         facilitada por la Parte Reveladora, por cualquier medio, con ocasión del proyecto \
         {{proyecto}}, así como la propia existencia de las negociaciones.",
    ),
    paragraph(
        "Segunda. Obligaciones. La Parte Receptora se obliga a utilizar la Información \
         Confidencial exclusivamente para evaluar la operación, a no divulgarla a terceros sin \
         consentimiento previo y por escrito, y a limitar su acceso a aquellos empleados y \
         asesores que necesiten conocerla, quienes quedarán sujetos a idénticas obligaciones.",
    ),
    paragraph(
        "Tercera. Devolución. A requerimiento de la Parte Reveladora, la Parte Receptora \
         devolverá o destruirá la Información Confidencial recibida, sin conservar copia alguna.",
    ),
    paragraph(
        "Cuarta. No captación. Durante la vigencia de este acuerdo, la Parte Receptora no \
         contratará ni intentará contratar a empleados de la Parte Reveladora con los que haya \
         tenido contacto en el marco del proyecto.",
    ),
    paragraph(
        "Quinta. Duración. Las obligaciones de este acuerdo se mantendrán durante \
         {{duracion_meses}} meses a contar desde la fecha de su firma.",
    ),
    paragraph(
        "Sexta. Ley y jurisdicción. El presente acuerdo se rige por la legislación española. \
         Las partes se someten a los Juzgados y Tribunales de {{jurisdiccion}}, con renuncia a \
         cualquier otro fuero que pudiera corresponderles.",
    ),
    heading("FIRMAS"),
    paragraph("Por {{parte_reveladora}}: ______________________"),
    paragraph("Por {{parte_receptora}}: ______________________"),
];

const LOI_TEMPLATE: &[TemplateBlock] = &[
    heading("CARTA DE INTENCIONES"),
    paragraph("En {{ciudad}}, a {{fecha}}."),
    paragraph("A la atención de {{vendedor}}."),
    paragraph(
        "Por medio de la presente, {{comprador}} manifiesta su interés en adquirir el 100% del \
         capital social de {{empresa_objetivo}} en los términos que se indican a continuación. \
         Esta carta no constituye una oferta vinculante.",
    ),
    heading("1. Precio"),
    paragraph(
        "El precio indicativo de la operación asciende a {{precio}}, sobre la base de una \
         empresa libre de caja y deuda y con un nivel normalizado de circulante.",
    ),
    heading("2. Forma de pago"),
    paragraph("{{forma_pago}}"),
    heading("3. Due diligence"),
    paragraph(
        "La oferta definitiva quedará sujeta al resultado satisfactorio de una revisión \
         financiera, fiscal, laboral y legal de {{empresa_objetivo}}.",
    ),
    heading("4. Exclusividad"),
    paragraph(
        "{{vendedor}} concede a {{comprador}} un periodo de exclusividad de \
         {{exclusividad_dias}} días desde la firma de esta carta, durante el cual no \
         negociará la venta con terceros.",
    ),
    heading("5. Condiciones adicionales"),
    optional("condiciones", "{{condiciones}}"),
    heading("6. Carácter no vinculante"),
    paragraph(
        "Salvo lo dispuesto en materia de exclusividad y confidencialidad, la presente carta \
         no genera obligación alguna para las partes, que quedarán vinculadas únicamente por \
         los contratos definitivos que, en su caso, suscriban.",
    ),
    heading("FIRMAS"),
    paragraph("{{comprador}}: ______________________"),
    paragraph("{{vendedor}}: ______________________"),
];

const TEASER_TEMPLATE: &[TemplateBlock] = &[
    heading("PROYECTO {{codigo_proyecto}}"),
    paragraph("Oportunidad de inversión en el sector {{sector}}. Documento estrictamente confidencial."),
    heading("La compañía"),
    paragraph("{{descripcion}}"),
    paragraph("Ubicación: {{ubicacion}}."),
    heading("Principales magnitudes"),
    paragraph("Facturación: {{facturacion}}."),
    paragraph("EBITDA: {{ebitda}}."),
    paragraph("Plantilla: {{empleados}} empleados."),
    heading("La operación"),
    paragraph("{{motivo_operacion}}"),
    paragraph(
        "Los interesados deberán firmar un acuerdo de confidencialidad antes de recibir el \
         cuaderno de venta con información detallada.",
    ),
    optional("contacto_asesor", "Contacto: {{contacto_asesor}}."),
];

/// Campos que pueden ir vacíos sin invalidar el documento.
const OPTIONAL_FIELDS: &[&str] = &["condiciones", "contacto_asesor"];

fn template(kind: DocumentKind) -> &'static [TemplateBlock] {
    match kind {
        DocumentKind::Nda => NDA_TEMPLATE,
        DocumentKind::Loi => LOI_TEMPLATE,
        DocumentKind::Teaser => TEASER_TEMPLATE,
    }
}

/// Bloque con los campos ya sustituidos (texto plano, sin escapar).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedBlock {
    Heading(String),
    Paragraph(String),
}

/// Lo que ocupa una página: títulos y tramos de párrafo ya partidos en líneas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageItem {
    Heading(String),
    Lines(Vec<String>),
}

pub type Page = Vec<PageItem>;

/// Sustituye `{{campo}}` por su valor. Los marcadores desconocidos se dejan
/// tal cual.
pub fn interpolate(text: &str, values: &[(&'static str, String)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                match values.iter().find(|(k, _)| *k == key) {
                    Some((_, value)) => out.push_str(value.trim()),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Campos obligatorios vacíos, en el orden en que aparecen.
pub fn missing_fields(fields: &DocumentFields) -> Vec<&'static str> {
    fields
        .values()
        .into_iter()
        .filter(|(key, value)| value.trim().is_empty() && !OPTIONAL_FIELDS.contains(key))
        .map(|(key, _)| key)
        .collect()
}

pub fn render_blocks(fields: &DocumentFields) -> ApiResult<Vec<RenderedBlock>> {
    let missing = missing_fields(fields);
    if !missing.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "faltan campos obligatorios: {}",
            missing.join(", ")
        )));
    }

    let values = fields.values();
    let is_empty = |key: &str| {
        values
            .iter()
            .find(|(k, _)| *k == key)
            .map_or(true, |(_, v)| v.trim().is_empty())
    };

    let mut blocks = Vec::new();
    let source = template(fields.kind());
    for (idx, block) in source.iter().enumerate() {
        if block.only_if.is_some_and(|key| is_empty(key)) {
            continue;
        }
        // Un título cuyo único contenido se ha omitido tampoco se pinta.
        if block.kind == BlockKind::Heading {
            let next = source.get(idx + 1);
            let next_skipped = next.is_some_and(|n| n.only_if.is_some_and(|key| is_empty(key)));
            let next_is_last_or_heading = source
                .get(idx + 2)
                .map_or(true, |n| n.kind == BlockKind::Heading);
            if next_skipped && next_is_last_or_heading {
                continue;
            }
        }
        let text = interpolate(block.text, &values);
        blocks.push(match block.kind {
            BlockKind::Heading => RenderedBlock::Heading(text),
            BlockKind::Paragraph => RenderedBlock::Paragraph(text),
        });
    }
    Ok(blocks)
}

/// Corte de líneas por palabras a `width` caracteres; las palabras más largas
/// que la línea se parten.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        if word.is_empty() {
            continue;
        }
        let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
        if needed > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word.iter());
        current_len += word.len();
    }
    if current_len > 0 {
        lines.push(current);
    }
    lines
}

/// Reparte los bloques en páginas de `lines_per_page` líneas. Un párrafo
/// puede continuar en la página siguiente; un título nunca queda solo al
/// final de una página.
pub fn paginate(blocks: &[RenderedBlock], layout: &DocumentLayout) -> Vec<Page> {
    let capacity = layout.lines_per_page.max(layout.heading_lines + 1);
    let mut pages: Vec<Page> = Vec::new();
    let mut page: Page = Vec::new();
    let mut used = 0usize;

    for (idx, block) in blocks.iter().enumerate() {
        let spacing = if used == 0 { 0 } else { layout.paragraph_spacing };
        match block {
            RenderedBlock::Heading(text) => {
                let has_following = blocks.get(idx + 1).is_some();
                let needed = spacing + layout.heading_lines + usize::from(has_following);
                if used > 0 && used + needed > capacity {
                    pages.push(std::mem::take(&mut page));
                    used = 0;
                }
                if used > 0 {
                    used += layout.paragraph_spacing;
                }
                page.push(PageItem::Heading(text.clone()));
                used += layout.heading_lines;
            }
            RenderedBlock::Paragraph(text) => {
                let lines = wrap_text(text, layout.chars_per_line);
                if lines.is_empty() {
                    continue;
                }
                // Tras un título el párrafo va pegado, sin espacio extra.
                let after_heading = matches!(page.last(), Some(PageItem::Heading(_)));
                if used > 0 && !after_heading {
                    if used + spacing + 1 > capacity {
                        pages.push(std::mem::take(&mut page));
                        used = 0;
                    } else {
                        used += spacing;
                    }
                }

                let mut chunk = Vec::new();
                for line in lines {
                    if used + 1 > capacity {
                        if !chunk.is_empty() {
                            page.push(PageItem::Lines(std::mem::take(&mut chunk)));
                        }
                        pages.push(std::mem::take(&mut page));
                        used = 0;
                    }
                    chunk.push(line);
                    used += 1;
                }
                if !chunk.is_empty() {
                    page.push(PageItem::Lines(chunk));
                }
            }
        }
    }

    if !page.is_empty() || pages.is_empty() {
        pages.push(page);
    }
    pages
}

const DOCUMENT_CSS: &str = "body{font-family:'DejaVu Serif',Georgia,serif;font-size:11pt;\
line-height:1.45;color:#111}h2{font-size:13pt;margin:0 0 .6em 0}p{margin:0 0 .8em 0;\
text-align:justify}.page{page-break-after:always}.page:last-child{page-break-after:auto}";

pub fn render_html(kind: DocumentKind, pages: &[Page]) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html><html lang=\"es\"><head><meta charset=\"utf-8\">");
    html.push_str(&format!("<title>{}</title>", escape_html(kind.default_file_name())));
    html.push_str("<style>");
    html.push_str(DOCUMENT_CSS);
    html.push_str("</style></head><body>");
    for page in pages {
        html.push_str("<div class=\"page\">");
        for item in page {
            match item {
                PageItem::Heading(text) => {
                    html.push_str(&format!("<h2>{}</h2>", escape_html(text)));
                }
                PageItem::Lines(lines) => {
                    html.push_str(&format!("<p>{}</p>", escape_html(&lines.join(" "))));
                }
            }
        }
        html.push_str("</div>");
    }
    html.push_str("</body></html>");
    html
}

#[derive(Clone)]
pub struct DocumentService {
    pdf: PdfService,
    layout: DocumentLayout,
}

impl DocumentService {
    pub fn new(pdf: PdfService, layout: DocumentLayout) -> Self {
        Self { pdf, layout }
    }

    pub fn preview(&self, fields: &DocumentFields) -> ApiResult<DocumentPreview> {
        let blocks = render_blocks(fields)?;
        let pages = paginate(&blocks, &self.layout);
        let kind = fields.kind();
        Ok(DocumentPreview {
            kind,
            pages: pages.len(),
            html: render_html(kind, &pages),
        })
    }

    pub async fn generate(&self, req: &DocumentRequest) -> ApiResult<GeneratedDocument> {
        let preview = self.preview(&req.documento)?;
        if !self.pdf.is_available() {
            return Err(ApiError::Internal(anyhow::anyhow!(
                "wkhtmltopdf no está instalado en el servidor"
            )));
        }
        let file_name = sanitize_file_name(
            req.file_name
                .as_deref()
                .unwrap_or_else(|| preview.kind.default_file_name()),
        );

        let output = self
            .pdf
            .generate_pdf(PdfRequest {
                file_name: file_name.clone(),
                html: preview.html,
                page_size: self.layout.page_preset,
                margins: self.layout.margins.clone(),
                store_local: req.store_local,
            })
            .await?;

        log::info!(
            "(documents) {:?} generado: {} páginas, {} bytes",
            preview.kind,
            preview.pages,
            output.bytes.len()
        );
        Ok(GeneratedDocument {
            kind: preview.kind,
            file_name,
            pages: preview.pages,
            size_bytes: output.bytes.len(),
            stored_as: output.stored_as,
            mandato_id: req.mandato_id.clone(),
            bytes: output.bytes,
        })
    }
}
