//! tests/document_tests.rs
//! Plantillas, paginación y HTML de los documentos legales.

use crate::config::document_config::DocumentLayout;
use crate::models::document_model::{
    DocumentFields, DocumentKind, DocumentRequest, LoiFields, TeaserFields,
};
use crate::models::error_model::ApiError;
use crate::services::document_service::{
    interpolate, missing_fields, paginate, render_blocks, render_html, wrap_text, DocumentService,
    PageItem, RenderedBlock,
};
use crate::services::pdf_service::{sanitize_file_name, PdfService};

fn loi() -> LoiFields {
    LoiFields {
        comprador: "Inversiones Cantábrico SA".to_string(),
        vendedor: "Familia Ortega".to_string(),
        empresa_objetivo: "Metalúrgica Norte SL".to_string(),
        precio: "12.000.000 EUR".to_string(),
        forma_pago: "80% al cierre y 20% aplazado a 24 meses.".to_string(),
        exclusividad_dias: 60,
        ciudad: "Bilbao".to_string(),
        fecha: "19 de octubre de 2026".to_string(),
        condiciones: String::new(),
    }
}

fn small_layout(chars_per_line: usize, lines_per_page: usize) -> DocumentLayout {
    DocumentLayout {
        chars_per_line,
        lines_per_page,
        heading_lines: 2,
        paragraph_spacing: 1,
        ..DocumentLayout::default()
    }
}

fn service() -> DocumentService {
    let dir = std::env::temp_dir().join("crm_docs_tests");
    DocumentService::new(PdfService::new(dir), DocumentLayout::default())
}

#[test]
fn interpolate_replaces_known_and_keeps_unknown() {
    let values = vec![("nombre", "  Ana ".to_string())];
    assert_eq!(
        interpolate("Hola {{nombre}} y {{ otro }}", &values),
        "Hola Ana y {{ otro }}"
    );
    assert_eq!(interpolate("Sin cierre {{nombre", &values), "Sin cierre {{nombre");
    assert_eq!(interpolate("{{ nombre }}.", &values), "Ana.");
}

#[test]
fn missing_required_fields_are_reported() {
    let mut fields = loi();
    fields.precio = "  ".to_string();
    fields.forma_pago = String::new();
    let documento = DocumentFields::Loi(fields);

    // condiciones es opcional y no aparece
    assert_eq!(missing_fields(&documento), vec!["precio", "forma_pago"]);
    match render_blocks(&documento) {
        Err(ApiError::BadRequest(msg)) => assert!(msg.contains("precio, forma_pago")),
        other => panic!("se esperaba BadRequest, llegó {other:?}"),
    }
}

#[test]
fn empty_optional_block_drops_its_heading() {
    let without = render_blocks(&DocumentFields::Loi(loi())).expect("bloques");
    assert!(!without.contains(&RenderedBlock::Heading("5. Condiciones adicionales".to_string())));
    assert!(without.contains(&RenderedBlock::Heading("6. Carácter no vinculante".to_string())));

    let mut fields = loi();
    fields.condiciones = "Sujeto a la aprobación del consejo.".to_string();
    let with = render_blocks(&DocumentFields::Loi(fields)).expect("bloques");
    let idx = with
        .iter()
        .position(|b| *b == RenderedBlock::Heading("5. Condiciones adicionales".to_string()))
        .expect("título presente");
    assert_eq!(
        with[idx + 1],
        RenderedBlock::Paragraph("Sujeto a la aprobación del consejo.".to_string())
    );
    assert_eq!(with.len(), without.len() + 2);
}

#[test]
fn teaser_never_names_missing_advisor() {
    let teaser = TeaserFields {
        codigo_proyecto: "ATLAS".to_string(),
        sector: "alimentación".to_string(),
        ubicacion: "Andalucía".to_string(),
        descripcion: "Conservera con marca propia y exportación a 12 países.".to_string(),
        facturacion: "25 M EUR".to_string(),
        ebitda: "3,1 M EUR".to_string(),
        empleados: "140".to_string(),
        motivo_operacion: "Relevo generacional.".to_string(),
        contacto_asesor: String::new(),
    };
    let blocks = render_blocks(&DocumentFields::Teaser(teaser)).expect("bloques");
    assert_eq!(blocks[0], RenderedBlock::Heading("PROYECTO ATLAS".to_string()));
    assert!(blocks.iter().all(|b| match b {
        RenderedBlock::Paragraph(text) | RenderedBlock::Heading(text) => !text.contains("Contacto:"),
    }));
}

#[test]
fn wrap_text_breaks_on_words_and_splits_long_ones() {
    assert_eq!(
        wrap_text("uno dos tres cuatro cinco", 9),
        vec!["uno dos", "tres", "cuatro", "cinco"]
    );
    assert_eq!(
        wrap_text("supercalifragilistico es", 5),
        vec!["super", "calif", "ragil", "istic", "o es"]
    );
    assert!(wrap_text("   ", 10).is_empty());
}

#[test]
fn heading_is_never_left_alone_at_page_bottom() {
    let blocks = vec![
        RenderedBlock::Paragraph("aaaa bbbb cccc dddd eeee ffff".to_string()),
        RenderedBlock::Heading("Cláusula".to_string()),
        RenderedBlock::Paragraph("gggg".to_string()),
    ];
    // 3 líneas + espacio + título (2) + 1 línea no caben en 6
    let pages = paginate(&blocks, &small_layout(9, 6));
    assert_eq!(pages.len(), 2);
    assert_eq!(
        pages[0],
        vec![PageItem::Lines(vec![
            "aaaa bbbb".to_string(),
            "cccc dddd".to_string(),
            "eeee ffff".to_string(),
        ])]
    );
    assert_eq!(
        pages[1],
        vec![
            PageItem::Heading("Cláusula".to_string()),
            PageItem::Lines(vec!["gggg".to_string()]),
        ]
    );
}

#[test]
fn heading_fits_when_there_is_room() {
    let blocks = vec![
        RenderedBlock::Paragraph("uno dos tres cuatro cinco seis".to_string()),
        RenderedBlock::Heading("Título".to_string()),
        RenderedBlock::Paragraph("a b c".to_string()),
    ];
    let pages = paginate(&blocks, &small_layout(20, 6));
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].len(), 3);
}

#[test]
fn long_paragraph_continues_on_next_page() {
    let text = vec!["palabra"; 8].join(" ");
    let blocks = vec![RenderedBlock::Paragraph(text)];
    let pages = paginate(&blocks, &small_layout(7, 6));
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0], vec![PageItem::Lines(vec!["palabra".to_string(); 6])]);
    assert_eq!(pages[1], vec![PageItem::Lines(vec!["palabra".to_string(); 2])]);
}

#[test]
fn empty_document_still_has_one_page() {
    let pages = paginate(&[], &DocumentLayout::default());
    assert_eq!(pages.len(), 1);
    let html = render_html(DocumentKind::Nda, &pages);
    assert_eq!(html.matches("class=\"page\"").count(), 1);
}

#[test]
fn preview_escapes_user_input() {
    let mut fields = loi();
    fields.comprador = "<script>alert('x')</script> & Cía".to_string();
    let preview = service()
        .preview(&DocumentFields::Loi(fields))
        .expect("vista previa");

    assert_eq!(preview.kind, DocumentKind::Loi);
    assert!(preview.pages >= 1);
    assert_eq!(preview.html.matches("class=\"page\"").count(), preview.pages);
    assert!(!preview.html.contains("<script>"));
    assert!(preview.html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; Cía"));
    assert!(preview.html.contains("<h2>CARTA DE INTENCIONES</h2>"));
}

#[actix_rt::test]
async fn generate_validates_fields_before_rendering_pdf() {
    let mut fields = loi();
    fields.comprador.clear();
    let result = service()
        .generate(&DocumentRequest {
            documento: DocumentFields::Loi(fields),
            file_name: None,
            mandato_id: None,
            store_local: false,
        })
        .await;
    assert!(matches!(result, Err(ApiError::BadRequest(_))));
}

#[test]
fn file_names_are_sanitized() {
    assert_eq!(sanitize_file_name("Informe final (v2).pdf"), "Informe_final__v2.pdf");
    assert_eq!(sanitize_file_name("../../etc/passwd"), "etc_passwd.pdf");
    assert_eq!(sanitize_file_name("   "), "documento.pdf");
}
