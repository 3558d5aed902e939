#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{Cursor, Write};

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
pub const XDR_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing";
pub const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub const C_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/chart";

pub const REL_TYPE_DRAWING: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing";
pub const REL_TYPE_CHART: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/chart";
pub const REL_TYPE_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

/// Builds synthetic XLSX ZIPs with worksheets, chart sheets and optional pre-existing drawing
/// parts. Payloads aren't validated, so tests can hand in odd markup on purpose.
#[derive(Debug, Clone, Default)]
pub struct WorkbookBuilder {
    sheets: Vec<SheetFixture>,
    extra_parts: BTreeMap<String, (String, Vec<u8>)>,
}

#[derive(Debug, Clone)]
struct SheetFixture {
    chart_sheet: bool,
    drawing: Option<DrawingFixture>,
}

#[derive(Debug, Clone)]
struct DrawingFixture {
    /// Children of `xdr:wsDr`.
    body: String,
    rels: Vec<(String, String, String)>,
}

impl WorkbookBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn worksheet(mut self) -> Self {
        self.sheets.push(SheetFixture {
            chart_sheet: false,
            drawing: None,
        });
        self
    }

    pub fn chart_sheet(mut self) -> Self {
        self.sheets.push(SheetFixture {
            chart_sheet: true,
            drawing: None,
        });
        self
    }

    /// Worksheet referencing `xl/drawings/drawing{n}.xml` whose `xdr:wsDr` holds `body`.
    pub fn worksheet_with_drawing(mut self, body: impl Into<String>) -> Self {
        self.sheets.push(SheetFixture {
            chart_sheet: false,
            drawing: Some(DrawingFixture {
                body: body.into(),
                rels: Vec::new(),
            }),
        });
        self
    }

    /// Add a relationship to the drawing part of the most recently added sheet.
    pub fn drawing_rel(mut self, id: &str, type_uri: &str, target: &str) -> Self {
        let drawing = self
            .sheets
            .last_mut()
            .and_then(|sheet| sheet.drawing.as_mut())
            .expect("drawing_rel needs a sheet with a drawing");
        drawing
            .rels
            .push((id.to_string(), type_uri.to_string(), target.to_string()));
        self
    }

    pub fn part(mut self, name: &str, content_type: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.extra_parts
            .insert(name.to_string(), (content_type.to_string(), bytes.into()));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut parts: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        let mut overrides: Vec<(String, String)> = vec![(
            "xl/workbook.xml".to_string(),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml".to_string(),
        )];

        parts.insert(
            "_rels/.rels".to_string(),
            rels_xml(&[(
                "rId1".to_string(),
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument"
                    .to_string(),
                "xl/workbook.xml".to_string(),
            )])
            .into_bytes(),
        );

        let mut sheet_entries = String::new();
        let mut workbook_rels = Vec::new();
        let (mut worksheets, mut chart_sheets) = (0, 0);
        for (idx, sheet) in self.sheets.iter().enumerate() {
            let sheet_id = idx + 1;
            let (part, rel_type, content_type) = if sheet.chart_sheet {
                chart_sheets += 1;
                (
                    format!("xl/chartsheets/sheet{chart_sheets}.xml"),
                    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/chartsheet",
                    "application/vnd.openxmlformats-officedocument.spreadsheetml.chartsheet+xml",
                )
            } else {
                worksheets += 1;
                (
                    format!("xl/worksheets/sheet{worksheets}.xml"),
                    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet",
                    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml",
                )
            };
            let rel_id = format!("rId{sheet_id}");
            sheet_entries.push_str(&format!(
                r#"<sheet name="Sheet{sheet_id}" sheetId="{sheet_id}" r:id="{rel_id}"/>"#
            ));
            workbook_rels.push((
                rel_id,
                rel_type.to_string(),
                part.trim_start_matches("xl/").to_string(),
            ));
            overrides.push((part.clone(), content_type.to_string()));

            let drawing_ref = if let Some(drawing) = &sheet.drawing {
                let drawing_part = format!("xl/drawings/drawing{sheet_id}.xml");
                parts.insert(
                    drawing_part.clone(),
                    format!(
                        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><xdr:wsDr xmlns:xdr="{XDR_NS}" xmlns:a="{A_NS}" xmlns:r="{REL_NS}" xmlns:c="{C_NS}">{}</xdr:wsDr>"#,
                        drawing.body
                    )
                    .into_bytes(),
                );
                if !drawing.rels.is_empty() {
                    parts.insert(
                        format!("xl/drawings/_rels/drawing{sheet_id}.xml.rels"),
                        rels_xml(&drawing.rels).into_bytes(),
                    );
                }
                parts.insert(
                    rels_part_for(&part),
                    rels_xml(&[(
                        "rId1".to_string(),
                        REL_TYPE_DRAWING.to_string(),
                        format!("../drawings/drawing{sheet_id}.xml"),
                    )])
                    .into_bytes(),
                );
                overrides.push((
                    drawing_part,
                    "application/vnd.openxmlformats-officedocument.drawing+xml".to_string(),
                ));
                r#"<drawing r:id="rId1"/>"#
            } else {
                ""
            };

            let xml = if sheet.chart_sheet {
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><chartsheet xmlns="{MAIN_NS}" xmlns:r="{REL_NS}"><sheetPr/><sheetViews><sheetView workbookViewId="0"/></sheetViews>{drawing_ref}</chartsheet>"#
                )
            } else {
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="{MAIN_NS}" xmlns:r="{REL_NS}"><sheetData/>{drawing_ref}</worksheet>"#
                )
            };
            parts.insert(part, xml.into_bytes());
        }

        parts.insert(
            "xl/workbook.xml".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="{MAIN_NS}" xmlns:r="{REL_NS}"><sheets>{sheet_entries}</sheets></workbook>"#
            )
            .into_bytes(),
        );
        parts.insert(
            "xl/_rels/workbook.xml.rels".to_string(),
            rels_xml(&workbook_rels).into_bytes(),
        );

        for (name, (content_type, bytes)) in &self.extra_parts {
            overrides.push((name.clone(), content_type.clone()));
            parts.insert(name.clone(), bytes.clone());
        }
        parts.insert(
            "[Content_Types].xml".to_string(),
            content_types_xml(&overrides).into_bytes(),
        );

        write_zip(parts)
    }
}

fn rels_part_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

fn rels_xml(rels: &[(String, String, String)]) -> String {
    let mut out = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{PKG_REL_NS}">"#
    );
    for (id, type_uri, target) in rels {
        let mode = if target.starts_with("http") {
            r#" TargetMode="External""#
        } else {
            ""
        };
        out.push_str(&format!(
            r#"<Relationship Id="{id}" Type="{type_uri}" Target="{target}"{mode}/>"#
        ));
    }
    out.push_str("</Relationships>");
    out
}

fn content_types_xml(overrides: &[(String, String)]) -> String {
    let mut out = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/>"#,
    );
    for (part, content_type) in overrides {
        out.push_str(&format!(
            r#"<Override PartName="/{part}" ContentType="{content_type}"/>"#
        ));
    }
    out.push_str("</Types>");
    out
}

fn write_zip(parts: BTreeMap<String, Vec<u8>>) -> Vec<u8> {
    let cursor = Cursor::new(Vec::new());
    let mut zip = zip::ZipWriter::new(cursor);
    let options = zip::write::FileOptions::<()>::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for (name, bytes) in parts {
        zip.start_file(name, options).unwrap();
        zip.write_all(&bytes).unwrap();
    }

    zip.finish().unwrap().into_inner()
}

/// A `.crtx` container: chart part at `chart/chart.xml` plus optional style, colors and theme
/// override parts linked from it.
pub fn crtx(
    chart_xml: &str,
    style_xml: Option<&str>,
    colors_xml: Option<&str>,
    theme_xml: Option<&str>,
) -> Vec<u8> {
    let mut parts: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    parts.insert(
        "_rels/.rels".to_string(),
        rels_xml(&[(
            "rId1".to_string(),
            REL_TYPE_CHART.to_string(),
            "chart/chart.xml".to_string(),
        )])
        .into_bytes(),
    );
    parts.insert("chart/chart.xml".to_string(), chart_xml.as_bytes().to_vec());

    let mut chart_rels = Vec::new();
    let aux = [
        (
            style_xml,
            "chart/style1.xml",
            "http://schemas.microsoft.com/office/2011/relationships/chartStyle",
        ),
        (
            colors_xml,
            "chart/colors1.xml",
            "http://schemas.microsoft.com/office/2011/relationships/chartColorStyle",
        ),
        (
            theme_xml,
            "chart/theme/themeOverride1.xml",
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships/themeOverride",
        ),
    ];
    for (idx, (xml, part, rel_type)) in aux.into_iter().enumerate() {
        let Some(xml) = xml else { continue };
        parts.insert(part.to_string(), xml.as_bytes().to_vec());
        chart_rels.push((
            format!("rId{}", idx + 1),
            rel_type.to_string(),
            part.trim_start_matches("chart/").to_string(),
        ));
    }
    if !chart_rels.is_empty() {
        parts.insert(
            "chart/_rels/chart.xml.rels".to_string(),
            rels_xml(&chart_rels).into_bytes(),
        );
    }
    parts.insert(
        "[Content_Types].xml".to_string(),
        content_types_xml(&[(
            "chart/chart.xml".to_string(),
            "application/vnd.openxmlformats-officedocument.drawingml.chart+xml".to_string(),
        )])
        .into_bytes(),
    );
    write_zip(parts)
}
