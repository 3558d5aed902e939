mod support;

use formula_drawings::relationships::{
    REL_TYPE_CHART_COLOR_STYLE, REL_TYPE_CHART_STYLE, REL_TYPE_THEME_OVERRIDE,
};
use formula_drawings::{ChartTemplate, ChartType, DrawingError, Drawings, EditAs, Package};
use pretty_assertions::assert_eq;
use support::workbook_builder::crtx;
use support::{blank_package, chart_sheet_page, part_str, worksheet_page};

const STYLE_NS: &str = "http://schemas.microsoft.com/office/drawing/2012/chartStyle";

fn chart_xml(style: &str, plot: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><c:chartSpace xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><c:roundedCorners val="0"/>{style}<c:chart><c:autoTitleDeleted val="1"/><c:plotArea><c:layout/>{plot}<c:catAx><c:axId val="1"/></c:catAx><c:valAx><c:axId val="2"/></c:valAx></c:plotArea></c:chart><c:externalData r:id="rId9"><c:autoUpdate val="0"/></c:externalData></c:chartSpace>"#
    )
}

const TWO_SERIES_BAR: &str = r#"<c:barChart><c:barDir val="bar"/><c:grouping val="stacked"/><c:ser><c:idx val="0"/><c:order val="0"/><c:tx><c:v>Template</c:v></c:tx></c:ser><c:ser><c:idx val="1"/><c:order val="1"/></c:ser><c:overlap val="100"/><c:axId val="1"/><c:axId val="2"/></c:barChart>"#;

fn style_xml(id: Option<&str>) -> String {
    let id = id.map(|id| format!(r#" id="{id}""#)).unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><cs:chartStyle xmlns:cs="{STYLE_NS}" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"{id}><cs:axisTitle/></cs:chartStyle>"#
    )
}

fn colors_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><cs:colorStyle xmlns:cs="{STYLE_NS}" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" meth="cycle" id="10"><a:schemeClr val="accent1"/></cs:colorStyle>"#
    )
}

const THEME_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><a:themeOverride xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><a:clrScheme name="Custom"/></a:themeOverride>"#;

#[test]
fn template_seeds_a_new_chart_with_its_parts() {
    let style = style_xml(None);
    let colors = colors_xml();
    let bytes = crtx(
        &chart_xml("", TWO_SERIES_BAR),
        Some(&style),
        Some(&colors),
        Some(THEME_XML),
    );
    let template = ChartTemplate::from_bytes(&bytes).expect("read template");
    assert!(template.style_xml.is_some());
    assert!(template.colors_xml.is_some());
    assert!(template.theme_override_xml.is_some());

    let mut pkg = blank_package();
    let mut drawings = Drawings::new(worksheet_page());
    let handle = drawings
        .add_chart_from_template(&mut pkg, &template, "From template", None)
        .expect("import");

    let drawing = drawings.resolve(handle).expect("resolves");
    assert_eq!(drawing.edit_as(), EditAs::TwoCell);
    let chart = drawing.as_chart().expect("chart");
    assert_eq!(chart.chart_type, ChartType::BarStacked);
    assert_eq!(chart.style, 2);
    assert_eq!(
        drawings.series_template(),
        Some(r#"<c:idx val="0"/><c:order val="0"/><c:tx><c:v>Template</c:v></c:tx>"#)
    );

    let chart_part = part_str(&pkg, &chart.part_name);
    assert_eq!(chart_part.matches("<c:ser>").count(), 1, "{chart_part}");
    assert!(chart_part.contains(r#"<c:style val="2"/>"#), "{chart_part}");
    assert!(!chart_part.contains("externalData"), "{chart_part}");

    assert_eq!(chart.style_part.as_deref(), Some("xl/charts/style1.xml"));
    assert_eq!(chart.colors_part.as_deref(), Some("xl/charts/colors1.xml"));
    assert_eq!(
        chart.theme_override_part.as_deref(),
        Some("xl/theme/themeOverride1.xml")
    );
    assert!(part_str(&pkg, "xl/charts/style1.xml").contains(r#"id="100""#));

    let rel_types: Vec<String> = pkg
        .relationships(&chart.part_name)
        .expect("chart rels")
        .iter()
        .map(|rel| rel.type_uri.clone())
        .collect();
    assert_eq!(
        rel_types,
        vec![
            REL_TYPE_THEME_OVERRIDE.to_string(),
            REL_TYPE_CHART_STYLE.to_string(),
            REL_TYPE_CHART_COLOR_STYLE.to_string(),
        ]
    );
}

#[test]
fn chart_style_and_style_ids() {
    let own_style = crtx(
        &chart_xml(r#"<c:style val="34"/>"#, TWO_SERIES_BAR),
        Some(&style_xml(None)),
        None,
        None,
    );
    let keeps_id = crtx(
        &chart_xml("", TWO_SERIES_BAR),
        Some(&style_xml(Some("251"))),
        None,
        None,
    );

    let mut pkg = blank_package();
    let mut drawings = Drawings::new(worksheet_page());
    let first = ChartTemplate::from_bytes(&own_style).expect("template");
    drawings
        .add_chart_from_template(&mut pkg, &first, "First", None)
        .expect("first");
    drawings
        .add_chart_from_template(&mut pkg, &first, "Second", None)
        .expect("second");
    drawings
        .add_chart_from_template(
            &mut pkg,
            &ChartTemplate::from_bytes(&keeps_id).expect("template"),
            "Third",
            None,
        )
        .expect("third");

    let styles: Vec<u32> = drawings
        .iter()
        .filter_map(|d| d.as_chart())
        .map(|c| c.style)
        .collect();
    assert_eq!(styles, vec![34, 34, 2]);
    assert!(part_str(&pkg, "xl/charts/style1.xml").contains(r#"id="100""#));
    assert!(part_str(&pkg, "xl/charts/style2.xml").contains(r#"id="101""#));
    assert!(part_str(&pkg, "xl/charts/style3.xml").contains(r#"id="251""#));
}

#[test]
fn pivot_source_is_written_into_the_chart() {
    let template = ChartTemplate::from_parts(chart_xml("", TWO_SERIES_BAR), None, None, None);
    let mut pkg = blank_package();
    let mut drawings = Drawings::new(worksheet_page());
    drawings
        .add_chart_from_template(&mut pkg, &template, "Pivot", Some("[Book1.xlsx]Sheet1!PivotTable1"))
        .expect("import");

    let chart = drawings.get(0).and_then(|d| d.as_chart()).expect("chart");
    assert_eq!(
        chart.pivot_source.as_deref(),
        Some("[Book1.xlsx]Sheet1!PivotTable1")
    );
    assert!(chart.style_part.is_none());
}

#[test]
fn corrupt_templates_leave_the_collection_untouched() {
    assert!(matches!(
        ChartTemplate::from_bytes(b"PK\x03\x04 but not really"),
        Err(DrawingError::TemplateCorrupt(_))
    ));

    let no_type = ChartTemplate::from_parts(
        chart_xml("", r#"<c:spPr/>"#),
        None,
        None,
        None,
    );
    let unparsable = ChartTemplate::from_parts(b"<c:chartSpace><c:chart>".to_vec(), None, None, None);

    let mut pkg = blank_package();
    let mut drawings = Drawings::new(worksheet_page());
    for template in [&no_type, &unparsable] {
        assert!(matches!(
            drawings.add_chart_from_template(&mut pkg, template, "Broken", None),
            Err(DrawingError::TemplateCorrupt(_))
        ));
    }
    assert!(drawings.is_empty());
    assert!(drawings.part_binding().is_none());
    assert!(drawings.series_template().is_none());
    assert!(!pkg.part_exists("xl/charts/chart1.xml"));
}

#[test]
fn registration_checks_run_before_the_template_is_read() {
    let broken = ChartTemplate::from_parts(b"not xml".to_vec(), None, None, None);
    let good = ChartTemplate::from_parts(chart_xml("", TWO_SERIES_BAR), None, None, None);

    let mut pkg = blank_package();
    let mut drawings = Drawings::new(chart_sheet_page());
    drawings
        .add_chart_from_template(&mut pkg, &good, "Only", None)
        .expect("first");

    assert!(matches!(
        drawings.add_chart_from_template(&mut pkg, &broken, "only", None),
        Err(DrawingError::DuplicateName(_))
    ));
    assert!(matches!(
        drawings.add_chart_from_template(&mut pkg, &broken, "Another", None),
        Err(DrawingError::ChartSheetCapacity)
    ));
    assert_eq!(drawings.len(), 1);
}

#[test]
fn templates_read_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bars.crtx");
    std::fs::write(&path, crtx(&chart_xml("", TWO_SERIES_BAR), None, None, None))
        .expect("write template");

    let template = ChartTemplate::from_path(&path).expect("read");
    assert!(template.style_xml.is_none());
    let prepared_type = {
        let mut pkg = blank_package();
        let mut drawings = Drawings::new(worksheet_page());
        drawings
            .add_chart_from_template(&mut pkg, &template, "Disk", None)
            .expect("import");
        drawings.get(0).and_then(|d| d.as_chart()).map(|c| c.chart_type)
    };
    assert_eq!(prepared_type, Some(ChartType::BarStacked));
}
