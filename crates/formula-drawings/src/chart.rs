//! Chart types and the `c:chartSpace` documents behind chart drawings.

use crate::anchor::{CHART_NS, DRAWINGML_NS};
use crate::binder::next_free_part_name;
use crate::content_types::{CT_CHART, CT_CHART_COLORS, CT_CHART_STYLE, CT_THEME_OVERRIDE};
use crate::error::{DrawingError, Result};
use crate::package::Package;
use crate::path::resolve_target;
use crate::relationships::{
    TargetMode, REL_NS, REL_TYPE_CHART, REL_TYPE_CHART_COLOR_STYLE, REL_TYPE_CHART_STYLE,
    REL_TYPE_THEME_OVERRIDE,
};
use crate::xml::{XmlElement, XmlNode};

/// Chart style used when a chart doesn't carry a `c:style` of its own.
pub const DEFAULT_CHART_STYLE: u32 = 2;

/// First id handed out to template chart styles that don't carry one.
pub const FIRST_CHART_STYLE_ID: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartType {
    ColumnClustered,
    ColumnStacked,
    ColumnStacked100,
    ColumnClustered3D,
    ColumnStacked3D,
    Column3D,
    BarClustered,
    BarStacked,
    BarStacked100,
    BarClustered3D,
    Line,
    LineStacked,
    LineStacked100,
    LineMarkers,
    LineMarkersStacked,
    Line3D,
    Pie,
    Pie3D,
    PieOfPie,
    BarOfPie,
    Doughnut,
    Area,
    AreaStacked,
    AreaStacked100,
    Area3D,
    XYScatter,
    XYScatterSmooth,
    XYScatterSmoothNoMarkers,
    XYScatterLinesNoMarkers,
    Radar,
    RadarMarkers,
    RadarFilled,
    Bubble,
    Surface,
    SurfaceWireframe,
    SurfaceTopView,
    SurfaceTopViewWireframe,
    StockHLC,
    StockOHLC,
    StockVOHLC,
}

impl ChartType {
    /// Whether charts of this type can be created from scratch.
    pub fn is_supported(self) -> bool {
        !matches!(
            self,
            ChartType::StockHLC | ChartType::StockOHLC | ChartType::StockVOHLC
        )
    }

    /// Local name of the plot-area element holding series of this type.
    pub fn plot_element(self) -> &'static str {
        use ChartType::*;
        match self {
            ColumnClustered | ColumnStacked | ColumnStacked100 | BarClustered | BarStacked
            | BarStacked100 => "barChart",
            ColumnClustered3D | ColumnStacked3D | Column3D | BarClustered3D => "bar3DChart",
            Line | LineStacked | LineStacked100 | LineMarkers | LineMarkersStacked => "lineChart",
            Line3D => "line3DChart",
            Pie => "pieChart",
            Pie3D => "pie3DChart",
            PieOfPie | BarOfPie => "ofPieChart",
            Doughnut => "doughnutChart",
            Area | AreaStacked | AreaStacked100 => "areaChart",
            Area3D => "area3DChart",
            XYScatter | XYScatterSmooth | XYScatterSmoothNoMarkers | XYScatterLinesNoMarkers => {
                "scatterChart"
            }
            Radar | RadarMarkers | RadarFilled => "radarChart",
            Bubble => "bubbleChart",
            Surface | SurfaceWireframe => "surface3DChart",
            SurfaceTopView | SurfaceTopViewWireframe => "surfaceChart",
            StockHLC | StockOHLC | StockVOHLC => "stockChart",
        }
    }

    /// Resolve the chart type of a plot-area element (`c:barChart`, `c:pieChart`, ...).
    ///
    /// Sub-types are read from the element's settings (`c:barDir`, `c:grouping`,
    /// `c:scatterStyle`, ...). Returns `None` for elements that aren't chart-type elements.
    pub fn from_plot_element(el: &XmlElement) -> Option<Self> {
        use ChartType::*;
        fn setting<'a>(el: &'a XmlElement, local: &str) -> Option<&'a str> {
            el.child(local).and_then(|c| c.attr("val"))
        }
        let val = |local: &str| setting(el, local);
        let horizontal = val("barDir") == Some("bar");
        let grouping = val("grouping").unwrap_or("standard");
        let flag = |local: &str| matches!(val(local), Some("1") | Some("true"));

        let chart_type = match el.local_name() {
            "barChart" => match (horizontal, grouping) {
                (false, "stacked") => ColumnStacked,
                (false, "percentStacked") => ColumnStacked100,
                (false, _) => ColumnClustered,
                (true, "stacked") => BarStacked,
                (true, "percentStacked") => BarStacked100,
                (true, _) => BarClustered,
            },
            "bar3DChart" => match grouping {
                _ if horizontal => BarClustered3D,
                "stacked" | "percentStacked" => ColumnStacked3D,
                "standard" => Column3D,
                _ => ColumnClustered3D,
            },
            "lineChart" => match (flag("marker"), grouping) {
                (true, "stacked") => LineMarkersStacked,
                (true, _) => LineMarkers,
                (false, "stacked") => LineStacked,
                (false, "percentStacked") => LineStacked100,
                (false, _) => Line,
            },
            "line3DChart" => Line3D,
            "pieChart" => Pie,
            "pie3DChart" => Pie3D,
            "ofPieChart" => match val("ofPieType") {
                Some("bar") => BarOfPie,
                _ => PieOfPie,
            },
            "doughnutChart" => Doughnut,
            "areaChart" => match grouping {
                "stacked" => AreaStacked,
                "percentStacked" => AreaStacked100,
                _ => Area,
            },
            "area3DChart" => Area3D,
            "scatterChart" => match val("scatterStyle") {
                Some("smoothMarker") => XYScatterSmooth,
                Some("smooth") => XYScatterSmoothNoMarkers,
                Some("line") => XYScatterLinesNoMarkers,
                _ => XYScatter,
            },
            "radarChart" => match val("radarStyle") {
                Some("marker") => RadarMarkers,
                Some("filled") => RadarFilled,
                _ => Radar,
            },
            "bubbleChart" => Bubble,
            "surface3DChart" if flag("wireframe") => SurfaceWireframe,
            "surface3DChart" => Surface,
            "surfaceChart" if flag("wireframe") => SurfaceTopViewWireframe,
            "surfaceChart" => SurfaceTopView,
            "stockChart" => StockHLC,
            _ => return None,
        };
        Some(chart_type)
    }

    fn grouping(self) -> Option<&'static str> {
        use ChartType::*;
        match self {
            ColumnClustered | BarClustered | ColumnClustered3D | BarClustered3D => Some("clustered"),
            ColumnStacked | BarStacked | ColumnStacked3D | LineStacked | LineMarkersStacked
            | AreaStacked => Some("stacked"),
            ColumnStacked100 | BarStacked100 | LineStacked100 | AreaStacked100 => {
                Some("percentStacked")
            }
            Column3D | Line | LineMarkers | Line3D | Area | Area3D => Some("standard"),
            _ => None,
        }
    }

    fn has_axes(self) -> bool {
        !matches!(
            self,
            ChartType::Pie | ChartType::Pie3D | ChartType::PieOfPie | ChartType::BarOfPie | ChartType::Doughnut
        )
    }

    fn is_horizontal(self) -> bool {
        matches!(
            self,
            ChartType::BarClustered
                | ChartType::BarStacked
                | ChartType::BarStacked100
                | ChartType::BarClustered3D
        )
    }
}

/// Facts about a chart read from its `c:chartSpace` document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartSpaceInfo {
    pub chart_type: Option<ChartType>,
    pub pivot_source: Option<String>,
    pub style: Option<u32>,
}

impl ChartSpaceInfo {
    pub fn read(chart_space: &XmlElement) -> Self {
        Self {
            chart_type: plot_type_element(chart_space).and_then(ChartType::from_plot_element),
            pivot_source: chart_space
                .child("pivotSource")
                .and_then(|p| p.child("name"))
                .map(|n| n.text()),
            style: chart_style(chart_space),
        }
    }
}

/// First child of `c:chart/c:plotArea` whose local name ends with `Chart`.
pub(crate) fn plot_type_element(chart_space: &XmlElement) -> Option<&XmlElement> {
    chart_space
        .child("chart")?
        .child("plotArea")?
        .elements()
        .find(|el| el.local_name().ends_with("Chart"))
}

fn chart_style(chart_space: &XmlElement) -> Option<u32> {
    if let Some(style) = chart_space.child("style") {
        return style.attr("val")?.trim().parse().ok();
    }
    // Excel 2010+ writes the style inside mc:AlternateContent (c14:style, fallback c:style).
    chart_space
        .child("AlternateContent")?
        .descendant("style")?
        .attr("val")?
        .trim()
        .parse()
        .ok()
}

/// Set `c:style`, inserting it before `c:clrMapOvr` / `c:pivotSource` / `c:chart` when absent.
pub(crate) fn set_chart_style(chart_space: &mut XmlElement, style: u32) {
    let prefix = chart_space.prefix().map(str::to_string);
    if let Some(existing) = chart_space.child_mut("style") {
        existing.set_attr("val", style.to_string());
        return;
    }
    let node = XmlElement::new(qualified(prefix.as_deref(), "style")).with_attr("val", style.to_string());
    let insert_at = chart_space
        .children
        .iter()
        .position(|child| match child {
            XmlNode::Element(el) => matches!(
                el.local_name(),
                "clrMapOvr" | "pivotSource" | "protection" | "chart"
            ),
            XmlNode::Text(_) => false,
        })
        .unwrap_or(chart_space.children.len());
    chart_space.children.insert(insert_at, XmlNode::Element(node));
}

fn qualified(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.to_string(),
    }
}

fn c(local: &str) -> XmlElement {
    XmlElement::new(format!("c:{local}"))
}

fn c_val(local: &str, val: impl Into<String>) -> XmlElement {
    c(local).with_attr("val", val)
}

/// A fresh `c:chartSpace` for a chart of `chart_type` with no series.
pub fn new_chart_space(chart_type: ChartType, pivot_source: Option<&str>) -> XmlElement {
    let mut plot = c(chart_type.plot_element());
    if matches!(chart_type.plot_element(), "barChart" | "bar3DChart") {
        plot.push(c_val("barDir", if chart_type.is_horizontal() { "bar" } else { "col" }));
    }
    if let Some(grouping) = chart_type.grouping() {
        plot.push(c_val("grouping", grouping));
    }
    match chart_type {
        ChartType::XYScatter => plot.push(c_val("scatterStyle", "lineMarker")),
        ChartType::XYScatterSmooth => plot.push(c_val("scatterStyle", "smoothMarker")),
        ChartType::XYScatterSmoothNoMarkers => plot.push(c_val("scatterStyle", "smooth")),
        ChartType::XYScatterLinesNoMarkers => plot.push(c_val("scatterStyle", "line")),
        ChartType::Radar => plot.push(c_val("radarStyle", "standard")),
        ChartType::RadarMarkers => plot.push(c_val("radarStyle", "marker")),
        ChartType::RadarFilled => plot.push(c_val("radarStyle", "filled")),
        ChartType::PieOfPie => plot.push(c_val("ofPieType", "pie")),
        ChartType::BarOfPie => plot.push(c_val("ofPieType", "bar")),
        ChartType::Surface | ChartType::SurfaceTopView => plot.push(c_val("wireframe", "0")),
        ChartType::SurfaceWireframe | ChartType::SurfaceTopViewWireframe => {
            plot.push(c_val("wireframe", "1"))
        }
        ChartType::LineMarkers | ChartType::LineMarkersStacked => plot.push(c_val("marker", "1")),
        _ => {}
    }

    let mut plot_area = c("plotArea").with_child(c("layout"));
    if chart_type.has_axes() {
        plot.push(c_val("axId", "1"));
        plot.push(c_val("axId", "2"));
        plot_area.push(plot);
        let (first, second) = match chart_type.plot_element() {
            "scatterChart" | "bubbleChart" => ("valAx", "valAx"),
            _ => ("catAx", "valAx"),
        };
        let (first_pos, second_pos) = if chart_type.is_horizontal() { ("l", "b") } else { ("b", "l") };
        plot_area.push(axis(first, 1, 2, first_pos));
        plot_area.push(axis(second, 2, 1, second_pos));
    } else {
        plot_area.push(plot);
    }

    let chart = c("chart")
        .with_child(plot_area)
        .with_child(c_val("plotVisOnly", "1"));

    let mut space = c("chartSpace")
        .with_attr("xmlns:c", CHART_NS)
        .with_attr("xmlns:a", DRAWINGML_NS)
        .with_attr("xmlns:r", REL_NS)
        .with_child(c_val("date1904", "0"))
        .with_child(c_val("roundedCorners", "0"));
    if let Some(name) = pivot_source {
        space.push(
            c("pivotSource")
                .with_child(c("name").with_text(name))
                .with_child(c_val("fmtId", "0")),
        );
    }
    space.push(chart);
    space
}

fn axis(tag: &str, id: u32, cross: u32, pos: &str) -> XmlElement {
    c(tag)
        .with_child(c_val("axId", id.to_string()))
        .with_child(c_val("axPos", pos))
        .with_child(c_val("crossAx", cross.to_string()))
}

/// Package parts owned by a chart drawing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chart {
    pub chart_type: ChartType,
    /// `xl/charts/chart{n}.xml`.
    pub part_name: String,
    /// Relationship id on the drawing part targeting `part_name`.
    pub rel_id: String,
    pub pivot_source: Option<String>,
    /// Effective `c:style` of the chart.
    pub style: u32,
    pub style_part: Option<String>,
    pub colors_part: Option<String>,
    pub theme_override_part: Option<String>,
}

impl Chart {
    /// Resolve the chart behind `rel_id` on the drawing part.
    pub(crate) fn load<P: Package + ?Sized>(
        pkg: &P,
        drawing_part: &str,
        rel_id: &str,
    ) -> Result<Option<Self>> {
        let rels = pkg.relationships(drawing_part)?;
        let Some(rel) = rels.get(rel_id).filter(|rel| !rel.is_external()) else {
            return Ok(None);
        };
        let part_name = resolve_target(drawing_part, &rel.target);
        let Some(bytes) = pkg.part(&part_name) else {
            return Ok(None);
        };
        let space = XmlElement::parse_bytes(bytes)?;
        let info = ChartSpaceInfo::read(&space);
        let Some(chart_type) = info.chart_type else {
            return Ok(None);
        };

        let mut chart = Chart {
            chart_type,
            part_name: part_name.clone(),
            rel_id: rel_id.to_string(),
            pivot_source: info.pivot_source,
            style: info.style.unwrap_or(DEFAULT_CHART_STYLE),
            style_part: None,
            colors_part: None,
            theme_override_part: None,
        };
        for rel in pkg.relationships(&part_name)?.iter().filter(|r| !r.is_external()) {
            let target = resolve_target(&part_name, &rel.target);
            match rel.type_uri.as_str() {
                REL_TYPE_CHART_STYLE => chart.style_part = Some(target),
                REL_TYPE_CHART_COLOR_STYLE => chart.colors_part = Some(target),
                REL_TYPE_THEME_OVERRIDE => chart.theme_override_part = Some(target),
                _ => {}
            }
        }
        Ok(Some(chart))
    }

    /// Create `xl/charts/chart{n}.xml` holding `chart_space` and link it from the drawing part.
    pub(crate) fn create<P: Package + ?Sized>(
        pkg: &mut P,
        drawing_part: &str,
        chart_space: &XmlElement,
    ) -> Result<Self> {
        let info = ChartSpaceInfo::read(chart_space);
        let chart_type = info
            .chart_type
            .ok_or_else(|| DrawingError::Invalid("chart has no chart-type element".to_string()))?;

        let part_name = next_free_part_name(&*pkg, 1, |n| format!("xl/charts/chart{n}.xml"));
        pkg.create_part(&part_name, CT_CHART, chart_space.to_document_bytes()?)?;
        let rel_id =
            pkg.create_relationship(drawing_part, REL_TYPE_CHART, &part_name, TargetMode::Internal)?;

        Ok(Chart {
            chart_type,
            part_name,
            rel_id,
            pivot_source: info.pivot_source,
            style: info.style.unwrap_or(DEFAULT_CHART_STYLE),
            style_part: None,
            colors_part: None,
            theme_override_part: None,
        })
    }

    /// Attach a theme override part (`xl/theme/themeOverride{n}.xml`).
    pub(crate) fn attach_theme_override<P: Package + ?Sized>(
        &mut self,
        pkg: &mut P,
        xml: &[u8],
    ) -> Result<()> {
        let part = next_free_part_name(&*pkg, 1, |n| format!("xl/theme/themeOverride{n}.xml"));
        self.attach(pkg, &part, CT_THEME_OVERRIDE, REL_TYPE_THEME_OVERRIDE, xml)?;
        self.theme_override_part = Some(part);
        Ok(())
    }

    /// Attach a chart style part (`xl/charts/style{n}.xml`).
    pub(crate) fn attach_style<P: Package + ?Sized>(&mut self, pkg: &mut P, xml: &[u8]) -> Result<()> {
        let part = next_free_part_name(&*pkg, 1, |n| format!("xl/charts/style{n}.xml"));
        self.attach(pkg, &part, CT_CHART_STYLE, REL_TYPE_CHART_STYLE, xml)?;
        self.style_part = Some(part);
        Ok(())
    }

    /// Attach a chart color style part (`xl/charts/colors{n}.xml`).
    pub(crate) fn attach_colors<P: Package + ?Sized>(&mut self, pkg: &mut P, xml: &[u8]) -> Result<()> {
        let part = next_free_part_name(&*pkg, 1, |n| format!("xl/charts/colors{n}.xml"));
        self.attach(pkg, &part, CT_CHART_COLORS, REL_TYPE_CHART_COLOR_STYLE, xml)?;
        self.colors_part = Some(part);
        Ok(())
    }

    fn attach<P: Package + ?Sized>(
        &self,
        pkg: &mut P,
        part: &str,
        content_type: &str,
        rel_type: &str,
        xml: &[u8],
    ) -> Result<()> {
        pkg.create_part(part, content_type, xml.to_vec())?;
        pkg.create_relationship(&self.part_name, rel_type, part, TargetMode::Internal)?;
        Ok(())
    }

    /// Delete the chart part, its auxiliary parts and the drawing → chart relationship.
    pub(crate) fn release<P: Package + ?Sized>(&self, pkg: &mut P, drawing_part: &str) -> Result<()> {
        for part in [&self.style_part, &self.colors_part, &self.theme_override_part]
            .into_iter()
            .flatten()
        {
            pkg.delete_part(part)?;
        }
        pkg.delete_part(&self.part_name)?;
        pkg.delete_relationship(drawing_part, &self.rel_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: &[ChartType] = &[
        ChartType::ColumnClustered,
        ChartType::ColumnStacked,
        ChartType::ColumnStacked100,
        ChartType::ColumnClustered3D,
        ChartType::ColumnStacked3D,
        ChartType::Column3D,
        ChartType::BarClustered,
        ChartType::BarStacked,
        ChartType::BarStacked100,
        ChartType::BarClustered3D,
        ChartType::Line,
        ChartType::LineStacked,
        ChartType::LineStacked100,
        ChartType::LineMarkers,
        ChartType::LineMarkersStacked,
        ChartType::Line3D,
        ChartType::Pie,
        ChartType::Pie3D,
        ChartType::PieOfPie,
        ChartType::BarOfPie,
        ChartType::Doughnut,
        ChartType::Area,
        ChartType::AreaStacked,
        ChartType::AreaStacked100,
        ChartType::Area3D,
        ChartType::XYScatter,
        ChartType::XYScatterSmooth,
        ChartType::XYScatterSmoothNoMarkers,
        ChartType::XYScatterLinesNoMarkers,
        ChartType::Radar,
        ChartType::RadarMarkers,
        ChartType::RadarFilled,
        ChartType::Bubble,
        ChartType::Surface,
        ChartType::SurfaceWireframe,
        ChartType::SurfaceTopView,
        ChartType::SurfaceTopViewWireframe,
    ];

    #[test]
    fn generated_chart_spaces_resolve_to_their_type() {
        for &chart_type in ALL {
            let space = new_chart_space(chart_type, None);
            assert_eq!(
                ChartSpaceInfo::read(&space).chart_type,
                Some(chart_type),
                "{chart_type:?}"
            );
        }
    }

    #[test]
    fn stock_charts_are_unsupported() {
        assert!(!ChartType::StockHLC.is_supported());
        assert!(!ChartType::StockOHLC.is_supported());
        assert!(!ChartType::StockVOHLC.is_supported());
        assert!(ChartType::Pie.is_supported());
    }

    #[test]
    fn info_reads_pivot_source_and_style() {
        let mut space = new_chart_space(ChartType::Pie, Some("[Book1.xlsx]Sheet1!PivotTable1"));
        assert_eq!(ChartSpaceInfo::read(&space).style, None);
        set_chart_style(&mut space, 7);

        let reparsed = XmlElement::parse_bytes(&space.to_document_bytes().expect("write"))
            .expect("reparse");
        let info = ChartSpaceInfo::read(&reparsed);
        assert_eq!(info.pivot_source.as_deref(), Some("[Book1.xlsx]Sheet1!PivotTable1"));
        assert_eq!(info.style, Some(7));

        let order: Vec<&str> = reparsed.elements().map(|e| e.local_name()).collect();
        assert_eq!(
            order,
            vec!["date1904", "roundedCorners", "style", "pivotSource", "chart"]
        );
    }

    #[test]
    fn style_inside_alternate_content_is_found() {
        let xml = format!(
            r#"<c:chartSpace xmlns:c="{CHART_NS}" xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006" xmlns:c14="http://schemas.microsoft.com/office/drawing/2007/8/2/chart"><mc:AlternateContent><mc:Choice Requires="c14"><c14:style val="102"/></mc:Choice><mc:Fallback><c:style val="2"/></mc:Fallback></mc:AlternateContent><c:chart><c:plotArea><c:layout/><c:areaChart><c:grouping val="stacked"/></c:areaChart></c:plotArea></c:chart></c:chartSpace>"#
        );
        let info = ChartSpaceInfo::read(&XmlElement::parse(&xml).expect("parse"));
        assert_eq!(info.style, Some(102));
        assert_eq!(info.chart_type, Some(ChartType::AreaStacked));
    }
}
