//! Chart templates (`.crtx`): a chart definition plus optional style, colors and theme override.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use crate::chart::{plot_type_element, ChartType};
use crate::error::{DrawingError, Result};
use crate::package::{OpcPackage, Package, PackageLimits};
use crate::path::resolve_target;
use crate::relationships::{
    REL_TYPE_CHART, REL_TYPE_CHART_COLOR_STYLE, REL_TYPE_CHART_STYLE, REL_TYPE_THEME_OVERRIDE,
};
use crate::xml::{XmlElement, XmlNode};

/// Chart-definition elements that point at template-local relationships, which aren't carried
/// over into the workbook.
const TEMPLATE_LOCAL_REFS: &[&str] = &["externalData", "userShapes"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartTemplate {
    /// `c:chartSpace` document.
    pub chart_xml: Vec<u8>,
    /// `cs:chartStyle` document.
    pub style_xml: Option<Vec<u8>>,
    /// `cs:colorStyle` document.
    pub colors_xml: Option<Vec<u8>>,
    /// `a:themeOverride` document.
    pub theme_override_xml: Option<Vec<u8>>,
}

impl ChartTemplate {
    pub fn from_parts(
        chart_xml: impl Into<Vec<u8>>,
        style_xml: Option<Vec<u8>>,
        colors_xml: Option<Vec<u8>>,
        theme_override_xml: Option<Vec<u8>>,
    ) -> Self {
        Self {
            chart_xml: chart_xml.into(),
            style_xml,
            colors_xml,
            theme_override_xml,
        }
    }

    /// Read a `.crtx` container from memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| {
            DrawingError::InvalidInput(format!("can't open chart template {}: {err}", path.display()))
        })?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        Self::from_reader_limited(reader, PackageLimits::default())
    }

    pub fn from_reader_limited<R: Read + Seek>(reader: R, limits: PackageLimits) -> Result<Self> {
        let pkg = match OpcPackage::from_reader(reader, limits) {
            Ok(pkg) => pkg,
            Err(DrawingError::Zip(zip::result::ZipError::Io(err))) | Err(DrawingError::Io(err)) => {
                return Err(DrawingError::InvalidInput(format!(
                    "can't read chart template: {err}"
                )))
            }
            Err(DrawingError::Zip(err)) => {
                return Err(DrawingError::TemplateCorrupt(format!(
                    "not a chart template container: {err}"
                )))
            }
            Err(err) => return Err(err),
        };
        Self::from_package(&pkg)
    }

    /// Collect the template parts from an opened `.crtx` package.
    pub fn from_package<P: Package + ?Sized>(pkg: &P) -> Result<Self> {
        let chart_part = locate_chart_part(pkg)?
            .ok_or_else(|| DrawingError::TemplateCorrupt("no chart part".to_string()))?;
        let chart_xml = pkg
            .part(&chart_part)
            .ok_or_else(|| DrawingError::TemplateCorrupt(format!("missing {chart_part}")))?
            .to_vec();

        let mut template = Self::from_parts(chart_xml, None, None, None);
        for rel in pkg.relationships(&chart_part)?.iter().filter(|r| !r.is_external()) {
            let slot = match rel.type_uri.as_str() {
                REL_TYPE_CHART_STYLE => &mut template.style_xml,
                REL_TYPE_CHART_COLOR_STYLE => &mut template.colors_xml,
                REL_TYPE_THEME_OVERRIDE => &mut template.theme_override_xml,
                _ => continue,
            };
            let target = resolve_target(&chart_part, &rel.target);
            if let Some(bytes) = pkg.part(&target) {
                *slot = Some(bytes.to_vec());
            }
        }
        Ok(template)
    }

    /// Parse and validate the template into the pieces a new chart is seeded with.
    ///
    /// The first data series is detached from the plot area and kept as the series template.
    pub(crate) fn prepare(&self, pivot_source: Option<&str>) -> Result<PreparedTemplate> {
        let mut chart_space = XmlElement::parse_bytes(&self.chart_xml)
            .map_err(|err| DrawingError::TemplateCorrupt(format!("chart definition: {err}")))?;
        if chart_space.local_name() != "chartSpace" {
            return Err(DrawingError::TemplateCorrupt(format!(
                "expected <chartSpace>, found <{}>",
                chart_space.name
            )));
        }

        let plot_area = chart_space
            .child_mut("chart")
            .and_then(|chart| chart.child_mut("plotArea"))
            .ok_or_else(|| DrawingError::TemplateCorrupt("chart has no plot area".to_string()))?;
        let series_template = take_first_series(plot_area)?;

        let chart_type = plot_type_element(&chart_space)
            .ok_or_else(|| DrawingError::TemplateCorrupt("no chart type element".to_string()))
            .and_then(|el| {
                ChartType::from_plot_element(el).ok_or_else(|| {
                    DrawingError::TemplateCorrupt(format!("unknown chart type <{}>", el.name))
                })
            })?;

        chart_space
            .children
            .retain(|c| !matches!(c, XmlNode::Element(el) if TEMPLATE_LOCAL_REFS.contains(&el.local_name())));
        if let Some(name) = pivot_source {
            set_pivot_source(&mut chart_space, name);
        }

        Ok(PreparedTemplate {
            chart_space,
            chart_type,
            series_template,
            style: parse_optional(self.style_xml.as_deref(), "chart style")?,
            colors: parse_optional(self.colors_xml.as_deref(), "chart colors")?,
            theme_override: parse_optional(self.theme_override_xml.as_deref(), "theme override")?,
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PreparedTemplate {
    pub chart_space: XmlElement,
    pub chart_type: ChartType,
    pub series_template: Option<String>,
    pub style: Option<XmlElement>,
    pub colors: Option<XmlElement>,
    pub theme_override: Option<XmlElement>,
}

fn locate_chart_part<P: Package + ?Sized>(pkg: &P) -> Result<Option<String>> {
    let root_rels = pkg.relationships("")?;
    if let Some(rel) = root_rels
        .iter()
        .find(|r| r.type_uri == REL_TYPE_CHART && !r.is_external())
    {
        let part = resolve_target("", &rel.target);
        if pkg.part_exists(&part) {
            return Ok(Some(part));
        }
    }

    // Some producers omit the package relationship; fall back to the conventional location.
    for candidate in ["chart/chart.xml", "chart/chart1.xml"] {
        if pkg.part_exists(candidate) {
            return Ok(Some(candidate.to_string()));
        }
    }
    Ok(None)
}

/// Detach the first `c:ser` of any chart-type element in the plot area and return its inner XML.
fn take_first_series(plot_area: &mut XmlElement) -> Result<Option<String>> {
    for group in plot_area
        .elements_mut()
        .filter(|el| el.local_name().ends_with("Chart"))
    {
        if let Some(idx) = group.child_position("ser") {
            let XmlNode::Element(series) = group.children.remove(idx) else {
                continue;
            };
            return series.inner_xml().map(Some);
        }
    }
    Ok(None)
}

fn set_pivot_source(chart_space: &mut XmlElement, name: &str) {
    let prefix = chart_space.prefix().map(|p| format!("{p}:")).unwrap_or_default();
    let node = XmlElement::new(format!("{prefix}pivotSource"))
        .with_child(XmlElement::new(format!("{prefix}name")).with_text(name))
        .with_child(XmlElement::new(format!("{prefix}fmtId")).with_attr("val", "0"));
    if let Some(existing) = chart_space.child_mut("pivotSource") {
        *existing = node;
        return;
    }
    let insert_at = chart_space
        .child_position("protection")
        .or_else(|| chart_space.child_position("chart"))
        .unwrap_or(chart_space.children.len());
    chart_space.children.insert(insert_at, XmlNode::Element(node));
}

fn parse_optional(xml: Option<&[u8]>, what: &str) -> Result<Option<XmlElement>> {
    xml.map(|bytes| {
        XmlElement::parse_bytes(bytes)
            .map_err(|err| DrawingError::TemplateCorrupt(format!("{what}: {err}")))
    })
    .transpose()
}
