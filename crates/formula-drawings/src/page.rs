use crate::error::{DrawingError, Result};
use crate::package::Package;
use crate::relationships::{rel_attr, REL_NS, REL_TYPE_DRAWING};
use crate::xml::XmlElement;

/// Elements that must follow `<drawing>` inside `<worksheet>` / `<chartsheet>`.
const AFTER_DRAWING: &[&str] = &[
    "legacyDrawing",
    "legacyDrawingHF",
    "drawingHF",
    "picture",
    "oleObjects",
    "controls",
    "webPublishItems",
    "tableParts",
    "extLst",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Worksheet,
    /// A chart sheet: holds a single chart and nothing else.
    ChartSheet,
}

/// The sheet part a drawings collection hangs off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub part_name: String,
    /// Workbook sheet id; seeds the drawing part name probe.
    pub sheet_id: u32,
    pub kind: PageKind,
}

impl Page {
    pub fn worksheet(part_name: impl Into<String>, sheet_id: u32) -> Self {
        Self {
            part_name: part_name.into(),
            sheet_id,
            kind: PageKind::Worksheet,
        }
    }

    pub fn chart_sheet(part_name: impl Into<String>, sheet_id: u32) -> Self {
        Self {
            part_name: part_name.into(),
            sheet_id,
            kind: PageKind::ChartSheet,
        }
    }

    pub fn is_chart_sheet(&self) -> bool {
        self.kind == PageKind::ChartSheet
    }

    pub(crate) fn load_xml<P: Package + ?Sized>(&self, pkg: &P) -> Result<XmlElement> {
        let bytes = pkg
            .part(&self.part_name)
            .ok_or_else(|| DrawingError::MissingPart(self.part_name.clone()))?;
        XmlElement::parse_bytes(bytes)
    }

    /// Relationship id of the page's `<drawing r:id="..."/>` reference, if any.
    ///
    /// The id is only returned when it resolves to a drawing relationship of the page.
    pub fn drawing_rel_id<P: Package + ?Sized>(&self, pkg: &P) -> Result<Option<String>> {
        let root = self.load_xml(pkg)?;
        let Some(id) = root.child("drawing").and_then(|d| rel_attr(d, "id")) else {
            return Ok(None);
        };
        let rels = pkg.relationships(&self.part_name)?;
        Ok(rels
            .get(id)
            .filter(|rel| rel.type_uri == REL_TYPE_DRAWING)
            .map(|rel| rel.id.clone()))
    }

    /// Write (or replace) the page's `<drawing r:id>` reference.
    pub fn set_drawing<P: Package + ?Sized>(&self, pkg: &mut P, rel_id: &str) -> Result<()> {
        let mut root = self.load_xml(pkg)?;
        let root_name = root.local_name();
        if root_name != "worksheet" && root_name != "chartsheet" {
            return Err(DrawingError::Invalid(format!(
                "{}: expected <worksheet> or <chartsheet>, found <{root_name}>",
                self.part_name
            )));
        }

        let r_prefix = ensure_r_namespace(&mut root);
        let r_id = format!("{r_prefix}:id");

        if let Some(existing) = root.child_mut("drawing") {
            existing.attrs.retain(|(k, _)| !k.ends_with(":id"));
            existing.set_attr(r_id, rel_id);
        } else {
            let tag = match root.prefix() {
                Some(prefix) => format!("{prefix}:drawing"),
                None => "drawing".to_string(),
            };
            let drawing = XmlElement::new(tag).with_attr(r_id, rel_id);
            let insert_at = root
                .children
                .iter()
                .position(|c| match c {
                    crate::xml::XmlNode::Element(el) => AFTER_DRAWING.contains(&el.local_name()),
                    crate::xml::XmlNode::Text(_) => false,
                })
                .unwrap_or(root.children.len());
            root.children
                .insert(insert_at, crate::xml::XmlNode::Element(drawing));
        }

        pkg.write_part(&self.part_name, root.to_document_bytes()?)
    }
}

/// Prefix bound to the relationships namespace on `root`, declaring `r` when absent.
fn ensure_r_namespace(root: &mut XmlElement) -> String {
    if let Some(prefix) = root
        .namespace_decls()
        .find(|(_, uri)| *uri == REL_NS)
        .and_then(|(prefix, _)| prefix)
    {
        return prefix.to_string();
    }
    root.declare_namespace("r", REL_NS);
    "r".to_string()
}
