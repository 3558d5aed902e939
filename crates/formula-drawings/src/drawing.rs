use std::sync::atomic::{AtomicU64, Ordering};

use crate::anchor::{Anchor, EditAs};
use crate::chart::Chart;
use crate::error::Result;
use crate::images::{ImageStore, PictureType};
use crate::package::Package;
use crate::path::resolve_target;
use crate::relationships::{rel_attr, REL_TYPE_HYPERLINK, REL_TYPE_IMAGE};
use crate::xml::XmlElement;

/// `cNvPr/@id` of a drawing as written in the part. New drawings get an id above every existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DrawingId(pub u32);

/// Process-unique identity of a [`crate::Drawings`] collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollectionId(u64);

impl CollectionId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Non-owning handle to a drawing, resolved through the collection that issued it.
///
/// The key is allocated by the collection when the drawing is inserted, so handles stay distinct
/// even when a loaded part repeats or omits `cNvPr/@id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawingRef {
    pub owner: CollectionId,
    pub(crate) key: u64,
}

/// Preset shape geometries (`a:prstGeom/@prst`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeStyle {
    Rect,
    RoundRect,
    Ellipse,
    Triangle,
    RtTriangle,
    Diamond,
    Parallelogram,
    Trapezoid,
    Pentagon,
    Hexagon,
    Octagon,
    Star5,
    Plus,
    Heart,
    Cloud,
    Line,
    RightArrow,
    LeftArrow,
    UpArrow,
    DownArrow,
    LeftRightArrow,
    WedgeRectCallout,
    FlowChartProcess,
    FlowChartDecision,
    FlowChartTerminator,
}

impl ShapeStyle {
    pub fn preset(self) -> &'static str {
        match self {
            ShapeStyle::Rect => "rect",
            ShapeStyle::RoundRect => "roundRect",
            ShapeStyle::Ellipse => "ellipse",
            ShapeStyle::Triangle => "triangle",
            ShapeStyle::RtTriangle => "rtTriangle",
            ShapeStyle::Diamond => "diamond",
            ShapeStyle::Parallelogram => "parallelogram",
            ShapeStyle::Trapezoid => "trapezoid",
            ShapeStyle::Pentagon => "pentagon",
            ShapeStyle::Hexagon => "hexagon",
            ShapeStyle::Octagon => "octagon",
            ShapeStyle::Star5 => "star5",
            ShapeStyle::Plus => "plus",
            ShapeStyle::Heart => "heart",
            ShapeStyle::Cloud => "cloud",
            ShapeStyle::Line => "line",
            ShapeStyle::RightArrow => "rightArrow",
            ShapeStyle::LeftArrow => "leftArrow",
            ShapeStyle::UpArrow => "upArrow",
            ShapeStyle::DownArrow => "downArrow",
            ShapeStyle::LeftRightArrow => "leftRightArrow",
            ShapeStyle::WedgeRectCallout => "wedgeRectCallout",
            ShapeStyle::FlowChartProcess => "flowChartProcess",
            ShapeStyle::FlowChartDecision => "flowChartDecision",
            ShapeStyle::FlowChartTerminator => "flowChartTerminator",
        }
    }

    pub fn from_preset(preset: &str) -> Option<Self> {
        const ALL: &[ShapeStyle] = &[
            ShapeStyle::Rect,
            ShapeStyle::RoundRect,
            ShapeStyle::Ellipse,
            ShapeStyle::Triangle,
            ShapeStyle::RtTriangle,
            ShapeStyle::Diamond,
            ShapeStyle::Parallelogram,
            ShapeStyle::Trapezoid,
            ShapeStyle::Pentagon,
            ShapeStyle::Hexagon,
            ShapeStyle::Octagon,
            ShapeStyle::Star5,
            ShapeStyle::Plus,
            ShapeStyle::Heart,
            ShapeStyle::Cloud,
            ShapeStyle::Line,
            ShapeStyle::RightArrow,
            ShapeStyle::LeftArrow,
            ShapeStyle::UpArrow,
            ShapeStyle::DownArrow,
            ShapeStyle::LeftRightArrow,
            ShapeStyle::WedgeRectCallout,
            ShapeStyle::FlowChartProcess,
            ShapeStyle::FlowChartDecision,
            ShapeStyle::FlowChartTerminator,
        ];
        ALL.iter().copied().find(|style| style.preset() == preset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hyperlink {
    /// Relationship id on the drawing part.
    pub rel_id: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    /// Relationship id (`a:blip/@r:embed`) on the drawing part.
    pub rel_id: String,
    /// Resolved image part; `None` for linked or dangling images.
    pub image_part: Option<String>,
    pub picture_type: Option<PictureType>,
    pub hyperlink: Option<Hyperlink>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    /// Preset geometry; `None` for custom geometry, groups, connectors without a known preset and
    /// frames whose content couldn't be resolved.
    pub style: Option<ShapeStyle>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawingKind {
    Chart(Chart),
    Picture(Picture),
    Shape(Shape),
}

/// A drawing in a collection. Its anchor node lives in the collection's anchor tree at the same
/// position as the drawing itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drawing {
    /// Collection-scoped key behind [`DrawingRef`]; set when the drawing is inserted.
    pub(crate) key: u64,
    pub(crate) id: DrawingId,
    pub(crate) name: String,
    pub(crate) edit_as: EditAs,
    pub(crate) kind: DrawingKind,
}

impl Drawing {
    pub(crate) fn new(id: DrawingId, name: &str, edit_as: EditAs, kind: DrawingKind) -> Self {
        Self {
            key: 0,
            id,
            name: name.to_string(),
            edit_as,
            kind,
        }
    }

    pub fn id(&self) -> DrawingId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn edit_as(&self) -> EditAs {
        self.edit_as
    }

    pub fn kind(&self) -> &DrawingKind {
        &self.kind
    }

    pub fn as_chart(&self) -> Option<&Chart> {
        match &self.kind {
            DrawingKind::Chart(chart) => Some(chart),
            _ => None,
        }
    }

    pub fn as_picture(&self) -> Option<&Picture> {
        match &self.kind {
            DrawingKind::Picture(picture) => Some(picture),
            _ => None,
        }
    }

    pub fn as_shape(&self) -> Option<&Shape> {
        match &self.kind {
            DrawingKind::Shape(shape) => Some(shape),
            _ => None,
        }
    }

    /// Read a drawing back from an anchor node of `drawing_part`.
    ///
    /// Pictures register their image part with `images`. Content that can't be resolved (chart
    /// frames without a chart part, `mc:AlternateContent`, content parts) is loaded as an opaque
    /// shape.
    pub(crate) fn from_anchor<P: Package + ?Sized>(
        pkg: &P,
        drawing_part: &str,
        anchor: &XmlElement,
        images: &mut ImageStore,
    ) -> Result<Self> {
        let edit_as = Anchor::parse(anchor)
            .map(|a| a.edit_as())
            .or_else(|| EditAs::from_anchor_tag(anchor.local_name()))
            .unwrap_or(EditAs::TwoCell);
        let (id, name) = non_visual_props(anchor);

        let kind = match content_element(anchor) {
            Some(content) if content.local_name() == "graphicFrame" => {
                let chart = match content.descendant("chart").and_then(|c| rel_attr(c, "id")) {
                    Some(rel_id) => Chart::load(pkg, drawing_part, rel_id)?,
                    None => None,
                };
                match chart {
                    Some(chart) => DrawingKind::Chart(chart),
                    None => {
                        log::warn!(
                            "{drawing_part}: graphic frame {name:?} has no resolvable chart; loading it as an opaque shape"
                        );
                        DrawingKind::Shape(Shape {
                            style: None,
                            text: None,
                        })
                    }
                }
            }
            Some(content) if content.local_name() == "pic" => {
                DrawingKind::Picture(load_picture(pkg, drawing_part, content, images)?)
            }
            Some(content) if matches!(content.local_name(), "sp" | "cxnSp" | "grpSp") => {
                DrawingKind::Shape(Shape {
                    style: content
                        .descendant("prstGeom")
                        .and_then(|g| g.attr("prst"))
                        .and_then(ShapeStyle::from_preset),
                    text: shape_text(content),
                })
            }
            other => {
                log::warn!(
                    "{drawing_part}: unrecognised anchor content <{}>; loading it as an opaque shape",
                    other.map(|el| el.name.as_str()).unwrap_or("")
                );
                DrawingKind::Shape(Shape {
                    style: None,
                    text: None,
                })
            }
        };

        Ok(Drawing::new(id, &name, edit_as, kind))
    }
}

/// The drawing content element of an anchor (everything except geometry and `clientData`).
pub(crate) fn content_element(anchor: &XmlElement) -> Option<&XmlElement> {
    anchor
        .elements()
        .find(|el| !matches!(el.local_name(), "from" | "to" | "pos" | "ext" | "clientData"))
}

fn non_visual_props(anchor: &XmlElement) -> (DrawingId, String) {
    let Some(props) = anchor.descendant("cNvPr") else {
        return (DrawingId(0), String::new());
    };
    let id = props
        .attr("id")
        .and_then(|id| id.trim().parse().ok())
        .unwrap_or(0);
    (DrawingId(id), props.attr("name").unwrap_or_default().to_string())
}

fn load_picture<P: Package + ?Sized>(
    pkg: &P,
    drawing_part: &str,
    pic: &XmlElement,
    images: &mut ImageStore,
) -> Result<Picture> {
    let rels = pkg.relationships(drawing_part)?;
    let rel_id = pic
        .descendant("blip")
        .and_then(|blip| rel_attr(blip, "embed"))
        .unwrap_or_default()
        .to_string();

    let image_part = rels
        .get(&rel_id)
        .filter(|rel| rel.type_uri == REL_TYPE_IMAGE && !rel.is_external())
        .map(|rel| resolve_target(drawing_part, &rel.target))
        .filter(|part| pkg.part_exists(part));
    if let Some(part) = &image_part {
        if let Some(bytes) = pkg.part(part) {
            images.register_existing(part, bytes);
        }
    }
    let picture_type = image_part
        .as_deref()
        .and_then(|part| part.rsplit_once('.'))
        .and_then(|(_, ext)| PictureType::from_extension(ext));

    let hyperlink = pic
        .descendant("hlinkClick")
        .and_then(|link| rel_attr(link, "id"))
        .and_then(|id| rels.get(id))
        .filter(|rel| rel.type_uri == REL_TYPE_HYPERLINK)
        .map(|rel| Hyperlink {
            rel_id: rel.id.clone(),
            target: rel.target.clone(),
        });

    Ok(Picture {
        rel_id,
        image_part,
        picture_type,
        hyperlink,
    })
}

fn shape_text(shape: &XmlElement) -> Option<String> {
    let body = shape.child("txBody")?;
    let mut out = String::new();
    for (i, paragraph) in body.elements().filter(|el| el.local_name() == "p").enumerate() {
        if i > 0 {
            out.push('\n');
        }
        for run in paragraph.elements().filter(|el| el.local_name() == "r") {
            if let Some(t) = run.child("t") {
                out.push_str(&t.text());
            }
        }
    }
    (!out.is_empty()).then_some(out)
}

fn xdr(local: &str) -> XmlElement {
    XmlElement::new(format!("xdr:{local}"))
}

fn a(local: &str) -> XmlElement {
    XmlElement::new(format!("a:{local}"))
}

fn c_nv_pr(id: DrawingId, name: &str) -> XmlElement {
    xdr("cNvPr")
        .with_attr("id", id.0.to_string())
        .with_attr("name", name)
}

fn xfrm() -> XmlElement {
    a("xfrm")
        .with_child(a("off").with_attr("x", "0").with_attr("y", "0"))
        .with_child(a("ext").with_attr("cx", "0").with_attr("cy", "0"))
}

/// `xdr:graphicFrame` pointing at a chart part.
pub(crate) fn chart_frame(id: DrawingId, name: &str, chart_rel_id: &str) -> XmlElement {
    xdr("graphicFrame")
        .with_attr("macro", "")
        .with_child(
            xdr("nvGraphicFramePr")
                .with_child(c_nv_pr(id, name))
                .with_child(xdr("cNvGraphicFramePr")),
        )
        .with_child(
            xdr("xfrm")
                .with_child(a("off").with_attr("x", "0").with_attr("y", "0"))
                .with_child(a("ext").with_attr("cx", "0").with_attr("cy", "0")),
        )
        .with_child(
            a("graphic").with_child(
                a("graphicData")
                    .with_attr("uri", crate::anchor::CHART_NS)
                    .with_child(XmlElement::new("c:chart").with_attr("r:id", chart_rel_id)),
            ),
        )
}

/// `xdr:pic` embedding the image behind `embed_rel_id`.
pub(crate) fn picture_element(
    id: DrawingId,
    name: &str,
    embed_rel_id: &str,
    hyperlink_rel_id: Option<&str>,
) -> XmlElement {
    let mut props = c_nv_pr(id, name).with_attr("descr", "");
    if let Some(link) = hyperlink_rel_id {
        props.push(a("hlinkClick").with_attr("r:id", link));
    }
    xdr("pic")
        .with_child(
            xdr("nvPicPr")
                .with_child(props)
                .with_child(
                    xdr("cNvPicPr").with_child(a("picLocks").with_attr("noChangeAspect", "1")),
                ),
        )
        .with_child(
            xdr("blipFill")
                .with_child(a("blip").with_attr("r:embed", embed_rel_id))
                .with_child(a("stretch").with_child(a("fillRect"))),
        )
        .with_child(
            xdr("spPr")
                .with_child(xfrm())
                .with_child(a("prstGeom").with_attr("prst", "rect").with_child(a("avLst"))),
        )
}

/// `xdr:sp` with a preset geometry and an empty text body.
pub(crate) fn shape_element(id: DrawingId, name: &str, style: ShapeStyle) -> XmlElement {
    xdr("sp")
        .with_attr("macro", "")
        .with_attr("textlink", "")
        .with_child(
            xdr("nvSpPr")
                .with_child(c_nv_pr(id, name))
                .with_child(xdr("cNvSpPr")),
        )
        .with_child(
            xdr("spPr")
                .with_child(xfrm())
                .with_child(
                    a("prstGeom")
                        .with_attr("prst", style.preset())
                        .with_child(a("avLst")),
                ),
        )
        .with_child(
            xdr("txBody")
                .with_child(a("bodyPr").with_attr("vertOverflow", "clip").with_attr("rtlCol", "0"))
                .with_child(a("lstStyle"))
                .with_child(a("p")),
        )
}

/// An anchor node holding `content` followed by `xdr:clientData`.
pub(crate) fn anchor_node(edit_as: EditAs, content: XmlElement) -> XmlElement {
    let mut node = Anchor::default_for(edit_as).build_node();
    node.push(content);
    node.push(xdr("clientData"));
    node
}

/// Point the `cNvPr` of an anchor at a new id and name.
pub(crate) fn set_non_visual_props(anchor: &mut XmlElement, id: Option<DrawingId>, name: &str) {
    if let Some(props) = anchor.descendant_mut("cNvPr") {
        if let Some(id) = id {
            props.set_attr("id", id.0.to_string());
        }
        props.set_attr("name", name);
    }
}
