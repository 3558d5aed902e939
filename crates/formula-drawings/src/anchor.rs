//! Anchor nodes (`xdr:oneCellAnchor`, `xdr:twoCellAnchor`, `xdr:absoluteAnchor`).
//!
//! All lengths are EMUs (English Metric Units, 914400 per inch).

use crate::xml::XmlElement;

pub const XDR_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing";
pub const DRAWINGML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub const CHART_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/chart";

/// Default extent of a freshly created one-cell or absolute anchor.
pub const DEFAULT_EXT_CX: i64 = 6_072_876;
pub const DEFAULT_EXT_CY: i64 = 9_299_263;

/// Default bottom-right cell of a freshly created two-cell anchor.
pub const DEFAULT_TO_COL: u32 = 10;
pub const DEFAULT_TO_ROW: u32 = 10;

/// How a drawing is anchored to the cell grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditAs {
    /// `oneCellAnchor`: moves with its top-left cell, explicit size.
    OneCell,
    /// `twoCellAnchor`: spans a cell range, moves and sizes with the grid.
    TwoCell,
    /// `absoluteAnchor`: fixed position and size, ignores the grid.
    Absolute,
}

impl EditAs {
    /// Local name of the anchor element for this mode.
    pub fn anchor_tag(self) -> &'static str {
        match self {
            EditAs::OneCell => "oneCellAnchor",
            EditAs::TwoCell => "twoCellAnchor",
            EditAs::Absolute => "absoluteAnchor",
        }
    }

    pub fn from_anchor_tag(local: &str) -> Option<Self> {
        match local {
            "oneCellAnchor" => Some(EditAs::OneCell),
            "twoCellAnchor" => Some(EditAs::TwoCell),
            "absoluteAnchor" => Some(EditAs::Absolute),
            _ => None,
        }
    }
}

/// A cell position with an EMU offset into the cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnchorPoint {
    pub col: u32,
    pub col_off: i64,
    pub row: u32,
    pub row_off: i64,
}

impl AnchorPoint {
    pub const fn new(col: u32, row: u32) -> Self {
        Self {
            col,
            col_off: 0,
            row,
            row_off: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmuSize {
    pub cx: i64,
    pub cy: i64,
}

impl EmuSize {
    pub const fn new(cx: i64, cy: i64) -> Self {
        Self { cx, cy }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmuPoint {
    pub x: i64,
    pub y: i64,
}

impl EmuPoint {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Geometry of an anchor node, one variant per anchor kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    OneCell { from: AnchorPoint, ext: EmuSize },
    TwoCell { from: AnchorPoint, to: AnchorPoint },
    Absolute { pos: EmuPoint, ext: EmuSize },
}

impl Anchor {
    /// Placeholder geometry for a new node; callers reposition afterwards.
    pub fn default_for(edit_as: EditAs) -> Self {
        let ext = EmuSize::new(DEFAULT_EXT_CX, DEFAULT_EXT_CY);
        match edit_as {
            EditAs::OneCell => Anchor::OneCell {
                from: AnchorPoint::default(),
                ext,
            },
            EditAs::TwoCell => Anchor::TwoCell {
                from: AnchorPoint::default(),
                to: AnchorPoint::new(DEFAULT_TO_COL, DEFAULT_TO_ROW),
            },
            EditAs::Absolute => Anchor::Absolute {
                pos: EmuPoint::default(),
                ext,
            },
        }
    }

    pub fn edit_as(&self) -> EditAs {
        match self {
            Anchor::OneCell { .. } => EditAs::OneCell,
            Anchor::TwoCell { .. } => EditAs::TwoCell,
            Anchor::Absolute { .. } => EditAs::Absolute,
        }
    }

    /// Read the geometry of an anchor element.
    ///
    /// `colOff` / `rowOff` default to 0 when missing and whitespace around numbers is tolerated.
    pub fn parse(anchor: &XmlElement) -> Option<Self> {
        match EditAs::from_anchor_tag(anchor.local_name())? {
            EditAs::OneCell => Some(Anchor::OneCell {
                from: parse_point(anchor.child("from")?)?,
                ext: parse_ext(anchor.child("ext")?)?,
            }),
            EditAs::TwoCell => Some(Anchor::TwoCell {
                from: parse_point(anchor.child("from")?)?,
                to: parse_point(anchor.child("to")?)?,
            }),
            EditAs::Absolute => {
                let pos = anchor.child("pos")?;
                Some(Anchor::Absolute {
                    pos: EmuPoint::new(parse_attr_i64(pos, "x")?, parse_attr_i64(pos, "y")?),
                    ext: parse_ext(anchor.child("ext")?)?,
                })
            }
        }
    }

    /// Build a bare anchor element (geometry only) for this anchor.
    pub fn build_node(&self) -> XmlElement {
        let mut node = XmlElement::new(format!("xdr:{}", self.edit_as().anchor_tag()));
        self.write(&mut node);
        node
    }

    /// Write this geometry into `anchor`, replacing the existing geometry children and leaving
    /// the drawing content untouched.
    ///
    /// The anchor kind is fixed by the element; a geometry of a different kind is ignored.
    pub fn write(&self, anchor: &mut XmlElement) {
        if EditAs::from_anchor_tag(anchor.local_name()).is_some_and(|kind| kind != self.edit_as()) {
            return;
        }
        let prefix = anchor.prefix().map(str::to_string);
        let prefix = prefix.as_deref();
        match self {
            Anchor::OneCell { from, ext } => {
                put_geometry(anchor, 0, point_node(prefix, "from", from));
                put_geometry(anchor, 1, ext_node(prefix, ext));
            }
            Anchor::TwoCell { from, to } => {
                put_geometry(anchor, 0, point_node(prefix, "from", from));
                put_geometry(anchor, 1, point_node(prefix, "to", to));
            }
            Anchor::Absolute { pos, ext } => {
                let pos_node = XmlElement::new(qualified(prefix, "pos"))
                    .with_attr("x", pos.x.to_string())
                    .with_attr("y", pos.y.to_string());
                put_geometry(anchor, 0, pos_node);
                put_geometry(anchor, 1, ext_node(prefix, ext));
            }
        }
    }
}

/// Replace the geometry child with the same local name, or insert it at `slot` among the
/// leading element children.
fn put_geometry(anchor: &mut XmlElement, slot: usize, node: XmlElement) {
    let local = node.local_name().to_string();
    if let Some(existing) = anchor.child_mut(&local) {
        *existing = node;
        return;
    }
    let insert_at = anchor
        .children
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c, crate::xml::XmlNode::Element(_)))
        .nth(slot)
        .map(|(idx, _)| idx)
        .unwrap_or(anchor.children.len());
    anchor
        .children
        .insert(insert_at, crate::xml::XmlNode::Element(node));
}

fn qualified(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.to_string(),
    }
}

fn point_node(prefix: Option<&str>, tag: &str, point: &AnchorPoint) -> XmlElement {
    XmlElement::new(qualified(prefix, tag))
        .with_child(XmlElement::new(qualified(prefix, "col")).with_text(point.col.to_string()))
        .with_child(
            XmlElement::new(qualified(prefix, "colOff")).with_text(point.col_off.to_string()),
        )
        .with_child(XmlElement::new(qualified(prefix, "row")).with_text(point.row.to_string()))
        .with_child(
            XmlElement::new(qualified(prefix, "rowOff")).with_text(point.row_off.to_string()),
        )
}

fn ext_node(prefix: Option<&str>, ext: &EmuSize) -> XmlElement {
    XmlElement::new(qualified(prefix, "ext"))
        .with_attr("cx", ext.cx.to_string())
        .with_attr("cy", ext.cy.to_string())
}

fn parse_point(node: &XmlElement) -> Option<AnchorPoint> {
    Some(AnchorPoint {
        col: parse_child_text(node, "col")?,
        col_off: parse_child_text::<i64>(node, "colOff").unwrap_or(0),
        row: parse_child_text(node, "row")?,
        row_off: parse_child_text::<i64>(node, "rowOff").unwrap_or(0),
    })
}

fn parse_ext(node: &XmlElement) -> Option<EmuSize> {
    Some(EmuSize::new(
        parse_attr_i64(node, "cx")?,
        parse_attr_i64(node, "cy")?,
    ))
}

fn parse_child_text<T: std::str::FromStr>(node: &XmlElement, local: &str) -> Option<T> {
    node.child(local)?.text().trim().parse().ok()
}

fn parse_attr_i64(node: &XmlElement, attr: &str) -> Option<i64> {
    node.attr(attr)?.trim().parse().ok()
}
