use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

use crate::anchor::{Anchor, AnchorPoint, EditAs, EmuPoint, EmuSize, CHART_NS, DRAWINGML_NS, XDR_NS};
use crate::binder::PartBinding;
use crate::chart::{
    new_chart_space, set_chart_style, Chart, ChartSpaceInfo, ChartType, DEFAULT_CHART_STYLE,
    FIRST_CHART_STYLE_ID,
};
use crate::drawing::{
    anchor_node, chart_frame, picture_element, set_non_visual_props, shape_element, CollectionId,
    Drawing, DrawingId, DrawingKind, DrawingRef, Hyperlink, Picture, Shape, ShapeStyle,
};
use crate::error::{DrawingError, Result};
use crate::images::{ImageStore, PictureType};
use crate::package::Package;
use crate::page::Page;
use crate::relationships::{TargetMode, REL_NS, REL_TYPE_HYPERLINK, REL_TYPE_IMAGE};
use crate::template::ChartTemplate;
use crate::xml::{XmlElement, XmlNode};

/// Case-insensitive key of a drawing name.
pub(crate) fn name_key(name: &str) -> String {
    if name.is_ascii() {
        name.to_ascii_uppercase()
    } else {
        name.chars().flat_map(|ch| ch.to_uppercase()).collect()
    }
}

/// Where a root child of the `xdr:wsDr` document sits.
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    /// The next anchor in z-order.
    Anchor,
    /// A root child that isn't a drawing anchor (`mc:AlternateContent`, comments, whitespace).
    Opaque(XmlNode),
}

/// The `xdr:wsDr` document: root element, one anchor per drawing, and the layout of the root's
/// children. Opaque children keep their place among the anchors; only anchor slots move.
#[derive(Debug, Clone)]
pub(crate) struct AnchorTree {
    pub(crate) root: XmlElement,
    pub(crate) anchors: Vec<XmlElement>,
    layout: Vec<Slot>,
}

impl AnchorTree {
    fn empty() -> Self {
        let mut tree = Self {
            root: XmlElement::new("xdr:wsDr"),
            anchors: Vec::new(),
            layout: Vec::new(),
        };
        tree.declare_namespaces();
        tree
    }

    /// Bind the prefixes new anchor content is written with.
    fn declare_namespaces(&mut self) {
        for (prefix, uri) in [("xdr", XDR_NS), ("a", DRAWINGML_NS), ("r", REL_NS), ("c", CHART_NS)] {
            self.root.declare_namespace(prefix, uri);
        }
    }

    pub(crate) fn push(&mut self, anchor: XmlElement) {
        self.anchors.push(anchor);
        self.layout.push(Slot::Anchor);
    }

    fn push_opaque(&mut self, node: XmlNode) {
        self.layout.push(Slot::Opaque(node));
    }

    /// Remove the anchor at z-order `pos` together with its slot.
    pub(crate) fn remove(&mut self, pos: usize) -> XmlElement {
        self.remove_slot(pos);
        self.anchors.remove(pos)
    }

    /// Move the anchor at `pos` after every other root child.
    pub(crate) fn move_to_front(&mut self, pos: usize) {
        let anchor = self.remove(pos);
        self.push(anchor);
    }

    /// Move the anchor at `pos` before every other root child.
    pub(crate) fn move_to_back(&mut self, pos: usize) {
        let anchor = self.remove(pos);
        self.anchors.insert(0, anchor);
        self.layout.insert(0, Slot::Anchor);
    }

    fn remove_slot(&mut self, pos: usize) {
        let slot = self
            .layout
            .iter()
            .enumerate()
            .filter(|(_, slot)| matches!(slot, Slot::Anchor))
            .nth(pos)
            .map(|(i, _)| i);
        if let Some(i) = slot {
            self.layout.remove(i);
        }
    }

    pub(crate) fn to_document(&self) -> XmlElement {
        let mut doc = self.root.clone();
        let mut anchors = self.anchors.iter();
        doc.children = self
            .layout
            .iter()
            .filter_map(|slot| match slot {
                Slot::Anchor => anchors.next().cloned().map(XmlNode::Element),
                Slot::Opaque(node) => Some(node.clone()),
            })
            .collect();
        doc
    }
}

/// The drawings of one sheet.
///
/// Three views are kept in lockstep: the ordered drawings (position is z-order, last is on
/// top), a case-insensitive name index, and the anchor tree of the drawing part. All mutation
/// goes through this type.
#[derive(Debug)]
pub struct Drawings {
    pub(crate) owner: CollectionId,
    pub(crate) page: Page,
    pub(crate) drawings: Vec<Drawing>,
    pub(crate) names: HashMap<String, usize>,
    pub(crate) tree: AnchorTree,
    pub(crate) binding: Option<PartBinding>,
    pub(crate) images: ImageStore,
    pub(crate) series_template: Option<String>,
    pub(crate) next_chart_style_id: u32,
    /// Set when the loaded part repeated a name; the index then tracks first occurrences and is
    /// rebuilt after every mutation.
    pub(crate) has_duplicate_names: bool,
    next_key: u64,
}

impl Drawings {
    /// An empty collection for a page without a drawing part.
    pub fn new(page: Page) -> Self {
        Self {
            owner: CollectionId::next(),
            page,
            drawings: Vec::new(),
            names: HashMap::new(),
            tree: AnchorTree::empty(),
            binding: None,
            images: ImageStore::new(),
            series_template: None,
            next_chart_style_id: FIRST_CHART_STYLE_ID,
            has_duplicate_names: false,
            next_key: 1,
        }
    }

    /// Load the drawings of `page`, or an empty collection if the page has no drawing part.
    pub fn load<P: Package + ?Sized>(pkg: &P, page: Page) -> Result<Self> {
        let mut out = Self::new(page);
        let Some(binding) = PartBinding::existing(pkg, &out.page)? else {
            return Ok(out);
        };
        let bytes = pkg
            .part(&binding.part_name)
            .ok_or_else(|| DrawingError::MissingPart(binding.part_name.clone()))?;
        let mut root = XmlElement::parse_bytes(bytes)?;
        let children = std::mem::take(&mut root.children);
        out.tree.root = root;
        out.tree.declare_namespaces();

        for child in children {
            match child {
                XmlNode::Element(anchor) if EditAs::from_anchor_tag(anchor.local_name()).is_some() => {
                    let drawing =
                        Drawing::from_anchor(pkg, &binding.part_name, &anchor, &mut out.images)?;
                    out.push_loaded(drawing, anchor);
                }
                other => out.tree.push_opaque(other),
            }
        }

        out.binding = Some(binding);
        Ok(out)
    }

    fn push_loaded(&mut self, mut drawing: Drawing, anchor: XmlElement) {
        drawing.key = self.allocate_key();
        let pos = self.drawings.len();
        let key = name_key(&drawing.name);
        if self.names.contains_key(&key) {
            log::warn!(
                "drawing name {:?} appears more than once on {}; keeping the first occurrence",
                drawing.name,
                self.page.part_name
            );
            self.has_duplicate_names = true;
        } else {
            self.names.insert(key, pos);
        }
        self.tree.push(anchor);
        self.drawings.push(drawing);
    }

    pub fn owner(&self) -> CollectionId {
        self.owner
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// The bound drawing part, once one exists.
    pub fn part_binding(&self) -> Option<&PartBinding> {
        self.binding.as_ref()
    }

    pub fn image_store(&self) -> &ImageStore {
        &self.images
    }

    /// Inner XML of the first series of the last imported chart template.
    pub fn series_template(&self) -> Option<&str> {
        self.series_template.as_deref()
    }

    pub fn len(&self) -> usize {
        self.drawings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drawings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Drawing> {
        self.drawings.iter()
    }

    pub fn get(&self, pos: usize) -> Option<&Drawing> {
        self.drawings.get(pos)
    }

    pub fn by_name(&self, name: &str) -> Option<&Drawing> {
        self.position_by_name(name).and_then(|pos| self.drawings.get(pos))
    }

    pub fn by_id(&self, id: DrawingId) -> Option<&Drawing> {
        self.drawings.iter().find(|d| d.id == id)
    }

    pub fn resolve(&self, drawing: DrawingRef) -> Option<&Drawing> {
        self.position_of(drawing).and_then(|pos| self.drawings.get(pos))
    }

    /// Position recorded in the name index for `name`.
    pub fn position_by_name(&self, name: &str) -> Option<usize> {
        self.names.get(&name_key(name)).copied()
    }

    pub fn position_of(&self, drawing: DrawingRef) -> Option<usize> {
        if drawing.owner != self.owner {
            return None;
        }
        self.drawings.iter().position(|d| d.key == drawing.key)
    }

    pub fn handle(&self, pos: usize) -> Option<DrawingRef> {
        self.drawings.get(pos).map(|d| DrawingRef {
            owner: self.owner,
            key: d.key,
        })
    }

    /// The anchor node of the drawing at `pos`.
    pub fn anchor(&self, pos: usize) -> Option<&XmlElement> {
        self.tree.anchors.get(pos)
    }

    pub fn geometry(&self, pos: usize) -> Option<Anchor> {
        self.tree.anchors.get(pos).and_then(Anchor::parse)
    }

    /// Replace the geometry of the drawing at `pos`. The anchor kind can't change.
    pub fn set_geometry(&mut self, pos: usize, geometry: Anchor) -> Result<()> {
        let edit_as = self
            .drawings
            .get(pos)
            .map(|d| d.edit_as)
            .ok_or_else(|| not_found_at(pos))?;
        if geometry.edit_as() != edit_as {
            return Err(DrawingError::InvalidInput(format!(
                "drawing at position {pos} is anchored {edit_as:?}, not {:?}",
                geometry.edit_as()
            )));
        }
        if let Some(anchor) = self.tree.anchors.get_mut(pos) {
            geometry.write(anchor);
        }
        Ok(())
    }

    /// Move the top-left corner of a one-cell or two-cell anchored drawing.
    pub fn set_from(&mut self, pos: usize, point: AnchorPoint) -> Result<()> {
        let geometry = match self.current_geometry(pos)? {
            Anchor::OneCell { ext, .. } => Anchor::OneCell { from: point, ext },
            Anchor::TwoCell { to, .. } => Anchor::TwoCell { from: point, to },
            Anchor::Absolute { .. } => return Err(wrong_anchor(pos, "a cell position")),
        };
        self.set_geometry(pos, geometry)
    }

    /// Move the bottom-right corner of a two-cell anchored drawing.
    pub fn set_to(&mut self, pos: usize, point: AnchorPoint) -> Result<()> {
        match self.current_geometry(pos)? {
            Anchor::TwoCell { from, .. } => self.set_geometry(pos, Anchor::TwoCell { from, to: point }),
            _ => Err(wrong_anchor(pos, "a bottom-right cell")),
        }
    }

    /// Move an absolutely anchored drawing.
    pub fn set_position(&mut self, pos: usize, point: EmuPoint) -> Result<()> {
        match self.current_geometry(pos)? {
            Anchor::Absolute { ext, .. } => self.set_geometry(pos, Anchor::Absolute { pos: point, ext }),
            _ => Err(wrong_anchor(pos, "an absolute position")),
        }
    }

    /// Resize a one-cell or absolutely anchored drawing.
    pub fn set_size(&mut self, pos: usize, size: EmuSize) -> Result<()> {
        let geometry = match self.current_geometry(pos)? {
            Anchor::OneCell { from, .. } => Anchor::OneCell { from, ext: size },
            Anchor::Absolute { pos: origin, .. } => Anchor::Absolute { pos: origin, ext: size },
            Anchor::TwoCell { .. } => return Err(wrong_anchor(pos, "an explicit size")),
        };
        self.set_geometry(pos, geometry)
    }

    fn current_geometry(&self, pos: usize) -> Result<Anchor> {
        let anchor = self.tree.anchors.get(pos).ok_or_else(|| not_found_at(pos))?;
        Anchor::parse(anchor).ok_or_else(|| {
            DrawingError::Invalid(format!("anchor of drawing at position {pos} has no geometry"))
        })
    }

    /// Rename the drawing at `pos`. Names stay unique ignoring case; changing only the case of
    /// a drawing's own name is allowed.
    pub fn rename(&mut self, pos: usize, new_name: &str) -> Result<()> {
        let old_name = self
            .drawings
            .get(pos)
            .map(|d| d.name.clone())
            .ok_or_else(|| not_found_at(pos))?;
        let new_key = name_key(new_name);
        let taken = self
            .drawings
            .iter()
            .enumerate()
            .any(|(i, d)| i != pos && name_key(&d.name) == new_key);
        if taken {
            return Err(DrawingError::DuplicateName(new_name.to_string()));
        }

        if let Some(anchor) = self.tree.anchors.get_mut(pos) {
            set_non_visual_props(anchor, None, new_name);
        }
        self.drawings[pos].name = new_name.to_string();
        if self.has_duplicate_names {
            self.reindex_names();
        } else {
            self.names.remove(&name_key(&old_name));
            self.names.insert(new_key, pos);
        }
        Ok(())
    }

    /// Add an empty chart anchored to a cell range.
    pub fn add_chart<P: Package + ?Sized>(
        &mut self,
        pkg: &mut P,
        name: &str,
        chart_type: ChartType,
    ) -> Result<DrawingRef> {
        self.add_chart_as(pkg, name, chart_type, None, EditAs::TwoCell)
    }

    /// Add an empty pivot chart bound to `pivot_source` (`[Book.xlsx]Sheet1!PivotTable1`).
    pub fn add_pivot_chart<P: Package + ?Sized>(
        &mut self,
        pkg: &mut P,
        name: &str,
        chart_type: ChartType,
        pivot_source: &str,
    ) -> Result<DrawingRef> {
        self.add_chart_as(pkg, name, chart_type, Some(pivot_source), EditAs::TwoCell)
    }

    pub fn add_chart_as<P: Package + ?Sized>(
        &mut self,
        pkg: &mut P,
        name: &str,
        chart_type: ChartType,
        pivot_source: Option<&str>,
        edit_as: EditAs,
    ) -> Result<DrawingRef> {
        self.check_can_add(name)?;
        if !chart_type.is_supported() {
            return Err(DrawingError::UnsupportedChartType(chart_type));
        }

        let drawing_part = self.bind(pkg)?;
        let chart = Chart::create(pkg, &drawing_part, &new_chart_space(chart_type, pivot_source))?;
        Ok(self.push_chart(name, edit_as, chart))
    }

    /// Add a chart seeded from a chart template.
    ///
    /// The template's first series is detached and kept as [`Drawings::series_template`]. The
    /// chart keeps its own `c:style` or gets the default style; the template's theme override,
    /// style and colors parts are attached in that order.
    pub fn add_chart_from_template<P: Package + ?Sized>(
        &mut self,
        pkg: &mut P,
        template: &ChartTemplate,
        name: &str,
        pivot_source: Option<&str>,
    ) -> Result<DrawingRef> {
        self.check_can_add(name)?;
        let mut prepared = template.prepare(pivot_source)?;

        let style = ChartSpaceInfo::read(&prepared.chart_space)
            .style
            .unwrap_or(DEFAULT_CHART_STYLE);
        set_chart_style(&mut prepared.chart_space, style);

        let mut assigns_style_id = false;
        if let Some(style_el) = prepared.style.as_mut() {
            if style_el.attr("id").is_none() {
                style_el.set_attr("id", self.next_chart_style_id.to_string());
                assigns_style_id = true;
            }
        }
        let theme_xml = prepared
            .theme_override
            .as_ref()
            .map(XmlElement::to_document_bytes)
            .transpose()?;
        let style_xml = prepared
            .style
            .as_ref()
            .map(XmlElement::to_document_bytes)
            .transpose()?;
        let colors_xml = prepared
            .colors
            .as_ref()
            .map(XmlElement::to_document_bytes)
            .transpose()?;

        let drawing_part = self.bind(pkg)?;
        let mut chart = Chart::create(pkg, &drawing_part, &prepared.chart_space)?;
        if let Some(xml) = theme_xml {
            chart.attach_theme_override(pkg, &xml)?;
        }
        if let Some(xml) = style_xml {
            chart.attach_style(pkg, &xml)?;
        }
        if let Some(xml) = colors_xml {
            chart.attach_colors(pkg, &xml)?;
        }

        if assigns_style_id {
            self.next_chart_style_id += 1;
        }
        if prepared.series_template.is_some() {
            self.series_template = prepared.series_template;
        }
        log::debug!(
            "imported chart template as {} ({:?}, style {style})",
            chart.part_name,
            chart.chart_type
        );
        Ok(self.push_chart(name, EditAs::TwoCell, chart))
    }

    fn push_chart(&mut self, name: &str, edit_as: EditAs, chart: Chart) -> DrawingRef {
        let id = self.next_id();
        let node = anchor_node(edit_as, chart_frame(id, name, &chart.rel_id));
        self.push(
            Drawing::new(
                id,
                name,
                edit_as,
                DrawingKind::Chart(chart),
            ),
            node,
        )
    }

    /// Add a picture from its encoded bytes, anchored to one cell.
    pub fn add_picture<P: Package + ?Sized>(
        &mut self,
        pkg: &mut P,
        name: &str,
        image: &[u8],
        picture_type: PictureType,
        hyperlink: Option<&str>,
    ) -> Result<DrawingRef> {
        self.check_can_add(name)?;
        self.register_picture(pkg, name, image, picture_type, hyperlink)
    }

    /// Add a picture read from a file; the picture type comes from the file extension.
    pub fn add_picture_from_file<P: Package + ?Sized>(
        &mut self,
        pkg: &mut P,
        name: &str,
        path: impl AsRef<Path>,
        hyperlink: Option<&str>,
    ) -> Result<DrawingRef> {
        let path = path.as_ref();
        self.check_can_add(name)?;
        let picture_type = picture_type_for_path(path)?;
        let image = std::fs::read(path).map_err(|err| unreadable_image(path, err))?;
        self.register_picture(pkg, name, &image, picture_type, hyperlink)
    }

    /// Add a picture read from the start of `reader`.
    pub fn add_picture_from_reader<P, R>(
        &mut self,
        pkg: &mut P,
        name: &str,
        mut reader: R,
        picture_type: PictureType,
        hyperlink: Option<&str>,
    ) -> Result<DrawingRef>
    where
        P: Package + ?Sized,
        R: Read + Seek,
    {
        self.check_can_add(name)?;
        let mut image = Vec::new();
        reader
            .seek(SeekFrom::Start(0))
            .and_then(|_| reader.read_to_end(&mut image))
            .map_err(|err| DrawingError::InvalidInput(format!("can't read image stream: {err}")))?;
        self.register_picture(pkg, name, &image, picture_type, hyperlink)
    }

    /// [`Drawings::add_picture_from_file`] with a non-blocking read.
    pub async fn add_picture_from_file_async<P: Package + ?Sized>(
        &mut self,
        pkg: &mut P,
        name: &str,
        path: impl AsRef<Path>,
        hyperlink: Option<&str>,
    ) -> Result<DrawingRef> {
        let path = path.as_ref();
        self.check_can_add(name)?;
        let picture_type = picture_type_for_path(path)?;
        let image = tokio::fs::read(path)
            .await
            .map_err(|err| unreadable_image(path, err))?;
        self.register_picture(pkg, name, &image, picture_type, hyperlink)
    }

    /// [`Drawings::add_picture_from_reader`] with a non-blocking read.
    pub async fn add_picture_from_reader_async<P, R>(
        &mut self,
        pkg: &mut P,
        name: &str,
        mut reader: R,
        picture_type: PictureType,
        hyperlink: Option<&str>,
    ) -> Result<DrawingRef>
    where
        P: Package + ?Sized,
        R: AsyncRead + AsyncSeek + Unpin,
    {
        self.check_can_add(name)?;
        let image = read_from_start(&mut reader)
            .await
            .map_err(|err| DrawingError::InvalidInput(format!("can't read image stream: {err}")))?;
        self.register_picture(pkg, name, &image, picture_type, hyperlink)
    }

    /// Shared tail of every picture add, run once the payload is in memory.
    fn register_picture<P: Package + ?Sized>(
        &mut self,
        pkg: &mut P,
        name: &str,
        image: &[u8],
        picture_type: PictureType,
        hyperlink: Option<&str>,
    ) -> Result<DrawingRef> {
        if image.is_empty() {
            return Err(DrawingError::InvalidInput("image data is empty".to_string()));
        }

        let drawing_part = self.bind(pkg)?;
        let image_part = self.images.store(pkg, image, picture_type)?;
        let rel_id =
            pkg.create_relationship(&drawing_part, REL_TYPE_IMAGE, &image_part, TargetMode::Internal)?;
        let hyperlink = match hyperlink {
            Some(target) => Some(Hyperlink {
                rel_id: pkg.create_relationship(
                    &drawing_part,
                    REL_TYPE_HYPERLINK,
                    target,
                    TargetMode::External,
                )?,
                target: target.to_string(),
            }),
            None => None,
        };

        let id = self.next_id();
        let content = picture_element(
            id,
            name,
            &rel_id,
            hyperlink.as_ref().map(|link| link.rel_id.as_str()),
        );
        let node = anchor_node(EditAs::OneCell, content);
        Ok(self.push(
            Drawing::new(
                id,
                name,
                EditAs::OneCell,
                DrawingKind::Picture(Picture {
                    rel_id,
                    image_part: Some(image_part),
                    picture_type: Some(picture_type),
                    hyperlink,
                }),
            ),
            node,
        ))
    }

    /// Add a preset shape anchored to a cell range.
    pub fn add_shape<P: Package + ?Sized>(
        &mut self,
        pkg: &mut P,
        name: &str,
        style: ShapeStyle,
    ) -> Result<DrawingRef> {
        self.check_can_add(name)?;
        self.bind(pkg)?;

        let id = self.next_id();
        let node = anchor_node(EditAs::TwoCell, shape_element(id, name, style));
        Ok(self.push(
            Drawing::new(
                id,
                name,
                EditAs::TwoCell,
                DrawingKind::Shape(Shape {
                    style: Some(style),
                    text: None,
                }),
            ),
            node,
        ))
    }

    /// Add a copy of the shape `source` (geometry, markup and style) under a new name.
    pub fn add_shape_copy<P: Package + ?Sized>(
        &mut self,
        pkg: &mut P,
        name: &str,
        source: DrawingRef,
    ) -> Result<DrawingRef> {
        self.check_can_add(name)?;
        let pos = self
            .position_of(source)
            .ok_or_else(|| DrawingError::NotFound(format!("drawing {source:?}")))?;
        let (edit_as, shape) = match &self.drawings[pos] {
            Drawing {
                edit_as,
                kind: DrawingKind::Shape(shape),
                ..
            } => (*edit_as, shape.clone()),
            other => {
                return Err(DrawingError::InvalidInput(format!(
                    "drawing {:?} is not a shape",
                    other.name
                )))
            }
        };
        let mut node = self.tree.anchors[pos].clone();
        self.bind(pkg)?;

        let id = self.next_id();
        set_non_visual_props(&mut node, Some(id), name);
        Ok(self.push(
            Drawing::new(
                id,
                name,
                edit_as,
                DrawingKind::Shape(shape),
            ),
            node,
        ))
    }

    /// Remove the drawing at `pos`.
    pub fn remove<P: Package + ?Sized>(&mut self, pkg: &mut P, pos: usize) -> Result<()> {
        self.check_can_remove()?;
        self.remove_at(pkg, pos)
    }

    pub fn remove_by_name<P: Package + ?Sized>(&mut self, pkg: &mut P, name: &str) -> Result<()> {
        self.check_can_remove()?;
        let pos = self
            .position_by_name(name)
            .ok_or_else(|| DrawingError::NotFound(format!("drawing named {name:?}")))?;
        self.remove_at(pkg, pos)
    }

    pub fn remove_by_id<P: Package + ?Sized>(&mut self, pkg: &mut P, id: DrawingId) -> Result<()> {
        self.check_can_remove()?;
        let pos = self
            .drawings
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| DrawingError::NotFound(format!("drawing with id {}", id.0)))?;
        self.remove_at(pkg, pos)
    }

    pub fn remove_ref<P: Package + ?Sized>(&mut self, pkg: &mut P, drawing: DrawingRef) -> Result<()> {
        self.check_can_remove()?;
        let pos = self
            .position_of(drawing)
            .ok_or_else(|| DrawingError::NotFound(format!("drawing {drawing:?}")))?;
        self.remove_at(pkg, pos)
    }

    /// Remove every drawing, front to back through the regular removal path.
    pub fn clear<P: Package + ?Sized>(&mut self, pkg: &mut P) -> Result<()> {
        self.check_can_remove()?;
        while !self.drawings.is_empty() {
            self.remove_at(pkg, 0)?;
        }
        Ok(())
    }

    fn remove_at<P: Package + ?Sized>(&mut self, pkg: &mut P, pos: usize) -> Result<()> {
        if pos >= self.drawings.len() {
            return Err(not_found_at(pos));
        }
        self.release(pkg, pos)?;

        self.tree.remove(pos);
        let removed = self.drawings.remove(pos);
        if self.has_duplicate_names {
            self.reindex_names();
            return Ok(());
        }
        for idx in self.names.values_mut() {
            if *idx > pos {
                *idx -= 1;
            }
        }
        self.names.remove(&name_key(&removed.name));
        Ok(())
    }

    /// Release the package resources owned by the drawing at `pos`.
    fn release<P: Package + ?Sized>(&mut self, pkg: &mut P, pos: usize) -> Result<()> {
        let Some(drawing_part) = self.binding.as_ref().map(|b| b.part_name.clone()) else {
            return Ok(());
        };
        match &self.drawings[pos].kind {
            DrawingKind::Chart(chart) => {
                let shared = self.drawings.iter().enumerate().any(|(i, d)| {
                    i != pos && d.as_chart().is_some_and(|c| c.part_name == chart.part_name)
                });
                if !shared {
                    chart.release(pkg, &drawing_part)?;
                }
            }
            DrawingKind::Picture(picture) => {
                let shared = self.drawings.iter().enumerate().any(|(i, d)| {
                    i != pos && d.as_picture().is_some_and(|p| p.rel_id == picture.rel_id)
                });
                if !shared {
                    pkg.delete_relationship(&drawing_part, &picture.rel_id)?;
                }
                if let Some(link) = &picture.hyperlink {
                    pkg.delete_relationship(&drawing_part, &link.rel_id)?;
                }
                if let Some(part) = picture.image_part.clone() {
                    self.images.release(pkg, &part)?;
                }
            }
            DrawingKind::Shape(_) => {}
        }
        Ok(())
    }

    /// Serialize the anchor tree into the drawing part and flush the package.
    pub fn save<P: Package + ?Sized>(&self, pkg: &mut P) -> Result<()> {
        let Some(binding) = &self.binding else {
            return Ok(());
        };
        pkg.write_part(&binding.part_name, self.to_xml()?)?;
        pkg.flush()
    }

    /// The drawing part document as it would be saved.
    pub fn to_xml(&self) -> Result<Vec<u8>> {
        self.tree.to_document().to_document_bytes()
    }

    fn check_can_add(&self, name: &str) -> Result<()> {
        if self.names.contains_key(&name_key(name)) {
            return Err(DrawingError::DuplicateName(name.to_string()));
        }
        if self.page.is_chart_sheet() && !self.drawings.is_empty() {
            return Err(DrawingError::ChartSheetCapacity);
        }
        Ok(())
    }

    fn check_can_remove(&self) -> Result<()> {
        if self.page.is_chart_sheet() && !self.drawings.is_empty() {
            return Err(DrawingError::ChartSheetLocked);
        }
        Ok(())
    }

    /// Bind the drawing part on first use and return its name.
    fn bind<P: Package + ?Sized>(&mut self, pkg: &mut P) -> Result<String> {
        if let Some(binding) = &self.binding {
            return Ok(binding.part_name.clone());
        }
        let binding = PartBinding::create(pkg, &self.page, &self.tree.to_document())?;
        let part_name = binding.part_name.clone();
        self.binding = Some(binding);
        Ok(part_name)
    }

    fn next_id(&self) -> DrawingId {
        let max = self.drawings.iter().map(|d| d.id.0).max().unwrap_or(1);
        DrawingId(max.saturating_add(1))
    }

    fn allocate_key(&mut self) -> u64 {
        let key = self.next_key;
        self.next_key += 1;
        key
    }

    fn push(&mut self, mut drawing: Drawing, anchor: XmlElement) -> DrawingRef {
        drawing.key = self.allocate_key();
        let pos = self.drawings.len();
        let handle = DrawingRef {
            owner: self.owner,
            key: drawing.key,
        };
        self.tree.push(anchor);
        self.names.insert(name_key(&drawing.name), pos);
        self.drawings.push(drawing);
        handle
    }

    /// Rebuild the name index, first occurrence wins.
    pub(crate) fn reindex_names(&mut self) {
        self.names.clear();
        let mut duplicates = false;
        for (pos, drawing) in self.drawings.iter().enumerate() {
            let key = name_key(&drawing.name);
            if self.names.contains_key(&key) {
                duplicates = true;
            } else {
                self.names.insert(key, pos);
            }
        }
        self.has_duplicate_names = duplicates;
    }
}

impl<'a> IntoIterator for &'a Drawings {
    type Item = &'a Drawing;
    type IntoIter = std::slice::Iter<'a, Drawing>;

    fn into_iter(self) -> Self::IntoIter {
        self.drawings.iter()
    }
}

fn not_found_at(pos: usize) -> DrawingError {
    DrawingError::NotFound(format!("no drawing at position {pos}"))
}

fn wrong_anchor(pos: usize, what: &str) -> DrawingError {
    DrawingError::InvalidInput(format!("the anchor of drawing at position {pos} has no {what}"))
}

fn picture_type_for_path(path: &Path) -> Result<PictureType> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(PictureType::from_extension)
        .ok_or_else(|| {
            DrawingError::InvalidInput(format!("unknown picture type for {}", path.display()))
        })
}

async fn read_from_start<R: AsyncRead + AsyncSeek + Unpin>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    reader.seek(SeekFrom::Start(0)).await?;
    let mut image = Vec::new();
    reader.read_to_end(&mut image).await?;
    Ok(image)
}

fn unreadable_image(path: &Path, err: std::io::Error) -> DrawingError {
    DrawingError::InvalidInput(format!("can't read image {}: {err}", path.display()))
}
