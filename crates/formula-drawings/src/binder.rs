use crate::content_types::CT_DRAWING;
use crate::error::{DrawingError, Result};
use crate::package::Package;
use crate::page::Page;
use crate::path::resolve_target;
use crate::relationships::{TargetMode, REL_TYPE_DRAWING};
use crate::xml::XmlElement;

/// The drawing part backing a collection and the page relationship pointing at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartBinding {
    pub part_name: String,
    /// Relationship id (on the page part) that targets `part_name`.
    pub rel_id: String,
}

impl PartBinding {
    /// Resolve the drawing part the page already references, if any.
    pub fn existing<P: Package + ?Sized>(pkg: &P, page: &Page) -> Result<Option<Self>> {
        let Some(rel_id) = page.drawing_rel_id(pkg)? else {
            return Ok(None);
        };
        let rels = pkg.relationships(&page.part_name)?;
        let rel = rels
            .get(&rel_id)
            .ok_or_else(|| DrawingError::MissingPart(format!("{}#{rel_id}", page.part_name)))?;
        let part_name = resolve_target(&page.part_name, &rel.target);
        if !pkg.part_exists(&part_name) {
            return Err(DrawingError::MissingPart(part_name));
        }
        Ok(Some(Self { part_name, rel_id }))
    }

    /// Create the drawing part for `page` and wire it up.
    ///
    /// Probes `xl/drawings/drawing{n}.xml` starting at the page's sheet id, creates the part with
    /// `root` as its content, adds the page → drawing relationship, writes `<drawing r:id>` into
    /// the page and flushes the package.
    pub fn create<P: Package + ?Sized>(pkg: &mut P, page: &Page, root: &XmlElement) -> Result<Self> {
        let part_name = next_free_part_name(&*pkg, page.sheet_id, |n| {
            format!("xl/drawings/drawing{n}.xml")
        });
        pkg.create_part(&part_name, CT_DRAWING, root.to_document_bytes()?)?;
        let rel_id = pkg.create_relationship(
            &page.part_name,
            REL_TYPE_DRAWING,
            &part_name,
            TargetMode::Internal,
        )?;
        page.set_drawing(pkg, &rel_id)?;
        pkg.flush()?;

        log::debug!(
            "bound drawing part {part_name} to {} as {rel_id}",
            page.part_name
        );
        Ok(Self { part_name, rel_id })
    }
}

/// First part name produced by `name_for(n)`, `n` counting up from `seed`, that the package does
/// not contain yet.
pub(crate) fn next_free_part_name<P, F>(pkg: &P, seed: u32, name_for: F) -> String
where
    P: Package + ?Sized,
    F: Fn(u32) -> String,
{
    let mut n = seed.max(1);
    loop {
        let candidate = name_for(n);
        if !pkg.part_exists(&candidate) {
            return candidate;
        }
        n = n.saturating_add(1);
    }
}
