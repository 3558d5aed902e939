//! Drawing collections for XLSX worksheets and chart sheets.
//!
//! A [`Drawings`] collection owns the charts, pictures and shapes placed on one sheet and keeps
//! three views of them consistent:
//!
//! - the ordered drawings, where position is z-order (the last drawing is painted on top);
//! - a case-insensitive name index;
//! - the anchor tree of the sheet's `xl/drawings/drawing{n}.xml` part.
//!
//! The drawing part is created lazily the first time something is added, together with the page
//! relationship and the `<drawing r:id>` element. Pictures share image parts through a
//! content-addressed [`ImageStore`], and charts can be seeded from `.crtx` [`ChartTemplate`]s.
//!
//! All package access goes through the [`Package`] trait; [`OpcPackage`] is an in-memory ZIP
//! implementation of it.

pub mod anchor;
mod binder;
pub mod chart;
pub mod content_types;
pub mod drawing;
mod drawings;
pub mod error;
mod geometry;
pub mod images;
pub mod package;
pub mod page;
mod path;
pub mod relationships;
pub mod template;
pub mod xml;
mod zip_util;
mod zorder;

pub use anchor::{Anchor, AnchorPoint, EditAs, EmuPoint, EmuSize};
pub use binder::PartBinding;
pub use chart::{Chart, ChartType};
pub use drawing::{
    CollectionId, Drawing, DrawingId, DrawingKind, DrawingRef, Hyperlink, Picture, Shape,
    ShapeStyle,
};
pub use drawings::Drawings;
pub use error::{DrawingError, Result};
pub use geometry::AxisSpan;
pub use images::{ImageStore, PictureType};
pub use package::{OpcPackage, Package, PackageLimits};
pub use page::{Page, PageKind};
pub use path::{rels_for_part, resolve_target};
pub use relationships::{Relationship, Relationships, TargetMode};
pub use template::ChartTemplate;
