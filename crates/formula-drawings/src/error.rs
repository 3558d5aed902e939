use thiserror::Error;

use crate::chart::ChartType;

pub type Result<T> = std::result::Result<T, DrawingError>;

#[derive(Debug, Error)]
pub enum DrawingError {
    #[error("a drawing named {0:?} already exists in the drawings collection")]
    DuplicateName(String),
    #[error("chart sheets can't hold more than one drawing")]
    ChartSheetCapacity,
    #[error("drawings can't be removed from a chart sheet")]
    ChartSheetLocked,
    #[error("chart type {0:?} is not supported")]
    UnsupportedChartType(ChartType),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("chart template is corrupt: {0}")]
    TemplateCorrupt(String),
    #[error("drawing not found: {0}")]
    NotFound(String),
    #[error("missing package part: {0}")]
    MissingPart(String),
    #[error("invalid package: {0}")]
    Invalid(String),
    #[error("package part is too large to load safely: {part} is {size} bytes (max {max} bytes)")]
    PartTooLarge { part: String, size: u64, max: u64 },
    #[error("package is too large to load safely: {total} bytes uncompressed (max {max})")]
    PackageTooLarge { total: u64, max: u64 },
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("xml error: {0}")]
    RoXml(#[from] roxmltree::Error),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}
