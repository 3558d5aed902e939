use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek, Write};

use zip::ZipArchive;

use crate::content_types::{ContentTypes, CONTENT_TYPES_PART};
use crate::error::{DrawingError, Result};
use crate::path::{normalize, relative_target, rels_for_part};
use crate::relationships::{Relationship, Relationships, TargetMode};
use crate::zip_util::{read_zip_file_bytes_with_budget, ZipInflateBudget};

/// Maximum allowed *inflated* bytes for a single ZIP entry.
pub const MAX_PACKAGE_PART_BYTES: u64 = 256 * 1024 * 1024; // 256 MiB

/// Maximum allowed *inflated* bytes across all ZIP entries of one container.
pub const MAX_PACKAGE_TOTAL_BYTES: u64 = 512 * 1024 * 1024; // 512 MiB

/// Size limits enforced whenever a ZIP container is inflated into memory.
#[derive(Debug, Clone, Copy)]
pub struct PackageLimits {
    /// Maximum allowed uncompressed bytes for any single part.
    pub max_part_bytes: u64,
    /// Maximum allowed uncompressed bytes across the whole package.
    pub max_total_bytes: u64,
}

impl Default for PackageLimits {
    fn default() -> Self {
        Self {
            max_part_bytes: MAX_PACKAGE_PART_BYTES,
            max_total_bytes: MAX_PACKAGE_TOTAL_BYTES,
        }
    }
}

/// Part/relationship operations the drawing collection needs from its containing package.
///
/// Part names are OPC part names without the leading `/` (`xl/drawings/drawing1.xml`). The empty
/// string names the package root when used as a relationship source.
pub trait Package {
    fn part(&self, name: &str) -> Option<&[u8]>;

    fn part_exists(&self, name: &str) -> bool {
        self.part(name).is_some()
    }

    /// Create a new part. Fails if the part already exists.
    fn create_part(&mut self, name: &str, content_type: &str, bytes: Vec<u8>) -> Result<()>;

    /// Replace the bytes of an existing part.
    fn write_part(&mut self, name: &str, bytes: Vec<u8>) -> Result<()>;

    /// Remove a part together with its relationships part. Missing parts are ignored.
    fn delete_part(&mut self, name: &str) -> Result<()>;

    /// Relationships owned by `source`; empty when the source has no `.rels` part.
    fn relationships(&self, source: &str) -> Result<Relationships>;

    /// Add a relationship from `source` and return its id.
    ///
    /// Internal targets are part names and are stored relative to `source`; external targets are
    /// stored verbatim.
    fn create_relationship(
        &mut self,
        source: &str,
        type_uri: &str,
        target: &str,
        mode: TargetMode,
    ) -> Result<String>;

    fn delete_relationship(&mut self, source: &str, id: &str) -> Result<()>;

    /// Persist package-level bookkeeping (content types) after a batch of writes.
    fn flush(&mut self) -> Result<()>;
}

/// In-memory OPC package: a map of part name -> bytes plus the parsed content types.
#[derive(Debug, Clone)]
pub struct OpcPackage {
    parts: BTreeMap<String, Vec<u8>>,
    content_types: ContentTypes,
}

impl Default for OpcPackage {
    fn default() -> Self {
        Self::new()
    }
}

impl OpcPackage {
    pub fn new() -> Self {
        Self {
            parts: BTreeMap::new(),
            content_types: ContentTypes::with_standard_defaults(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes), PackageLimits::default())
    }

    pub fn from_reader<R: Read + Seek>(reader: R, limits: PackageLimits) -> Result<Self> {
        let mut zip = ZipArchive::new(reader)?;

        let mut parts = BTreeMap::new();
        let mut budget = ZipInflateBudget::new(limits.max_total_bytes);
        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            if !file.is_file() {
                continue;
            }

            let name = file.name().to_string();
            let buf =
                read_zip_file_bytes_with_budget(&mut file, &name, limits.max_part_bytes, &mut budget)?;
            parts.insert(normalize_part_name(&name), buf);
        }

        Self::from_parts(parts)
    }

    /// Build a package from an already-inflated part map.
    pub fn from_parts(parts: BTreeMap<String, Vec<u8>>) -> Result<Self> {
        let parts: BTreeMap<String, Vec<u8>> = parts
            .into_iter()
            .map(|(name, bytes)| (normalize_part_name(&name), bytes))
            .collect();
        let content_types = match parts.get(CONTENT_TYPES_PART) {
            Some(xml) => ContentTypes::parse(xml)?,
            None => ContentTypes::with_standard_defaults(),
        };
        Ok(Self {
            parts,
            content_types,
        })
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    pub fn content_type(&self, name: &str) -> Option<&str> {
        self.content_types.content_type(&normalize_part_name(name))
    }

    pub fn write_to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    pub fn write_to<W: Write>(&self, mut w: W) -> Result<()> {
        let mut parts = self.parts.clone();
        parts.insert(CONTENT_TYPES_PART.to_string(), self.content_types.to_xml()?);

        let cursor = Cursor::new(Vec::new());
        let mut zip = zip::ZipWriter::new(cursor);
        let options = zip::write::FileOptions::<()>::default()
            .compression_method(zip::CompressionMethod::Deflated);

        for (name, bytes) in parts {
            zip.start_file(name, options)?;
            zip.write_all(&bytes)?;
        }

        let cursor = zip.finish()?;
        w.write_all(&cursor.into_inner())?;
        Ok(())
    }

    fn write_relationships(&mut self, source: &str, rels: &Relationships) -> Result<()> {
        let rels_part = rels_for_part(source);
        if rels.is_empty() {
            self.parts.remove(&rels_part);
            return Ok(());
        }
        self.parts.insert(rels_part, rels.to_xml()?);
        Ok(())
    }
}

impl Package for OpcPackage {
    fn part(&self, name: &str) -> Option<&[u8]> {
        if let Some(bytes) = self.parts.get(name) {
            return Some(bytes.as_slice());
        }
        self.parts
            .get(&normalize_part_name(name))
            .map(Vec::as_slice)
    }

    fn create_part(&mut self, name: &str, content_type: &str, bytes: Vec<u8>) -> Result<()> {
        let name = normalize_part_name(name);
        if self.parts.contains_key(&name) {
            return Err(DrawingError::Invalid(format!("part {name} already exists")));
        }
        // Media parts are typed through an extension default, like Excel does.
        let ext = name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
        if content_type.starts_with("image/") && !ext.is_empty() {
            if !self.content_types.has_default(ext) {
                self.content_types.set_default(ext, content_type);
            }
        } else {
            self.content_types.set_override(&name, content_type);
        }
        self.parts.insert(name, bytes);
        Ok(())
    }

    fn write_part(&mut self, name: &str, bytes: Vec<u8>) -> Result<()> {
        let name = normalize_part_name(name);
        match self.parts.get_mut(&name) {
            Some(existing) => {
                *existing = bytes;
                Ok(())
            }
            None => Err(DrawingError::MissingPart(name)),
        }
    }

    fn delete_part(&mut self, name: &str) -> Result<()> {
        let name = normalize_part_name(name);
        self.parts.remove(&name);
        self.parts.remove(&rels_for_part(&name));
        self.content_types.remove_override(&name);
        Ok(())
    }

    fn relationships(&self, source: &str) -> Result<Relationships> {
        match self.part(&rels_for_part(source)) {
            Some(bytes) => Relationships::from_xml(bytes),
            None => Ok(Relationships::default()),
        }
    }

    fn create_relationship(
        &mut self,
        source: &str,
        type_uri: &str,
        target: &str,
        mode: TargetMode,
    ) -> Result<String> {
        let mut rels = self.relationships(source)?;
        let id = rels.next_r_id();
        let (target, target_mode) = match mode {
            TargetMode::Internal => (relative_target(source, target), None),
            TargetMode::External => (target.to_string(), Some("External".to_string())),
        };
        rels.push(Relationship {
            id: id.clone(),
            type_uri: type_uri.to_string(),
            target,
            target_mode,
        });
        self.write_relationships(source, &rels)?;
        Ok(id)
    }

    fn delete_relationship(&mut self, source: &str, id: &str) -> Result<()> {
        let mut rels = self.relationships(source)?;
        if rels.remove(id).is_some() {
            self.write_relationships(source, &rels)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let xml = self.content_types.to_xml()?;
        self.parts.insert(CONTENT_TYPES_PART.to_string(), xml);
        Ok(())
    }
}

fn normalize_part_name(name: &str) -> String {
    let name = name.replace('\\', "/");
    if name == CONTENT_TYPES_PART || name == "/[Content_Types].xml" {
        return CONTENT_TYPES_PART.to_string();
    }
    normalize(&name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_types::CT_DRAWING;
    use crate::relationships::REL_TYPE_DRAWING;

    #[test]
    fn create_relationship_stores_relative_targets() {
        let mut pkg = OpcPackage::new();
        pkg.create_part("xl/worksheets/sheet1.xml", "application/xml", b"<worksheet/>".to_vec())
            .expect("sheet");
        let id = pkg
            .create_relationship(
                "xl/worksheets/sheet1.xml",
                REL_TYPE_DRAWING,
                "xl/drawings/drawing1.xml",
                TargetMode::Internal,
            )
            .expect("rel");
        assert_eq!(id, "rId1");

        let rels = pkg.relationships("xl/worksheets/sheet1.xml").expect("rels");
        assert_eq!(
            rels.get("rId1").map(|r| r.target.as_str()),
            Some("../drawings/drawing1.xml")
        );
        assert!(pkg.part_exists("xl/worksheets/_rels/sheet1.xml.rels"));
    }

    #[test]
    fn create_part_rejects_existing_names() {
        let mut pkg = OpcPackage::new();
        pkg.create_part("xl/drawings/drawing1.xml", CT_DRAWING, Vec::new())
            .expect("create");
        assert!(matches!(
            pkg.create_part("/xl/drawings/drawing1.xml", CT_DRAWING, Vec::new()),
            Err(DrawingError::Invalid(_))
        ));
    }

    #[test]
    fn write_and_read_back_preserves_parts_and_content_types() {
        let mut pkg = OpcPackage::new();
        pkg.create_part("xl/drawings/drawing1.xml", CT_DRAWING, b"<x/>".to_vec())
            .expect("drawing");
        pkg.create_part("xl/media/image1.png", "image/png", vec![1, 2, 3])
            .expect("image");
        pkg.flush().expect("flush");

        let bytes = pkg.write_to_bytes().expect("write");
        let reread = OpcPackage::from_bytes(&bytes).expect("read");
        assert_eq!(reread.part("xl/media/image1.png"), Some(&[1u8, 2, 3][..]));
        assert_eq!(reread.content_type("xl/drawings/drawing1.xml"), Some(CT_DRAWING));
        assert_eq!(reread.content_type("xl/media/image1.png"), Some("image/png"));
    }

    #[test]
    fn delete_part_drops_relationships_part() {
        let mut pkg = OpcPackage::new();
        pkg.create_part("xl/charts/chart1.xml", "application/xml", Vec::new())
            .expect("chart");
        pkg.create_relationship(
            "xl/charts/chart1.xml",
            crate::relationships::REL_TYPE_CHART_STYLE,
            "xl/charts/style1.xml",
            TargetMode::Internal,
        )
        .expect("rel");
        pkg.delete_part("xl/charts/chart1.xml").expect("delete");
        assert!(!pkg.part_exists("xl/charts/chart1.xml"));
        assert!(!pkg.part_exists("xl/charts/_rels/chart1.xml.rels"));
    }

    #[test]
    fn oversized_parts_are_rejected() {
        let mut pkg = OpcPackage::new();
        pkg.create_part("big.bin", "application/octet-stream", vec![0u8; 64])
            .expect("part");
        let bytes = pkg.write_to_bytes().expect("write");
        let limits = PackageLimits {
            max_part_bytes: 16,
            max_total_bytes: 1024,
        };
        assert!(matches!(
            OpcPackage::from_reader(Cursor::new(bytes), limits),
            Err(DrawingError::PartTooLarge { .. })
        ));
    }
}
