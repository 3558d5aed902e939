use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::binder::next_free_part_name;
use crate::error::Result;
use crate::package::Package;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PictureType {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
    Emf,
    Wmf,
    Svg,
    Webp,
    Ico,
}

impl PictureType {
    /// Picture type for a file extension (with or without the leading dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim().trim_start_matches('.');
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" | "jpe" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "bmp" => Some(Self::Bmp),
            "tif" | "tiff" => Some(Self::Tiff),
            "emf" => Some(Self::Emf),
            "wmf" => Some(Self::Wmf),
            "svg" => Some(Self::Svg),
            "webp" => Some(Self::Webp),
            "ico" => Some(Self::Ico),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
            Self::Emf => "emf",
            Self::Wmf => "wmf",
            Self::Svg => "svg",
            Self::Webp => "webp",
            Self::Ico => "ico",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
            Self::Emf => "image/x-emf",
            Self::Wmf => "image/x-wmf",
            Self::Svg => "image/svg+xml",
            Self::Webp => "image/webp",
            Self::Ico => "image/x-icon",
        }
    }
}

pub type ImageDigest = [u8; 32];

pub fn image_digest(bytes: &[u8]) -> ImageDigest {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(bytes));
    out
}

#[derive(Debug, Clone)]
struct ImageEntry {
    len: usize,
    part_name: String,
    /// Pictures of this collection that reference the part.
    refs: usize,
    /// Whether the part was embedded by this store (as opposed to found on load).
    owned: bool,
}

/// Content-addressed registry of image parts embedded by a drawings collection.
///
/// The SHA-256 digest only narrows the candidates; a payload is treated as a duplicate only when
/// its bytes equal the stored part byte-for-byte.
#[derive(Debug, Clone, Default)]
pub struct ImageStore {
    by_digest: HashMap<ImageDigest, Vec<ImageEntry>>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct image parts tracked.
    pub fn len(&self) -> usize {
        self.by_digest.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.by_digest
            .values()
            .flatten()
            .map(|entry| entry.part_name.as_str())
    }

    /// Number of pictures referencing `part_name`.
    pub fn ref_count(&self, part_name: &str) -> usize {
        self.by_digest
            .values()
            .flatten()
            .find(|entry| entry.part_name == part_name)
            .map_or(0, |entry| entry.refs)
    }

    /// Image part already holding exactly `bytes`, if any.
    pub fn find<P: Package + ?Sized>(&self, pkg: &P, bytes: &[u8]) -> Option<&str> {
        self.find_entry(pkg, &image_digest(bytes), bytes)
            .map(|entry| entry.part_name.as_str())
    }

    fn find_entry<P: Package + ?Sized>(
        &self,
        pkg: &P,
        digest: &ImageDigest,
        bytes: &[u8],
    ) -> Option<&ImageEntry> {
        self.by_digest.get(digest)?.iter().find(|entry| {
            entry.len == bytes.len() && pkg.part(&entry.part_name) == Some(bytes)
        })
    }

    /// Return the image part for `bytes`, embedding a new `xl/media/image{n}.{ext}` part unless an
    /// identical payload is already stored. Either way the part gains one reference.
    pub(crate) fn store<P: Package + ?Sized>(
        &mut self,
        pkg: &mut P,
        bytes: &[u8],
        picture_type: PictureType,
    ) -> Result<String> {
        let digest = image_digest(bytes);
        let existing = self
            .find_entry(&*pkg, &digest, bytes)
            .map(|entry| entry.part_name.clone());
        if let Some(part_name) = existing {
            if let Some(entry) = self.entry_mut(&part_name) {
                entry.refs += 1;
            }
            log::debug!("reusing image part {part_name} ({} bytes)", bytes.len());
            return Ok(part_name);
        }

        let ext = picture_type.extension();
        let part_name = next_free_part_name(&*pkg, 1, |n| format!("xl/media/image{n}.{ext}"));
        pkg.create_part(&part_name, picture_type.content_type(), bytes.to_vec())?;
        self.by_digest.entry(digest).or_default().push(ImageEntry {
            len: bytes.len(),
            part_name: part_name.clone(),
            refs: 1,
            owned: true,
        });
        Ok(part_name)
    }

    /// Track an image part found while loading an existing drawing part.
    pub(crate) fn register_existing(&mut self, part_name: &str, bytes: &[u8]) {
        if let Some(entry) = self.entry_mut(part_name) {
            entry.refs += 1;
            return;
        }
        self.by_digest
            .entry(image_digest(bytes))
            .or_default()
            .push(ImageEntry {
                len: bytes.len(),
                part_name: part_name.to_string(),
                refs: 1,
                owned: false,
            });
    }

    /// Drop one reference to `part_name`.
    ///
    /// When the last reference goes away the entry is forgotten; parts this store embedded are
    /// deleted from the package. Parts found on load may be shared with other sheets and stay.
    pub(crate) fn release<P: Package + ?Sized>(&mut self, pkg: &mut P, part_name: &str) -> Result<()> {
        let Some((digest, idx)) = self.by_digest.iter().find_map(|(digest, entries)| {
            entries
                .iter()
                .position(|entry| entry.part_name == part_name)
                .map(|idx| (*digest, idx))
        }) else {
            return Ok(());
        };

        let Some(entries) = self.by_digest.get_mut(&digest) else {
            return Ok(());
        };
        let entry = &mut entries[idx];
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs > 0 {
            return Ok(());
        }

        let removed = entries.remove(idx);
        if entries.is_empty() {
            self.by_digest.remove(&digest);
        }
        if removed.owned {
            pkg.delete_part(&removed.part_name)?;
        }
        Ok(())
    }

    fn entry_mut(&mut self, part_name: &str) -> Option<&mut ImageEntry> {
        self.by_digest
            .values_mut()
            .flatten()
            .find(|entry| entry.part_name == part_name)
    }
}
