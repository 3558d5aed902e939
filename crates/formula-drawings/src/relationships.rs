use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::Result;
use crate::xml::local_name;

pub const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PACKAGE_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

pub const REL_TYPE_DRAWING: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing";
pub const REL_TYPE_CHART: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/chart";
pub const REL_TYPE_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
pub const REL_TYPE_HYPERLINK: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
pub const REL_TYPE_THEME_OVERRIDE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/themeOverride";
pub const REL_TYPE_CHART_STYLE: &str =
    "http://schemas.microsoft.com/office/2011/relationships/chartStyle";
pub const REL_TYPE_CHART_COLOR_STYLE: &str =
    "http://schemas.microsoft.com/office/2011/relationships/chartColorStyle";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetMode {
    Internal,
    External,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub type_uri: String,
    pub target: String,
    pub target_mode: Option<String>,
}

impl Relationship {
    pub fn is_external(&self) -> bool {
        self.target_mode
            .as_deref()
            .is_some_and(|mode| mode.trim().eq_ignore_ascii_case("External"))
    }
}

/// Relationships of a single source part, in document order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Relationships {
    rels: Vec<Relationship>,
}

impl Relationships {
    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        Ok(Self {
            rels: parse_relationships(xml)?,
        })
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.rels.iter().find(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.iter()
    }

    pub fn len(&self) -> usize {
        self.rels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    /// First relationship id of the form `rIdN` that is not in use.
    pub fn next_r_id(&self) -> String {
        let max = self
            .rels
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId"))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("rId{}", max.saturating_add(1))
    }

    pub fn push(&mut self, rel: Relationship) {
        self.rels.push(rel);
    }

    pub fn remove(&mut self, id: &str) -> Option<Relationship> {
        let idx = self.rels.iter().position(|r| r.id == id)?;
        Some(self.rels.remove(idx))
    }

    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

        let mut root = BytesStart::new("Relationships");
        root.push_attribute(("xmlns", PACKAGE_REL_NS));
        if self.rels.is_empty() {
            writer.write_event(Event::Empty(root))?;
            return Ok(writer.into_inner());
        }

        writer.write_event(Event::Start(root))?;
        for rel in &self.rels {
            let mut el = BytesStart::new("Relationship");
            el.push_attribute(("Id", rel.id.as_str()));
            el.push_attribute(("Type", rel.type_uri.as_str()));
            el.push_attribute(("Target", rel.target.as_str()));
            if let Some(mode) = rel.target_mode.as_deref() {
                el.push_attribute(("TargetMode", mode));
            }
            writer.write_event(Event::Empty(el))?;
        }
        writer.write_event(Event::End(quick_xml::events::BytesEnd::new("Relationships")))?;
        Ok(writer.into_inner())
    }
}

pub fn parse_relationships(xml: &[u8]) -> Result<Vec<Relationship>> {
    let mut reader = Reader::from_reader(Cursor::new(xml));
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut relationships = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) | Event::Empty(start) => {
                if local_name_bytes(start.name().as_ref()).eq_ignore_ascii_case(b"Relationship") {
                    let mut id = None;
                    let mut target = None;
                    let mut type_uri = None;
                    let mut target_mode = None;
                    for attr in start.attributes() {
                        let attr = attr?;
                        let key = local_name_bytes(attr.key.as_ref());
                        let value = attr.unescape_value()?.into_owned();
                        if key.eq_ignore_ascii_case(b"Id") {
                            id = Some(value);
                        } else if key.eq_ignore_ascii_case(b"Target") {
                            target = Some(value);
                        } else if key.eq_ignore_ascii_case(b"Type") {
                            type_uri = Some(value);
                        } else if key.eq_ignore_ascii_case(b"TargetMode") {
                            target_mode = Some(value);
                        }
                    }
                    if let (Some(id), Some(target), Some(type_uri)) = (id, target, type_uri) {
                        relationships.push(Relationship {
                            id,
                            target,
                            type_uri,
                            target_mode,
                        });
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}

fn local_name_bytes(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|b| *b == b':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

/// Relationship id referenced by an `r:id` / `r:embed` style attribute on `el`.
pub(crate) fn rel_attr<'a>(el: &'a crate::xml::XmlElement, local: &str) -> Option<&'a str> {
    el.attrs
        .iter()
        .find(|(k, _)| local_name(k) == local && k.contains(':') && !k.starts_with("xmlns"))
        .or_else(|| el.attrs.iter().find(|(k, _)| k == local))
        .map(|(_, v)| v.as_str())
}
