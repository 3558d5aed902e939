use std::collections::BTreeMap;
use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::Result;

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

pub const CT_RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";
pub const CT_XML: &str = "application/xml";
pub const CT_DRAWING: &str = "application/vnd.openxmlformats-officedocument.drawing+xml";
pub const CT_CHART: &str = "application/vnd.openxmlformats-officedocument.drawingml.chart+xml";
pub const CT_CHART_STYLE: &str = "application/vnd.ms-office.chartstyle+xml";
pub const CT_CHART_COLORS: &str = "application/vnd.ms-office.chartcolorstyle+xml";
pub const CT_THEME_OVERRIDE: &str =
    "application/vnd.openxmlformats-officedocument.themeOverride+xml";

/// `[Content_Types].xml`: extension defaults plus per-part overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTypes {
    defaults: BTreeMap<String, String>,
    overrides: BTreeMap<String, String>,
}

impl ContentTypes {
    pub fn with_standard_defaults() -> Self {
        let mut out = Self::default();
        out.set_default("rels", CT_RELATIONSHIPS);
        out.set_default("xml", CT_XML);
        out
    }

    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(Cursor::new(xml));
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();
        let mut out = Self::default();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) | Event::Empty(e) => {
                    let name = e.local_name();
                    let is_default = name.as_ref().eq_ignore_ascii_case(b"Default");
                    let is_override = name.as_ref().eq_ignore_ascii_case(b"Override");
                    if is_default || is_override {
                        let mut key = None;
                        let mut content_type = None;
                        for attr in e.attributes().with_checks(false) {
                            let attr = attr?;
                            let value = attr.unescape_value()?.into_owned();
                            match attr.key.local_name().as_ref() {
                                b"Extension" | b"PartName" => key = Some(value),
                                b"ContentType" => content_type = Some(value),
                                _ => {}
                            }
                        }
                        if let (Some(key), Some(content_type)) = (key, content_type) {
                            if is_default {
                                out.set_default(&key, &content_type);
                            } else {
                                out.set_override(&key, &content_type);
                            }
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(out)
    }

    pub fn set_default(&mut self, ext: &str, content_type: &str) {
        let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        if ext.is_empty() {
            return;
        }
        self.defaults.insert(ext, content_type.to_string());
    }

    pub fn has_default(&self, ext: &str) -> bool {
        self.defaults.contains_key(&ext.to_ascii_lowercase())
    }

    pub fn set_override(&mut self, part_name: &str, content_type: &str) {
        self.overrides
            .insert(canonical_part_name(part_name), content_type.to_string());
    }

    pub fn remove_override(&mut self, part_name: &str) {
        self.overrides.remove(&canonical_part_name(part_name));
    }

    /// Effective content type of a part: its override, else the default for its extension.
    pub fn content_type(&self, part_name: &str) -> Option<&str> {
        if let Some(ct) = self.overrides.get(&canonical_part_name(part_name)) {
            return Some(ct.as_str());
        }
        let ext = part_name.rsplit_once('.').map(|(_, ext)| ext)?;
        self.defaults
            .get(&ext.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        let mut root = BytesStart::new("Types");
        root.push_attribute(("xmlns", CONTENT_TYPES_NS));
        writer.write_event(Event::Start(root))?;

        for (ext, ct) in &self.defaults {
            let mut el = BytesStart::new("Default");
            el.push_attribute(("Extension", ext.as_str()));
            el.push_attribute(("ContentType", ct.as_str()));
            writer.write_event(Event::Empty(el))?;
        }
        for (part, ct) in &self.overrides {
            let mut el = BytesStart::new("Override");
            el.push_attribute(("PartName", part.as_str()));
            el.push_attribute(("ContentType", ct.as_str()));
            writer.write_event(Event::Empty(el))?;
        }

        writer.write_event(Event::End(BytesEnd::new("Types")))?;
        Ok(writer.into_inner())
    }
}

/// Override part names are absolute (`/xl/drawings/drawing1.xml`).
fn canonical_part_name(part_name: &str) -> String {
    if part_name.starts_with('/') {
        part_name.to_string()
    } else {
        format!("/{part_name}")
    }
}
