#![allow(dead_code)]

pub mod workbook_builder;

use formula_drawings::{OpcPackage, Page};

pub const WORKSHEET: &str = "xl/worksheets/sheet1.xml";
pub const CHART_SHEET: &str = "xl/chartsheets/sheet1.xml";

/// Worksheet 1 and chart sheet 2 of a package built by [`workbook_builder::WorkbookBuilder`].
pub fn worksheet_page() -> Page {
    Page::worksheet(WORKSHEET, 1)
}

pub fn chart_sheet_page() -> Page {
    Page::chart_sheet(CHART_SHEET, 2)
}

/// A package with an empty worksheet and an empty chart sheet.
pub fn blank_package() -> OpcPackage {
    let bytes = workbook_builder::WorkbookBuilder::new()
        .worksheet()
        .chart_sheet()
        .build();
    OpcPackage::from_bytes(&bytes).expect("open generated workbook")
}

/// Write the package to a ZIP and open it again.
pub fn reopen(pkg: &OpcPackage) -> OpcPackage {
    let bytes = pkg.write_to_bytes().expect("write package");
    OpcPackage::from_bytes(&bytes).expect("reopen package")
}

/// A small PNG-looking payload; `seed` makes payloads distinct.
pub fn png(seed: u8) -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(b"\0\0\0\rIHDR");
    bytes.extend(std::iter::repeat(seed).take(32));
    bytes
}

pub fn part_str(pkg: &OpcPackage, name: &str) -> String {
    use formula_drawings::Package;
    let bytes = pkg.part(name).unwrap_or_else(|| panic!("missing part {name}"));
    String::from_utf8(bytes.to_vec()).expect("utf-8 part")
}
