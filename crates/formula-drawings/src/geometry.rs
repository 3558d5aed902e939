//! Bulk width/height snapshots, used to keep drawings the same size across column or row
//! resizes.

use crate::anchor::{Anchor, EmuPoint, EmuSize};
use crate::drawings::Drawings;

/// Origin and extent of a drawing along one axis, in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisSpan {
    pub origin: i64,
    pub size: i64,
}

impl Drawings {
    /// Horizontal span of every drawing, in collection order.
    ///
    /// Two-cell anchors have no intrinsic size and report `size: 0`; drawings without readable
    /// geometry report the default span.
    pub fn capture_widths(&self) -> Vec<AxisSpan> {
        self.capture(|anchor| match anchor {
            Anchor::Absolute { pos, ext } => AxisSpan { origin: pos.x, size: ext.cx },
            Anchor::OneCell { from, ext } => AxisSpan { origin: from.col_off, size: ext.cx },
            Anchor::TwoCell { from, .. } => AxisSpan { origin: from.col_off, size: 0 },
        })
    }

    pub fn capture_heights(&self) -> Vec<AxisSpan> {
        self.capture(|anchor| match anchor {
            Anchor::Absolute { pos, ext } => AxisSpan { origin: pos.y, size: ext.cy },
            Anchor::OneCell { from, ext } => AxisSpan { origin: from.row_off, size: ext.cy },
            Anchor::TwoCell { from, .. } => AxisSpan { origin: from.row_off, size: 0 },
        })
    }

    /// Restore widths captured by [`Drawings::capture_widths`].
    ///
    /// Two-cell anchors stretch with their cells and are left alone. Absolute anchors get both
    /// origin and size back; one-cell anchors only their size. Extra spans are ignored.
    pub fn adjust_widths(&mut self, spans: &[AxisSpan]) {
        self.adjust(spans, |anchor, span| match anchor {
            Anchor::Absolute { pos, ext } => Some(Anchor::Absolute {
                pos: EmuPoint { x: span.origin, ..pos },
                ext: EmuSize { cx: span.size, ..ext },
            }),
            Anchor::OneCell { from, ext } => Some(Anchor::OneCell {
                from,
                ext: EmuSize { cx: span.size, ..ext },
            }),
            Anchor::TwoCell { .. } => None,
        });
    }

    pub fn adjust_heights(&mut self, spans: &[AxisSpan]) {
        self.adjust(spans, |anchor, span| match anchor {
            Anchor::Absolute { pos, ext } => Some(Anchor::Absolute {
                pos: EmuPoint { y: span.origin, ..pos },
                ext: EmuSize { cy: span.size, ..ext },
            }),
            Anchor::OneCell { from, ext } => Some(Anchor::OneCell {
                from,
                ext: EmuSize { cy: span.size, ..ext },
            }),
            Anchor::TwoCell { .. } => None,
        });
    }

    fn capture(&self, span_of: impl Fn(Anchor) -> AxisSpan) -> Vec<AxisSpan> {
        self.tree
            .anchors
            .iter()
            .map(|anchor| Anchor::parse(anchor).map(&span_of).unwrap_or_default())
            .collect()
    }

    fn adjust(&mut self, spans: &[AxisSpan], apply: impl Fn(Anchor, AxisSpan) -> Option<Anchor>) {
        for (anchor, span) in self.tree.anchors.iter_mut().zip(spans) {
            let Some(updated) = Anchor::parse(anchor).and_then(|current| apply(current, *span)) else {
                continue;
            };
            updated.write(anchor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::{AnchorPoint, EditAs};
    use crate::drawing::ShapeStyle;
    use crate::package::{OpcPackage, Package};
    use crate::page::Page;

    #[test]
    fn widths_survive_a_round_trip_through_other_edits() {
        let mut pkg = OpcPackage::new();
        pkg.create_part(
            "xl/worksheets/sheet1.xml",
            "application/xml",
            br#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData/></worksheet>"#.to_vec(),
        )
        .expect("sheet");
        let mut drawings = Drawings::new(Page::worksheet("xl/worksheets/sheet1.xml", 1));
        drawings.add_shape(&mut pkg, "Two", ShapeStyle::Rect).expect("two");
        drawings
            .add_chart_as(&mut pkg, "Abs", crate::chart::ChartType::Pie, None, EditAs::Absolute)
            .expect("abs");

        drawings
            .set_geometry(
                1,
                Anchor::Absolute {
                    pos: EmuPoint { x: 100, y: 200 },
                    ext: EmuSize { cx: 3000, cy: 4000 },
                },
            )
            .expect("abs geometry");
        let widths = drawings.capture_widths();
        assert_eq!(
            widths,
            vec![
                AxisSpan { origin: 0, size: 0 },
                AxisSpan { origin: 100, size: 3000 },
            ]
        );

        let two_cell_before = drawings.geometry(0);
        drawings
            .set_geometry(
                1,
                Anchor::Absolute {
                    pos: EmuPoint { x: 7, y: 200 },
                    ext: EmuSize { cx: 9, cy: 4000 },
                },
            )
            .expect("resize");
        drawings
            .set_to(0, AnchorPoint::new(3, 3))
            .expect("two-cell corner");
        let two_cell_moved = drawings.geometry(0);

        drawings.adjust_widths(&widths);
        assert_eq!(
            drawings.geometry(1),
            Some(Anchor::Absolute {
                pos: EmuPoint { x: 100, y: 200 },
                ext: EmuSize { cx: 3000, cy: 4000 },
            })
        );
        assert_ne!(two_cell_before, two_cell_moved);
        assert_eq!(drawings.geometry(0), two_cell_moved);
    }
}
