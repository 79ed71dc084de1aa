//! Line-number gutter and current-line marker, computed from layout data
//! alone so it can be drawn by any surface that can place text at a row.

/// Vertical extent of one text block in document coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGeometry {
    pub top: i32,
    pub height: i32,
}

/// Cursor cell in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorRect {
    pub top: i32,
    pub left: i32,
    pub height: i32,
}

impl CursorRect {
    pub fn bottom(&self) -> i32 {
        self.top + self.height - 1
    }
}

/// The slice of layout the gutter needs: blocks from the first visible one
/// onward, plus the document-to-viewport translation.
#[derive(Debug, Clone, Copy)]
pub struct VisibleLayout<'a> {
    /// Zero-based ordinal of `blocks[0]` in the whole document.
    pub first_block_number: usize,
    pub blocks: &'a [BlockGeometry],
    pub content_offset: i32,
    pub viewport_height: i32,
    pub viewport_width: i32,
    pub cursor: Option<CursorRect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GutterLine {
    pub line_number: usize,
    pub top: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerLine {
    pub y: i32,
    pub x_start: i32,
    pub x_end: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GutterPaint {
    pub lines: Vec<GutterLine>,
    pub marker: Option<MarkerLine>,
}

/// Walks blocks top to bottom until one starts at or below the viewport's
/// bottom edge. No layout yields an empty paint.
pub fn render(layout: Option<&VisibleLayout<'_>>) -> GutterPaint {
    let Some(layout) = layout else {
        return GutterPaint::default();
    };

    let mut lines = Vec::new();
    let mut line_number = layout.first_block_number + 1;
    for block in layout.blocks {
        let y = block.top + layout.content_offset;
        if y >= layout.viewport_height {
            break;
        }
        lines.push(GutterLine {
            line_number,
            top: y,
            height: block.height,
        });
        line_number += 1;
    }

    let marker = layout
        .cursor
        .map(|cursor| cursor.bottom())
        .filter(|y| (0..layout.viewport_height).contains(y))
        .map(|y| MarkerLine {
            y,
            x_start: 0,
            x_end: layout.viewport_width,
        });

    GutterPaint { lines, marker }
}

/// Right-aligns `line_number` in `width` cells. Numbers wider than the
/// gutter keep their last digits.
pub fn label(line_number: usize, width: usize) -> String {
    let digits = line_number.to_string();
    if digits.len() > width {
        digits[digits.len() - width..].to_string()
    } else {
        format!("{digits:>width$}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(count: usize) -> Vec<BlockGeometry> {
        (0..count)
            .map(|idx| BlockGeometry {
                top: idx as i32,
                height: 1,
            })
            .collect()
    }

    #[test]
    fn emits_exactly_the_rows_that_fit() {
        let blocks = uniform(100);
        let layout = VisibleLayout {
            first_block_number: 0,
            blocks: &blocks,
            content_offset: 0,
            viewport_height: 12,
            viewport_width: 40,
            cursor: None,
        };
        let paint = render(Some(&layout));
        assert_eq!(paint.lines.len(), 12);
        let numbers: Vec<_> = paint.lines.iter().map(|line| line.line_number).collect();
        assert_eq!(numbers, (1..=12).collect::<Vec<_>>());
    }

    #[test]
    fn numbering_starts_at_first_visible_ordinal() {
        let blocks = uniform(50);
        let layout = VisibleLayout {
            first_block_number: 30,
            blocks: &blocks[30..],
            content_offset: -30,
            viewport_height: 5,
            viewport_width: 40,
            cursor: None,
        };
        let paint = render(Some(&layout));
        let numbers: Vec<_> = paint.lines.iter().map(|line| line.line_number).collect();
        assert_eq!(numbers, vec![31, 32, 33, 34, 35]);
        assert_eq!(paint.lines[0].top, 0);
        assert_eq!(paint.lines[4].top, 4);
    }

    #[test]
    fn partially_scrolled_block_keeps_its_number() {
        let blocks = vec![
            BlockGeometry { top: 0, height: 3 },
            BlockGeometry { top: 3, height: 1 },
            BlockGeometry { top: 4, height: 1 },
        ];
        let layout = VisibleLayout {
            first_block_number: 0,
            blocks: &blocks,
            content_offset: -2,
            viewport_height: 2,
            viewport_width: 10,
            cursor: None,
        };
        let paint = render(Some(&layout));
        assert_eq!(
            paint.lines,
            vec![
                GutterLine {
                    line_number: 1,
                    top: -2,
                    height: 3
                },
                GutterLine {
                    line_number: 2,
                    top: 1,
                    height: 1
                },
            ]
        );
    }

    #[test]
    fn marker_sits_on_cursor_bottom_edge_across_viewport() {
        let blocks = uniform(3);
        let layout = VisibleLayout {
            first_block_number: 0,
            blocks: &blocks,
            content_offset: 0,
            viewport_height: 10,
            viewport_width: 33,
            cursor: Some(CursorRect {
                top: 2,
                left: 4,
                height: 1,
            }),
        };
        let paint = render(Some(&layout));
        assert_eq!(
            paint.marker,
            Some(MarkerLine {
                y: 2,
                x_start: 0,
                x_end: 33
            })
        );
    }

    #[test]
    fn missing_layout_renders_nothing() {
        assert_eq!(render(None), GutterPaint::default());
    }

    #[test]
    fn labels_right_align_and_truncate_past_four_digits() {
        assert_eq!(label(7, 4), "   7");
        assert_eq!(label(9999, 4), "9999");
        assert_eq!(label(12345, 4), "2345");
    }
}
