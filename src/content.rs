//! Content box layout: summary row, icon column, body and action row.
//!
//! Coordinates are popup-relative. The popup is a fixed-width column; its
//! height follows from the measured text, the icon and the arrow spacers.

use anyhow::Result;
use cairo::{Context as CairoContext, Format, ImageSurface};
use pango::glib::markup_escape_text;
use pangocairo::functions as pangocairo;

use crate::geometry::{Rect, Size};
use crate::shape::DEFAULT_ARROW_HEIGHT;

pub const WIDTH: i32 = 400;
pub const IMAGE_SIZE: i32 = 32;
pub const IMAGE_PADDING: i32 = 10;
pub const SPACER_LEFT: i32 = 30;
pub const BODY_X_OFFSET: i32 = IMAGE_SIZE + 8;
pub const PIE_RADIUS: i32 = 12;
pub const PIE_SIZE: i32 = 2 * PIE_RADIUS;
pub const CLOSE_SIZE: i32 = 20;

const FRAME: i32 = 1;
const PADDING: i32 = 10;
const SPACING: i32 = 6;
const ACTION_PADDING: i32 = 4;

/// Arrow room above or below the content. At most one is shown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Spacers {
    pub top: bool,
    pub bottom: bool,
}

/// Measured sizes of everything that goes into the content box.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentMetrics {
    pub summary: Size,
    pub body: Option<Size>,
    pub icon: Option<Size>,
    pub actions: Vec<Size>,
    pub pie: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentLayout {
    pub size: Size,
    /// Area below the frame and spacers; the urgency stripe runs along its
    /// left edge.
    pub main: Rect,
    pub summary: Rect,
    pub close: Rect,
    pub icon: Option<Rect>,
    pub body: Option<Rect>,
    pub actions: Vec<Rect>,
    pub pie: Option<Rect>,
}

fn inner_left() -> i32 {
    FRAME + PADDING
}

fn inner_right() -> i32 {
    WIDTH - FRAME - PADDING
}

fn summary_x() -> i32 {
    inner_left() + SPACER_LEFT + SPACING
}

fn close_x() -> i32 {
    inner_right() - CLOSE_SIZE
}

fn icon_column(icon: Option<Size>) -> i32 {
    icon.map_or(BODY_X_OFFSET, |icon| icon.width.max(BODY_X_OFFSET))
}

fn body_x(icon: Option<Size>) -> i32 {
    inner_left() + icon_column(icon) + SPACING
}

/// Wrap width for the summary label.
pub fn summary_text_width() -> i32 {
    close_x() - SPACING - summary_x()
}

/// Wrap width for the body label, which shrinks when a wide icon is shown.
pub fn body_text_width(icon: Option<Size>) -> i32 {
    inner_right() - body_x(icon)
}

impl ContentLayout {
    pub fn compute(metrics: &ContentMetrics, spacers: Spacers) -> Self {
        let main_y = FRAME + if spacers.top { DEFAULT_ARROW_HEIGHT } else { 0 };
        let mut y = main_y + PADDING;

        let summary = Rect::new(
            summary_x(),
            y,
            summary_text_width(),
            metrics.summary.height,
        );
        let close = Rect::new(close_x(), y, CLOSE_SIZE, CLOSE_SIZE);
        y += metrics.summary.height.max(CLOSE_SIZE);

        let mut icon = None;
        let mut body = None;
        let mut actions = Vec::with_capacity(metrics.actions.len());
        let mut pie = None;

        let has_action_row = !metrics.actions.is_empty() || metrics.pie;
        if metrics.icon.is_some() || metrics.body.is_some() || has_action_row {
            y += SPACING;
            let top = y;

            icon = metrics.icon.map(|size| {
                let x = inner_left() + (icon_column(metrics.icon) - size.width) / 2;
                Rect::new(x, top, size.width, size.height)
            });

            let x = body_x(metrics.icon);
            let mut column_y = top;
            if let Some(size) = metrics.body {
                body = Some(Rect::new(x, column_y, body_text_width(metrics.icon), size.height));
                column_y += size.height;
            }

            if has_action_row {
                if body.is_some() {
                    column_y += SPACING;
                }
                let buttons: Vec<Size> = metrics
                    .actions
                    .iter()
                    .map(|label| {
                        Size::new(
                            label.width + 2 * ACTION_PADDING,
                            (label.height + 2 * ACTION_PADDING).max(PIE_SIZE),
                        )
                    })
                    .collect();
                let mut row_width: i32 = buttons.iter().map(|b| b.width + SPACING).sum();
                if metrics.pie {
                    row_width += PIE_SIZE;
                } else {
                    row_width -= SPACING;
                }
                let row_height = buttons
                    .iter()
                    .map(|b| b.height)
                    .max()
                    .unwrap_or(0)
                    .max(if metrics.pie { PIE_SIZE } else { 0 });

                let mut cursor = inner_right() - row_width;
                for button in &buttons {
                    actions.push(Rect::new(cursor, column_y, button.width, button.height));
                    cursor += button.width + SPACING;
                }
                if metrics.pie {
                    pie = Some(Rect::new(
                        cursor,
                        column_y + (row_height - PIE_SIZE) / 2,
                        PIE_SIZE,
                        PIE_SIZE,
                    ));
                }
                column_y += row_height;
            }

            let icon_height = metrics.icon.map_or(0, |size| size.height);
            y = top + (column_y - top).max(icon_height);
        }

        y += PADDING;
        let main = Rect::new(FRAME, main_y, WIDTH - 2 * FRAME, y - main_y);
        let height = y + if spacers.bottom { DEFAULT_ARROW_HEIGHT } else { 0 } + FRAME;

        Self {
            size: Size::new(WIDTH, height),
            main,
            summary,
            close,
            icon,
            body,
            actions,
            pie,
        }
    }
}

pub fn summary_markup(summary: &str) -> String {
    format!("<b><big>{}</big></b>", markup_escape_text(summary))
}

pub fn action_markup(label: &str) -> String {
    format!("<small>{}</small>", markup_escape_text(label))
}

pub fn body_markup(body: &str) -> String {
    markup_escape_text(body).to_string()
}

/// Wrapped pango layout for `markup`; `width <= 0` disables wrapping.
pub fn text_layout(cr: &CairoContext, font: &str, markup: &str, width: i32) -> pango::Layout {
    let layout = pangocairo::create_layout(cr);
    let font_desc = pango::FontDescription::from_string(font);
    layout.set_font_description(Some(&font_desc));
    if width > 0 {
        layout.set_width(width * pango::SCALE);
        layout.set_wrap(pango::WrapMode::WordChar);
    }
    layout.set_markup(markup);
    layout
}

/// Text input for [`measure`].
pub struct ContentText<'a> {
    pub font: &'a str,
    pub summary: &'a str,
    pub body: &'a str,
    pub icon: Option<Size>,
    pub actions: &'a [&'a str],
    pub pie: bool,
}

pub fn measure(text: &ContentText<'_>) -> Result<ContentMetrics> {
    let surface = ImageSurface::create(Format::ARgb32, 1, 1)?;
    let cr = CairoContext::new(&surface)?;
    let pixel_size = |markup: &str, width: i32| {
        let (w, h) = text_layout(&cr, text.font, markup, width).pixel_size();
        Size::new(w, h)
    };

    let summary = pixel_size(&summary_markup(text.summary), summary_text_width());
    let body = (!text.body.is_empty())
        .then(|| pixel_size(&body_markup(text.body), body_text_width(text.icon)));
    let actions = text
        .actions
        .iter()
        .map(|label| pixel_size(&action_markup(label), 0))
        .collect();

    Ok(ContentMetrics {
        summary,
        body,
        icon: text.icon,
        actions,
        pie: text.pie,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary_only() -> ContentMetrics {
        ContentMetrics {
            summary: Size::new(200, 24),
            ..ContentMetrics::default()
        }
    }

    #[test]
    fn summary_only_hides_content_row() {
        let layout = ContentLayout::compute(&summary_only(), Spacers::default());
        assert_eq!(layout.size, Size::new(WIDTH, 1 + 10 + 24 + 10 + 1));
        assert_eq!(layout.main, Rect::new(1, 1, WIDTH - 2, 44));
        assert!(layout.body.is_none());
        assert!(layout.pie.is_none());
    }

    #[test]
    fn spacers_add_arrow_room() {
        let plain = ContentLayout::compute(&summary_only(), Spacers::default());
        let top = ContentLayout::compute(
            &summary_only(),
            Spacers {
                top: true,
                bottom: false,
            },
        );
        assert_eq!(top.size.height, plain.size.height + DEFAULT_ARROW_HEIGHT);
        assert_eq!(top.main.y, plain.main.y + DEFAULT_ARROW_HEIGHT);

        let bottom = ContentLayout::compute(
            &summary_only(),
            Spacers {
                top: false,
                bottom: true,
            },
        );
        assert_eq!(bottom.main, plain.main);
        assert_eq!(bottom.size.height, top.size.height);
    }

    #[test]
    fn actions_are_right_aligned_with_pie_last() {
        let metrics = ContentMetrics {
            summary: Size::new(200, 24),
            body: Some(Size::new(250, 40)),
            actions: vec![Size::new(40, 12), Size::new(60, 12)],
            pie: true,
            ..ContentMetrics::default()
        };
        let layout = ContentLayout::compute(&metrics, Spacers::default());
        let pie = layout.pie.unwrap();
        assert_eq!(pie.right(), inner_right());
        assert_eq!(layout.actions.len(), 2);
        assert!(layout.actions[1].right() + SPACING <= pie.x);
        let body = layout.body.unwrap();
        assert!(layout.actions[0].y >= body.bottom());
        assert!(layout.main.bottom() <= layout.size.height);
    }

    #[test]
    fn wide_icon_narrows_body() {
        let wide = Some(Size::new(64, 64));
        assert!(body_text_width(wide) < body_text_width(None));
        let metrics = ContentMetrics {
            summary: Size::new(200, 24),
            icon: wide,
            ..ContentMetrics::default()
        };
        let layout = ContentLayout::compute(&metrics, Spacers::default());
        let icon = layout.icon.unwrap();
        assert_eq!(icon.x, inner_left());
        assert!(layout.size.height >= icon.bottom() + PADDING);
    }

    #[test]
    fn markup_escapes_text() {
        assert_eq!(summary_markup("a<b"), "<b><big>a&lt;b</big></b>");
        assert_eq!(action_markup("R&D"), "<small>R&amp;D</small>");
    }
}
