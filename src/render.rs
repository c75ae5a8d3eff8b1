//! Popup painting.
//!
//! A paint is a fixed sequence of passes over one cairo context:
//! background, border, urgency stripe, content, countdown pie. The
//! countdown can also be repainted on its own when only time has passed.

use anyhow::Result;
use cairo::{Context as CairoContext, LinearGradient, Operator};
use pangocairo::functions as pangocairo;
use std::f64::consts::{FRAC_PI_2, PI};

use crate::content::{self, PIE_RADIUS};
use crate::geometry::Rect;
use crate::popup::{PopupWindow, Urgency};
use crate::shape::Outline;
use crate::style::{Rgba, Style, CRITICAL_COLOR};

pub const STRIPE_WIDTH: i32 = 30;
pub const GRADIENT_STRIPE_WIDTH: i32 = 45;
pub const BACKGROUND_OPACITY: f64 = 0.92;
pub const BOTTOM_GRADIENT_HEIGHT: i32 = 30;

/// Chosen once at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RendererConfig {
    /// Faded stripe and a darkened bottom edge.
    pub gradient_look: bool,
    /// Whether the host blends translucent surfaces.
    pub composited: bool,
}

impl RendererConfig {
    pub fn stripe_width(&self) -> i32 {
        if self.gradient_look {
            GRADIENT_STRIPE_WIDTH
        } else {
            STRIPE_WIDTH
        }
    }

    /// Translucency is only worth asking for when something composites it.
    pub fn transparency(&self, wanted: bool) -> bool {
        wanted && self.composited
    }
}

pub fn stripe_color(urgency: Urgency, style: &Style) -> Rgba {
    match urgency {
        Urgency::Low => style.bg_normal,
        Urgency::Critical => CRITICAL_COLOR,
        Urgency::Normal => style.bg_selected,
    }
}

/// Share of the timeout still left, or `None` without a timeout.
pub fn countdown_fraction(remaining: i64, timeout: i64) -> Option<f64> {
    (timeout > 0).then(|| (remaining as f64 / timeout as f64).clamp(0.0, 1.0))
}

/// Start and end angle of the countdown wedge: from twelve o'clock,
/// clockwise on screen.
pub fn countdown_angles(fraction: f64) -> (f64, f64) {
    let start = -FRAC_PI_2;
    (start, start + fraction * 2.0 * PI)
}

fn set_source(cr: &CairoContext, color: Rgba) {
    cr.set_source_rgba(color[0], color[1], color[2], color[3]);
}

fn trace_polygon(cr: &CairoContext, outline: &Outline, inset: f64) {
    let mut points = outline.border.points().iter();
    if let Some(first) = points.next() {
        cr.move_to(f64::from(first.x) + inset, f64::from(first.y) + inset);
        for p in points {
            cr.line_to(f64::from(p.x) + inset, f64::from(p.y) + inset);
        }
        cr.close_path();
    }
}

pub struct PopupRenderer {
    config: RendererConfig,
    style: Style,
}

impl PopupRenderer {
    pub fn new(config: RendererConfig, style: Style) -> Self {
        Self { config, style }
    }

    pub fn config(&self) -> RendererConfig {
        self.config
    }

    pub fn style(&self) -> &Style {
        &self.style
    }

    /// Paints the whole popup. `outline` is the arrow outline from
    /// [`PopupWindow::prepare_paint`], if the popup has an arrow.
    pub fn paint(&self, cr: &CairoContext, popup: &PopupWindow, outline: Option<&Outline>) -> Result<()> {
        let size = popup.size();
        cr.save()?;
        cr.set_operator(Operator::Source);
        cr.set_source_rgba(0.0, 0.0, 0.0, 0.0);
        cr.paint()?;
        cr.set_operator(Operator::Over);

        let area = Rect::new(0, 0, size.width, size.height);
        self.fill_background(cr, popup, area, outline)?;
        self.draw_border(cr, popup, outline)?;
        self.draw_stripe(cr, popup)?;
        self.draw_content(cr, popup)?;
        self.draw_countdown(cr, popup)?;
        cr.restore()?;
        Ok(())
    }

    /// Repaints just the countdown pie.
    pub fn paint_countdown(&self, cr: &CairoContext, popup: &PopupWindow) -> Result<()> {
        cr.save()?;
        self.draw_countdown(cr, popup)?;
        cr.restore()?;
        Ok(())
    }

    pub(crate) fn fill_background(
        &self,
        cr: &CairoContext,
        popup: &PopupWindow,
        area: Rect,
        outline: Option<&Outline>,
    ) -> Result<()> {
        let mut color = self.style.base;
        if popup.transparency_enabled() {
            color[3] = BACKGROUND_OPACITY;
        }
        set_source(cr, color);
        match outline {
            Some(outline) => trace_polygon(cr, outline, 0.5),
            None => cr.rectangle(
                f64::from(area.x),
                f64::from(area.y),
                f64::from(area.width),
                f64::from(area.height),
            ),
        }
        cr.fill()?;

        if self.config.gradient_look {
            let top = f64::from(area.bottom() - BOTTOM_GRADIENT_HEIGHT);
            let gradient = LinearGradient::new(0.0, top, 0.0, f64::from(area.bottom()));
            gradient.add_color_stop_rgba(0.0, 0.0, 0.0, 0.0, 0.0);
            gradient.add_color_stop_rgba(1.0, 0.0, 0.0, 0.0, 0.15);
            cr.rectangle(
                f64::from(area.x),
                top,
                f64::from(area.width),
                f64::from(BOTTOM_GRADIENT_HEIGHT),
            );
            cr.set_source(&gradient)?;
            cr.fill()?;
        }
        Ok(())
    }

    pub(crate) fn draw_border(
        &self,
        cr: &CairoContext,
        popup: &PopupWindow,
        outline: Option<&Outline>,
    ) -> Result<()> {
        let size = popup.size();
        set_source(cr, self.style.border);
        cr.set_line_width(1.0);
        match outline {
            Some(outline) => trace_polygon(cr, outline, 0.5),
            None => cr.rectangle(
                0.5,
                0.5,
                f64::from(size.width - 1),
                f64::from(size.height - 1),
            ),
        }
        cr.stroke()?;
        Ok(())
    }

    pub(crate) fn draw_stripe(&self, cr: &CairoContext, popup: &PopupWindow) -> Result<()> {
        let main = popup.content().main;
        let x = f64::from(main.x + 1);
        let y = f64::from(main.y + 1);
        let width = f64::from(self.config.stripe_width());
        let height = f64::from(main.height - 2);
        if height <= 0.0 {
            return Ok(());
        }
        let color = stripe_color(popup.urgency(), &self.style);

        cr.rectangle(x, y, width, height);
        if self.config.gradient_look {
            let gradient = LinearGradient::new(x, 0.0, x + width, 0.0);
            gradient.add_color_stop_rgba(0.0, color[0], color[1], color[2], 1.0);
            gradient.add_color_stop_rgba(1.0, color[0], color[1], color[2], 0.0);
            cr.set_source(&gradient)?;
        } else {
            set_source(cr, color);
        }
        cr.fill()?;
        Ok(())
    }

    fn draw_content(&self, cr: &CairoContext, popup: &PopupWindow) -> Result<()> {
        let layout = popup.content();

        if let (Some(icon), Some(rect)) = (popup.icon(), layout.icon) {
            cr.save()?;
            cr.rectangle(
                f64::from(rect.x),
                f64::from(rect.y),
                f64::from(rect.width),
                f64::from(rect.height),
            );
            cr.clip();
            cr.set_source_surface(icon, f64::from(rect.x), f64::from(rect.y))?;
            cr.paint()?;
            cr.restore()?;
        }

        set_source(cr, self.style.text);
        let summary = content::text_layout(
            cr,
            popup.font(),
            &content::summary_markup(popup.summary()),
            layout.summary.width,
        );
        cr.move_to(f64::from(layout.summary.x), f64::from(layout.summary.y));
        pangocairo::show_layout(cr, &summary);

        if let Some(rect) = layout.body {
            let body = content::text_layout(
                cr,
                popup.font(),
                &content::body_markup(popup.body()),
                rect.width,
            );
            cr.move_to(f64::from(rect.x), f64::from(rect.y));
            pangocairo::show_layout(cr, &body);
        }

        // close button glyph
        let close = layout.close;
        let inset = 6.0;
        cr.set_line_width(1.5);
        cr.move_to(f64::from(close.x) + inset, f64::from(close.y) + inset);
        cr.line_to(f64::from(close.right()) - inset, f64::from(close.bottom()) - inset);
        cr.move_to(f64::from(close.right()) - inset, f64::from(close.y) + inset);
        cr.line_to(f64::from(close.x) + inset, f64::from(close.bottom()) - inset);
        cr.stroke()?;

        cr.set_line_width(1.0);
        for (action, rect) in popup.actions().iter().zip(&layout.actions) {
            let mut frame = self.style.border;
            frame[3] *= 0.3;
            set_source(cr, frame);
            cr.rectangle(
                f64::from(rect.x) + 0.5,
                f64::from(rect.y) + 0.5,
                f64::from(rect.width - 1),
                f64::from(rect.height - 1),
            );
            cr.stroke()?;

            set_source(cr, self.style.text);
            let label = content::text_layout(cr, popup.font(), &content::action_markup(&action.label), 0);
            let (w, h) = label.pixel_size();
            cr.move_to(
                f64::from(rect.x + (rect.width - w) / 2),
                f64::from(rect.y + (rect.height - h) / 2),
            );
            pangocairo::show_layout(cr, &label);
        }
        Ok(())
    }

    pub(crate) fn draw_countdown(&self, cr: &CairoContext, popup: &PopupWindow) -> Result<()> {
        let Some(pie) = popup.content().pie else {
            return Ok(());
        };

        // the pie area gets its own background, like a separate widget
        cr.save()?;
        cr.rectangle(
            f64::from(pie.x),
            f64::from(pie.y),
            f64::from(pie.width),
            f64::from(pie.height),
        );
        cr.clip();
        cr.set_operator(Operator::Source);
        self.fill_background(cr, popup, pie, None)?;
        cr.set_operator(Operator::Over);

        if let Some(fraction) = countdown_fraction(popup.remaining(), popup.timeout()) {
            let radius = f64::from(PIE_RADIUS);
            let cx = f64::from(pie.x) + radius;
            let cy = f64::from(pie.y) + radius;
            let (start, end) = countdown_angles(fraction);
            set_source(cr, self.style.bg_active);
            cr.move_to(cx, cy);
            cr.arc(cx, cy, radius, start, end);
            cr.line_to(cx, cy);
            cr.fill()?;
        }
        cr.restore()?;
        Ok(())
    }
}
