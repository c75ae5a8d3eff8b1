//! Per-popup state and the handle the daemon drives it through.
//!
//! A [`Popup`] is a shared handle to one [`PopupWindow`]. The daemon owns
//! the handles; stacks hold clones while the popup is visible. Closing a
//! popup runs its close hooks exactly once, which is how stacks learn to
//! drop it.

use anyhow::Result;
use cairo::ImageSurface;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use tracing::trace;

use crate::content::{self, ContentLayout, ContentMetrics, ContentText, Spacers};
use crate::error::PreconditionError;
use crate::geometry::{Point, Size};
use crate::shape::{arrow_direction, compute_outline, ArrowDirection, Outline, Region};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    Critical,
}

impl Urgency {
    /// Maps the wire level (0, 1, 2); anything else is treated as normal.
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Self::Low,
            2 => Self::Critical,
            _ => Self::Normal,
        }
    }
}

impl FromStr for Urgency {
    type Err = PreconditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" | "0" => Ok(Self::Low),
            "normal" | "1" => Ok(Self::Normal),
            "critical" | "2" => Ok(Self::Critical),
            _ => Err(PreconditionError::UnknownUrgency(s.to_string())),
        }
    }
}

/// Hints the theme reacts to. Decoding them from the notification request
/// happens upstream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Hints {
    pub urgency: Option<Urgency>,
}

pub type ActionCallback = Rc<dyn Fn(&Popup, &str)>;
type CloseHook = Box<dyn FnOnce(&Popup)>;

#[derive(Clone)]
pub struct Action {
    pub label: String,
    pub key: String,
    callback: ActionCallback,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("label", &self.label)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Pending repaint, widest wins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Redraw {
    #[default]
    Clean,
    Countdown,
    Full,
}

pub struct PopupWindow {
    id: u32,
    title: &'static str,
    screen: Size,
    position: Point,
    width: i32,
    height: i32,
    size_override: Option<Size>,
    urgency: Urgency,
    has_arrow: bool,
    point: Point,
    timeout: i64,
    remaining: i64,
    enable_transparency: bool,
    font: String,
    summary: String,
    body: String,
    icon: Option<ImageSurface>,
    actions: Vec<Action>,
    has_pie: bool,
    spacers: Spacers,
    content: ContentLayout,
    region: Option<Region>,
    realized: bool,
    closed: bool,
    needs_layout: bool,
    redraw: Redraw,
    close_hooks: Vec<CloseHook>,
}

impl PopupWindow {
    fn new(id: u32, screen: Size, enable_transparency: bool) -> Self {
        let mut window = Self {
            id,
            title: "Notification",
            screen,
            position: Point::default(),
            width: 0,
            height: 0,
            size_override: None,
            urgency: Urgency::Normal,
            has_arrow: false,
            point: Point::default(),
            timeout: 0,
            remaining: 0,
            enable_transparency,
            font: "Sans 10".to_string(),
            summary: String::new(),
            body: String::new(),
            icon: None,
            actions: Vec::new(),
            has_pie: false,
            spacers: Spacers::default(),
            content: ContentLayout::default(),
            region: None,
            realized: true,
            closed: false,
            needs_layout: true,
            redraw: Redraw::Full,
            close_hooks: Vec::new(),
        };
        window.apply_metrics(&ContentMetrics::default());
        window
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn title(&self) -> &str {
        self.title
    }

    pub fn screen(&self) -> Size {
        self.screen
    }

    pub fn position(&self) -> Point {
        self.position
    }

    /// Last size reported by the windowing system, or the requested size
    /// before the first configure.
    pub fn size(&self) -> Size {
        if self.width == 0 {
            self.size_request()
        } else {
            Size::new(self.width, self.height)
        }
    }

    pub fn size_request(&self) -> Size {
        self.size_override.unwrap_or(self.content.size)
    }

    pub fn urgency(&self) -> Urgency {
        self.urgency
    }

    pub fn has_arrow(&self) -> bool {
        self.has_arrow
    }

    pub fn arrow_point(&self) -> Point {
        self.point
    }

    pub fn timeout(&self) -> i64 {
        self.timeout
    }

    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    pub fn transparency_enabled(&self) -> bool {
        self.enable_transparency
    }

    pub fn font(&self) -> &str {
        &self.font
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn icon(&self) -> Option<&ImageSurface> {
        self.icon.as_ref()
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn has_countdown(&self) -> bool {
        self.has_pie
    }

    pub fn spacers(&self) -> Spacers {
        self.spacers
    }

    pub fn content(&self) -> &ContentLayout {
        &self.content
    }

    pub fn region(&self) -> Option<&Region> {
        self.region.as_ref()
    }

    pub fn needs_layout(&self) -> bool {
        self.needs_layout
    }

    pub fn redraw(&self) -> Redraw {
        self.redraw
    }

    fn queue_draw(&mut self, redraw: Redraw) {
        self.redraw = self.redraw.max(redraw);
        trace!(id = self.id, ?redraw, "queue draw");
    }

    fn queue_resize(&mut self) {
        self.needs_layout = true;
        self.queue_draw(Redraw::Full);
    }

    /// Direction the arrow would take at the current size, if shown.
    pub fn arrow_direction(&self) -> Option<ArrowDirection> {
        self.has_arrow
            .then(|| arrow_direction(self.point.y, self.size().height, self.screen.height))
    }

    fn update_spacers(&mut self) {
        let spacers = match self.arrow_direction() {
            Some(ArrowDirection::Up) => Spacers {
                top: true,
                bottom: false,
            },
            Some(ArrowDirection::Down) => Spacers {
                top: false,
                bottom: true,
            },
            None => Spacers::default(),
        };
        if spacers != self.spacers {
            self.spacers = spacers;
            self.queue_resize();
        }
    }

    pub fn set_font(&mut self, font: &str) {
        self.font = font.to_string();
        self.queue_resize();
    }

    pub fn set_hints(&mut self, hints: &Hints) {
        if let Some(urgency) = hints.urgency {
            self.urgency = urgency;
            self.title = match urgency {
                Urgency::Critical => "Critical Notification",
                _ => "Notification",
            };
            self.queue_draw(Redraw::Full);
        }
    }

    pub fn set_timeout(&mut self, timeout_ms: i64) {
        self.timeout = timeout_ms;
    }

    /// Stores the time left and repaints the countdown, if there is one.
    pub fn tick(&mut self, remaining_ms: i64) {
        self.remaining = remaining_ms;
        if self.has_pie {
            self.queue_draw(Redraw::Countdown);
        }
    }

    pub fn set_text(&mut self, summary: &str, body: &str) {
        self.summary = summary.to_string();
        self.body = body.to_string();
        self.queue_resize();
    }

    pub fn set_icon(&mut self, icon: Option<ImageSurface>) {
        self.icon = icon;
        self.queue_resize();
    }

    pub fn set_arrow(&mut self, visible: bool, x: i32, y: i32) {
        self.has_arrow = visible;
        self.point = Point::new(x, y);
        self.update_spacers();
        self.queue_resize();
    }

    pub fn clear_actions(&mut self) {
        self.actions.clear();
        self.has_pie = false;
        self.queue_resize();
    }

    /// Fixed size, bypassing text measurement. `None` restores the measured
    /// size.
    pub fn set_size_request(&mut self, size: Option<Size>) {
        self.size_override = size;
        self.queue_resize();
    }

    /// A popup with an arrow places itself from the arrow anchor, so a move
    /// only asks for a new layout.
    pub fn move_to(&mut self, x: i32, y: i32) {
        if self.has_arrow {
            self.queue_resize();
        } else {
            self.position = Point::new(x, y);
        }
    }

    /// Window resize from the windowing system.
    pub fn configure(&mut self, width: i32, height: i32) {
        let size = Size::new(width, height);
        self.width = size.width;
        self.height = size.height;
        self.update_spacers();
        self.queue_draw(Redraw::Full);
    }

    /// Lays the content out from already measured sizes.
    pub fn apply_metrics(&mut self, metrics: &ContentMetrics) {
        self.content = ContentLayout::compute(metrics, self.spacers);
        self.needs_layout = false;
    }

    /// Measures text with pango and lays the content out.
    pub fn relayout(&mut self) -> Result<()> {
        let labels: Vec<&str> = self.actions.iter().map(|a| a.label.as_str()).collect();
        let icon = self
            .icon
            .as_ref()
            .map(|icon| Size::new(icon.width(), icon.height()));
        let metrics = content::measure(&ContentText {
            font: &self.font,
            summary: &self.summary,
            body: &self.body,
            icon,
            actions: &labels,
            pie: self.has_pie,
        })?;
        self.apply_metrics(&metrics);
        Ok(())
    }

    /// Outline for the next paint. With an arrow this also moves the window
    /// so the tip lands on the anchor and refreshes the shape region.
    pub fn prepare_paint(&mut self) -> Option<Outline> {
        if !self.has_arrow {
            self.region = None;
            return None;
        }
        let outline = compute_outline(self.size(), self.point, self.screen);
        self.position = outline.origin;
        self.region = Some(outline.region());
        Some(outline)
    }

    pub fn take_redraw(&mut self) -> Redraw {
        std::mem::take(&mut self.redraw)
    }

    /// Frees the shape region and marks the window unmapped.
    pub fn unrealize(&mut self) {
        self.region = None;
        self.realized = false;
    }

    pub fn is_realized(&self) -> bool {
        self.realized
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[derive(Clone)]
pub struct Popup(Rc<RefCell<PopupWindow>>);

impl fmt::Debug for Popup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Popup").field(&self.id()).finish()
    }
}

impl Popup {
    /// `transparency` should only be set when the host composites.
    pub fn new(id: u32, screen: Size, transparency: bool) -> Self {
        Self(Rc::new(RefCell::new(PopupWindow::new(id, screen, transparency))))
    }

    pub fn borrow(&self) -> Ref<'_, PopupWindow> {
        self.0.borrow()
    }

    /// Runs `f` with mutable access. Must not be nested inside another
    /// borrow of the same popup.
    pub fn update<R>(&self, f: impl FnOnce(&mut PopupWindow) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    pub fn ptr_eq(&self, other: &Popup) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn id(&self) -> u32 {
        self.0.borrow().id
    }

    pub fn position(&self) -> Point {
        self.0.borrow().position
    }

    pub fn size_request(&self) -> Size {
        self.0.borrow().size_request()
    }

    pub fn set_size_request(&self, size: Option<Size>) {
        self.update(|w| w.set_size_request(size));
    }

    pub fn move_to(&self, x: i32, y: i32) {
        self.update(|w| w.move_to(x, y));
    }

    pub fn set_hints(&self, hints: &Hints) {
        self.update(|w| w.set_hints(hints));
    }

    pub fn set_timeout(&self, timeout_ms: i64) {
        self.update(|w| w.set_timeout(timeout_ms));
    }

    pub fn tick(&self, remaining_ms: i64) {
        self.update(|w| w.tick(remaining_ms));
    }

    pub fn set_text(&self, summary: &str, body: &str) {
        self.update(|w| w.set_text(summary, body));
    }

    pub fn set_icon(&self, icon: Option<ImageSurface>) {
        self.update(|w| w.set_icon(icon));
    }

    pub fn set_arrow(&self, visible: bool, x: i32, y: i32) {
        self.update(|w| w.set_arrow(visible, x, y));
    }

    /// Appends an action button. The first one also brings up the
    /// countdown pie.
    pub fn add_action(
        &self,
        label: &str,
        key: &str,
        callback: impl Fn(&Popup, &str) + 'static,
    ) {
        self.update(|w| {
            w.actions.push(Action {
                label: label.to_string(),
                key: key.to_string(),
                callback: Rc::new(callback),
            });
            w.has_pie = true;
            w.queue_resize();
        });
    }

    pub fn clear_actions(&self) {
        self.update(PopupWindow::clear_actions);
    }

    /// Calls the callback registered for `key`. Returns whether one existed.
    pub fn invoke_action(&self, key: &str) -> bool {
        let callback = self
            .0
            .borrow()
            .actions
            .iter()
            .find(|a| a.key == key)
            .map(|a| Rc::clone(&a.callback));
        match callback {
            Some(callback) => {
                callback(self, key);
                true
            }
            None => false,
        }
    }

    pub fn on_close(&self, hook: impl FnOnce(&Popup) + 'static) {
        self.0.borrow_mut().close_hooks.push(Box::new(hook));
    }

    /// Closes the popup: runs the close hooks once, then frees its screen
    /// resources. Safe to call at any time, including repeatedly.
    pub fn close(&self) {
        let hooks = {
            let mut window = self.0.borrow_mut();
            if window.closed {
                return;
            }
            window.closed = true;
            std::mem::take(&mut window.close_hooks)
        };
        for hook in hooks {
            hook(self);
        }
        self.unrealize();
    }

    pub fn unrealize(&self) {
        self.update(PopupWindow::unrealize);
    }

    pub fn is_realized(&self) -> bool {
        self.0.borrow().realized
    }

    pub fn is_closed(&self) -> bool {
        self.0.borrow().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const SCREEN: Size = Size {
        width: 1280,
        height: 800,
    };

    fn popup() -> Popup {
        let popup = Popup::new(7, SCREEN, false);
        popup.set_size_request(Some(Size::new(400, 100)));
        popup
    }

    #[test]
    fn critical_hint_changes_title() {
        let p = popup();
        p.set_hints(&Hints {
            urgency: Some(Urgency::Critical),
        });
        assert_eq!(p.borrow().title(), "Critical Notification");
        p.set_hints(&Hints::default());
        assert_eq!(p.borrow().urgency(), Urgency::Critical);
        p.set_hints(&Hints {
            urgency: Some(Urgency::Low),
        });
        assert_eq!(p.borrow().title(), "Notification");
    }

    #[test]
    fn urgency_levels() {
        assert_eq!(Urgency::from_level(0), Urgency::Low);
        assert_eq!(Urgency::from_level(2), Urgency::Critical);
        assert_eq!(Urgency::from_level(9), Urgency::Normal);
        assert_eq!("critical".parse::<Urgency>(), Ok(Urgency::Critical));
        assert!("urgent".parse::<Urgency>().is_err());
    }

    #[test]
    fn spacers_follow_arrow_direction() {
        let p = popup();
        p.set_arrow(true, 600, 100);
        assert_eq!(
            p.borrow().spacers(),
            Spacers {
                top: true,
                bottom: false
            }
        );
        p.set_arrow(true, 600, 750);
        assert_eq!(
            p.borrow().spacers(),
            Spacers {
                top: false,
                bottom: true
            }
        );
        p.set_arrow(false, 0, 0);
        assert_eq!(p.borrow().spacers(), Spacers::default());
    }

    #[test]
    fn move_with_arrow_only_requests_layout() {
        let p = popup();
        p.move_to(10, 20);
        assert_eq!(p.position(), Point::new(10, 20));

        p.set_arrow(true, 600, 100);
        p.update(|w| w.apply_metrics(&ContentMetrics::default()));
        p.move_to(300, 300);
        assert_eq!(p.position(), Point::new(10, 20));
        assert!(p.borrow().needs_layout());

        let outline = p.update(PopupWindow::prepare_paint).unwrap();
        assert_eq!(p.position(), outline.origin);
        assert!(p.borrow().region().is_some());
    }

    #[test]
    fn tick_only_redraws_countdown_when_present() {
        let p = popup();
        p.update(PopupWindow::take_redraw);
        p.tick(500);
        assert_eq!(p.borrow().redraw(), Redraw::Clean);
        assert_eq!(p.borrow().remaining(), 500);

        p.add_action("Open", "open", |_, _| {});
        p.update(PopupWindow::take_redraw);
        p.tick(400);
        assert_eq!(p.borrow().redraw(), Redraw::Countdown);
    }

    #[test]
    fn actions_invoke_callbacks_and_clear() {
        let p = popup();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        p.add_action("Reply", "reply", move |popup, key| {
            assert_eq!(key, "reply");
            assert_eq!(popup.id(), 7);
            counter.set(counter.get() + 1);
        });
        assert!(p.borrow().has_countdown());
        assert!(p.invoke_action("reply"));
        assert!(!p.invoke_action("missing"));
        assert_eq!(hits.get(), 1);

        p.clear_actions();
        assert!(p.borrow().actions().is_empty());
        assert!(!p.borrow().has_countdown());
        assert!(!p.invoke_action("reply"));
    }

    #[test]
    fn close_runs_hooks_once() {
        let p = popup();
        let closed = Rc::new(Cell::new(0));
        let counter = Rc::clone(&closed);
        p.on_close(move |_| counter.set(counter.get() + 1));
        p.close();
        p.close();
        assert_eq!(closed.get(), 1);
        assert!(p.is_closed());
        assert!(!p.is_realized());
    }

    #[test]
    fn configure_tracks_actual_size() {
        let p = popup();
        assert_eq!(p.borrow().size(), Size::new(400, 100));
        p.update(|w| w.configure(420, -3));
        assert_eq!(p.borrow().size(), Size::new(420, 0));
        assert_eq!(p.borrow().redraw(), Redraw::Full);
    }
}
