//! Corner-anchored notification stacks.
//!
//! A stack owns the ordered list of visible popups for one screen corner.
//! The head of the list sits in the corner; every other member is placed
//! one popup further away. Positions are recomputed on every add and
//! remove, so closing a popup compacts the rest towards the corner.

use serde::Deserialize;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::str::FromStr;
use tracing::debug;

use crate::error::PreconditionError;
use crate::geometry::{Rect, Size};
use crate::popup::Popup;
use crate::workarea::WorkAreaProvider;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StackLocation {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

impl StackLocation {
    pub fn is_top(self) -> bool {
        matches!(self, Self::TopLeft | Self::TopRight)
    }

    fn x_for(self, area: Rect, width: i32) -> i32 {
        match self {
            Self::TopLeft | Self::BottomLeft => area.x,
            Self::TopRight | Self::BottomRight => area.right() - width,
        }
    }
}

impl FromStr for StackLocation {
    type Err = PreconditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "top-left" => Ok(Self::TopLeft),
            "top-right" => Ok(Self::TopRight),
            "bottom-left" => Ok(Self::BottomLeft),
            "bottom-right" => Ok(Self::BottomRight),
            _ => Err(PreconditionError::UnknownLocation(s.to_string())),
        }
    }
}

impl fmt::Display for StackLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomRight => "bottom-right",
        })
    }
}

/// Running placement while walking a stack away from its corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Cursor {
    x: i32,
    y: i32,
    shift_y: i32,
}

impl Cursor {
    /// Placement of the popup in the corner itself.
    fn origin(location: StackLocation, area: Rect, size: Size) -> Self {
        let x = location.x_for(area, size.width);
        if location.is_top() {
            Self {
                x,
                y: area.y,
                shift_y: size.height,
            }
        } else {
            Self {
                x,
                y: area.bottom() - size.height,
                shift_y: 0,
            }
        }
    }

    /// Advance past the previous member to the next one, of `size`.
    fn translate(&mut self, location: StackLocation, area: Rect, size: Size) {
        self.x = location.x_for(area, size.width);
        if location.is_top() {
            self.y += self.shift_y;
            self.shift_y = size.height;
        } else {
            self.y -= size.height;
        }
    }
}

struct StackState {
    provider: Rc<dyn WorkAreaProvider>,
    monitor: usize,
    location: StackLocation,
    windows: Vec<Popup>,
}

impl StackState {
    fn work_area(&self) -> Rect {
        self.provider.work_area(self.monitor)
    }

    /// Re-place every member except `skip`, starting from `cursor`.
    fn relayout(&self, area: Rect, mut cursor: Cursor, skip: &Popup) {
        for popup in self
            .windows
            .iter()
            .filter(|w| !w.ptr_eq(skip) && !w.borrow().has_arrow())
        {
            let size = popup.size_request();
            cursor.translate(self.location, area, size);
            debug!(id = popup.id(), x = cursor.x, y = cursor.y, "restack");
            popup.move_to(cursor.x, cursor.y);
        }
    }
}

/// Shared handle to one stack. Calls on one stack must not interleave;
/// everything runs on the UI thread.
#[derive(Clone)]
pub struct NotifyStack(Rc<RefCell<StackState>>);

impl NotifyStack {
    pub fn new(
        provider: Rc<dyn WorkAreaProvider>,
        monitor: usize,
        location: StackLocation,
    ) -> Result<Self, PreconditionError> {
        let available = provider.screen().monitors;
        if monitor >= available {
            return Err(PreconditionError::MonitorOutOfRange { monitor, available });
        }
        Ok(Self(Rc::new(RefCell::new(StackState {
            provider,
            monitor,
            location,
            windows: Vec::new(),
        }))))
    }

    pub fn location(&self) -> StackLocation {
        self.0.borrow().location
    }

    /// Changes where the next add or remove lays the stack out. Members
    /// stay where they are until then.
    pub fn set_location(&self, location: StackLocation) {
        self.0.borrow_mut().location = location;
    }

    pub fn monitor(&self) -> usize {
        self.0.borrow().monitor
    }

    /// Current members, head (corner) first.
    pub fn windows(&self) -> Vec<Popup> {
        self.0.borrow().windows.clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().windows.is_empty()
    }

    pub fn contains(&self, popup: &Popup) -> bool {
        self.0.borrow().windows.iter().any(|w| w.ptr_eq(popup))
    }

    /// Puts `popup` in the corner and pushes every other member outwards.
    ///
    /// A new notification becomes the head of the stack and removes itself
    /// again when it closes. Popups showing an arrow place themselves from
    /// their anchor and never join a stack.
    pub fn add_window(&self, popup: &Popup, new_notification: bool) {
        if popup.borrow().has_arrow() {
            debug!(id = popup.id(), "arrow popup, not stacked");
            return;
        }
        {
            let state = self.0.borrow();
            let area = state.work_area();
            let cursor = Cursor::origin(state.location, area, popup.size_request());
            debug!(id = popup.id(), x = cursor.x, y = cursor.y, location = %state.location, "add");
            popup.move_to(cursor.x, cursor.y);
            state.relayout(area, cursor, popup);
        }

        if new_notification && !self.contains(popup) {
            let stack: Weak<RefCell<StackState>> = Rc::downgrade(&self.0);
            popup.on_close(move |closed| {
                if let Some(state) = stack.upgrade() {
                    NotifyStack(state).remove_window(closed);
                }
            });
            self.0.borrow_mut().windows.insert(0, popup.clone());
        }
    }

    /// Compacts the other members towards the corner, forgets `popup` and
    /// releases its screen resources.
    pub fn remove_window(&self, popup: &Popup) {
        {
            let state = self.0.borrow();
            let area = state.work_area();
            let cursor = Cursor::origin(state.location, area, Size::default());
            debug!(id = popup.id(), "remove");
            state.relayout(area, cursor, popup);
        }

        self.0.borrow_mut().windows.retain(|w| !w.ptr_eq(popup));
        popup.unrealize();
    }

    /// Drops every member reference. Member windows stay open.
    pub fn destroy(&self) {
        self.0.borrow_mut().windows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::workarea::FixedWorkArea;

    fn provider(area: Rect) -> Rc<dyn WorkAreaProvider> {
        Rc::new(FixedWorkArea::with_areas(Size::new(1280, 800), vec![area]))
    }

    fn popup(id: u32, width: i32, height: i32) -> Popup {
        let popup = Popup::new(id, Size::new(1280, 800), false);
        popup.set_size_request(Some(Size::new(width, height)));
        popup
    }

    fn origin(popup: &Popup) -> Point {
        popup.position()
    }

    fn bounds(popup: &Popup) -> Rect {
        Rect::from_origin_size(popup.position(), popup.size_request())
    }

    #[test]
    fn top_left_accumulates_heights_from_head() {
        let stack = NotifyStack::new(provider(Rect::new(0, 0, 1280, 800)), 0, StackLocation::TopLeft).unwrap();
        let (a, b, c) = (popup(1, 300, 70), popup(2, 300, 60), popup(3, 300, 50));
        for p in [&a, &b, &c] {
            stack.add_window(p, true);
        }
        // head first: 50, 60, 70
        assert_eq!(origin(&c), Point::new(0, 0));
        assert_eq!(origin(&b), Point::new(0, 50));
        assert_eq!(origin(&a), Point::new(0, 110));
    }

    #[test]
    fn newest_popup_takes_the_corner() {
        let area = Rect::new(40, 24, 1200, 760);
        let stack = NotifyStack::new(provider(area), 0, StackLocation::TopRight).unwrap();
        let (a, b, c) = (popup(1, 300, 50), popup(2, 350, 60), popup(3, 320, 70));
        for p in [&a, &b, &c] {
            stack.add_window(p, true);
        }
        assert_eq!(origin(&c), Point::new(area.right() - 320, 24));
        assert_eq!(origin(&b), Point::new(area.right() - 350, 24 + 70));
        assert_eq!(origin(&a), Point::new(area.right() - 300, 24 + 130));
        assert!(stack.windows()[0].ptr_eq(&c));
    }

    #[test]
    fn bottom_right_grows_upwards() {
        let stack = NotifyStack::new(provider(Rect::new(0, 0, 800, 600)), 0, StackLocation::BottomRight).unwrap();
        let (a, b) = (popup(1, 300, 50), popup(2, 350, 60));
        stack.add_window(&a, true);
        assert_eq!(origin(&a), Point::new(500, 550));
        stack.add_window(&b, true);
        assert_eq!(origin(&b), Point::new(450, 540));
        assert_eq!(origin(&a), Point::new(500, 490));
    }

    #[test]
    fn members_never_overlap() {
        let area = Rect::new(0, 30, 1280, 770);
        for location in [
            StackLocation::TopLeft,
            StackLocation::TopRight,
            StackLocation::BottomLeft,
            StackLocation::BottomRight,
        ] {
            let stack = NotifyStack::new(provider(area), 0, location).unwrap();
            let popups: Vec<Popup> = (0..8)
                .map(|i| popup(i, 250 + (i as i32 * 37) % 150, 40 + (i as i32 * 23) % 90))
                .collect();
            for p in &popups {
                stack.add_window(p, true);
            }
            stack.remove_window(&popups[3]);
            stack.remove_window(&popups[6]);

            let members = stack.windows();
            assert_eq!(members.len(), 6);
            for (i, p) in members.iter().enumerate() {
                let r = bounds(p);
                assert!(r.x >= area.x && r.right() <= area.right(), "{location}: {r:?}");
                if location.is_top() {
                    assert!(r.y >= area.y);
                } else {
                    assert!(r.bottom() <= area.bottom());
                }
                for q in &members[i + 1..] {
                    assert!(!r.intersects(&bounds(q)), "{location}: {r:?} overlaps {:?}", bounds(q));
                }
            }
        }
    }

    #[test]
    fn remove_compacts_towards_corner() {
        let stack = NotifyStack::new(provider(Rect::new(0, 0, 1280, 800)), 0, StackLocation::TopLeft).unwrap();
        let (a, b, c) = (popup(1, 300, 50), popup(2, 300, 60), popup(3, 300, 70));
        for p in [&a, &b, &c] {
            stack.add_window(p, true);
        }
        stack.remove_window(&b);
        assert!(!stack.contains(&b));
        assert_eq!(origin(&c), Point::new(0, 0));
        assert_eq!(origin(&a), Point::new(0, 70));
    }

    #[test]
    fn readding_equal_head_restores_layout() {
        let stack = NotifyStack::new(provider(Rect::new(0, 0, 1280, 800)), 0, StackLocation::BottomLeft).unwrap();
        let (a, b, c) = (popup(1, 300, 50), popup(2, 300, 60), popup(3, 300, 70));
        for p in [&a, &b, &c] {
            stack.add_window(p, true);
        }
        let before: Vec<Rect> = stack.windows().iter().map(bounds).collect();

        stack.remove_window(&c);
        let again = popup(4, 300, 70);
        stack.add_window(&again, true);
        let after: Vec<Rect> = stack.windows().iter().map(bounds).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn closing_a_popup_removes_it() {
        let stack = NotifyStack::new(provider(Rect::new(0, 0, 1280, 800)), 0, StackLocation::TopLeft).unwrap();
        let (a, b) = (popup(1, 300, 50), popup(2, 300, 60));
        stack.add_window(&a, true);
        stack.add_window(&b, true);
        assert_eq!(origin(&a), Point::new(0, 60));

        b.close();
        assert_eq!(stack.len(), 1);
        assert_eq!(origin(&a), Point::new(0, 0));
        assert!(!b.is_realized());
    }

    #[test]
    fn location_change_is_lazy() {
        let stack = NotifyStack::new(provider(Rect::new(0, 0, 1280, 800)), 0, StackLocation::TopLeft).unwrap();
        let a = popup(1, 300, 50);
        stack.add_window(&a, true);
        stack.set_location(StackLocation::BottomRight);
        assert_eq!(origin(&a), Point::new(0, 0));

        let b = popup(2, 300, 60);
        stack.add_window(&b, true);
        assert_eq!(origin(&b), Point::new(980, 740));
        assert_eq!(origin(&a), Point::new(980, 690));
    }

    #[test]
    fn existing_popup_is_not_registered_twice() {
        let stack = NotifyStack::new(provider(Rect::new(0, 0, 1280, 800)), 0, StackLocation::TopLeft).unwrap();
        let a = popup(1, 300, 50);
        stack.add_window(&a, true);
        stack.add_window(&a, true);
        stack.add_window(&a, false);
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn rejects_bad_monitor() {
        let err = NotifyStack::new(provider(Rect::new(0, 0, 10, 10)), 2, StackLocation::TopLeft)
            .err()
            .unwrap();
        assert_eq!(
            err,
            PreconditionError::MonitorOutOfRange {
                monitor: 2,
                available: 1
            }
        );
    }

    #[test]
    fn parses_locations() {
        assert_eq!("top-left".parse::<StackLocation>(), Ok(StackLocation::TopLeft));
        assert_eq!("BOTTOM_RIGHT".parse::<StackLocation>(), Ok(StackLocation::BottomRight));
        assert_eq!(
            "center".parse::<StackLocation>(),
            Err(PreconditionError::UnknownLocation("center".into()))
        );
    }

    #[test]
    fn destroy_keeps_windows_open() {
        let stack = NotifyStack::new(provider(Rect::new(0, 0, 1280, 800)), 0, StackLocation::TopLeft).unwrap();
        let a = popup(1, 300, 50);
        stack.add_window(&a, true);
        stack.destroy();
        assert!(stack.is_empty());
        assert!(!a.is_closed());
    }

    #[test]
    fn arrow_popups_leave_the_corner_free() {
        let stack = NotifyStack::new(provider(Rect::new(0, 0, 1280, 800)), 0, StackLocation::TopLeft).unwrap();
        let plain = popup(1, 300, 50);
        stack.add_window(&plain, true);

        let pointer = popup(2, 400, 120);
        pointer.set_arrow(true, 600, 400);
        stack.add_window(&pointer, true);
        assert!(!stack.contains(&pointer));
        assert_eq!(origin(&plain), Point::new(0, 0));
    }

    #[test]
    fn member_that_gains_an_arrow_is_skipped_on_relayout() {
        let stack = NotifyStack::new(provider(Rect::new(0, 0, 1280, 800)), 0, StackLocation::TopLeft).unwrap();
        let (a, b, c) = (popup(1, 300, 50), popup(2, 300, 60), popup(3, 300, 70));
        stack.add_window(&a, true);
        stack.add_window(&b, true);
        assert_eq!(origin(&a), Point::new(0, 60));

        b.set_arrow(true, 600, 400);
        stack.add_window(&c, true);
        assert_eq!(origin(&c), Point::new(0, 0));
        assert_eq!(origin(&a), Point::new(0, 70));
    }
}
