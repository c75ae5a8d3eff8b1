use squawk::geometry::{Point, Rect, Size};
use squawk::popup::{Hints, Popup, PopupWindow, Urgency};
use squawk::stack::{NotifyStack, StackLocation};
use squawk::workarea::{FixedWorkArea, WorkAreaProvider};
use std::cell::RefCell;
use std::rc::Rc;

const SCREEN: Size = Size {
    width: 3200,
    height: 1080,
};

fn dual_head() -> Rc<dyn WorkAreaProvider> {
    Rc::new(FixedWorkArea::with_areas(
        SCREEN,
        vec![Rect::new(0, 0, 1280, 1024), Rect::new(1280, 0, 1920, 1080)],
    ))
}

fn popup(id: u32, width: i32, height: i32) -> Popup {
    let popup = Popup::new(id, SCREEN, false);
    popup.set_size_request(Some(Size::new(width, height)));
    popup
}

#[test]
fn stacks_on_different_monitors_do_not_interfere() {
    let provider = dual_head();
    let left = NotifyStack::new(Rc::clone(&provider), 0, StackLocation::TopLeft).unwrap();
    let right = NotifyStack::new(provider, 1, StackLocation::BottomRight).unwrap();

    let (a, b) = (popup(1, 300, 50), popup(2, 300, 80));
    left.add_window(&a, true);
    right.add_window(&b, true);

    assert_eq!(a.position(), Point::new(0, 0));
    assert_eq!(b.position(), Point::new(2900, 1000));

    a.close();
    assert!(left.is_empty());
    assert_eq!(right.len(), 1);
    assert_eq!(b.position(), Point::new(2900, 1000));
}

#[test]
fn action_callback_can_close_its_popup() {
    let stack = NotifyStack::new(dual_head(), 1, StackLocation::BottomRight).unwrap();
    let (old, new) = (popup(1, 300, 50), popup(2, 300, 60));
    stack.add_window(&old, true);
    stack.add_window(&new, true);
    assert_eq!(old.position(), Point::new(2900, 970));

    let invoked = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&invoked);
    new.add_action("Open", "open", move |popup, key| {
        seen.borrow_mut().push((popup.id(), key.to_string()));
        popup.close();
    });

    assert!(!new.invoke_action("dismiss"));
    assert!(new.invoke_action("open"));
    assert_eq!(*invoked.borrow(), vec![(2, "open".to_string())]);

    assert!(new.is_closed());
    assert!(!new.is_realized());
    assert_eq!(stack.len(), 1);
    assert_eq!(old.position(), Point::new(2900, 1030));
}

#[test]
fn arrow_popup_stays_out_of_the_corner_stack() {
    let stack = NotifyStack::new(dual_head(), 0, StackLocation::TopLeft).unwrap();
    let plain = popup(1, 300, 50);
    stack.add_window(&plain, true);

    let pointer = popup(2, 400, 120);
    pointer.set_arrow(true, 600, 400);
    stack.add_window(&pointer, true);
    assert_eq!(stack.len(), 1);
    assert_eq!(plain.position(), Point::new(0, 0));

    let outline = pointer
        .update(PopupWindow::prepare_paint)
        .expect("arrow popups have an outline");
    let tip = Point::new(
        outline.origin.x + outline.arrow.middle.x,
        outline.origin.y + outline.arrow.middle.y,
    );
    assert_eq!(tip, Point::new(600, 400));
    assert_eq!(pointer.position(), outline.origin);

    let region = pointer.borrow().region().cloned().expect("shape region");
    assert!(!region.is_empty());

    pointer.close();
    assert!(pointer.borrow().region().is_none());
    assert_eq!(stack.len(), 1);

    let next = popup(3, 300, 60);
    stack.add_window(&next, true);
    assert_eq!(next.position(), Point::new(0, 0));
    assert_eq!(plain.position(), Point::new(0, 60));
}

#[test]
fn critical_hint_retitles_popup() {
    let popup = popup(7, 300, 50);
    assert_eq!(popup.borrow().title(), "Notification");
    popup.set_hints(&Hints {
        urgency: Some(Urgency::Critical),
    });
    assert_eq!(popup.borrow().title(), "Critical Notification");
    assert_eq!(popup.borrow().urgency(), Urgency::Critical);
}

#[test]
fn unknown_monitor_is_rejected() {
    assert!(NotifyStack::new(dual_head(), 2, StackLocation::TopLeft).is_err());
}
