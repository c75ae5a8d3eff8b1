//! Usable screen rectangles.
//!
//! A work area is the part of a monitor not reserved by panels or docks.
//! Every provider here is best effort: when the windowing system has no
//! usable answer the full screen is returned instead of an error.

use anyhow::{Context, Result};
use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::randr::ConnectionExt as _;
use x11rb::protocol::xproto::{AtomEnum, ConnectionExt as _, GetPropertyReply, Screen};
use x11rb::rust_connection::RustConnection;

use crate::geometry::{Rect, Size};

/// Longest `_NET_WORKAREA` read, in 32-bit units.
const WORKAREA_MAX_LEN: u32 = 4 * 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenInfo {
    pub number: usize,
    pub size: Size,
    pub monitors: usize,
}

pub trait WorkAreaProvider {
    fn screen(&self) -> ScreenInfo;

    /// Usable rectangle of `monitor`. Never fails; falls back to
    /// [`full_screen`].
    fn work_area(&self, monitor: usize) -> Rect;
}

pub fn full_screen(size: Size) -> Rect {
    Rect::new(0, 0, size.width, size.height)
}

/// Raw `_NET_WORKAREA` property as read from the root window.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkAreaProperty {
    pub type_: u32,
    pub format: u8,
    pub bytes_after: u32,
    pub values: Vec<u32>,
}

impl From<GetPropertyReply> for WorkAreaProperty {
    fn from(reply: GetPropertyReply) -> Self {
        let values = reply
            .value32()
            .map(|values| values.collect())
            .unwrap_or_default();
        Self {
            type_: reply.type_,
            format: reply.format,
            bytes_after: reply.bytes_after,
            values,
        }
    }
}

impl WorkAreaProperty {
    /// Rectangle number `index`, or `None` when the property is absent,
    /// malformed, truncated or too short.
    pub fn rect(&self, index: usize) -> Option<Rect> {
        if self.type_ == x11rb::NONE || self.format == 0 || self.bytes_after != 0 {
            return None;
        }
        if self.values.is_empty() || self.values.len() % 4 != 0 {
            return None;
        }
        let quad = self.values.get(index * 4..index * 4 + 4)?;
        Some(Rect::new(
            quad[0] as i32,
            quad[1] as i32,
            quad[2] as i32,
            quad[3] as i32,
        ))
    }
}

/// Fixed answers, for headless use and for backends that learn the work
/// area some other way.
#[derive(Clone, Debug)]
pub struct FixedWorkArea {
    screen: Size,
    areas: Vec<Rect>,
}

impl FixedWorkArea {
    pub fn new(screen: Size) -> Self {
        Self {
            screen,
            areas: vec![full_screen(screen)],
        }
    }

    pub fn with_areas(screen: Size, areas: Vec<Rect>) -> Self {
        Self { screen, areas }
    }
}

impl WorkAreaProvider for FixedWorkArea {
    fn screen(&self) -> ScreenInfo {
        ScreenInfo {
            number: 0,
            size: self.screen,
            monitors: self.areas.len().max(1),
        }
    }

    fn work_area(&self, monitor: usize) -> Rect {
        self.areas
            .get(monitor)
            .copied()
            .unwrap_or_else(|| full_screen(self.screen))
    }
}

/// Reads `_NET_WORKAREA` from the root window of an X screen.
pub struct X11WorkArea {
    conn: RustConnection,
    screen_num: usize,
}

impl X11WorkArea {
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None).context("connect to X server")?;
        Ok(Self { conn, screen_num })
    }

    fn root(&self) -> &Screen {
        &self.conn.setup().roots[self.screen_num]
    }

    fn screen_size(&self) -> Size {
        let root = self.root();
        Size::new(
            i32::from(root.width_in_pixels),
            i32::from(root.height_in_pixels),
        )
    }

    fn read_property(&self) -> Result<Option<WorkAreaProperty>> {
        let atom = self
            .conn
            .intern_atom(true, b"_NET_WORKAREA")?
            .reply()
            .context("intern _NET_WORKAREA")?
            .atom;
        if atom == x11rb::NONE {
            return Ok(None);
        }
        let reply = self
            .conn
            .get_property(false, self.root().root, atom, AtomEnum::ANY, 0, WORKAREA_MAX_LEN)?
            .reply()
            .context("read _NET_WORKAREA")?;
        Ok(Some(reply.into()))
    }

    fn monitor_count(&self) -> Result<usize> {
        let reply = self
            .conn
            .randr_get_monitors(self.root().root, true)?
            .reply()
            .context("randr monitors")?;
        Ok(reply.monitors.len())
    }
}

impl WorkAreaProvider for X11WorkArea {
    fn screen(&self) -> ScreenInfo {
        let monitors = self.monitor_count().unwrap_or_else(|err| {
            debug!("randr unavailable, assuming one monitor: {err:#}");
            1
        });
        ScreenInfo {
            number: self.screen_num,
            size: self.screen_size(),
            monitors: monitors.max(1),
        }
    }

    // The property is indexed by X screen, so `monitor` only selects the
    // fallback size.
    fn work_area(&self, _monitor: usize) -> Rect {
        resolve_work_area(self.read_property(), self.screen_num, self.screen_size())
    }
}

/// Picks the work area out of a `_NET_WORKAREA` query, or the full screen
/// when the query failed or the property is missing or malformed.
fn resolve_work_area(query: Result<Option<WorkAreaProperty>>, screen_num: usize, screen: Size) -> Rect {
    let fallback = full_screen(screen);
    match query {
        Ok(Some(prop)) => prop.rect(screen_num).unwrap_or_else(|| {
            warn!(?prop, "malformed _NET_WORKAREA, using full screen");
            fallback
        }),
        Ok(None) => {
            debug!("no _NET_WORKAREA, using full screen");
            fallback
        }
        Err(err) => {
            warn!("work area query failed: {err:#}");
            fallback
        }
    }
}
