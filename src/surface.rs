//! Wayland presentation: one wlr layer-shell overlay surface per popup.
//!
//! Layer surfaces cannot be placed at absolute coordinates, so every popup
//! is anchored to the top-left corner of the usable area and its position
//! is carried in the margins. The usable area itself is learned from a
//! probe surface stretched across all four edges.

use anyhow::{Context, Result};
use cairo::{Context as CairoContext, Format, ImageSurface};
use memfd::MemfdOptions;
use memmap2::MmapMut;
use std::collections::{HashMap, HashSet};
use std::io;
use std::os::unix::io::AsFd;
use tracing::{debug, trace, warn};
use wayland_client::backend::WaylandError;
use wayland_client::protocol::{
    wl_buffer::WlBuffer, wl_compositor::WlCompositor, wl_region::WlRegion, wl_registry::WlRegistry,
    wl_shm::WlShm, wl_shm_pool::WlShmPool, wl_surface::WlSurface,
};
use wayland_client::{
    globals::{registry_queue_init, GlobalListContents},
    Connection, Dispatch, EventQueue, QueueHandle,
};
use wayland_protocols_wlr::layer_shell::v1::client::{
    zwlr_layer_shell_v1::{self, ZwlrLayerShellV1},
    zwlr_layer_surface_v1::{self, ZwlrLayerSurfaceV1},
};

use crate::geometry::{Point, Size};
use crate::popup::{Popup, PopupWindow, Redraw};
use crate::render::PopupRenderer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceRole {
    Probe,
    Popup(u32),
}

#[derive(Default)]
pub struct State {
    configured: HashMap<SurfaceRole, (i32, i32)>,
    closed: HashSet<SurfaceRole>,
    /// Serials of buffers the compositor has handed back.
    released: HashSet<u64>,
}

impl Dispatch<ZwlrLayerSurfaceV1, SurfaceRole> for State {
    fn event(
        state: &mut Self,
        proxy: &ZwlrLayerSurfaceV1,
        event: zwlr_layer_surface_v1::Event,
        role: &SurfaceRole,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            zwlr_layer_surface_v1::Event::Configure { serial, width, height } => {
                proxy.ack_configure(serial);
                state
                    .configured
                    .insert(*role, (width as i32, height as i32));
            }
            zwlr_layer_surface_v1::Event::Closed => {
                state.closed.insert(*role);
            }
            _ => {}
        }
    }
}

impl Dispatch<WlSurface, ()> for State {
    fn event(
        _: &mut Self,
        _: &WlSurface,
        _: wayland_client::protocol::wl_surface::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<WlCompositor, ()> for State {
    fn event(
        _: &mut Self,
        _: &WlCompositor,
        _: wayland_client::protocol::wl_compositor::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<WlShm, ()> for State {
    fn event(
        _: &mut Self,
        _: &WlShm,
        _: wayland_client::protocol::wl_shm::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZwlrLayerShellV1, ()> for State {
    fn event(
        _: &mut Self,
        _: &ZwlrLayerShellV1,
        _: zwlr_layer_shell_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<WlRegistry, GlobalListContents> for State {
    fn event(
        _: &mut Self,
        _: &WlRegistry,
        _: wayland_client::protocol::wl_registry::Event,
        _: &GlobalListContents,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<WlBuffer, u64> for State {
    fn event(
        state: &mut Self,
        _: &WlBuffer,
        event: wayland_client::protocol::wl_buffer::Event,
        serial: &u64,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wayland_client::protocol::wl_buffer::Event::Release = event {
            state.released.insert(*serial);
        }
    }
}

impl Dispatch<WlShmPool, ()> for State {
    fn event(
        _: &mut Self,
        _: &WlShmPool,
        _: wayland_client::protocol::wl_shm_pool::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<WlRegion, ()> for State {
    fn event(
        _: &mut Self,
        _: &WlRegion,
        _: wayland_client::protocol::wl_region::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

/// Buffers per surface: one on screen, one being painted.
const MAX_BUFFERS: usize = 2;

struct Buffer {
    mmap: MmapMut,
    wl_buffer: WlBuffer,
    stride: i32,
}

struct Slot<B> {
    buffer: B,
    serial: u64,
    size: Size,
    /// Attached and not yet released by the compositor.
    busy: bool,
    /// Content generation the pixels were last fully painted at.
    generation: u64,
}

/// Which of a surface's buffers may be painted, and whether their pixels
/// are recent enough for a countdown-only repaint.
struct Slots<B> {
    slots: Vec<Slot<B>>,
    generation: u64,
}

impl<B> Slots<B> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            generation: 0,
        }
    }

    /// Marks the buffer with `serial` free. Returns whether it is ours.
    fn release(&mut self, serial: u64) -> bool {
        match self.slots.iter_mut().find(|s| s.serial == serial) {
            Some(slot) => {
                slot.busy = false;
                true
            }
            None => false,
        }
    }

    /// Removes every buffer not of `size` and hands them back for
    /// destruction.
    fn retire(&mut self, size: Size) -> Vec<B> {
        let (keep, retired): (Vec<_>, Vec<_>) =
            self.slots.drain(..).partition(|s| s.size == size);
        self.slots = keep;
        retired.into_iter().map(|s| s.buffer).collect()
    }

    fn free(&self, size: Size) -> Option<usize> {
        self.slots.iter().position(|s| !s.busy && s.size == size)
    }

    fn is_full(&self) -> bool {
        self.slots.len() >= MAX_BUFFERS
    }

    fn insert(&mut self, buffer: B, serial: u64, size: Size) -> usize {
        self.slots.push(Slot {
            buffer,
            serial,
            size,
            busy: false,
            generation: 0,
        });
        self.slots.len() - 1
    }

    /// Whether slot `index` holds the latest content, so only the pie
    /// needs repainting.
    fn is_current(&self, index: usize) -> bool {
        self.generation > 0 && self.slots[index].generation == self.generation
    }

    /// Records a full paint into slot `index` and hands it to the
    /// compositor. `changed` starts a new content generation.
    fn mark_full(&mut self, index: usize, changed: bool) {
        if changed || self.generation == 0 {
            self.generation += 1;
        }
        let slot = &mut self.slots[index];
        slot.generation = self.generation;
        slot.busy = true;
    }

    fn mark_partial(&mut self, index: usize) {
        self.slots[index].busy = true;
    }

    fn get_mut(&mut self, index: usize) -> &mut B {
        &mut self.slots[index].buffer
    }

    fn drain(&mut self) -> impl Iterator<Item = B> + '_ {
        self.slots.drain(..).map(|s| s.buffer)
    }
}

fn create_buffer(shm: &WlShm, qh: &QueueHandle<State>, size: Size, serial: u64) -> Result<Buffer> {
    let stride = size.width * 4;
    let len = stride * size.height;

    let memfd = MemfdOptions::default().create("squawk")?;
    memfd.as_file().set_len(len as u64)?;

    let mmap = unsafe { MmapMut::map_mut(memfd.as_file())? };

    let pool = shm.create_pool(memfd.as_file().as_fd(), len, qh, ());
    let wl_buffer = pool.create_buffer(
        0,
        size.width,
        size.height,
        stride,
        wayland_client::protocol::wl_shm::Format::Argb8888,
        qh,
        serial,
    );
    pool.destroy();

    Ok(Buffer {
        mmap,
        wl_buffer,
        stride,
    })
}

/// Surface, layer role and pixels of one popup. Dropping it destroys all
/// three.
pub struct PopupSurface {
    id: u32,
    surface: WlSurface,
    layer: ZwlrLayerSurfaceV1,
    buffers: Slots<Buffer>,
    size: Option<Size>,
    position: Option<Point>,
}

impl Drop for PopupSurface {
    fn drop(&mut self) {
        self.layer.destroy();
        self.surface.destroy();
        for buffer in self.buffers.drain() {
            buffer.wl_buffer.destroy();
        }
    }
}

pub struct Display {
    conn: Connection,
    queue: EventQueue<State>,
    qh: QueueHandle<State>,
    state: State,
    compositor: WlCompositor,
    shm: WlShm,
    layer_shell: ZwlrLayerShellV1,
    next_serial: u64,
}

impl Display {
    pub fn connect() -> Result<Self> {
        let conn = Connection::connect_to_env().context("connect to wayland")?;
        let (globals, queue) = registry_queue_init(&conn).context("init registry")?;
        let qh = queue.handle();

        let compositor: WlCompositor = globals.bind(&qh, 4..=5, ()).context("bind wl_compositor")?;
        let shm: WlShm = globals.bind(&qh, 1..=1, ()).context("bind wl_shm")?;
        let layer_shell: ZwlrLayerShellV1 = globals
            .bind(&qh, 1..=4, ())
            .context("bind zwlr_layer_shell_v1")?;

        Ok(Self {
            conn,
            queue,
            qh,
            state: State::default(),
            compositor,
            shm,
            layer_shell,
            next_serial: 0,
        })
    }

    /// Usable size of the default output, if the compositor sizes the probe.
    pub fn probe_work_area(&mut self) -> Option<Size> {
        let surface = self.compositor.create_surface(&self.qh, ());
        let layer = self.layer_shell.get_layer_surface(
            &surface,
            None,
            zwlr_layer_shell_v1::Layer::Background,
            "squawk-probe".to_string(),
            &self.qh,
            SurfaceRole::Probe,
        );
        layer.set_anchor(
            zwlr_layer_surface_v1::Anchor::Top
                | zwlr_layer_surface_v1::Anchor::Bottom
                | zwlr_layer_surface_v1::Anchor::Left
                | zwlr_layer_surface_v1::Anchor::Right,
        );
        layer.set_size(0, 0);
        layer.set_exclusive_zone(0);
        layer.set_keyboard_interactivity(zwlr_layer_surface_v1::KeyboardInteractivity::None);
        surface.commit();

        let probed = match self.queue.roundtrip(&mut self.state) {
            Ok(_) => self.state.configured.remove(&SurfaceRole::Probe),
            Err(err) => {
                warn!("work area probe failed: {err}");
                None
            }
        };
        layer.destroy();
        surface.destroy();

        match probed {
            Some((width, height)) if width > 0 && height > 0 => {
                debug!(width, height, "probed work area");
                Some(Size::new(width, height))
            }
            _ => {
                warn!("compositor did not size the work area probe");
                None
            }
        }
    }

    pub fn create_surface(&mut self, id: u32) -> PopupSurface {
        let surface = self.compositor.create_surface(&self.qh, ());
        let layer = self.layer_shell.get_layer_surface(
            &surface,
            None,
            zwlr_layer_shell_v1::Layer::Overlay,
            "squawk".to_string(),
            &self.qh,
            SurfaceRole::Popup(id),
        );
        layer.set_anchor(zwlr_layer_surface_v1::Anchor::Top | zwlr_layer_surface_v1::Anchor::Left);
        layer.set_keyboard_interactivity(zwlr_layer_surface_v1::KeyboardInteractivity::None);
        layer.set_exclusive_zone(0);

        PopupSurface {
            id,
            surface,
            layer,
            buffers: Slots::new(),
            size: None,
            position: None,
        }
    }

    /// Reads whatever the compositor sent and dispatches it. Never blocks.
    pub fn dispatch(&mut self) -> Result<()> {
        self.conn.flush().context("flush wayland")?;
        if let Some(guard) = self.queue.prepare_read() {
            match guard.read() {
                Ok(_) => {}
                Err(WaylandError::Io(err)) if err.kind() == io::ErrorKind::WouldBlock => {}
                Err(err) => return Err(err).context("read wayland events"),
            }
        }
        self.queue
            .dispatch_pending(&mut self.state)
            .context("dispatch wayland events")?;
        Ok(())
    }

    /// Popups whose surfaces the compositor has closed.
    pub fn take_closed(&mut self) -> Vec<u32> {
        let closed = std::mem::take(&mut self.state.closed);
        closed
            .into_iter()
            .filter_map(|role| match role {
                SurfaceRole::Popup(id) => Some(id),
                SurfaceRole::Probe => None,
            })
            .collect()
    }

    fn configure_size(&mut self, target: &mut PopupSurface, request: Size) -> Result<Size> {
        target
            .layer
            .set_size(request.width as u32, request.height as u32);
        target.surface.commit();
        self.queue
            .roundtrip(&mut self.state)
            .context("configure popup surface")?;
        target.size = Some(request);

        let configured = self
            .state
            .configured
            .remove(&SurfaceRole::Popup(target.id))
            .filter(|&(w, h)| w > 0 && h > 0)
            .map_or(request, |(w, h)| Size::new(w, h));
        Ok(configured)
    }

    /// A released buffer of `size`, a new one while there is room, or `None`
    /// when the compositor still holds all of them.
    fn acquire_buffer(&mut self, target: &mut PopupSurface, size: Size) -> Result<Option<usize>> {
        if let Some(index) = target.buffers.free(size) {
            return Ok(Some(index));
        }
        if target.buffers.is_full() {
            return Ok(None);
        }
        let serial = self.next_serial;
        self.next_serial += 1;
        let buffer = create_buffer(&self.shm, &self.qh, size, serial)?;
        Ok(Some(target.buffers.insert(buffer, serial, size)))
    }

    /// Brings the surface in line with the popup: size, position, pixels
    /// and input region.
    pub fn present(
        &mut self,
        target: &mut PopupSurface,
        popup: &Popup,
        renderer: &PopupRenderer,
    ) -> Result<()> {
        if popup.borrow().needs_layout() {
            popup.update(PopupWindow::relayout)?;
        }

        let request = popup.size_request();
        if target.size != Some(request) {
            let size = self.configure_size(target, request)?;
            popup.update(|w| w.configure(size.width, size.height));
            if popup.borrow().needs_layout() {
                popup.update(PopupWindow::relayout)?;
            }
        }

        let outline = popup.update(PopupWindow::prepare_paint);
        let (size, position, redraw) = {
            let window = popup.borrow();
            (window.size(), window.position(), window.redraw())
        };
        if size.is_empty() {
            return Ok(());
        }

        if target.position != Some(position) {
            target.layer.set_margin(position.y, 0, 0, position.x);
            target.position = Some(position);
        }

        let released = &mut self.state.released;
        released.retain(|&serial| !target.buffers.release(serial));
        for old in target.buffers.retire(size) {
            old.wl_buffer.destroy();
        }

        if redraw != Redraw::Clean {
            match self.acquire_buffer(target, size)? {
                Some(index) => {
                    popup.update(PopupWindow::take_redraw);
                    let changed = redraw == Redraw::Full;
                    let partial = !changed && target.buffers.is_current(index);
                    let window = popup.borrow();
                    let buffer = target.buffers.get_mut(index);
                    let data = buffer.mmap.as_mut();
                    let surface = unsafe {
                        ImageSurface::create_for_data_unsafe(
                            data.as_mut_ptr(),
                            Format::ARgb32,
                            size.width,
                            size.height,
                            buffer.stride,
                        )?
                    };
                    {
                        let cr = CairoContext::new(&surface)?;
                        if partial {
                            renderer.paint_countdown(&cr, &window)?;
                        } else {
                            renderer.paint(&cr, &window, outline.as_ref())?;
                        }
                    }
                    surface.flush();

                    target.surface.attach(Some(&buffer.wl_buffer), 0, 0);
                    target.surface.damage_buffer(0, 0, size.width, size.height);
                    if partial {
                        target.buffers.mark_partial(index);
                    } else {
                        target.buffers.mark_full(index, changed);
                    }
                }
                None => trace!(id = target.id, "buffers held by the compositor, repaint deferred"),
            }
        }

        let window = popup.borrow();
        match window.region() {
            Some(shape) => {
                let region = self.compositor.create_region(&self.qh, ());
                for rect in shape.rects() {
                    region.add(rect.x, rect.y, rect.width, rect.height);
                }
                target.surface.set_input_region(Some(&region));
                region.destroy();
            }
            None => target.surface.set_input_region(None),
        }

        target.surface.commit();
        Ok(())
    }
}
