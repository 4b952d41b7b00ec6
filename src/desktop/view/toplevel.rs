//! `xdg-shell` toplevel view: the configure/ack/commit round-trip variant
//! (§4.5 "Toplevel (xdg-shell) configure/ack cycle"), grounded on the
//! original's `toplevel_view.c`.

use smithay::output::Output;
use smithay::utils::{Logical, Point};
use smithay::wayland::shell::xdg::ToplevelSurface;

use crate::desktop::container::ContainerWeak;
use crate::desktop::view::{SizeHints, View};

/// A size-configure is "in flight" between the compositor issuing it and
/// the client acking + committing the matching surface state. At most one
/// may be outstanding per the contract in §4.5; further `configure` calls
/// while one is in flight only update `pending`.
#[derive(Debug, Clone, Copy)]
struct PendingConfigure {
    loc: Point<i32, Logical>,
    size: (i32, i32),
}

pub struct ToplevelView {
    surface: ToplevelSurface,
    container: Option<ContainerWeak>,
    output: Option<Output>,

    current_size: (i32, i32),
    scheduled_loc: Point<i32, Logical>,
    in_flight: bool,
    pending: Option<PendingConfigure>,
}

impl ToplevelView {
    pub fn new(surface: ToplevelSurface) -> Self {
        Self {
            surface,
            container: None,
            output: None,
            current_size: (0, 0),
            scheduled_loc: (0, 0).into(),
            in_flight: false,
            pending: None,
        }
    }

    pub fn surface(&self) -> &ToplevelSurface {
        &self.surface
    }

    /// Call when the client's surface commit acknowledges a previously
    /// issued configure. Updates `current_size` from the acked state and
    /// the remembered `scheduled_loc`; if a newer `configure` arrived while
    /// this one was in flight, issues it now.
    pub fn on_ack_commit(&mut self, acked_size: (i32, i32)) {
        self.current_size = acked_size;
        self.in_flight = false;

        if let Some(pending) = self.pending.take() {
            self.scheduled_loc = pending.loc;
            self.issue_configure(pending.size);
        }
    }

    fn issue_configure(&mut self, size: (i32, i32)) {
        self.in_flight = true;
        self.surface.with_pending_state(|state| {
            state.size = Some(size.into());
        });
        self.surface.send_configure();
    }
}

impl View for ToplevelView {
    fn size_hints(&self) -> SizeHints {
        let guard = self.surface.current_state();
        SizeHints {
            min_width: guard.min_size.w,
            min_height: guard.min_size.h,
            max_width: guard.max_size.w,
            max_height: guard.max_size.h,
            width_inc: 0,
            height_inc: 0,
        }
    }

    fn set_tiled(&mut self, tiled: bool) {
        self.surface.with_pending_state(|state| {
            use smithay::reexports::wayland_protocols::xdg::shell::server::xdg_toplevel::State as XdgState;
            if tiled {
                state.states.set(XdgState::TiledLeft);
                state.states.set(XdgState::TiledRight);
                state.states.set(XdgState::TiledTop);
                state.states.set(XdgState::TiledBottom);
            } else {
                state.states.unset(XdgState::TiledLeft);
                state.states.unset(XdgState::TiledRight);
                state.states.unset(XdgState::TiledTop);
                state.states.unset(XdgState::TiledBottom);
            }
        });
    }

    fn set_activated(&mut self, activated: bool) {
        self.surface.with_pending_state(|state| {
            use smithay::reexports::wayland_protocols::xdg::shell::server::xdg_toplevel::State as XdgState;
            if activated {
                state.states.set(XdgState::Activated);
            } else {
                state.states.unset(XdgState::Activated);
            }
        });
        self.surface.send_configure();
    }

    fn set_fullscreen(&mut self, fullscreen: bool) {
        self.surface.with_pending_state(|state| {
            use smithay::reexports::wayland_protocols::xdg::shell::server::xdg_toplevel::State as XdgState;
            if fullscreen {
                state.states.set(XdgState::Fullscreen);
            } else {
                state.states.unset(XdgState::Fullscreen);
            }
        });
        self.surface.send_configure();
    }

    /// Not immediate: records `(lx, ly)` and, unless a configure is already
    /// in flight, issues the new size. A position-only change (size
    /// unchanged) moves the container node without a round-trip, signalled
    /// to the caller by `on_ack_commit` never being required for this call
    /// — the container arrange step applies `scheduled_loc` directly.
    fn configure(&mut self, lx: i32, ly: i32, w: i32, h: i32) {
        self.scheduled_loc = (lx, ly).into();

        if (w, h) == self.current_size {
            return;
        }

        if self.in_flight {
            self.pending = Some(PendingConfigure {
                loc: (lx, ly).into(),
                size: (w, h),
            });
            return;
        }

        self.issue_configure((w, h));
    }

    fn wants_floating(&self) -> bool {
        self.size_hints().forces_fixed_size()
    }

    fn send_close(&mut self) {
        self.surface.send_close();
    }

    fn title(&self) -> String {
        smithay::wayland::shell::xdg::XdgToplevelSurfaceData::with(self.surface.wl_surface(), |data| {
            data.title.clone().unwrap_or_default()
        })
    }

    fn app_id(&self) -> String {
        smithay::wayland::shell::xdg::XdgToplevelSurfaceData::with(self.surface.wl_surface(), |data| {
            data.app_id.clone().unwrap_or_default()
        })
    }

    fn wl_surface(&self) -> Option<smithay::reexports::wayland_server::protocol::wl_surface::WlSurface> {
        Some(self.surface.wl_surface().clone())
    }

    fn output(&self) -> Option<Output> {
        self.output.clone()
    }

    fn set_output(&mut self, output: Option<Output>) {
        self.output = output;
    }

    fn container(&self) -> Option<ContainerWeak> {
        self.container.clone()
    }

    fn set_container(&mut self, container: ContainerWeak) {
        self.container = Some(container);
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
