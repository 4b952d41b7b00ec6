//! Xwayland managed view (§4.5 "Xwayland managed"), grounded on the
//! original's `xwayland_view.c`. Configure is immediate — there is no
//! configure/ack round-trip the way `xdg-shell` has one, since the X11
//! protocol has no equivalent negotiation.

use smithay::output::Output;
use smithay::xwayland::xwm::WmWindowType;
use smithay::xwayland::X11Surface;

use crate::desktop::container::ContainerWeak;
use crate::desktop::view::{SizeHints, View};

/// Window-type atoms that force floating regardless of size hints (§4.5).
const FLOATING_WINDOW_TYPES: &[WmWindowType] = &[
    WmWindowType::Dialog,
    WmWindowType::DropdownMenu,
    WmWindowType::PopupMenu,
    WmWindowType::Tooltip,
    WmWindowType::Splash,
    WmWindowType::Notification,
    WmWindowType::Menu,
    WmWindowType::Combo,
];

pub struct XwaylandView {
    surface: X11Surface,
    container: Option<ContainerWeak>,
    output: Option<Output>,
}

impl XwaylandView {
    pub fn new(surface: X11Surface) -> Self {
        Self {
            surface,
            container: None,
            output: None,
        }
    }

    pub fn surface(&self) -> &X11Surface {
        &self.surface
    }
}

impl View for XwaylandView {
    fn size_hints(&self) -> SizeHints {
        let hints = self.surface.size_hints();
        hints
            .map(|h| SizeHints {
                min_width: h.min_size.map(|s| s.0).unwrap_or(0),
                min_height: h.min_size.map(|s| s.1).unwrap_or(0),
                max_width: h.max_size.map(|s| s.0).unwrap_or(0),
                max_height: h.max_size.map(|s| s.1).unwrap_or(0),
                width_inc: 0,
                height_inc: 0,
            })
            .unwrap_or_default()
    }

    fn set_tiled(&mut self, tiled: bool) {
        let _ = tiled;
    }

    fn set_activated(&mut self, activated: bool) {
        let _ = self.surface.set_activated(activated);
    }

    fn set_fullscreen(&mut self, fullscreen: bool) {
        let _ = self.surface.set_fullscreen(fullscreen);
    }

    /// Immediate: the surface accepts absolute layout coordinates directly,
    /// no scheduling. Commit re-reads the surface's reported geometry
    /// rather than trusting this call's size (§4.5).
    fn configure(&mut self, lx: i32, ly: i32, w: i32, h: i32) {
        let geo = smithay::utils::Rectangle::from_loc_and_size((lx, ly), (w.max(1), h.max(1)));
        if self.surface.configure(geo).is_err() {
            // The X11 surface has been dissociated from its wl_surface
            // (client gone between map and this configure).
            tracing::debug!("{}", crate::error::CompositorError::Clientless);
        }
    }

    fn wants_floating(&self) -> bool {
        if self.surface.is_modal() {
            return true;
        }
        if self.size_hints().forces_fixed_size() {
            return true;
        }
        FLOATING_WINDOW_TYPES
            .iter()
            .any(|ty| self.surface.window_type() == Some(*ty))
    }

    fn send_close(&mut self) {
        let _ = self.surface.close();
    }

    fn title(&self) -> String {
        self.surface.title()
    }

    fn app_id(&self) -> String {
        self.surface.class()
    }

    fn wl_surface(&self) -> Option<smithay::reexports::wayland_server::protocol::wl_surface::WlSurface> {
        self.surface.wl_surface()
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
