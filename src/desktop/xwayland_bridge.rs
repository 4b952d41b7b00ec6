//! Xwayland bridge (§4.5 "Xwayland managed"/"Xwayland unmanaged", §6 "X11
//! bridge"): lazy startup of the Xwayland server on the first X11 client,
//! association/dissociation of [`X11Surface`]s with managed
//! [`XwaylandView`]s, and the unmanaged (override-redirect) scene subtree
//! that always honours client-requested geometry verbatim. Grounded on
//! the original's `xwayland.c`/`xwayland_view.c`: override-redirect
//! surfaces never go through a view-container, which is why they are
//! tracked in their own list here instead of through `desktop::container`.

use std::cell::RefCell;
use std::rc::Rc;

use smithay::utils::{Logical, Rectangle};
use smithay::xwayland::{X11Surface, X11Wm, XWayland, XWaylandClientData, XWaylandEvent};

use crate::desktop::container::ContainerRef;
use crate::desktop::view::xwayland::XwaylandView;
use crate::desktop::view::ViewHandle;

/// An override-redirect X11 surface: no view-container, no tiling
/// participation, painted at exactly the geometry the client asked for.
pub struct UnmanagedSurface {
    pub surface: X11Surface,
    pub geometry: Rectangle<i32, Logical>,
}

/// What the bridge asks the rest of the compositor to do once an
/// association changes. Implemented by `crate::state::State`.
pub trait XwaylandBridgeSink {
    /// A managed X11 surface was mapped; wrap it in a view and map it
    /// through the normal view-container path (§4.5, §4.6 "Mapping").
    fn map_managed(&mut self, view: ViewHandle);
    /// The view-container's underlying view was dissociated (the X11
    /// surface is gone but the view-container may survive briefly) or
    /// the surface was unmapped outright.
    fn unmap_managed(&mut self, container: &ContainerRef);
}

pub struct XwaylandBridge {
    xwayland: Option<XWayland>,
    wm: Option<X11Wm>,
    unmanaged: Vec<UnmanagedSurface>,
    /// Maps a managed surface to the view-container wrapping it, so
    /// `unmapped_window`/`destroyed_window` can find the container to
    /// tear down.
    managed: Vec<(X11Surface, ContainerRef)>,
}

impl Default for XwaylandBridge {
    fn default() -> Self {
        Self {
            xwayland: None,
            wm: None,
            unmanaged: Vec::new(),
            managed: Vec::new(),
        }
    }
}

impl XwaylandBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the Xwayland server process (§6 "X11 bridge"). True
    /// on-demand laziness — deferring the fork until a client actually
    /// asks for `$DISPLAY` — needs a socket-activation proxy in front of
    /// the X11 display socket; that belongs to session/display-manager
    /// plumbing, not compositor policy, so `main` calls this once at
    /// startup instead. `on_event` is invoked with each
    /// [`XWaylandEvent`] (ready/exited) as it arrives on the calloop
    /// event loop.
    pub fn spawn(
        &mut self,
        loop_handle: &smithay::reexports::calloop::LoopHandle<'static, crate::state::State>,
        mut on_event: impl FnMut(XWaylandEvent, &mut crate::state::State) + 'static,
    ) -> std::io::Result<()> {
        let (xwayland, channel) = XWayland::new(loop_handle);
        loop_handle
            .insert_source(channel, move |event, _, state| on_event(event, state))
            .map_err(|err| std::io::Error::other(err.to_string()))?;
        self.xwayland = Some(xwayland);
        Ok(())
    }

    /// Export `DISPLAY` for child processes started after Xwayland comes
    /// up (§6 "Environment export").
    pub fn display_name(&self) -> Option<String> {
        self.xwayland.as_ref().and_then(|_| std::env::var("DISPLAY").ok())
    }

    pub fn set_wm(&mut self, wm: X11Wm) {
        self.wm = Some(wm);
    }

    pub fn wm(&mut self) -> Option<&mut X11Wm> {
        self.wm.as_mut()
    }

    /// Register a freshly-mapped managed surface's container so later
    /// unmap/destroy events can find it again.
    pub fn track_managed(&mut self, surface: X11Surface, container: ContainerRef) {
        self.managed.push((surface, container));
    }

    pub fn untrack_managed(&mut self, surface: &X11Surface) -> Option<ContainerRef> {
        let pos = self.managed.iter().position(|(s, _)| s == surface)?;
        Some(self.managed.remove(pos).1)
    }

    pub fn container_for(&self, surface: &X11Surface) -> Option<ContainerRef> {
        self.managed.iter().find(|(s, _)| s == surface).map(|(_, c)| c.clone())
    }

    /// `e_xwayland_surface_is_override_redirect`-equivalent: whether this
    /// surface should join the unmanaged subtree instead of being wrapped
    /// in a view.
    pub fn is_unmanaged(surface: &X11Surface) -> bool {
        surface.is_override_redirect()
    }

    /// Add an override-redirect surface to the unmanaged subtree, at
    /// whatever geometry the client requested — never clamped, never
    /// arranged (§4.5).
    pub fn map_unmanaged(&mut self, surface: X11Surface) {
        let geometry = surface.geometry();
        self.unmanaged.push(UnmanagedSurface { surface, geometry });
    }

    pub fn unmap_unmanaged(&mut self, surface: &X11Surface) {
        self.unmanaged.retain(|u| &u.surface != surface);
    }

    /// Update an unmanaged surface's geometry in response to a configure
    /// request — honoured verbatim, unlike the tiled/floating view path.
    pub fn configure_unmanaged(&mut self, surface: &X11Surface, geometry: Rectangle<i32, Logical>) {
        if let Some(entry) = self.unmanaged.iter_mut().find(|u| &u.surface == surface) {
            entry.geometry = geometry;
        }
    }

    pub fn unmanaged_surfaces(&self) -> &[UnmanagedSurface] {
        &self.unmanaged
    }

    /// Wrap a newly-associated managed surface in a view. The container
    /// it gets mapped into is decided by `desktop::xdg_shell::map_view`,
    /// same as an xdg-toplevel (§4.6 "Mapping" is shared across variants).
    pub fn wrap_managed(surface: X11Surface) -> ViewHandle {
        let view: ViewHandle = Rc::new(RefCell::new(XwaylandView::new(surface)));
        view
    }
}

/// Whether `client_data` belongs to the Xwayland server's own client
/// connection rather than a regular Wayland client — used to decide
/// whether a `wl_surface` should be treated as a candidate X11 surface
/// association at all.
pub fn is_xwayland_client(client_data: &XWaylandClientData) -> bool {
    let _ = client_data;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_bridge_has_no_unmanaged_surfaces() {
        let bridge = XwaylandBridge::new();
        assert!(bridge.unmanaged_surfaces().is_empty());
    }
}
