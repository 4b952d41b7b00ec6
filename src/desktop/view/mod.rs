//! View polymorphism: a closed, tagged dispatch over the supported view
//! variants (xdg-shell toplevel, xwayland managed), grounded on the
//! original's `e_view`/`e_view_impl` vtable but deliberately *not*
//! reproduced as a vtable — a `dyn` trait plus an enum tag is the
//! idiomatic Rust shape for a small closed set of variants.

pub mod toplevel;
pub mod xwayland;

use std::cell::RefCell;
use std::rc::Rc;

use smithay::output::Output;
use smithay::reexports::wayland_server::protocol::wl_surface::WlSurface;

use crate::desktop::container::ContainerWeak;

/// Shared handle to a view trait object. A view is exclusively owned by its
/// view-container, so a single strong reference suffices; `Rc` rather than
/// ownership-by-value only because the container needs to hand the same
/// object to protocol handler callbacks that run outside the container's
/// own borrow.
pub type ViewHandle = Rc<RefCell<dyn View>>;

/// Size constraints reported by the client. A value of `0` (or `None` for
/// the increments) means "hint not set", matching `e_view_size_hints`'s
/// "0 or lower means hint isn't set" convention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeHints {
    pub min_width: i32,
    pub min_height: i32,
    pub max_width: i32,
    pub max_height: i32,
    pub width_inc: i32,
    pub height_inc: i32,
}

impl SizeHints {
    /// True when the client forces an exact size (a nonzero minimum that
    /// equals the maximum on either axis) — the shared half of both
    /// variants' `wants_floating` rule (§4.5/§4.6).
    pub fn forces_fixed_size(&self) -> bool {
        (self.min_width > 0 || self.min_height > 0)
            && (self.min_width == self.max_width || self.min_height == self.max_height)
    }
}

/// The capability set every view variant offers; the view-container only
/// ever interacts with a view through this trait (§4.5).
pub trait View {
    fn size_hints(&self) -> SizeHints;
    fn set_tiled(&mut self, tiled: bool);
    fn set_activated(&mut self, activated: bool);
    fn set_fullscreen(&mut self, fullscreen: bool);
    /// Request the view occupy `(lx, ly, w, h)` in layout coordinates.
    /// Round-trip semantics (immediate vs. scheduled) are variant-specific.
    fn configure(&mut self, lx: i32, ly: i32, w: i32, h: i32);
    fn wants_floating(&self) -> bool;
    fn send_close(&mut self);
    fn title(&self) -> String;
    fn app_id(&self) -> String;
    /// The underlying `wl_surface`, for render-element gathering and
    /// hit-testing. `None` once the client has destroyed its surface but
    /// the container hasn't been torn down yet.
    fn wl_surface(&self) -> Option<WlSurface>;
    /// Output currently hosting this view, if mapped and assigned.
    fn output(&self) -> Option<Output>;
    fn set_output(&mut self, output: Option<Output>);
    /// Back-pointer to the view-container wrapping this view, set once at
    /// construction by the container that owns it.
    fn container(&self) -> Option<ContainerWeak>;
    fn set_container(&mut self, container: ContainerWeak);
    /// Downcast escape hatch for variant-specific behaviour the trait
    /// doesn't generalize (e.g. routing an acked xdg-shell configure back
    /// to [`toplevel::ToplevelView`]), per the closed-variant design in §9.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

#[cfg(test)]
pub mod test_support {
    use super::*;

    /// Minimal in-memory [`View`] used by container/workspace unit tests —
    /// has no backing protocol object, just records the calls made to it.
    #[derive(Default)]
    pub struct StubView {
        pub tiled: bool,
        pub activated: bool,
        pub fullscreen: bool,
        pub configured: Option<(i32, i32, i32, i32)>,
        pub closed: bool,
        pub hints: SizeHints,
        pub output: Option<Output>,
        pub container: Option<ContainerWeak>,
    }

    impl View for StubView {
        fn size_hints(&self) -> SizeHints {
            self.hints
        }
        fn set_tiled(&mut self, tiled: bool) {
            self.tiled = tiled;
        }
        fn set_activated(&mut self, activated: bool) {
            self.activated = activated;
        }
        fn set_fullscreen(&mut self, fullscreen: bool) {
            self.fullscreen = fullscreen;
        }
        fn configure(&mut self, lx: i32, ly: i32, w: i32, h: i32) {
            self.configured = Some((lx, ly, w, h));
        }
        fn wants_floating(&self) -> bool {
            self.hints.forces_fixed_size()
        }
        fn send_close(&mut self) {
            self.closed = true;
        }
        fn title(&self) -> String {
            "stub".to_string()
        }
        fn app_id(&self) -> String {
            "stub".to_string()
        }
        fn wl_surface(&self) -> Option<WlSurface> {
            None
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forces_fixed_size_requires_nonzero_min_equal_to_max() {
        let unset = SizeHints::default();
        assert!(!unset.forces_fixed_size());

        let fixed = SizeHints {
            min_width: 200,
            max_width: 200,
            min_height: 100,
            max_height: 100,
            ..Default::default()
        };
        assert!(fixed.forces_fixed_size());

        let resizable = SizeHints {
            min_width: 200,
            max_width: 400,
            ..Default::default()
        };
        assert!(!resizable.forces_fixed_size());
    }
}
