//! `wlr-layer-shell` surfaces: state machine and exclusive-zone layout
//! (§4.4), grounded on the original's `layer_surface.c` for the
//! create/commit/destroy shape and on the wlr-layer-shell protocol's
//! well-known exclusive-zone algorithm for the geometry math itself (the
//! original delegates that math to wlroots' scene helper, which has no
//! Rust counterpart here).

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use bitflags::bitflags;
use smithay::utils::{Logical, Rectangle};

use crate::desktop::output::OutputWeak;

pub type LayerSurfaceRef = Rc<RefCell<LayerSurfaceState>>;
pub type LayerSurfaceWeak = Weak<RefCell<LayerSurfaceState>>;

/// The four wlr-layer-shell protocol layers, back to front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShellLayer {
    Background,
    Bottom,
    Top,
    Overlay,
}

impl ShellLayer {
    /// Configure order for exclusive-zone claims: higher layers claim
    /// space first (§4.3 "overlay→top→bottom→background gives higher
    /// layers priority").
    pub const CONFIGURE_ORDER: [ShellLayer; 4] = [
        ShellLayer::Overlay,
        ShellLayer::Top,
        ShellLayer::Bottom,
        ShellLayer::Background,
    ];
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Anchor: u8 {
        const TOP    = 1 << 0;
        const BOTTOM = 1 << 1;
        const LEFT   = 1 << 2;
        const RIGHT  = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Margin {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardInteractivity {
    None,
    Exclusive,
    OnDemand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerSurfaceLifecycle {
    Uninitialised,
    Configured,
    Mapped,
    Unmapped,
    Destroyed,
}

pub struct LayerSurfaceState {
    pub layer: ShellLayer,
    pub anchor: Anchor,
    /// Negative means "not exclusive" (protocol allows -1); non-positive
    /// values claim no space.
    pub exclusive_zone: i32,
    pub margin: Margin,
    /// `0` on either axis means "use the anchored/remaining extent".
    pub desired_size: (i32, i32),
    pub keyboard_interactivity: KeyboardInteractivity,
    pub lifecycle: LayerSurfaceLifecycle,
    pub area: Rectangle<i32, Logical>,
    pub output: Option<OutputWeak>,
}

impl LayerSurfaceState {
    pub fn new(layer: ShellLayer) -> LayerSurfaceRef {
        Rc::new(RefCell::new(LayerSurfaceState {
            layer,
            anchor: Anchor::empty(),
            exclusive_zone: 0,
            margin: Margin::default(),
            desired_size: (0, 0),
            keyboard_interactivity: KeyboardInteractivity::None,
            lifecycle: LayerSurfaceLifecycle::Uninitialised,
            area: Rectangle::from_loc_and_size((0, 0), (0, 0)),
            output: None,
        }))
    }
}

/// Resolve this surface's geometry against `full`/`remaining`, consuming
/// `remaining`'s exclusive zone along the anchored edge. Mirrors the
/// standard wlr-layer-shell placement algorithm: size defaults to the
/// anchored span when two opposite edges are anchored, position hugs the
/// anchored edge(s) (or centers when neither edge on an axis is
/// anchored), and an `exclusive_zone > 0` shrinks `remaining` by
/// `zone + margin` on the single anchored edge it is unambiguous for.
pub fn configure(
    surface: &LayerSurfaceRef,
    full: Rectangle<i32, Logical>,
    remaining: &mut Rectangle<i32, Logical>,
) {
    let (anchor, exclusive_zone, margin, desired_size) = {
        let s = surface.borrow();
        (s.anchor, s.exclusive_zone, s.margin, s.desired_size)
    };

    let anchored_horiz = anchor.contains(Anchor::LEFT) && anchor.contains(Anchor::RIGHT);
    let anchored_vert = anchor.contains(Anchor::TOP) && anchor.contains(Anchor::BOTTOM);

    let width = if desired_size.0 > 0 {
        desired_size.0
    } else if anchored_horiz {
        (remaining.size.w - margin.left - margin.right).max(0)
    } else {
        0
    };
    let height = if desired_size.1 > 0 {
        desired_size.1
    } else if anchored_vert {
        (remaining.size.h - margin.top - margin.bottom).max(0)
    } else {
        0
    };

    let x = if anchor.contains(Anchor::LEFT) && !anchor.contains(Anchor::RIGHT) {
        remaining.loc.x + margin.left
    } else if anchor.contains(Anchor::RIGHT) && !anchor.contains(Anchor::LEFT) {
        remaining.loc.x + remaining.size.w - width - margin.right
    } else {
        remaining.loc.x + (remaining.size.w - width) / 2
    };

    let y = if anchor.contains(Anchor::TOP) && !anchor.contains(Anchor::BOTTOM) {
        remaining.loc.y + margin.top
    } else if anchor.contains(Anchor::BOTTOM) && !anchor.contains(Anchor::TOP) {
        remaining.loc.y + remaining.size.h - height - margin.bottom
    } else {
        remaining.loc.y + (remaining.size.h - height) / 2
    };

    surface.borrow_mut().area = Rectangle::from_loc_and_size((x, y), (width, height));
    let _ = full;

    if exclusive_zone > 0 {
        if anchor.contains(Anchor::TOP) && !anchor.contains(Anchor::BOTTOM) {
            let claim = exclusive_zone + margin.top;
            remaining.loc.y += claim;
            remaining.size.h -= claim;
        } else if anchor.contains(Anchor::BOTTOM) && !anchor.contains(Anchor::TOP) {
            remaining.size.h -= exclusive_zone + margin.bottom;
        } else if anchor.contains(Anchor::LEFT) && !anchor.contains(Anchor::RIGHT) {
            let claim = exclusive_zone + margin.left;
            remaining.loc.x += claim;
            remaining.size.w -= claim;
        } else if anchor.contains(Anchor::RIGHT) && !anchor.contains(Anchor::LEFT) {
            remaining.size.w -= exclusive_zone + margin.right;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_anchored_exclusive_surface_claims_remaining_height() {
        let bar = LayerSurfaceState::new(ShellLayer::Top);
        {
            let mut s = bar.borrow_mut();
            s.anchor = Anchor::TOP | Anchor::LEFT | Anchor::RIGHT;
            s.exclusive_zone = 32;
            s.desired_size = (0, 32);
        }

        let full = Rectangle::from_loc_and_size((0, 0), (1920, 1080));
        let mut remaining = full;
        configure(&bar, full, &mut remaining);

        assert_eq!(bar.borrow().area, Rectangle::from_loc_and_size((0, 0), (1920, 32)));
        assert_eq!(remaining, Rectangle::from_loc_and_size((0, 32), (1920, 1048)));
    }

    #[test]
    fn non_exclusive_surface_does_not_shrink_remaining() {
        let osd = LayerSurfaceState::new(ShellLayer::Overlay);
        {
            let mut s = osd.borrow_mut();
            s.anchor = Anchor::BOTTOM;
            s.desired_size = (400, 100);
        }

        let full = Rectangle::from_loc_and_size((0, 0), (1920, 1080));
        let mut remaining = full;
        configure(&osd, full, &mut remaining);

        assert_eq!(remaining, full);
        assert_eq!(osd.borrow().area.size, (400, 100).into());
    }

    #[test]
    fn fully_anchored_surface_fills_remaining_area() {
        let bg = LayerSurfaceState::new(ShellLayer::Background);
        {
            let mut s = bg.borrow_mut();
            s.anchor = Anchor::TOP | Anchor::BOTTOM | Anchor::LEFT | Anchor::RIGHT;
        }

        let full = Rectangle::from_loc_and_size((0, 0), (1920, 1080));
        let mut remaining = Rectangle::from_loc_and_size((0, 32), (1920, 1048));
        configure(&bg, full, &mut remaining);

        assert_eq!(bg.borrow().area, remaining);
    }
}
