//! Workspace: a virtual desktop holding one tiling tree and one floating
//! sequence, displayed by at most one output at a time (§3, §4.2). Grounded
//! on the original's `workspace.c`.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use smithay::utils::{Logical, Rectangle};

use crate::desktop::container::{
    self, Container, ContainerKind, ContainerRef, Layout,
};
use crate::desktop::output::OutputWeak;

pub type WorkspaceRef = Rc<RefCell<Workspace>>;
pub type WorkspaceWeak = Weak<RefCell<Workspace>>;

bitflags::bitflags! {
    /// `ext-workspace-v1`/`cosmic-workspace-unstable-v1` share the same
    /// three-bit `state` bitmask (§6, §3 Workspace "published metadata").
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WorkspaceState: u32 {
        const ACTIVE = 1 << 0;
        const URGENT = 1 << 1;
        const HIDDEN = 1 << 2;
    }
}

static NEXT_WORKSPACE_ID: std::sync::atomic::AtomicU32 = std::sync::atomic::AtomicU32::new(1);

pub struct Workspace {
    pub id: u32,
    pub name: String,
    /// 2-D grid position published to workspace-protocol clients; the core
    /// layout engine never consults this itself.
    pub coordinates: Vec<u32>,
    pub output: Option<OutputWeak>,
    pub active: bool,
    pub urgent: bool,

    pub full_area: Rectangle<i32, Logical>,
    pub tiled_area: Rectangle<i32, Logical>,

    pub root_tiling_container: ContainerRef,
    pub floating_containers: Vec<ContainerRef>,

    /// Container currently fullscreen on this workspace, if any. Per §4.2,
    /// when set both the tiling and floating layers are hidden and only
    /// this container is configured, to `full_area`.
    pub fullscreen: Option<ContainerRef>,
}

impl Workspace {
    pub fn new(name: impl Into<String>) -> WorkspaceRef {
        let id = NEXT_WORKSPACE_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Rc::new(RefCell::new(Workspace {
            id,
            name: name.into(),
            coordinates: Vec::new(),
            output: None,
            active: false,
            urgent: false,
            full_area: Rectangle::from_loc_and_size((0, 0), (0, 0)),
            tiled_area: Rectangle::from_loc_and_size((0, 0), (0, 0)),
            root_tiling_container: Container::new_tree(Layout::Horizontal),
            floating_containers: Vec::new(),
            fullscreen: None,
        }))
    }

    /// The `{active, urgent, hidden}` bitmask published by both workspace
    /// protocols (§3). A workspace is hidden exactly when it is not the
    /// active workspace of an output — a workspace with no output at all
    /// (mid-creation, before the manager has assigned one) counts as
    /// hidden too.
    pub fn state(&self) -> WorkspaceState {
        let mut state = WorkspaceState::empty();
        if self.active {
            state |= WorkspaceState::ACTIVE;
        } else {
            state |= WorkspaceState::HIDDEN;
        }
        if self.urgent {
            state |= WorkspaceState::URGENT;
        }
        state
    }

    /// Enable/disable the workspace's trees. Exactly one workspace per
    /// output is active at a time (§4.2 "Activation").
    pub fn set_activated(this: &WorkspaceRef, activated: bool) {
        this.borrow_mut().active = activated;
    }

    /// Set the back-pointer to the output this workspace belongs to, so
    /// code holding only a `ContainerRef`/`WorkspaceRef` (e.g. the
    /// workspace-protocol bridge resolving a commit's `source` id, or
    /// `map_view` resolving a newly-mapped view's output) can reach it
    /// without a separate output-to-workspace lookup table.
    pub fn set_output(this: &WorkspaceRef, output: Option<OutputWeak>) {
        this.borrow_mut().output = output;
    }

    /// `workspace.arrange(full_area, tiled_area)` (§4.2 "Contract"). If a
    /// fullscreen container is set, it alone is configured, to
    /// `full_area`; otherwise the tiling tree is arranged within
    /// `tiled_area` and floating containers keep their own geometry.
    pub fn arrange(
        this: &WorkspaceRef,
        full_area: Rectangle<i32, Logical>,
        tiled_area: Rectangle<i32, Logical>,
    ) {
        {
            let mut ws = this.borrow_mut();
            ws.full_area = full_area;
            ws.tiled_area = tiled_area;
        }

        let fullscreen = this.borrow().fullscreen.clone();
        if let Some(fullscreen) = fullscreen {
            container::arrange(&fullscreen, full_area);
            return;
        }

        let root = this.borrow().root_tiling_container.clone();
        container::arrange(&root, tiled_area);
        // Floating containers are roots of their own subtree and are not
        // subject to arrange; their area already tracks the view's
        // committed geometry (§4.1 "Floating containers").
    }

    /// Add `container` as a tiled child at the root tiling container's
    /// given index. Caller is responsible for re-arranging afterward.
    pub fn add_tiled(this: &WorkspaceRef, container: ContainerRef, index: usize) {
        let root = this.borrow().root_tiling_container.clone();
        container::insert_child(&root, index, container.clone());
        set_workspace(this, &container);
        if let ContainerKind::View(view_container) = &mut container.borrow_mut().kind {
            view_container.tiled = true;
        }
    }

    /// Add `container` as a floating root. Floating containers are direct
    /// children of the workspace, not of any tree container.
    pub fn add_floating(this: &WorkspaceRef, container: ContainerRef) {
        set_workspace(this, &container);
        if let ContainerKind::View(view_container) = &mut container.borrow_mut().kind {
            view_container.tiled = false;
        }
        this.borrow_mut().floating_containers.push(container);
    }

    pub fn remove_floating(this: &WorkspaceRef, container: &ContainerRef) {
        this.borrow_mut()
            .floating_containers
            .retain(|c| !Rc::ptr_eq(c, container));
        container.borrow_mut().common.workspace = None;
    }

    pub fn set_fullscreen(this: &WorkspaceRef, container: Option<ContainerRef>) {
        this.borrow_mut().fullscreen = container;
    }

    /// Move a floating container to the back of the floating list, i.e.
    /// the topmost paint position — the floating-sequence equivalent of
    /// `wlr_scene_node_raise_to_top` for a container with no literal scene
    /// node. A no-op if `container` is not one of this workspace's
    /// floating roots (in particular, tiled containers: raising a tiled
    /// container does not reorder the tiling tree, since siblings don't
    /// overlap).
    pub fn raise_floating_to_top(this: &WorkspaceRef, container: &ContainerRef) {
        let mut ws = this.borrow_mut();
        let Some(pos) = ws.floating_containers.iter().position(|c| Rc::ptr_eq(c, container)) else {
            return;
        };
        let container = ws.floating_containers.remove(pos);
        ws.floating_containers.push(container);
    }
}

fn set_workspace(this: &WorkspaceRef, container: &ContainerRef) {
    container.borrow_mut().common.workspace = Some(Rc::downgrade(this));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::view::test_support::StubView;
    use crate::desktop::view::ViewHandle;

    fn leaf() -> ContainerRef {
        let view: ViewHandle = Rc::new(RefCell::new(StubView::default()));
        Container::new_view(view)
    }

    #[test]
    fn fullscreen_hides_tiling_arrange() {
        let ws = Workspace::new("1");
        let tiled = leaf();
        Workspace::add_tiled(&ws, tiled.clone(), 0);

        let fs = leaf();
        Workspace::set_fullscreen(&ws, Some(fs.clone()));

        let full = Rectangle::from_loc_and_size((0, 0), (1920, 1080));
        let usable = Rectangle::from_loc_and_size((0, 0), (1920, 1040));
        Workspace::arrange(&ws, full, usable);

        assert_eq!(fs.borrow().common.area, full);
        // The tiled container was never visited since arrange returned
        // early; its area is still the zero default.
        assert_eq!(tiled.borrow().common.area.size, (0, 0).into());
    }

    #[test]
    fn non_fullscreen_arranges_tiling_tree_within_tiled_area() {
        let ws = Workspace::new("1");
        let tiled = leaf();
        Workspace::add_tiled(&ws, tiled.clone(), 0);

        let full = Rectangle::from_loc_and_size((0, 0), (1920, 1080));
        let usable = Rectangle::from_loc_and_size((0, 0), (1920, 1040));
        Workspace::arrange(&ws, full, usable);

        assert_eq!(tiled.borrow().common.area, usable);
    }

    #[test]
    fn floating_containers_are_untouched_by_arrange() {
        let ws = Workspace::new("1");
        let floating = leaf();
        floating.borrow_mut().common.area = Rectangle::from_loc_and_size((300, 300), (640, 480));
        Workspace::add_floating(&ws, floating.clone());

        let full = Rectangle::from_loc_and_size((0, 0), (1920, 1080));
        Workspace::arrange(&ws, full, full);

        assert_eq!(
            floating.borrow().common.area,
            Rectangle::from_loc_and_size((300, 300), (640, 480))
        );
    }
}
