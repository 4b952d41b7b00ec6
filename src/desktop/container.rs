//! Tree containers and view containers, and the tiling arrange algorithm
//! (§4.1). Grounded on the original's `view_container.c` for map/unmap/
//! commit/configure semantics, but deliberately does *not* reproduce the
//! older sibling `windows::*` path (`container.c`) — that path predates the
//! view-container redesign and has no counterpart here.
//!
//! Containers form a tree via `Rc`-owned children and a `Weak` parent
//! back-pointer, per the ownership rules in §5: a container's children are
//! exclusively owned by it, while its parent/workspace pointers are
//! non-owning and must be cleared before the container is dropped.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use bitflags::bitflags;
use smithay::utils::{Logical, Rectangle};

use crate::desktop::view::{SizeHints, ViewHandle};
use crate::desktop::workspace::WorkspaceWeak;

bitflags! {
    /// Which edges of a view-container are anchored during an interactive
    /// resize grab — mirrors `wlr_edges`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Edges: u8 {
        const TOP    = 1 << 0;
        const BOTTOM = 1 << 1;
        const LEFT   = 1 << 2;
        const RIGHT  = 1 << 3;
    }
}

pub type ContainerRef = Rc<RefCell<Container>>;
pub type ContainerWeak = Weak<RefCell<Container>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Horizontal,
    Vertical,
}

/// Fields common to every container, tree or view, tiled or floating.
pub struct ContainerCommon {
    pub area: Rectangle<i32, Logical>,
    /// This container's share of its tree-container parent's area. Ignored
    /// for floating roots, which track their view's own geometry instead.
    pub percentage: f64,
    pub parent: Option<ContainerWeak>,
    pub workspace: Option<WorkspaceWeak>,
    pub fullscreen: bool,
}

impl ContainerCommon {
    fn new() -> Self {
        Self {
            area: Rectangle::from_loc_and_size((0, 0), (0, 0)),
            percentage: 1.0,
            parent: None,
            workspace: None,
            fullscreen: false,
        }
    }
}

pub struct TreeContainer {
    pub layout: Layout,
    pub children: Vec<ContainerRef>,
}

pub struct ViewContainer {
    pub view: ViewHandle,
    /// Whether this view-container currently lives in its workspace's
    /// tiling tree (`true`) or floating sequence (`false`).
    pub tiled: bool,
    /// The geometry last requested via `configure` — the original's
    /// `view_pending`. Compared against what the client actually commits
    /// to decide how much of the requested move/resize took effect.
    pub pending: Rectangle<i32, Logical>,
}

pub enum ContainerKind {
    Tree(TreeContainer),
    View(ViewContainer),
}

pub struct Container {
    pub common: ContainerCommon,
    pub kind: ContainerKind,
}

impl Container {
    pub fn new_tree(layout: Layout) -> ContainerRef {
        Rc::new(RefCell::new(Container {
            common: ContainerCommon::new(),
            kind: ContainerKind::Tree(TreeContainer {
                layout,
                children: Vec::new(),
            }),
        }))
    }

    pub fn new_view(view: ViewHandle) -> ContainerRef {
        Rc::new(RefCell::new(Container {
            common: ContainerCommon::new(),
            kind: ContainerKind::View(ViewContainer {
                view,
                tiled: false,
                pending: Rectangle::from_loc_and_size((0, 0), (0, 0)),
            }),
        }))
    }

    pub fn size_hints(&self) -> Option<SizeHints> {
        match &self.kind {
            ContainerKind::View(v) => Some(v.view.borrow().size_hints()),
            ContainerKind::Tree(_) => None,
        }
    }
}

/// Set every child's percentage to `1/children.len()`. A no-op on an empty
/// list. Called after every insert/remove — user-set splits are
/// intentionally not preserved across structural changes (§4.1).
fn renormalize(children: &[ContainerRef]) {
    if children.is_empty() {
        return;
    }
    let share = 1.0 / children.len() as f64;
    for child in children {
        child.borrow_mut().common.percentage = share;
    }
}

/// Insert `child` into `parent`'s children at `index`, renormalizing every
/// sibling's percentage to `1/n`. `parent` must be a tree container.
pub fn insert_child(parent: &ContainerRef, index: usize, child: ContainerRef) {
    child.borrow_mut().common.parent = Some(Rc::downgrade(parent));
    let workspace = parent.borrow().common.workspace.clone();
    child.borrow_mut().common.workspace = workspace;

    let mut parent_mut = parent.borrow_mut();
    let ContainerKind::Tree(tree) = &mut parent_mut.kind else {
        panic!("insert_child called on a non-tree container");
    };
    let index = index.min(tree.children.len());
    tree.children.insert(index, child);
    renormalize(&tree.children);
}

pub fn push_child(parent: &ContainerRef, child: ContainerRef) {
    let index = match &parent.borrow().kind {
        ContainerKind::Tree(tree) => tree.children.len(),
        ContainerKind::View(_) => panic!("push_child called on a non-tree container"),
    };
    insert_child(parent, index, child);
}

/// Detach `child` from its current parent, renormalizing the remaining
/// siblings. Clears the child's parent and workspace back-pointers. A
/// no-op if the child has no parent (already detached, or a floating
/// root).
pub fn remove_child(child: &ContainerRef) {
    let parent = child.borrow_mut().common.parent.take();
    child.borrow_mut().common.workspace = None;

    let Some(parent) = parent.and_then(|p| p.upgrade()) else {
        return;
    };
    let mut parent_mut = parent.borrow_mut();
    if let ContainerKind::Tree(tree) = &mut parent_mut.kind {
        tree.children.retain(|c| !Rc::ptr_eq(c, child));
        renormalize(&tree.children);
    }
}

/// Move `child` from its current parent (if any) to `new_parent` at
/// `index`, renormalizing both the old and new sibling sets (§4.1 "Parent
/// change"). Callers are responsible for re-arranging both workspaces
/// afterward; this function only touches the tree structure.
pub fn reparent(child: &ContainerRef, new_parent: &ContainerRef, index: usize) {
    remove_child(child);
    insert_child(new_parent, index, child.clone());
}

/// Apply the tiling arrange algorithm to `container` within `area`,
/// recursing into tree children and configuring leaf views. Total: a
/// zero-area input yields zero-area children, never an error (§4.1
/// "Failure modes").
pub fn arrange(container: &ContainerRef, area: Rectangle<i32, Logical>) {
    container.borrow_mut().common.area = area;

    let children = match &container.borrow().kind {
        ContainerKind::Tree(tree) => tree.children.clone(),
        ContainerKind::View(_) => {
            configure_view(container, area);
            return;
        }
    };

    let layout = match &container.borrow().kind {
        ContainerKind::Tree(tree) => tree.layout,
        ContainerKind::View(_) => unreachable!(),
    };

    let n = children.len();
    if n == 0 {
        return;
    }

    let main_extent = match layout {
        Layout::Horizontal => area.size.w,
        Layout::Vertical => area.size.h,
    };

    let mut offset = 0i32;
    let mut consumed = 0i32;
    for (idx, child) in children.iter().enumerate() {
        let percentage = child.borrow().common.percentage;
        let extent = if idx + 1 == n {
            main_extent - consumed
        } else {
            (main_extent as f64 * percentage).floor() as i32
        };
        consumed += extent;

        let child_area = match layout {
            Layout::Horizontal => Rectangle::from_loc_and_size(
                (area.loc.x + offset, area.loc.y),
                (extent, area.size.h),
            ),
            Layout::Vertical => Rectangle::from_loc_and_size(
                (area.loc.x, area.loc.y + offset),
                (area.size.w, extent),
            ),
        };
        offset += extent;

        arrange(child, child_area);
    }
}

fn configure_view(container: &ContainerRef, area: Rectangle<i32, Logical>) {
    let mut borrowed = container.borrow_mut();
    let ContainerKind::View(view_container) = &mut borrowed.kind else {
        unreachable!()
    };
    view_container.pending = area;
    view_container
        .view
        .borrow_mut()
        .configure(area.loc.x, area.loc.y, area.size.w, area.size.h);
}

/// Apply a view's actually-committed size to its container, grounded on
/// `view_container_apply_geometry`: clients may commit a size different
/// from what was requested, so position is derived from the *pending*
/// geometry plus whichever edges are anchored by an in-progress resize
/// grab — grabbing the right/bottom edge leaves left/top anchored
/// automatically, but grabbing left/top requires anchoring the opposite
/// edge so the grabbed corner stays under the cursor. Floating
/// containers additionally sync their own area to the result (tiled
/// containers keep the area `arrange` gave them).
pub fn apply_geometry(container: &ContainerRef, committed_size: (i32, i32), grabbed_edges: Option<Edges>) {
    let mut borrowed = container.borrow_mut();
    let tiled = match &borrowed.kind {
        ContainerKind::View(v) => v.tiled,
        ContainerKind::Tree(_) => return,
    };

    let ContainerKind::View(view_container) = &mut borrowed.kind else {
        unreachable!()
    };
    let pending = view_container.pending;
    let (width, height) = committed_size;

    let x = match grabbed_edges {
        Some(edges) if edges.contains(Edges::LEFT) => pending.loc.x + pending.size.w - width,
        _ => pending.loc.x,
    };
    let y = match grabbed_edges {
        Some(edges) if edges.contains(Edges::TOP) => pending.loc.y + pending.size.h - height,
        _ => pending.loc.y,
    };

    let current = Rectangle::from_loc_and_size((x, y), (width, height));
    view_container.pending = current;
    drop(borrowed);

    if !tiled {
        container.borrow_mut().common.area = current;
    }
}

/// The leaf view-container whose area contains `point`, searched
/// depth-first; a tree container's children don't overlap (§4.1), so at
/// most one branch can ever match and the first one found is correct.
/// Used by pointer hit-testing (§4.7) to resolve a layout coordinate to
/// the view-container under it.
pub fn view_at(container: &ContainerRef, point: (i32, i32)) -> Option<ContainerRef> {
    if !container.borrow().common.area.contains(point) {
        return None;
    }
    match &container.borrow().kind {
        ContainerKind::View(_) => Some(container.clone()),
        ContainerKind::Tree(tree) => tree.children.iter().find_map(|c| view_at(c, point)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::view::{test_support::StubView, View};
    use std::cell::RefCell as StdRefCell;
    use std::rc::Rc as StdRc;

    fn leaf() -> ContainerRef {
        let view: ViewHandle = StdRc::new(StdRefCell::new(StubView::default()));
        Container::new_view(view)
    }

    #[test]
    fn horizontal_split_divides_width_evenly() {
        let root = Container::new_tree(Layout::Horizontal);
        let a = leaf();
        let b = leaf();
        push_child(&root, a.clone());
        push_child(&root, b.clone());

        arrange(&root, Rectangle::from_loc_and_size((0, 0), (100, 50)));

        assert_eq!(a.borrow().common.area, Rectangle::from_loc_and_size((0, 0), (50, 50)));
        assert_eq!(b.borrow().common.area, Rectangle::from_loc_and_size((50, 0), (50, 50)));
    }

    #[test]
    fn last_child_absorbs_rounding_error() {
        let root = Container::new_tree(Layout::Horizontal);
        let a = leaf();
        let b = leaf();
        let c = leaf();
        push_child(&root, a.clone());
        push_child(&root, b.clone());
        push_child(&root, c.clone());

        arrange(&root, Rectangle::from_loc_and_size((0, 0), (100, 10)));

        // 100/3 floors to 33 for the first two; the third takes 34 so the
        // total remains exactly 100.
        assert_eq!(a.borrow().common.area.size.w, 33);
        assert_eq!(b.borrow().common.area.size.w, 33);
        assert_eq!(c.borrow().common.area.size.w, 34);
    }

    #[test]
    fn apply_geometry_anchors_left_edge_when_grabbed() {
        let container = leaf();
        if let ContainerKind::View(v) = &mut container.borrow_mut().kind {
            v.tiled = false;
            v.pending = Rectangle::from_loc_and_size((100, 100), (200, 200));
        }

        // Client committed a narrower width than requested while the left
        // edge was being dragged: the right edge (100+200=300) must stay
        // put, so x moves to 300 - 150 = 150.
        apply_geometry(&container, (150, 200), Some(Edges::LEFT));

        assert_eq!(container.borrow().common.area, Rectangle::from_loc_and_size((150, 100), (150, 200)));
    }

    #[test]
    fn apply_geometry_without_a_grab_keeps_pending_origin() {
        let container = leaf();
        if let ContainerKind::View(v) = &mut container.borrow_mut().kind {
            v.tiled = false;
            v.pending = Rectangle::from_loc_and_size((100, 100), (200, 200));
        }

        apply_geometry(&container, (250, 200), None);

        assert_eq!(container.borrow().common.area, Rectangle::from_loc_and_size((100, 100), (250, 200)));
    }

    #[test]
    fn zero_area_yields_zero_area_children_not_an_error() {
        let root = Container::new_tree(Layout::Horizontal);
        let a = leaf();
        push_child(&root, a.clone());

        arrange(&root, Rectangle::from_loc_and_size((0, 0), (0, 0)));

        assert_eq!(a.borrow().common.area.size, (0, 0).into());
    }

    #[test]
    fn insert_renormalizes_existing_siblings() {
        let root = Container::new_tree(Layout::Horizontal);
        let a = leaf();
        let b = leaf();
        push_child(&root, a.clone());
        assert_eq!(a.borrow().common.percentage, 1.0);
        push_child(&root, b.clone());
        assert_eq!(a.borrow().common.percentage, 0.5);
        assert_eq!(b.borrow().common.percentage, 0.5);
    }

    #[test]
    fn remove_renormalizes_remaining_siblings() {
        let root = Container::new_tree(Layout::Horizontal);
        let a = leaf();
        let b = leaf();
        let c = leaf();
        push_child(&root, a.clone());
        push_child(&root, b.clone());
        push_child(&root, c.clone());

        remove_child(&b);

        if let ContainerKind::Tree(tree) = &root.borrow().kind {
            assert_eq!(tree.children.len(), 2);
        } else {
            panic!("expected tree container");
        }
        assert!((a.borrow().common.percentage - 0.5).abs() < f64::EPSILON);
        assert!((c.borrow().common.percentage - 0.5).abs() < f64::EPSILON);
        assert!(b.borrow().common.parent.is_none());
    }

    #[test]
    fn reparent_moves_child_between_trees() {
        let tree_a = Container::new_tree(Layout::Horizontal);
        let tree_b = Container::new_tree(Layout::Vertical);
        let child = leaf();
        push_child(&tree_a, child.clone());

        reparent(&child, &tree_b, 0);

        if let ContainerKind::Tree(tree) = &tree_a.borrow().kind {
            assert!(tree.children.is_empty());
        } else {
            unreachable!()
        }
        if let ContainerKind::Tree(tree) = &tree_b.borrow().kind {
            assert_eq!(tree.children.len(), 1);
        } else {
            unreachable!()
        }
    }

    #[test]
    fn view_at_resolves_point_to_the_containing_leaf() {
        let root = Container::new_tree(Layout::Horizontal);
        let a = leaf();
        let b = leaf();
        push_child(&root, a.clone());
        push_child(&root, b.clone());
        arrange(&root, Rectangle::from_loc_and_size((0, 0), (100, 50)));

        assert!(Rc::ptr_eq(&view_at(&root, (10, 10)).unwrap(), &a));
        assert!(Rc::ptr_eq(&view_at(&root, (60, 10)).unwrap(), &b));
        assert!(view_at(&root, (10, 1000)).is_none());
    }
}
