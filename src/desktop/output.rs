//! Output: one physical/virtual display, its workspaces, and its
//! layer-shell surfaces (§4.3). Grounded on the original's `output.c` for
//! the usable-area computation and destruction/migration contract.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use smithay::output::Output as SmithayOutput;
use smithay::utils::{Logical, Rectangle};

use crate::desktop::container::{ContainerKind, ContainerRef};
use crate::desktop::layer::{self, LayerSurfaceRef, ShellLayer};
use crate::desktop::workspace::{Workspace, WorkspaceRef};

pub type OutputRef = Rc<RefCell<OutputState>>;
pub type OutputWeak = Weak<RefCell<OutputState>>;

pub struct OutputState {
    pub output: SmithayOutput,
    pub workspaces: Vec<WorkspaceRef>,
    pub active_workspace: usize,
    pub layers: HashMap<ShellLayer, Vec<LayerSurfaceRef>>,
    /// The area left over after layer-shell exclusive zones have claimed
    /// their share; what the active workspace's tiling tree is arranged
    /// within.
    pub usable_area: Rectangle<i32, Logical>,
}

impl OutputState {
    pub fn new(output: SmithayOutput) -> OutputRef {
        let mut layers = HashMap::new();
        for layer in ShellLayer::CONFIGURE_ORDER {
            layers.insert(layer, Vec::new());
        }

        let workspace = Workspace::new("1");
        Workspace::set_activated(&workspace, true);

        let output_ref = Rc::new(RefCell::new(OutputState {
            output,
            workspaces: vec![workspace.clone()],
            active_workspace: 0,
            layers,
            usable_area: Rectangle::from_loc_and_size((0, 0), (0, 0)),
        }));
        Workspace::set_output(&workspace, Some(Rc::downgrade(&output_ref)));
        output_ref
    }

    pub fn active_workspace(&self) -> WorkspaceRef {
        self.workspaces[self.active_workspace].clone()
    }

    fn output_box(&self) -> Rectangle<i32, Logical> {
        let size = self
            .output
            .current_mode()
            .map(|mode| mode.size)
            .unwrap_or_default();
        let scale = self.output.current_scale().fractional_scale();
        let logical_size = ((size.w as f64 / scale).round() as i32, (size.h as f64 / scale).round() as i32);
        Rectangle::from_loc_and_size(self.output.current_location(), logical_size)
    }
}

/// `arrange(output)` (§4.3 "Usable-area computation"): claim exclusive
/// zones overlay→top→bottom→background, then arrange the active workspace
/// within whatever area remains.
pub fn arrange(this: &OutputRef) {
    let full = this.borrow().output_box();
    let mut remaining = full;

    for shell_layer in ShellLayer::CONFIGURE_ORDER {
        let surfaces = this.borrow().layers.get(&shell_layer).cloned().unwrap_or_default();
        for surface in &surfaces {
            layer::configure(surface, full, &mut remaining);
        }
    }

    let active = this.borrow().active_workspace();
    Workspace::arrange(&active, full, remaining);

    this.borrow_mut().usable_area = remaining;
}

/// Add a mapped layer surface to its layer and rearrange.
pub fn add_layer_surface(this: &OutputRef, layer: ShellLayer, surface: LayerSurfaceRef) {
    this.borrow_mut()
        .layers
        .entry(layer)
        .or_default()
        .push(surface);
    arrange(this);
}

/// Remove an unmapped/destroyed layer surface from its layer and
/// rearrange.
pub fn remove_layer_surface(this: &OutputRef, layer: ShellLayer, surface: &LayerSurfaceRef) {
    if let Some(list) = this.borrow_mut().layers.get_mut(&layer) {
        list.retain(|s| !Rc::ptr_eq(s, surface));
    }
    arrange(this);
}

/// `output.display(workspace)` (§4.2 "Display switch"). The target must be
/// currently inactive. Deactivates the current workspace, switches, and
/// re-arranges within the output's current geometry. Returns `false`
/// (doing nothing) if the target is already active or not one of this
/// output's workspaces.
pub fn display_workspace(this: &OutputRef, target: &WorkspaceRef) -> bool {
    let target_index = {
        let state = this.borrow();
        if Rc::ptr_eq(&state.active_workspace(), target) {
            return false;
        }
        state.workspaces.iter().position(|w| Rc::ptr_eq(w, target))
    };
    let Some(target_index) = target_index else {
        return false;
    };

    let current = this.borrow().active_workspace();
    Workspace::set_activated(&current, false);
    Workspace::set_activated(target, true);
    this.borrow_mut().active_workspace = target_index;

    arrange(this);
    true
}

/// Deactivate the active workspace, drop every workspace, and collect the
/// view-containers that were hosted here so the caller can migrate them to
/// another output (or close their clients) — §4.3 "Destruction".
pub fn destroy(this: &OutputRef) -> Vec<ContainerRef> {
    let mut orphans = Vec::new();

    let (active, workspaces) = {
        let state = this.borrow();
        (state.active_workspace(), state.workspaces.clone())
    };
    Workspace::set_activated(&active, false);

    for workspace in &workspaces {
        let ws = workspace.borrow();
        collect_views(&ws.root_tiling_container, &mut orphans);
        orphans.extend(ws.floating_containers.iter().cloned());
    }

    this.borrow_mut().workspaces.clear();
    orphans
}

/// Hit-test a logical point against everything visible on `this`'s active
/// workspace: the fullscreen container if one is set, otherwise floating
/// containers top-to-bottom (last-raised first, §4.7) and then the tiling
/// tree. Used to route pointer events to the view underneath the cursor.
pub fn view_at(this: &OutputRef, point: (i32, i32)) -> Option<ContainerRef> {
    use crate::desktop::container;

    let workspace = this.borrow().active_workspace();
    let ws = workspace.borrow();

    if let Some(fullscreen) = &ws.fullscreen {
        return container::view_at(fullscreen, point);
    }

    for floating in ws.floating_containers.iter().rev() {
        if let Some(found) = container::view_at(floating, point) {
            return Some(found);
        }
    }

    container::view_at(&ws.root_tiling_container, point)
}

/// Every view-container actually on screen on `this`'s active workspace
/// right now: just the fullscreen container if one is set (§3 Workspace
/// "when fullscreen is set, tiling and floating layers are hidden"),
/// otherwise the tiling tree plus the floating list. Used to decide who
/// gets `wl_surface.frame` done callbacks on each rendered frame (§4.3).
pub fn visible_view_containers(this: &OutputRef) -> Vec<ContainerRef> {
    let workspace = this.borrow().active_workspace();
    let ws = workspace.borrow();

    if let Some(fullscreen) = &ws.fullscreen {
        return vec![fullscreen.clone()];
    }

    let mut out = Vec::new();
    collect_views(&ws.root_tiling_container, &mut out);
    out.extend(ws.floating_containers.iter().cloned());
    out
}

fn collect_views(container: &ContainerRef, out: &mut Vec<ContainerRef>) {
    match &container.borrow().kind {
        ContainerKind::View(_) => out.push(container.clone()),
        ContainerKind::Tree(tree) => {
            for child in &tree.children {
                collect_views(child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::container::Container;
    use crate::desktop::view::test_support::StubView;
    use crate::desktop::view::ViewHandle;
    use crate::desktop::workspace::Workspace;

    fn test_output() -> SmithayOutput {
        SmithayOutput::new(
            "test".to_string(),
            smithay::output::PhysicalProperties {
                size: (0, 0).into(),
                subpixel: smithay::output::Subpixel::Unknown,
                make: "tilewl".into(),
                model: "test".into(),
            },
        )
    }

    #[test]
    fn display_workspace_refuses_already_active_target() {
        let output = OutputState::new(test_output());
        let active = output.borrow().active_workspace();
        assert!(!display_workspace(&output, &active));
    }

    #[test]
    fn display_workspace_switches_to_inactive_target() {
        let output = OutputState::new(test_output());
        let second = Workspace::new("2");
        output.borrow_mut().workspaces.push(second.clone());

        assert!(display_workspace(&output, &second));
        assert!(second.borrow().active);
        assert_eq!(output.borrow().active_workspace, 1);
    }

    #[test]
    fn collect_views_walks_tiling_tree() {
        let root = Container::new_tree(crate::desktop::container::Layout::Horizontal);
        let view: ViewHandle = Rc::new(RefCell::new(StubView::default()));
        let leaf = Container::new_view(view);
        crate::desktop::container::push_child(&root, leaf.clone());

        let mut out = Vec::new();
        collect_views(&root, &mut out);
        assert_eq!(out.len(), 1);
        assert!(Rc::ptr_eq(&out[0], &leaf));
    }
}
