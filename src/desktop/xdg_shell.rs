//! `xdg-shell` map-time policy (§4.6 "Tiled/float policy"), grounded on
//! the original's `e_view_map` and `view_container_handle_view_map`.
//!
//! This module works entirely in terms of the domain model
//! ([`Desktop`], [`ContainerRef`], [`WorkspaceRef`]) — the actual
//! `XdgShellHandler`/`WlrLayerShellHandler` trait impls in
//! [`crate::state`] translate raw protocol events into calls here.

use crate::desktop::container::{self, Container, ContainerKind, ContainerRef};
use crate::desktop::output::OutputRef;
use crate::desktop::view::ViewHandle;
use crate::desktop::workspace::{Workspace, WorkspaceRef};
use crate::desktop::Desktop;

/// Parameters of a view becoming ready to display, mirroring
/// `e_view_map_event`.
pub struct MapRequest {
    pub fullscreen: bool,
    pub fullscreen_output: Option<OutputRef>,
}

/// Map `view` into the desktop per §4.6's five-step policy, returning the
/// container it now lives in. `hovered_output` is the output under the
/// pointer, used when the request does not pin a specific output.
pub fn map_view(
    desktop: &mut Desktop,
    view: ViewHandle,
    request: MapRequest,
    hovered_output: Option<OutputRef>,
) -> Option<ContainerRef> {
    // 1. Target workspace: the fullscreen-requested output's active
    // workspace, or the hovered output's.
    let output = if request.fullscreen {
        request.fullscreen_output.or(hovered_output)
    } else {
        hovered_output
    };
    let output = output.or_else(|| desktop.outputs.first().cloned())?;
    let workspace = output.borrow().active_workspace();

    let wants_floating = view.borrow().wants_floating();
    let container = Container::new_view(view.clone());

    // 2. Fullscreen flag before inserting.
    if request.fullscreen {
        container.borrow_mut().common.fullscreen = true;
    }

    if !wants_floating {
        // 3. Tiled insertion preference: (a) parent of the currently
        // tiled focused view, (b) parent of the previously tiled focused
        // view, (c) the root tiling container.
        let parent = tiled_insertion_parent(desktop, &workspace);
        let index = container_child_count(&parent);
        container::insert_child(&parent, index, container.clone());
        Workspace::add_tiled(&workspace, container.clone(), index);
        if let ContainerKind::View(v) = &mut container.borrow_mut().kind {
            v.tiled = true;
        }
    } else {
        // 4. Floating: size from the view's reported size, centered on
        // the output.
        let hints = view.borrow().size_hints();
        let size = (
            if hints.min_width > 0 { hints.min_width } else { 640 },
            if hints.min_height > 0 { hints.min_height } else { 480 },
        );
        let output_area = workspace.borrow().full_area;
        let loc = (
            output_area.loc.x + (output_area.size.w - size.0) / 2,
            output_area.loc.y + (output_area.size.h - size.1) / 2,
        );
        container.borrow_mut().common.area =
            smithay::utils::Rectangle::from_loc_and_size(loc, size);
        Workspace::add_floating(&workspace, container.clone());
    }

    if request.fullscreen {
        Workspace::set_fullscreen(&workspace, Some(container.clone()));
    }

    // 5. Arrange, then focus.
    let full = workspace.borrow().full_area;
    let tiled_area = workspace.borrow().tiled_area;
    Workspace::arrange(&workspace, full, tiled_area);

    desktop
        .seat
        .set_focus_view_container(Some(container.clone()), |_| {});

    Some(container)
}

fn container_child_count(container: &ContainerRef) -> usize {
    match &container.borrow().kind {
        ContainerKind::Tree(tree) => tree.children.len(),
        ContainerKind::View(_) => 0,
    }
}

/// The insertion-point preference from §4.6 step 3.
fn tiled_insertion_parent(desktop: &Desktop, workspace: &WorkspaceRef) -> ContainerRef {
    let candidates = [
        desktop.seat.active_view_container(),
        desktop.seat.last_tiled_focus(),
    ];

    for candidate in candidates.into_iter().flatten() {
        let same_workspace = candidate
            .borrow()
            .common
            .workspace
            .as_ref()
            .and_then(|w| w.upgrade())
            .map(|w| std::rc::Rc::ptr_eq(&w, workspace))
            .unwrap_or(false);
        let tiled = matches!(&candidate.borrow().kind, ContainerKind::View(v) if v.tiled);
        if same_workspace && tiled {
            if let Some(parent) = candidate
                .borrow()
                .common
                .parent
                .as_ref()
                .and_then(|p| p.upgrade())
            {
                return parent;
            }
        }
    }

    workspace.borrow().root_tiling_container.clone()
}

/// Toggle tiling on a mapped view-container, moving it between the
/// tiling root and the floating sequence by the same policy (§4.6, final
/// paragraph).
pub fn toggle_tiled(desktop: &Desktop, container: &ContainerRef) {
    let workspace = container
        .borrow()
        .common
        .workspace
        .as_ref()
        .and_then(|w| w.upgrade());
    let Some(workspace) = workspace else { return };

    let currently_tiled = matches!(&container.borrow().kind, ContainerKind::View(v) if v.tiled);

    if currently_tiled {
        container::remove_child(container);
        Workspace::add_floating(&workspace, container.clone());
    } else {
        Workspace::remove_floating(&workspace, container);
        let parent = tiled_insertion_parent(desktop, &workspace);
        let index = container_child_count(&parent);
        Workspace::add_tiled(&workspace, container.clone(), index);
    }

    if let ContainerKind::View(v) = &mut container.borrow_mut().kind {
        v.tiled = !currently_tiled;
    }
    let view = match &container.borrow().kind {
        ContainerKind::View(v) => v.view.clone(),
        ContainerKind::Tree(_) => return,
    };
    view.borrow_mut().set_tiled(!currently_tiled);

    let full = workspace.borrow().full_area;
    let tiled_area = workspace.borrow().tiled_area;
    Workspace::arrange(&workspace, full, tiled_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::output::OutputState;
    use crate::desktop::view::test_support::StubView;
    use smithay::output::{PhysicalProperties, Subpixel};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn test_output() -> OutputRef {
        let output = smithay::output::Output::new(
            "test".to_string(),
            PhysicalProperties {
                size: (0, 0).into(),
                subpixel: Subpixel::Unknown,
                make: "tilewl".into(),
                model: "test".into(),
            },
        );
        output.change_current_state(
            Some(smithay::output::Mode {
                size: (1920, 1080).into(),
                refresh: 60_000,
            }),
            None,
            None,
            Some((0, 0).into()),
        );
        OutputState::new(output)
    }

    #[test]
    fn non_floating_view_is_inserted_tiled() {
        let mut desktop = Desktop::new();
        let output = test_output();
        desktop.add_output(output.clone());

        let view: ViewHandle = Rc::new(RefCell::new(StubView::default()));
        let container = map_view(
            &mut desktop,
            view,
            MapRequest {
                fullscreen: false,
                fullscreen_output: None,
            },
            Some(output),
        )
        .unwrap();

        assert!(matches!(&container.borrow().kind, ContainerKind::View(v) if v.tiled));
    }

    #[test]
    fn fixed_size_view_is_inserted_floating_and_centered() {
        let mut desktop = Desktop::new();
        let output = test_output();
        desktop.add_output(output.clone());

        let mut stub = StubView::default();
        stub.hints.min_width = 400;
        stub.hints.max_width = 400;
        stub.hints.min_height = 300;
        stub.hints.max_height = 300;
        let view: ViewHandle = Rc::new(RefCell::new(stub));

        let container = map_view(
            &mut desktop,
            view,
            MapRequest {
                fullscreen: false,
                fullscreen_output: None,
            },
            Some(output),
        )
        .unwrap();

        assert!(matches!(&container.borrow().kind, ContainerKind::View(v) if !v.tiled));
        assert_eq!(container.borrow().common.area.size, (400, 300).into());
    }
}
