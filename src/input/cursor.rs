//! Interactive move/resize grabs and drag-and-drop tracking (§4.7 "Cursor
//! grabs", "Drag & drop"), grounded on the original's `cursor.c`.

use smithay::input::pointer::CursorImageStatus;
use smithay::utils::{Logical, Point};

use crate::desktop::container::{self, ContainerRef, Edges};

enum GrabKind {
    Move {
        /// Container-space origin at the moment the grab started.
        origin: Point<i32, Logical>,
    },
    Resize {
        edges: Edges,
    },
}

struct Grab {
    container: ContainerRef,
    pointer_start: Point<f64, Logical>,
    kind: GrabKind,
}

/// Cursor state: pointer position and, while active, an interactive
/// move/resize grab bound to one container. There is at most one grab at
/// a time — starting a new one implicitly ends whatever was running.
pub struct Cursor {
    position: Point<f64, Logical>,
    grab: Option<Grab>,
    drag: Option<DragIcon>,
    /// What the render loop should draw at `position`: the themed default,
    /// hidden, or a client-supplied surface set via `set_cursor` on the
    /// pointer. Tracked here rather than left to `SeatHandler::cursor_image`
    /// to discard, since the backend's render pass needs it every frame.
    image: CursorImageStatus,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            position: Point::default(),
            grab: None,
            drag: None,
            image: CursorImageStatus::default_named(),
        }
    }
}

struct DragIcon {
    position: Point<f64, Logical>,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Point<f64, Logical> {
        self.position
    }

    pub fn image(&self) -> &CursorImageStatus {
        &self.image
    }

    pub fn set_image(&mut self, image: CursorImageStatus) {
        self.image = image;
    }

    /// The container currently grabbed for move or resize, checked by
    /// `apply_geometry` callers before anchoring edges (a container may
    /// have been destroyed mid-grab; handlers must check before
    /// dereferencing — §5 "Cancellation & timeouts").
    pub fn grabbed_container(&self) -> Option<ContainerRef> {
        self.grab.as_ref().map(|g| g.container.clone())
    }

    pub fn grabbed_edges(&self) -> Option<Edges> {
        match &self.grab {
            Some(Grab {
                kind: GrabKind::Resize { edges },
                ..
            }) => Some(*edges),
            _ => None,
        }
    }

    pub fn is_grabbing(&self) -> bool {
        self.grab.is_some()
    }

    pub fn start_container_move(&mut self, container: ContainerRef) {
        let origin = container.borrow().common.area.loc;
        self.grab = Some(Grab {
            container,
            pointer_start: self.position,
            kind: GrabKind::Move { origin },
        });
    }

    pub fn start_container_resize(&mut self, container: ContainerRef, edges: Edges) {
        self.grab = Some(Grab {
            container,
            pointer_start: self.position,
            kind: GrabKind::Resize { edges },
        });
    }

    pub fn end_grab(&mut self) {
        self.grab = None;
    }

    /// Update the pointer position and, if a grab is active, apply its
    /// effect: a move updates the container's position directly; a
    /// resize updates the container's *pending* geometry (actually
    /// committed size still comes from the client's next commit, via
    /// [`container::apply_geometry`]).
    pub fn motion(&mut self, position: Point<f64, Logical>) {
        self.position = position;
        if let Some(icon) = &mut self.drag {
            icon.position = position;
        }

        let Some(grab) = &self.grab else { return };
        let delta = (
            (position.x - grab.pointer_start.x) as i32,
            (position.y - grab.pointer_start.y) as i32,
        );

        match &grab.kind {
            GrabKind::Move { origin } => {
                let new_loc: Point<i32, Logical> = (origin.x + delta.0, origin.y + delta.1).into();
                grab.container.borrow_mut().common.area.loc = new_loc;
            }
            GrabKind::Resize { edges } => {
                let area = grab.container.borrow().common.area;
                let mut size = area.size;
                let mut loc = area.loc;
                if edges.contains(Edges::RIGHT) {
                    size.w += delta.0;
                } else if edges.contains(Edges::LEFT) {
                    size.w -= delta.0;
                    loc.x = area.loc.x + area.size.w - size.w;
                }
                if edges.contains(Edges::BOTTOM) {
                    size.h += delta.1;
                } else if edges.contains(Edges::TOP) {
                    size.h -= delta.1;
                    loc.y = area.loc.y + area.size.h - size.h;
                }
                container::arrange(&grab.container, smithay::utils::Rectangle::from_loc_and_size(loc, size));
            }
        }
    }

    /// End whatever grab is active on button release (§4.7).
    pub fn button_released(&mut self) {
        self.end_grab();
    }

    pub fn start_drag(&mut self) {
        self.drag = Some(DragIcon { position: self.position });
    }

    pub fn drag_icon_position(&self) -> Option<Point<f64, Logical>> {
        self.drag.as_ref().map(|icon| icon.position)
    }

    /// Called when the drag source's destroy signal fires.
    pub fn end_drag(&mut self) {
        self.drag = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::container::Container;
    use crate::desktop::view::test_support::StubView;
    use crate::desktop::view::ViewHandle;
    use smithay::utils::Rectangle;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn leaf_at(area: Rectangle<i32, Logical>) -> ContainerRef {
        let view: ViewHandle = Rc::new(RefCell::new(StubView::default()));
        let container = Container::new_view(view);
        container.borrow_mut().common.area = area;
        container
    }

    #[test]
    fn move_grab_translates_container_by_pointer_delta() {
        let mut cursor = Cursor::new();
        let container = leaf_at(Rectangle::from_loc_and_size((100, 100), (200, 150)));

        cursor.motion((10.0, 10.0).into());
        cursor.start_container_move(container.clone());
        cursor.motion((35.0, 20.0).into());

        assert_eq!(container.borrow().common.area.loc, (125, 110).into());
    }

    #[test]
    fn resize_grab_on_right_edge_grows_width_only() {
        let mut cursor = Cursor::new();
        let container = leaf_at(Rectangle::from_loc_and_size((0, 0), (200, 200)));

        cursor.motion((0.0, 0.0).into());
        cursor.start_container_resize(container.clone(), Edges::RIGHT);
        cursor.motion((50.0, 0.0).into());

        let area = container.borrow().common.area;
        assert_eq!(area.loc, (0, 0).into());
        assert_eq!(area.size, (250, 200).into());
    }

    #[test]
    fn resize_grab_on_left_edge_anchors_the_right_edge() {
        let mut cursor = Cursor::new();
        let container = leaf_at(Rectangle::from_loc_and_size((100, 100), (400, 300)));

        cursor.motion((0.0, 0.0).into());
        cursor.start_container_resize(container.clone(), Edges::LEFT);
        cursor.motion((-30.0, 0.0).into());

        let area = container.borrow().common.area;
        assert_eq!(area.loc, (70, 100).into());
        assert_eq!(area.size, (430, 300).into());
    }

    #[test]
    fn button_release_ends_the_grab() {
        let mut cursor = Cursor::new();
        let container = leaf_at(Rectangle::from_loc_and_size((0, 0), (200, 200)));
        cursor.start_container_move(container);
        assert!(cursor.is_grabbing());
        cursor.button_released();
        assert!(!cursor.is_grabbing());
    }
}
