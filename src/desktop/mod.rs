//! Scene/window hierarchy and tiling layout engine: containers, views,
//! workspaces, outputs, layer-shell surfaces, and the protocol bridges
//! built on top of them (§3, §4.1-§4.9).

pub mod container;
pub mod layer;
pub mod node;
pub mod output;
pub mod protocols;
pub mod transaction;
pub mod view;
pub mod workspace;
pub mod xdg_shell;
pub mod xwayland_bridge;

use crate::desktop::node::NodeRegistry;
use crate::desktop::output::OutputRef;
use crate::input::seat::Seat;

/// The desktop root: every output this compositor manages, plus the node
/// registry shared by hit-testing, and the single seat's focus/grab
/// state. Owned by [`crate::state::State`].
pub struct Desktop {
    pub outputs: Vec<OutputRef>,
    pub nodes: NodeRegistry,
    pub seat: Seat,
}

impl Desktop {
    pub fn new() -> Self {
        Self {
            outputs: Vec::new(),
            nodes: NodeRegistry::new(),
            seat: Seat::new(),
        }
    }

    pub fn add_output(&mut self, output: OutputRef) {
        self.outputs.push(output);
    }

    /// Remove and return the output matching `predicate`, along with the
    /// view-containers that were hosted on it (already deactivated and
    /// detached from their old workspaces by `output::destroy`) for the
    /// caller to migrate onto a remaining output (§4.3 "Destruction").
    pub fn remove_output(
        &mut self,
        predicate: impl Fn(&OutputRef) -> bool,
    ) -> Option<(OutputRef, Vec<container::ContainerRef>)> {
        let index = self.outputs.iter().position(|o| predicate(o))?;
        let output = self.outputs.remove(index);
        let orphans = output::destroy(&output);
        Some((output, orphans))
    }

    /// The output whose geometry contains the given layout point, if any
    /// — used to resolve "the currently hovered output" (§4.6).
    pub fn output_at(&self, point: (f64, f64)) -> Option<OutputRef> {
        self.outputs
            .iter()
            .find(|o| {
                let state = o.borrow();
                let geometry = state.output.geometry();
                geometry.contains((point.0 as i32, point.1 as i32))
            })
            .cloned()
    }
}

impl Default for Desktop {
    fn default() -> Self {
        Self::new()
    }
}
