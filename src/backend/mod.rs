//! Output/input backend selection.
//!
//! The GPU renderer and the output/input device backend are an external
//! collaborator this compositor only drives through its public contract
//! (vblank → render a frame → `frame_done`, libinput events → `State`'s
//! input handlers) rather than something reimplemented here. Each
//! submodule owns exactly that glue for one of smithay's backends; it
//! renders a damage-tracked clear per output rather than compositing the
//! view tree's buffers, since buffer compositing is the renderer's job,
//! not this compositor's domain logic.

pub mod udev;
pub mod winit;

use smithay::reexports::calloop::EventLoop;

use crate::config::BackendChoice;
use crate::state::State;

/// Resolve `Auto` the way other wlroots compositors do: nested inside an
/// existing Wayland or X11 session → windowed backend; otherwise the real
/// device backend.
fn resolve_auto() -> BackendChoice {
    if std::env::var_os("WAYLAND_DISPLAY").is_some() || std::env::var_os("DISPLAY").is_some() {
        BackendChoice::Winit
    } else {
        BackendChoice::Udev
    }
}

/// Wire up the chosen backend's render/input loop against `state` and run
/// it until `state.running` goes false. Returns on fatal backend
/// initialization failure (§6 "Process exit codes").
pub fn run(event_loop: &mut EventLoop<'static, State>, state: &mut State, choice: BackendChoice) -> anyhow::Result<()> {
    let resolved = match choice {
        BackendChoice::Auto => resolve_auto(),
        other => other,
    };

    match resolved {
        BackendChoice::Winit => winit::run(event_loop, state),
        BackendChoice::Udev => udev::run(event_loop, state),
        BackendChoice::Auto => unreachable!("resolve_auto never returns Auto"),
    }
}
