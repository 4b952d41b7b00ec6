//! Real-device backend (DRM/GBM/libinput/session), grounded on the
//! shape of the original's `udev`-backed startup path, §10.4.
//!
//! A complete implementation multiplexes DRM connector hotplug, GBM/EGL
//! buffer import and libinput device events the way
//! `smithay-drm-extras` demonstrates — all of it squarely inside the
//! "output backend"/"GPU renderer" territory this compositor treats as
//! an external collaborator rather than something it reimplements
//! (§10.4 Non-goals). This build does not carry that device-ownership
//! path; `--backend udev`/unattended `auto` outside a nested session
//! fails fast with a clear message instead of silently degrading.
use smithay::reexports::calloop::EventLoop;

use crate::state::State;

pub fn run(_event_loop: &mut EventLoop<'static, State>, _state: &mut State) -> anyhow::Result<()> {
    anyhow::bail!(
        "the udev/DRM backend is not built into this binary; run nested under an existing \
         Wayland or X11 session (or pass --backend winit) instead"
    )
}
