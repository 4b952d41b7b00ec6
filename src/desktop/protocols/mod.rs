//! Wire-level protocol bridges built on top of the domain model: workspace
//! enumeration (`ext-workspace-v1`, `cosmic-workspace-unstable-v1`,
//! §4.8), the foreign-toplevel bridges consumed by taskbars (§4.9),
//! per-output gamma control (§6), and output capture (§6). Each submodule
//! owns its own [`wayland_server::Dispatch`] impls and talks to the
//! domain model (`crate::desktop`) only through a small sink trait, so
//! the domain side stays free of protocol types.

pub mod foreign_toplevel;
pub mod gamma_control;
pub mod screencopy;
pub mod workspace;
