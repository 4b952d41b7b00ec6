//! Input subsystem: keybind table (§3 Keybind), seat focus policy, cursor
//! grabs, and keyboard/xkb translation (§4.7).

pub mod cursor;
pub mod keybind;
pub mod keyboard;
pub mod seat;
