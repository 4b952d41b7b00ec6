//! `wlr-gamma-control-unstable-v1` (§6 "Per-output gamma control"):
//! apply a client-supplied gamma ramp to one output, or fail the control
//! object if the backend refuses the mode change. Grounded on the
//! original's `gamma_control_manager.c`, which does exactly this and
//! nothing else — one listener on `set_gamma`, applied straight to an
//! output state commit.

use std::collections::HashMap;

use smithay::output::Output;
use smithay::reexports::wayland_protocols_wlr::gamma_control::v1::server::{
    zwlr_gamma_control_manager_v1::{self, ZwlrGammaControlManagerV1},
    zwlr_gamma_control_v1::{self, ZwlrGammaControlV1},
};
use smithay::reexports::wayland_server::backend::GlobalId;
use smithay::reexports::wayland_server::{Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New};

/// Applies a ramp to an output's hardware gamma LUT. Implemented by
/// whatever owns the DRM/backend handle (`crate::state::State` on the
/// udev backend; a no-op that always fails under winit, which has no
/// gamma hardware to program).
pub trait GammaControlSink {
    /// `ramp` holds `size` red values, then `size` green, then `size`
    /// blue, each a native-endian `u16` — the wire layout of
    /// `set_gamma`'s fd payload (§6).
    fn apply_gamma(&mut self, output: &Output, ramp: GammaRamp) -> bool;
}

#[derive(Debug, Clone)]
pub struct GammaRamp {
    pub red: Vec<u16>,
    pub green: Vec<u16>,
    pub blue: Vec<u16>,
}

pub struct ControlData {
    output: Output,
}

pub struct GammaControlManagerState {
    global: GlobalId,
    gamma_size: HashMap<String, u32>,
}

impl GammaControlManagerState {
    pub fn new<D>(display: &DisplayHandle) -> Self
    where
        D: GlobalDispatch<ZwlrGammaControlManagerV1, ()>
            + Dispatch<ZwlrGammaControlManagerV1, ()>
            + Dispatch<ZwlrGammaControlV1, ControlData>
            + 'static,
    {
        let global = display.create_global::<D, ZwlrGammaControlManagerV1, _>(1, ());
        Self {
            global,
            gamma_size: HashMap::new(),
        }
    }

    pub fn global_id(&self) -> &GlobalId {
        &self.global
    }

    /// Record the ramp size the backend reports for `output`, advertised
    /// to clients via `gamma_size` before they fill in `set_gamma`'s fd.
    pub fn set_gamma_size(&mut self, output: &Output, size: u32) {
        self.gamma_size.insert(output.name(), size);
    }

    fn gamma_size_for(&self, output: &Output) -> u32 {
        self.gamma_size.get(&output.name()).copied().unwrap_or(0)
    }
}

/// Parse the `set_gamma` fd's contents, already read into `bytes`, into a
/// [`GammaRamp`] of `size` entries per channel.
pub fn decode_ramp(bytes: &[u8], size: u32) -> Option<GammaRamp> {
    let size = size as usize;
    let needed = size * 3 * std::mem::size_of::<u16>();
    if bytes.len() < needed {
        return None;
    }
    let mut values = bytes
        .chunks_exact(2)
        .map(|c| u16::from_ne_bytes([c[0], c[1]]));
    let red = (&mut values).take(size).collect::<Vec<_>>();
    let green = (&mut values).take(size).collect::<Vec<_>>();
    let blue = (&mut values).take(size).collect::<Vec<_>>();
    if red.len() != size || green.len() != size || blue.len() != size {
        return None;
    }
    Some(GammaRamp { red, green, blue })
}

impl<D> GlobalDispatch<ZwlrGammaControlManagerV1, (), D> for GammaControlManagerState
where
    D: GlobalDispatch<ZwlrGammaControlManagerV1, ()> + Dispatch<ZwlrGammaControlManagerV1, ()> + 'static,
{
    fn bind(
        _state: &mut D,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<ZwlrGammaControlManagerV1>,
        _global_data: &(),
        data_init: &mut DataInit<'_, D>,
    ) {
        data_init.init(resource, ());
    }
}

impl<D> Dispatch<ZwlrGammaControlManagerV1, (), D> for GammaControlManagerState
where
    D: Dispatch<ZwlrGammaControlManagerV1, ()>
        + Dispatch<ZwlrGammaControlV1, ControlData>
        + AsGammaControlState
        + 'static,
{
    fn request(
        state: &mut D,
        _client: &Client,
        _resource: &ZwlrGammaControlManagerV1,
        request: zwlr_gamma_control_manager_v1::Request,
        _data: &(),
        _dh: &DisplayHandle,
        data_init: &mut DataInit<'_, D>,
    ) {
        if let zwlr_gamma_control_manager_v1::Request::GetGammaControl { id, output } = request {
            let Some(output) = Output::from_resource(&output) else {
                return;
            };
            let control = data_init.init(id, ControlData { output: output.clone() });
            let size = state.gamma_control_state().gamma_size_for(&output);
            control.gamma_size(size);
        }
    }
}

impl<D> Dispatch<ZwlrGammaControlV1, ControlData, D> for GammaControlManagerState
where
    D: Dispatch<ZwlrGammaControlV1, ControlData> + AsGammaControlState + 'static,
{
    fn request(
        state: &mut D,
        _client: &Client,
        resource: &ZwlrGammaControlV1,
        request: zwlr_gamma_control_v1::Request,
        data: &ControlData,
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            zwlr_gamma_control_v1::Request::SetGamma { fd } => {
                let size = state.gamma_control_state().gamma_size_for(&data.output);
                match read_ramp_from_fd(fd, size) {
                    Some(ramp) => {
                        if !state.gamma_control_sink().apply_gamma(&data.output, ramp) {
                            resource.failed();
                        }
                    }
                    None => resource.failed(),
                }
            }
            zwlr_gamma_control_v1::Request::Destroy => {}
            _ => {}
        }
    }
}

fn read_ramp_from_fd(fd: std::os::unix::io::OwnedFd, size: u32) -> Option<GammaRamp> {
    use std::io::Read;
    let mut file = std::fs::File::from(fd);
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).ok()?;
    decode_ramp(&bytes, size)
}

/// Implemented by [`crate::state::State`] so the two `Dispatch` impls
/// above can reach the one [`GammaControlManagerState`] field it owns
/// and the backend's [`GammaControlSink`].
pub trait AsGammaControlState {
    fn gamma_control_state(&mut self) -> &mut GammaControlManagerState;
    fn gamma_control_sink(&mut self) -> &mut dyn GammaControlSink;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_ramp_splits_three_equal_channels_in_order() {
        let size = 2u32;
        let mut bytes = Vec::new();
        for v in [1u16, 2, 3, 4, 5, 6] {
            bytes.extend_from_slice(&v.to_ne_bytes());
        }

        let ramp = decode_ramp(&bytes, size).expect("enough bytes");
        assert_eq!(ramp.red, vec![1, 2]);
        assert_eq!(ramp.green, vec![3, 4]);
        assert_eq!(ramp.blue, vec![5, 6]);
    }

    #[test]
    fn decode_ramp_rejects_short_buffers() {
        assert!(decode_ramp(&[0, 0], 2).is_none());
    }
}
