//! `wlr-screencopy-unstable-v1` (§6 "Screencopy"): one-shot output (or
//! output-region) capture into a client-supplied `wl_shm` buffer. Grounded
//! on the original's `screencopy.c`, which is itself a thin manager
//! handing capture requests to the renderer and a frame object that lives
//! only long enough to answer `copy`/`copy_with_damage` once.
//!
//! The actual pixel copy is backend/renderer work this module knows
//! nothing about — it's handed off through [`ScreencopySink`], the same
//! shape [`super::gamma_control::GammaControlSink`] uses for the hardware
//! side of gamma control.

use std::time::SystemTime;

use smithay::output::Output;
use smithay::reexports::wayland_protocols_wlr::screencopy::v1::server::{
    zwlr_screencopy_frame_v1::{self, ZwlrScreencopyFrameV1},
    zwlr_screencopy_manager_v1::{self, ZwlrScreencopyManagerV1},
};
use smithay::reexports::wayland_server::protocol::wl_buffer::WlBuffer;
use smithay::reexports::wayland_server::backend::GlobalId;
use smithay::reexports::wayland_server::{Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New};
use smithay::utils::{Logical, Physical, Rectangle};

/// The `wl_shm` buffer layout a frame's capture will produce, so the
/// client can allocate a matching buffer before sending `copy` (§6
/// "Screencopy" — `buffer`/`buffer_done`).
#[derive(Debug, Clone, Copy)]
pub struct BufferLayout {
    pub wl_shm_format: u32,
    pub width: i32,
    pub height: i32,
    pub stride: i32,
}

/// Implemented by whatever owns the renderer (`crate::state::State`).
/// `region` is `None` for a whole-output capture, `Some` for
/// `capture_output_region`; coordinates are output-logical.
pub trait ScreencopySink {
    /// The buffer layout a capture of `output`/`region` would produce, or
    /// `None` if the output can't currently be captured (no frame has ever
    /// been rendered to it yet).
    fn screencopy_buffer_layout(
        &mut self,
        output: &Output,
        region: Option<Rectangle<i32, Logical>>,
    ) -> Option<BufferLayout>;

    /// Copy the most recently rendered frame into `buffer`. Returns the
    /// damaged region (in buffer coordinates) since the previous capture
    /// of this output, for `copy_with_damage`; an empty `Vec` means
    /// "nothing changed" and is still a successful copy.
    fn copy_output_into(
        &mut self,
        output: &Output,
        region: Option<Rectangle<i32, Logical>>,
        buffer: &WlBuffer,
    ) -> Result<Vec<Rectangle<i32, Physical>>, ()>;
}

pub struct ScreencopyManagerState {
    global: GlobalId,
}

impl ScreencopyManagerState {
    pub fn new<D>(display: &DisplayHandle) -> Self
    where
        D: GlobalDispatch<ZwlrScreencopyManagerV1, ()>
            + Dispatch<ZwlrScreencopyManagerV1, ()>
            + Dispatch<ZwlrScreencopyFrameV1, FrameData>
            + 'static,
    {
        let global = display.create_global::<D, ZwlrScreencopyManagerV1, _>(3, ());
        Self { global }
    }

    pub fn global_id(&self) -> &GlobalId {
        &self.global
    }
}

pub struct FrameData {
    output: Output,
    region: Option<Rectangle<i32, Logical>>,
}

impl<D> GlobalDispatch<ZwlrScreencopyManagerV1, (), D> for ScreencopyManagerState
where
    D: GlobalDispatch<ZwlrScreencopyManagerV1, ()> + Dispatch<ZwlrScreencopyManagerV1, ()> + 'static,
{
    fn bind(
        _state: &mut D,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<ZwlrScreencopyManagerV1>,
        _global_data: &(),
        data_init: &mut DataInit<'_, D>,
    ) {
        data_init.init(resource, ());
    }
}

impl<D> Dispatch<ZwlrScreencopyManagerV1, (), D> for ScreencopyManagerState
where
    D: Dispatch<ZwlrScreencopyManagerV1, ()>
        + Dispatch<ZwlrScreencopyFrameV1, FrameData>
        + AsScreencopyState
        + 'static,
{
    fn request(
        state: &mut D,
        _client: &Client,
        _resource: &ZwlrScreencopyManagerV1,
        request: zwlr_screencopy_manager_v1::Request,
        _data: &(),
        _dh: &DisplayHandle,
        data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            zwlr_screencopy_manager_v1::Request::CaptureOutput {
                frame,
                overlay_cursor: _,
                output,
            } => {
                let Some(output) = Output::from_resource(&output) else {
                    return;
                };
                let frame = data_init.init(frame, FrameData { output: output.clone(), region: None });
                announce_buffer(state, &frame, &output, None);
            }
            zwlr_screencopy_manager_v1::Request::CaptureOutputRegion {
                frame,
                overlay_cursor: _,
                output,
                x,
                y,
                width,
                height,
            } => {
                let Some(output) = Output::from_resource(&output) else {
                    return;
                };
                let region = Rectangle::from_loc_and_size((x, y), (width.max(0), height.max(0)));
                let frame = data_init.init(
                    frame,
                    FrameData { output: output.clone(), region: Some(region) },
                );
                announce_buffer(state, &frame, &output, Some(region));
            }
            zwlr_screencopy_manager_v1::Request::Destroy => {}
            _ => {}
        }
    }
}

/// Send the `buffer`/`flags`/`buffer_done` burst for a freshly created
/// frame, or `failed` if the output can't be captured right now (§6
/// "Screencopy" — announced once per frame object, before any `copy`).
fn announce_buffer<D>(
    state: &mut D,
    frame: &ZwlrScreencopyFrameV1,
    output: &Output,
    region: Option<Rectangle<i32, Logical>>,
) where
    D: AsScreencopyState,
{
    match state.screencopy_sink().screencopy_buffer_layout(output, region) {
        Some(layout) => {
            frame.buffer(
                wl_shm_format_to_proto(layout.wl_shm_format),
                layout.width as u32,
                layout.height as u32,
                layout.stride as u32,
            );
            if frame.version() >= 3 {
                frame.buffer_done();
            }
        }
        None => frame.failed(),
    }
}

fn wl_shm_format_to_proto(format: u32) -> smithay::reexports::wayland_server::protocol::wl_shm::Format {
    smithay::reexports::wayland_server::protocol::wl_shm::Format::try_from(format)
        .unwrap_or(smithay::reexports::wayland_server::protocol::wl_shm::Format::Argb8888)
}

impl<D> Dispatch<ZwlrScreencopyFrameV1, FrameData, D> for ScreencopyManagerState
where
    D: Dispatch<ZwlrScreencopyFrameV1, FrameData> + AsScreencopyState + 'static,
{
    fn request(
        state: &mut D,
        _client: &Client,
        resource: &ZwlrScreencopyFrameV1,
        request: zwlr_screencopy_frame_v1::Request,
        data: &FrameData,
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            zwlr_screencopy_frame_v1::Request::Copy { buffer } => {
                copy(state, resource, data, &buffer, false);
            }
            zwlr_screencopy_frame_v1::Request::CopyWithDamage { buffer } => {
                copy(state, resource, data, &buffer, true);
            }
            zwlr_screencopy_frame_v1::Request::Destroy => {}
            _ => {}
        }
    }
}

/// Run the copy and send the matching terminal event(s): `damage*` (only
/// for `copy_with_damage`) then `ready`, or `failed` on error. A frame
/// object answers exactly one `copy`/`copy_with_damage` in its lifetime
/// (§6), so nothing here needs to guard against being called twice.
fn copy<D>(
    state: &mut D,
    resource: &ZwlrScreencopyFrameV1,
    data: &FrameData,
    buffer: &WlBuffer,
    with_damage: bool,
) where
    D: AsScreencopyState,
{
    let result = state
        .screencopy_sink()
        .copy_output_into(&data.output, data.region, buffer);

    match result {
        Ok(damage) => {
            if with_damage {
                for rect in damage {
                    resource.damage(
                        rect.loc.x as u32,
                        rect.loc.y as u32,
                        rect.size.w as u32,
                        rect.size.h as u32,
                    );
                }
            }
            let (sec_hi, sec_lo, nsec) = now_as_wire_timestamp();
            resource.ready(sec_hi, sec_lo, nsec);
        }
        Err(()) => resource.failed(),
    }
}

fn now_as_wire_timestamp() -> (u32, u32, u32) {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = now.as_secs();
    (((secs >> 32) & 0xffff_ffff) as u32, (secs & 0xffff_ffff) as u32, now.subsec_nanos())
}

/// Implemented by [`crate::state::State`] so the `Dispatch` impls above
/// can reach the one [`ScreencopyManagerState`] field it owns and the
/// backend's [`ScreencopySink`].
pub trait AsScreencopyState {
    fn screencopy_sink(&mut self) -> &mut dyn ScreencopySink;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubSink {
        layout: Option<BufferLayout>,
        damage: Vec<Rectangle<i32, Physical>>,
    }

    impl ScreencopySink for StubSink {
        fn screencopy_buffer_layout(
            &mut self,
            _output: &Output,
            _region: Option<Rectangle<i32, Logical>>,
        ) -> Option<BufferLayout> {
            self.layout
        }

        fn copy_output_into(
            &mut self,
            _output: &Output,
            _region: Option<Rectangle<i32, Logical>>,
            _buffer: &WlBuffer,
        ) -> Result<Vec<Rectangle<i32, Physical>>, ()> {
            Ok(self.damage.clone())
        }
    }

    #[test]
    fn timestamp_splits_into_two_32_bit_halves() {
        let (hi, lo, _nsec) = now_as_wire_timestamp();
        let reassembled = ((hi as u64) << 32) | lo as u64;
        assert!(reassembled > 0);
    }

    #[test]
    fn stub_sink_reports_no_layout_when_nothing_rendered_yet() {
        let mut sink = StubSink { layout: None, damage: Vec::new() };
        assert!(sink
            .screencopy_buffer_layout(&test_output(), None)
            .is_none());
    }

    fn test_output() -> Output {
        Output::new(
            "test".to_string(),
            smithay::output::PhysicalProperties {
                size: (0, 0).into(),
                subpixel: smithay::output::Subpixel::Unknown,
                make: "test".to_string(),
                model: "test".to_string(),
            },
        )
    }
}
