//! Windowed backend: a winit window standing in for a physical output,
//! grounded on the teacher pack's own winit-driven main loop (the
//! `aigi_udev` example's `winit::init()` + `Timer::immediate()` render
//! loop). Used whenever the compositor runs nested inside an existing
//! session, and as the default `auto` fallback there.

use std::time::Duration;

use smithay::backend::input::{AbsolutePositionEvent, Event, InputEvent};
use smithay::backend::renderer::{Frame, Renderer};
use smithay::backend::winit::{self, WinitEvent};
use smithay::input::pointer::MotionEvent;
use smithay::output::{Mode as OutputMode, Output, PhysicalProperties, Subpixel};
use smithay::reexports::calloop::timer::{TimeoutAction, Timer};
use smithay::reexports::calloop::EventLoop;
use smithay::utils::{Rectangle, Transform, SERIAL_COUNTER};

use crate::desktop::container::ContainerKind;
use crate::desktop::output::{self as domain_output};
use crate::state::State;

const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const CLEAR_COLOR: [f32; 4] = [0.1, 0.1, 0.1, 1.0];

pub fn run(event_loop: &mut EventLoop<'static, State>, state: &mut State) -> anyhow::Result<()> {
    let (mut backend, mut winit_loop) = winit::init()?;

    let mode = OutputMode {
        size: backend.window_size().physical_size,
        refresh: 60_000,
    };
    let smithay_output = Output::new(
        "winit0".to_string(),
        PhysicalProperties {
            size: (0, 0).into(),
            subpixel: Subpixel::Unknown,
            make: "tilewl".into(),
            model: "winit".into(),
        },
    );
    let _global = smithay_output.create_global::<State>(&state.display_handle);
    smithay_output.change_current_state(Some(mode), Some(Transform::Normal), None, Some((0, 0).into()));
    smithay_output.set_preferred(mode);

    let output_ref = state.add_output(smithay_output.clone());
    let start_time = state.start_time;

    event_loop
        .handle()
        .insert_source(Timer::immediate(), move |_, _, state| {
            let mut resized = false;
            winit_loop
                .dispatch_new_events(|event| match event {
                    WinitEvent::Resized { size, .. } => {
                        smithay_output.change_current_state(
                            Some(OutputMode { size, refresh: 60_000 }),
                            None,
                            None,
                            None,
                        );
                        resized = true;
                    }
                    WinitEvent::Input(InputEvent::Keyboard { event }) => {
                        state.handle_keyboard_input(event);
                    }
                    WinitEvent::Input(InputEvent::PointerMotionAbsolute { event, .. }) => {
                        let location = event.position_transformed(
                            smithay_output.current_mode().map(|m| m.size).unwrap_or_default(),
                        );
                        handle_pointer_motion(state, &output_ref, location, event.time_msec());
                    }
                    _ => {}
                })
                .unwrap();

            if resized {
                domain_output::arrange(&output_ref);
            }

            backend.bind().unwrap();
            let size = backend.window_size().physical_size;
            let damage = Rectangle::from_loc_and_size((0, 0), size);
            {
                let renderer = backend.renderer();
                let mut frame = renderer
                    .render(size, Transform::Normal)
                    .expect("failed to start a render frame");
                frame.clear(CLEAR_COLOR, &[damage]).expect("failed to clear frame");
                let _ = frame.finish().expect("failed to finish frame");
            }
            backend.submit(None).unwrap();

            state.send_frame_done(&output_ref, start_time.elapsed());
            state.foreign_toplevel.sync();
            state.display_handle.flush_clients().unwrap();

            TimeoutAction::ToDuration(FRAME_INTERVAL)
        })
        .map_err(|err| anyhow::anyhow!("failed to insert winit render timer: {err}"))?;

    while state.running {
        event_loop.dispatch(Some(FRAME_INTERVAL), state)?;
    }
    Ok(())
}

/// Hit-test the pointer against the output's visible containers, forward
/// motion to the domain cursor (grab handling, §4.7 "Interactive move and
/// resize"), and notify the client under the pointer.
fn handle_pointer_motion(
    state: &mut State,
    output_ref: &domain_output::OutputRef,
    location: smithay::utils::Point<f64, smithay::utils::Logical>,
    time: u32,
) {
    state.desktop.seat.cursor_mut().motion(location);

    let point = (location.x as i32, location.y as i32);
    let under = domain_output::view_at(output_ref, point).and_then(|container| {
        let ContainerKind::View(v) = &container.borrow().kind else {
            return None;
        };
        let surface = v.view.borrow().wl_surface()?;
        let origin = container.borrow().common.area.loc;
        Some((surface, origin))
    });

    let Some(pointer) = state.seat.get_pointer() else {
        return;
    };
    let serial = SERIAL_COUNTER.next_serial();
    pointer.motion(
        state,
        under,
        &MotionEvent {
            location,
            serial,
            time,
        },
    );
}
