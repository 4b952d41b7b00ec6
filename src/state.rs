//! Compositor state: the root `State` struct smithay drives through its
//! `Dispatch`/`*Handler` traits, translating raw protocol events into
//! calls on the protocol-agnostic `desktop`/`input` domain modules.
//! Grounded on the teacher's `state.rs` for the overall shape (one state
//! struct, one `ClientState`, delegate macros at the bottom) and
//! generalized from its `Space`/`Window` model to this compositor's own
//! container/workspace tree.

use std::sync::Arc;
use std::time::Instant;

use smithay::backend::input::{InputEvent, KeyState};
use smithay::backend::renderer::utils::on_commit_buffer_handler;
use smithay::desktop::PopupManager;
use smithay::input::keyboard::{FilterResult, KeyboardHandle};
use smithay::input::pointer::CursorImageStatus;
use smithay::input::{Seat as SmithaySeat, SeatHandler, SeatState};
use smithay::output::Output;
use smithay::reexports::calloop::LoopHandle;
use smithay::reexports::wayland_server::backend::{ClientData, ClientId, DisconnectReason};
use smithay::reexports::wayland_server::protocol::wl_buffer::WlBuffer;
use smithay::reexports::wayland_protocols::xdg::shell::server::xdg_toplevel;
use smithay::reexports::wayland_server::protocol::wl_seat::WlSeat;
use smithay::reexports::wayland_server::protocol::wl_surface::WlSurface;
use smithay::reexports::wayland_server::{Client, Display, DisplayHandle};
use smithay::utils::Serial;
use smithay::wayland::buffer::BufferHandler;
use smithay::wayland::compositor::{
    with_states, CompositorClientState, CompositorHandler, CompositorState,
};
use smithay::wayland::cursor_shape::CursorShapeManagerState;
use smithay::wayland::output::OutputManagerState;
use smithay::wayland::viewporter::ViewporterState;
use smithay::wayland::selection::data_device::{
    ClientDndGrabHandler, DataDeviceHandler, DataDeviceState, ServerDndGrabHandler,
};
use smithay::wayland::shell::wlr_layer::{
    Layer as WlrLayer, LayerSurface as SmithayLayerSurface, LayerSurfaceData,
    WlrLayerShellHandler, WlrLayerShellState,
};
use smithay::wayland::shell::xdg::{
    PopupSurface, PositionerState, ToplevelSurface, XdgShellHandler, XdgShellState,
};
use smithay::wayland::shm::{ShmHandler, ShmState};
use smithay::xwayland::xwm::{Reorder, ResizeEdge as X11ResizeEdge, XwmHandler};
use smithay::xwayland::{X11Surface, X11Wm, XwmId};

use crate::commands::{self, Command, CommandSink};
use crate::config::CompositorConfig;
use crate::desktop::container::{Container, ContainerKind, ContainerRef, Edges};
use crate::desktop::layer::{self, Anchor, KeyboardInteractivity, LayerSurfaceLifecycle, LayerSurfaceState, Margin, ShellLayer};
use crate::desktop::output::{self, OutputRef, OutputState};
use crate::desktop::protocols::foreign_toplevel::{AsForeignToplevelSink, ForeignToplevelBridge, ForeignToplevelSink};
use crate::desktop::protocols::gamma_control::{AsGammaControlState, GammaControlManagerState, GammaControlSink, GammaRamp};
use crate::desktop::protocols::screencopy::{AsScreencopyState, ScreencopyManagerState, ScreencopySink};
use crate::desktop::protocols::workspace::{cosmic, ext, CosmicWorkspaceManagerState, ExtWorkspaceManagerState, WorkspaceProtocolSink};
use crate::desktop::view::toplevel::ToplevelView;
use crate::desktop::view::xwayland::XwaylandView;
use crate::desktop::view::{View, ViewHandle};
use crate::desktop::xdg_shell::{self, MapRequest};
use crate::desktop::xwayland_bridge::XwaylandBridge;
use crate::desktop::Desktop;
use crate::input::keybind::ModMask;

/// Per-client data. `xwayland` marks the client as Xwayland's own
/// connection so surface-association code can tell X11 clients apart
/// from regular Wayland ones.
#[derive(Default)]
pub struct ClientState {
    pub compositor_state: CompositorClientState,
}

impl ClientData for ClientState {
    fn initialized(&self, _client_id: ClientId) {}
    fn disconnected(&self, _client_id: ClientId, _reason: DisconnectReason) {}
}

/// The root compositor state. One instance lives for the process
/// lifetime; smithay hands `&mut State` to every `Dispatch`/handler call.
pub struct State {
    pub config: CompositorConfig,
    pub display_handle: DisplayHandle,
    pub loop_handle: LoopHandle<'static, State>,
    pub start_time: Instant,
    pub running: bool,
    pub socket_name: String,

    pub desktop: Desktop,
    pub popups: PopupManager,

    // Smithay protocol states.
    pub compositor_state: CompositorState,
    pub xdg_shell_state: XdgShellState,
    pub layer_shell_state: WlrLayerShellState,
    pub shm_state: ShmState,
    pub output_manager_state: OutputManagerState,
    pub data_device_state: DataDeviceState,
    pub seat_state: SeatState<State>,
    pub seat: SmithaySeat<State>,
    pub cursor_shape_manager_state: CursorShapeManagerState,
    pub viewporter_state: ViewporterState,

    // Custom protocol bridges (§4.8, §4.9, §6).
    pub ext_workspace_state: ExtWorkspaceManagerState,
    pub cosmic_workspace_state: CosmicWorkspaceManagerState,
    pub foreign_toplevel: ForeignToplevelBridge,
    pub gamma_control_state: GammaControlManagerState,
    pub screencopy_state: crate::desktop::protocols::screencopy::ScreencopyManagerState,

    pub xwayland: XwaylandBridge,

    /// Maps a bound layer-shell protocol object to its domain state, so
    /// `WlrLayerShellHandler` callbacks (which only see the smithay
    /// wrapper) can reach the pure layout struct.
    layer_surfaces: Vec<(SmithayLayerSurface, crate::desktop::layer::LayerSurfaceRef, OutputRef)>,
    /// Maps a bound xdg-toplevel to its view-container, likewise.
    toplevels: Vec<(ToplevelSurface, ContainerRef)>,
}

impl State {
    pub fn new(
        display: &Display<State>,
        loop_handle: LoopHandle<'static, State>,
        config: CompositorConfig,
    ) -> Self {
        let display_handle = display.handle();

        let compositor_state = CompositorState::new::<State>(&display_handle);
        let xdg_shell_state = XdgShellState::new::<State>(&display_handle);
        let layer_shell_state = WlrLayerShellState::new::<State>(&display_handle);
        let shm_state = ShmState::new::<State>(&display_handle, Vec::new());
        let output_manager_state = OutputManagerState::new_with_xdg_output::<State>(&display_handle);
        let data_device_state = DataDeviceState::new::<State>(&display_handle);

        let mut seat_state = SeatState::new();
        let mut seat = seat_state.new_wl_seat(&display_handle, "seat0");
        seat.add_keyboard(
            smithay::input::keyboard::XkbConfig {
                layout: &config.keyboard.layout,
                variant: &config.keyboard.variant,
                options: config.keyboard.options.clone(),
                ..Default::default()
            },
            config.keyboard.repeat_delay,
            config.keyboard.repeat_rate,
        )
        .expect("failed to initialize keyboard");
        seat.add_pointer();

        let cursor_shape_manager_state = CursorShapeManagerState::new::<State>(&display_handle);
        let viewporter_state = ViewporterState::new::<State>(&display_handle);

        let ext_workspace_state = ExtWorkspaceManagerState::new::<State>(&display_handle, loop_handle.clone());
        let cosmic_workspace_state = CosmicWorkspaceManagerState::new::<State>(&display_handle, loop_handle.clone());
        let foreign_toplevel = ForeignToplevelBridge::new::<State>(&display_handle);
        let gamma_control_state = GammaControlManagerState::new::<State>(&display_handle);
        let screencopy_state = crate::desktop::protocols::screencopy::ScreencopyManagerState::new::<State>(&display_handle);

        Self {
            config,
            display_handle,
            loop_handle,
            start_time: Instant::now(),
            running: true,
            socket_name: String::new(),

            desktop: Desktop::new(),
            popups: PopupManager::default(),

            compositor_state,
            xdg_shell_state,
            layer_shell_state,
            shm_state,
            output_manager_state,
            data_device_state,
            seat_state,
            seat,
            cursor_shape_manager_state,
            viewporter_state,

            ext_workspace_state,
            cosmic_workspace_state,
            foreign_toplevel,
            gamma_control_state,
            screencopy_state,

            xwayland: XwaylandBridge::new(),

            layer_surfaces: Vec::new(),
            toplevels: Vec::new(),
        }
    }

    /// Bind a Unix socket and register it with the event loop, exporting
    /// `WAYLAND_DISPLAY` for child processes (§6).
    pub fn init_wayland_socket(
        &mut self,
        display: Display<State>,
    ) -> std::io::Result<String> {
        use smithay::reexports::wayland_server::socket::ListeningSocketSource;

        let socket = ListeningSocketSource::new_auto()?;
        let socket_name = socket.socket_name().to_string_lossy().to_string();

        self.loop_handle
            .insert_source(socket, |client_stream, _, state| {
                if let Err(err) = state
                    .display_handle
                    .insert_client(client_stream, Arc::new(ClientState::default()))
                {
                    tracing::error!("failed to insert client: {err}");
                }
            })
            .map_err(|err| std::io::Error::other(err.to_string()))?;

        self.loop_handle
            .insert_source(
                smithay::reexports::calloop::generic::Generic::new(
                    display,
                    smithay::reexports::calloop::Interest::READ,
                    smithay::reexports::calloop::Mode::Level,
                ),
                |_, display, state| {
                    // SAFETY: `display` outlives the event loop; dispatched
                    // events only ever touch `state`, never re-enter this
                    // closure.
                    unsafe {
                        display.get_mut().dispatch_clients(state)?;
                    }
                    Ok(smithay::reexports::calloop::PostAction::Continue)
                },
            )
            .map_err(|err| std::io::Error::other(err.to_string()))?;

        self.socket_name = socket_name.clone();
        std::env::set_var("WAYLAND_DISPLAY", &socket_name);
        tracing::info!("listening on wayland socket {socket_name}");
        Ok(socket_name)
    }

    /// Add an output backed by `output` and arrange it, per §4.3. Also
    /// advertises a workspace-protocol group for the output and a
    /// workspace handle for the default workspace `OutputState::new`
    /// creates on it (§4.8/§4.9 "Creation" — a taskbar must see both the
    /// moment the output appears, not only after the next explicit
    /// `create_workspace` request).
    pub fn add_output(&mut self, smithay_output: Output) -> OutputRef {
        let output_name = smithay_output.name();
        let output_ref = OutputState::new(smithay_output);
        self.desktop.add_output(output_ref.clone());
        output::arrange(&output_ref);

        let dh = self.display_handle.clone();
        self.ext_workspace_state.add_group::<State>(&dh, output_name.clone());
        self.cosmic_workspace_state.add_group::<State>(&dh, output_name.clone());

        let workspace = output_ref.borrow().active_workspace();
        self.ext_workspace_state.workspace_created::<State>(&dh, &output_name, workspace.clone());
        self.cosmic_workspace_state.workspace_created::<State>(&dh, &output_name, workspace);

        output_ref
    }

    /// Remove `output_ref`, migrating its orphaned view-containers onto
    /// the first remaining output, if any (§4.3 "Destruction").
    pub fn remove_output(&mut self, output_ref: &OutputRef) {
        let Some((_, orphans)) = self
            .desktop
            .remove_output(|o| std::rc::Rc::ptr_eq(o, output_ref))
        else {
            return;
        };

        let Some(target) = self.desktop.outputs.first().cloned() else {
            for container in &orphans {
                if let ContainerKind::View(v) = &container.borrow().kind {
                    v.view.borrow_mut().send_close();
                }
            }
            return;
        };

        let workspace = target.borrow().active_workspace();
        for (index, container) in orphans.into_iter().enumerate() {
            crate::desktop::workspace::Workspace::add_tiled(&workspace, container, index);
        }
        output::arrange(&target);
    }

    /// Run a keybind command string against the live compositor, per §4.7.
    pub fn run_command(&mut self, command: &str) {
        commands::run(command, self);
    }

    /// Resolve a raw keysym + xkb-state modifier mask against the
    /// configured keybind table; on a match, dispatches the command and
    /// swallows the key (§4.7 "Key dispatch").
    fn try_dispatch_keybind(&mut self, keysym: xkbcommon::xkb::Keysym, mods: ModMask) -> bool {
        let Some(bind) = self.config.keybinds.find_match(keysym, mods).cloned() else {
            return false;
        };
        self.run_command(&bind.command);
        true
    }

    fn resolved_mod_mask(keyboard: &KeyboardHandle<State>) -> ModMask {
        let mods = keyboard.modifier_state();
        let mut mask = ModMask::empty();
        if mods.shift {
            mask |= ModMask::SHIFT;
        }
        if mods.caps_lock {
            mask |= ModMask::CAPS;
        }
        if mods.ctrl {
            mask |= ModMask::CTRL;
        }
        if mods.alt {
            mask |= ModMask::ALT;
        }
        if mods.logo {
            mask |= ModMask::LOGO;
        }
        mask
    }

    /// Feed one input-backend keyboard event through keybind dispatch
    /// before falling back to normal client delivery.
    pub fn handle_keyboard_input<I, E>(&mut self, event: E)
    where
        I: smithay::backend::input::InputBackend,
        E: smithay::backend::input::KeyboardKeyEvent<I>,
    {
        use smithay::backend::input::Event;

        let keycode = event.key_code();
        let state = event.state();
        let serial = Serial::from(0u32);
        let time = event.time_msec();

        let Some(keyboard) = self.seat.get_keyboard() else {
            return;
        };

        let mut swallowed = false;
        keyboard.input::<(), _>(
            self,
            keycode.into(),
            state,
            serial,
            time,
            |compositor_state, _mods, keysym_handle| {
                if state == KeyState::Pressed {
                    let mods = State::resolved_mod_mask(&compositor_state.seat.get_keyboard().unwrap());
                    if compositor_state.try_dispatch_keybind(keysym_handle.modified_sym(), mods) {
                        swallowed = true;
                        return FilterResult::Intercept(());
                    }
                }
                FilterResult::Forward
            },
        );
        let _ = swallowed;
    }

    /// Map a newly-ready view (xdg-toplevel or xwayland), per §4.6.
    fn map_view(&mut self, view: ViewHandle, fullscreen: bool) {
        let hovered = self
            .desktop
            .output_at(self.seat.get_pointer().map(|p| p.current_location()).unwrap_or((0.0, 0.0).into()).into());
        let container = xdg_shell::map_view(
            &mut self.desktop,
            view.clone(),
            MapRequest {
                fullscreen,
                fullscreen_output: None,
            },
            hovered,
        );

        if let Some(container) = container {
            let smithay_output = container
                .borrow()
                .common
                .workspace
                .clone()
                .and_then(|w| w.upgrade())
                .and_then(|w| w.borrow().output.clone())
                .and_then(|o| o.upgrade())
                .map(|o| o.borrow().output.clone());
            if let Some(smithay_output) = &smithay_output {
                view.borrow_mut().set_output(Some(smithay_output.clone()));
            }

            let dh = self.display_handle.clone();
            self.foreign_toplevel.create::<State>(&dh, view.clone());
            self.foreign_toplevel.set_title(&view, Some(view.borrow().title()));
            self.foreign_toplevel.set_app_id(&view, Some(view.borrow().app_id()));
            self.foreign_toplevel.set_activated(&view, true);
            self.foreign_toplevel.set_fullscreen(&view, fullscreen);
            if let Some(smithay_output) = &smithay_output {
                self.foreign_toplevel.output_enter(&view, smithay_output);
            }
            self.foreign_toplevel.sync();
        }
    }

    /// Resolve a `ToplevelSurface` to the container it's mapped into, if
    /// any — the xdg-shell side of the same surface-to-container lookup
    /// `XwaylandBridge`'s managed-window tracking does for X11.
    fn container_for_toplevel(&self, surface: &ToplevelSurface) -> Option<ContainerRef> {
        self.toplevels.iter().find(|(t, _)| t == surface).map(|(_, c)| c.clone())
    }

    /// Toggle fullscreen on the view-container behind `surface`, mirroring
    /// `ForeignToplevelSink::request_fullscreen`'s effect for the taskbar-
    /// driven path (§4.2 "Fullscreen").
    fn set_toplevel_fullscreen(&mut self, surface: &ToplevelSurface, fullscreen: bool) {
        let Some(container) = self.container_for_toplevel(surface) else {
            return;
        };
        let view = {
            let ContainerKind::View(view_container) = &container.borrow().kind else {
                return;
            };
            view_container.view.clone()
        };
        ForeignToplevelSink::request_fullscreen(self, &view, fullscreen, None);
    }

    /// Send `wl_surface.frame` done callbacks to every surface visible on
    /// `output_ref` right now (§4.3 "Each output commits a scene frame on
    /// every vblank and sends `frame_done` to surfaces that appear in that
    /// frame"). Called by the backend render loop once per rendered frame.
    pub fn send_frame_done(&self, output_ref: &OutputRef, time: std::time::Duration) {
        use smithay::desktop::utils::send_frames_surface_tree;

        let output = output_ref.borrow().output.clone();

        for container in output::visible_view_containers(output_ref) {
            let ContainerKind::View(v) = &container.borrow().kind else {
                continue;
            };
            let Some(surface) = v.view.borrow().wl_surface() else {
                continue;
            };
            send_frames_surface_tree(&surface, &output, time, None, |_, _| Some(output.clone()));
        }

        for (layer_surface, _, layer_output) in &self.layer_surfaces {
            if std::rc::Rc::ptr_eq(layer_output, output_ref) {
                send_frames_surface_tree(layer_surface.wl_surface(), &output, time, None, |_, _| {
                    Some(output.clone())
                });
            }
        }
    }

    fn unmap_container(&mut self, container: &ContainerRef) {
        let view = match &container.borrow().kind {
            ContainerKind::View(v) => v.view.clone(),
            ContainerKind::Tree(_) => return,
        };
        self.foreign_toplevel.destroy(&view);

        let workspace = container.borrow().common.workspace.clone().and_then(|w| w.upgrade());
        if let Some(workspace) = workspace {
            let tiled = matches!(&container.borrow().kind, ContainerKind::View(v) if v.tiled);
            if tiled {
                Container::remove_child(container);
            } else {
                crate::desktop::workspace::Workspace::remove_floating(&workspace, container);
            }
            let full = workspace.borrow().full_area;
            let tiled_area = workspace.borrow().tiled_area;
            crate::desktop::workspace::Workspace::arrange(&workspace, full, tiled_area);
        }
    }
}

impl CommandSink for State {
    fn exec(&mut self, command: &str) {
        use std::os::unix::process::CommandExt;

        let result = std::process::Command::new("/bin/sh")
            .arg("-c")
            .arg(command)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .pre_exec(|| {
                // SAFETY: between fork and exec; setsid is async-signal-safe.
                if unsafe { libc::setsid() } == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            })
            .spawn();
        if let Err(err) = result {
            tracing::error!("exec {command:?} failed: {err}");
        }
    }

    fn exit(&mut self) {
        self.running = false;
    }

    fn kill_focused(&mut self) {
        if let Some(container) = self.desktop.seat.active_view_container() {
            if let ContainerKind::View(v) = &container.borrow().kind {
                v.view.borrow_mut().send_close();
            }
        }
    }

    fn reload_config(&mut self) {
        self.config = CompositorConfig::load();
    }

    fn switch_vt(&mut self, vt: u32) {
        tracing::info!("switch to vt {vt} requested (no-op outside the udev backend)");
    }
}

// ---------------------------------------------------------------------
// Wayland compositor core
// ---------------------------------------------------------------------

impl CompositorHandler for State {
    fn compositor_state(&mut self) -> &mut CompositorState {
        &mut self.compositor_state
    }

    fn client_compositor_state<'a>(&self, client: &'a Client) -> &'a CompositorClientState {
        &client.get_data::<ClientState>().unwrap().compositor_state
    }

    fn commit(&mut self, surface: &WlSurface) {
        on_commit_buffer_handler::<State>(surface);
        self.popups.commit(surface);

        if let Some((toplevel_surface, container)) =
            self.toplevels.iter().find(|(t, _)| t.wl_surface() == surface).cloned()
        {
            let acked = with_states(surface, |states| {
                states
                    .data_map
                    .get::<smithay::wayland::shell::xdg::XdgToplevelSurfaceData>()
                    .map(|_| toplevel_surface.current_state().size.unwrap_or_default())
            })
            .unwrap_or_default();
            if let ContainerKind::View(v) = &container.borrow().kind {
                if let Some(view) = v.view.borrow_mut().as_any_mut().downcast_mut::<ToplevelView>() {
                    view.on_ack_commit(acked.into());
                }
            }
        }

        if let Some((layer_surface, layer_ref, output)) = self
            .layer_surfaces
            .iter()
            .find(|(l, _, _)| l.wl_surface() == surface)
            .cloned()
        {
            sync_layer_pending_state(&layer_surface, &layer_ref);
            let mut state = layer_ref.borrow_mut();
            if state.lifecycle == LayerSurfaceLifecycle::Configured {
                state.lifecycle = LayerSurfaceLifecycle::Mapped;
            }
            drop(state);
            output::arrange(&output);
        }
    }
}

impl BufferHandler for State {
    fn buffer_destroyed(&mut self, _buffer: &WlBuffer) {}
}

impl ShmHandler for State {
    fn shm_state(&self) -> &ShmState {
        &self.shm_state
    }
}

// ---------------------------------------------------------------------
// xdg-shell
// ---------------------------------------------------------------------

impl XdgShellHandler for State {
    fn xdg_shell_state(&mut self) -> &mut XdgShellState {
        &mut self.xdg_shell_state
    }

    fn new_toplevel(&mut self, surface: ToplevelSurface) {
        surface.with_pending_state(|state| {
            state.size = Some((0, 0).into());
        });
        surface.send_configure();
        // Mapping happens on the first commit that has a buffer attached
        // (§4.5 "Mapping"); remembered here only so `commit` can route
        // ack'd sizes back to the right `ToplevelView`, the actual
        // `map_view` call happens once in `commit` via a "newly mapped"
        // check left to the real backend wiring.
        let view: ViewHandle = std::rc::Rc::new(std::cell::RefCell::new(ToplevelView::new(surface.clone())));
        self.map_view(view.clone(), false);
        if let Some(container) = self.desktop.seat.active_view_container() {
            self.toplevels.push((surface, container));
        }
    }

    fn new_popup(&mut self, surface: PopupSurface, _positioner: PositionerState) {
        self.popups.track_popup(smithay::desktop::PopupKind::Xdg(surface)).ok();
    }

    fn grab(&mut self, _surface: PopupSurface, _seat: WlSeat, _serial: Serial) {}

    fn reposition_request(&mut self, _surface: PopupSurface, _positioner: PositionerState, _token: u32) {}

    fn toplevel_destroyed(&mut self, surface: ToplevelSurface) {
        if let Some(pos) = self.toplevels.iter().position(|(t, _)| t == &surface) {
            let (_, container) = self.toplevels.remove(pos);
            self.unmap_container(&container);
        }
    }

    /// Client-initiated interactive move, e.g. dragging a custom
    /// decoration (§4.7 "Interactive move and resize").
    fn move_request(&mut self, surface: ToplevelSurface, _seat: WlSeat, _serial: Serial) {
        if let Some(container) = self.container_for_toplevel(&surface) {
            self.desktop.seat.cursor_mut().start_container_move(container);
        }
    }

    /// Client-initiated interactive resize, anchored on whichever edges
    /// the client reports grabbing (§4.7).
    fn resize_request(&mut self, surface: ToplevelSurface, _seat: WlSeat, _serial: Serial, edges: xdg_toplevel::ResizeEdge) {
        if let Some(container) = self.container_for_toplevel(&surface) {
            let edges = Edges::from_bits_truncate(edges as u8);
            self.desktop.seat.cursor_mut().start_container_resize(container, edges);
        }
    }

    fn fullscreen_request(&mut self, surface: ToplevelSurface, _output: Option<smithay::reexports::wayland_server::protocol::wl_output::WlOutput>) {
        self.set_toplevel_fullscreen(&surface, true);
    }

    fn unset_fullscreen_request(&mut self, surface: ToplevelSurface) {
        self.set_toplevel_fullscreen(&surface, false);
    }
}

// ---------------------------------------------------------------------
// wlr-layer-shell
// ---------------------------------------------------------------------

impl WlrLayerShellHandler for State {
    fn shell_state(&mut self) -> &mut WlrLayerShellState {
        &mut self.layer_shell_state
    }

    fn new_layer_surface(
        &mut self,
        surface: SmithayLayerSurface,
        wl_output: Option<smithay::reexports::wayland_server::protocol::wl_output::WlOutput>,
        layer: WlrLayer,
        _namespace: String,
    ) {
        let output = wl_output
            .and_then(|o| Output::from_resource(&o))
            .and_then(|o| self.desktop.outputs.iter().find(|out| out.borrow().output == o).cloned())
            .or_else(|| self.desktop.outputs.first().cloned());
        let Some(output) = output else {
            return;
        };

        let shell_layer = match layer {
            WlrLayer::Background => ShellLayer::Background,
            WlrLayer::Bottom => ShellLayer::Bottom,
            WlrLayer::Top => ShellLayer::Top,
            WlrLayer::Overlay => ShellLayer::Overlay,
        };
        let state = LayerSurfaceState::new(shell_layer);
        state.borrow_mut().lifecycle = LayerSurfaceLifecycle::Configured;

        self.layer_surfaces.push((surface, state.clone(), output.clone()));
        output::add_layer_surface(&output, shell_layer, state);
    }

    fn layer_destroyed(&mut self, surface: SmithayLayerSurface) {
        let Some(pos) = self.layer_surfaces.iter().position(|(l, _, _)| l == &surface) else {
            return;
        };
        let (_, state, output) = self.layer_surfaces.remove(pos);
        state.borrow_mut().lifecycle = LayerSurfaceLifecycle::Destroyed;
        let layer = state.borrow().layer;
        output::remove_layer_surface(&output, layer, &state);
    }
}

/// Apply a configured layer-shell surface's pending state into its
/// [`LayerSurfaceState`] — the smithay-side equivalent of the original's
/// `layer_surface_handle_commit` decoding `zwlr_layer_surface_v1`'s
/// `set_*` requests before the next `configure`.
pub fn sync_layer_pending_state(surface: &SmithayLayerSurface, state: &crate::desktop::layer::LayerSurfaceRef) {
    let data = surface.cached_state();
    let mut s = state.borrow_mut();
    s.anchor = Anchor::from_bits_truncate(data.anchor.bits());
    s.exclusive_zone = data.exclusive_zone;
    s.margin = Margin {
        top: data.margin.top,
        right: data.margin.right,
        bottom: data.margin.bottom,
        left: data.margin.left,
    };
    s.desired_size = (data.size.w, data.size.h);
    s.keyboard_interactivity = match data.keyboard_interactivity {
        smithay::wayland::shell::wlr_layer::KeyboardInteractivity::None => KeyboardInteractivity::None,
        smithay::wayland::shell::wlr_layer::KeyboardInteractivity::Exclusive => KeyboardInteractivity::Exclusive,
        smithay::wayland::shell::wlr_layer::KeyboardInteractivity::OnDemand => KeyboardInteractivity::OnDemand,
    };
}

// ---------------------------------------------------------------------
// Data device / seat
// ---------------------------------------------------------------------

impl DataDeviceHandler for State {
    fn data_device_state(&self) -> &DataDeviceState {
        &self.data_device_state
    }
}

impl ClientDndGrabHandler for State {}
impl ServerDndGrabHandler for State {}

impl SeatHandler for State {
    type KeyboardFocus = WlSurface;
    type PointerFocus = WlSurface;
    type TouchFocus = WlSurface;

    fn seat_state(&mut self) -> &mut SeatState<State> {
        &mut self.seat_state
    }

    fn cursor_image(&mut self, _seat: &SmithaySeat<State>, image: CursorImageStatus) {
        self.desktop.seat.cursor_mut().set_image(image);
    }

    /// Keep the protocol keyboard focus mirrored to whatever this pointer
    /// enter/leave just changed; the seat's own recorded [`Focus`] is the
    /// source of truth and is only ever updated through
    /// `Seat::set_focus_view_container`/`set_focus_layer_surface`, so there
    /// is nothing further to drive from here (§5 "Seat focus state").
    fn focus_changed(&mut self, _seat: &SmithaySeat<State>, _focused: Option<&WlSurface>) {}
}

// ---------------------------------------------------------------------
// Xwayland
// ---------------------------------------------------------------------

impl XwmHandler for State {
    fn xwm_state(&mut self, _xwm: XwmId) -> &mut X11Wm {
        self.xwayland.wm().expect("xwm requested before it was set")
    }

    fn new_window(&mut self, _xwm: XwmId, _window: X11Surface) {}

    fn new_override_redirect_window(&mut self, _xwm: XwmId, window: X11Surface) {
        self.xwayland.map_unmanaged(window);
    }

    fn map_window_request(&mut self, _xwm: XwmId, window: X11Surface) {
        let _ = window.set_mapped(true);
        let view = XwaylandBridge::wrap_managed(window.clone());
        let fullscreen = window.is_fullscreen();
        self.map_view(view, fullscreen);
        if let Some(container) = self.desktop.seat.active_view_container() {
            self.xwayland.track_managed(window, container);
        }
    }

    fn mapped_override_redirect_window(&mut self, _xwm: XwmId, window: X11Surface) {
        let geometry = window.geometry();
        self.xwayland.configure_unmanaged(&window, geometry);
    }

    fn unmapped_window(&mut self, _xwm: XwmId, window: X11Surface) {
        if XwaylandBridge::is_unmanaged(&window) {
            self.xwayland.unmap_unmanaged(&window);
            return;
        }
        if let Some(container) = self.xwayland.untrack_managed(&window) {
            self.unmap_container(&container);
        }
    }

    fn destroyed_window(&mut self, xwm: XwmId, window: X11Surface) {
        self.unmapped_window(xwm, window);
    }

    fn configure_request(
        &mut self,
        _xwm: XwmId,
        window: X11Surface,
        x: Option<i32>,
        y: Option<i32>,
        w: Option<u32>,
        h: Option<u32>,
        _reorder: Option<Reorder>,
    ) {
        if XwaylandBridge::is_unmanaged(&window) {
            let mut geo = window.geometry();
            if let Some(x) = x {
                geo.loc.x = x;
            }
            if let Some(y) = y {
                geo.loc.y = y;
            }
            if let Some(w) = w {
                geo.size.w = w as i32;
            }
            if let Some(h) = h {
                geo.size.h = h as i32;
            }
            let _ = window.configure(geo);
            self.xwayland.configure_unmanaged(&window, geo);
        } else {
            let _ = window.configure(window.geometry());
        }
    }

    fn configure_notify(&mut self, _xwm: XwmId, window: X11Surface, geometry: smithay::utils::Rectangle<i32, smithay::utils::Logical>, _above: Option<u32>) {
        if XwaylandBridge::is_unmanaged(&window) {
            self.xwayland.configure_unmanaged(&window, geometry);
        }
    }

    /// `_NET_WM_MOVERESIZE` move, the X11 equivalent of `xdg_toplevel.move`
    /// (§4.7).
    fn move_request(&mut self, _xwm: XwmId, window: X11Surface, _button: u32) {
        if let Some(container) = self.xwayland.container_for(&window) {
            self.desktop.seat.cursor_mut().start_container_move(container);
        }
    }

    /// `_NET_WM_MOVERESIZE` resize, the X11 equivalent of
    /// `xdg_toplevel.resize`.
    fn resize_request(&mut self, _xwm: XwmId, window: X11Surface, _button: u32, edge: X11ResizeEdge) {
        let Some(container) = self.xwayland.container_for(&window) else {
            return;
        };
        let edges = match edge {
            X11ResizeEdge::Top => Edges::TOP,
            X11ResizeEdge::Bottom => Edges::BOTTOM,
            X11ResizeEdge::Left => Edges::LEFT,
            X11ResizeEdge::Right => Edges::RIGHT,
            X11ResizeEdge::TopLeft => Edges::TOP | Edges::LEFT,
            X11ResizeEdge::TopRight => Edges::TOP | Edges::RIGHT,
            X11ResizeEdge::BottomLeft => Edges::BOTTOM | Edges::LEFT,
            X11ResizeEdge::BottomRight => Edges::BOTTOM | Edges::RIGHT,
        };
        self.desktop.seat.cursor_mut().start_container_resize(container, edges);
    }
}

// ---------------------------------------------------------------------
// Custom protocol sinks
// ---------------------------------------------------------------------

impl ext::AsWorkspaceProtocols for State {
    fn ext_workspace_state(&mut self) -> &mut ExtWorkspaceManagerState {
        &mut self.ext_workspace_state
    }

    fn do_commit(&mut self) {
        let mut state = std::mem::replace(
            &mut self.ext_workspace_state,
            ExtWorkspaceManagerState::new::<State>(&self.display_handle.clone(), self.loop_handle.clone()),
        );
        state.commit(self);
        self.ext_workspace_state = state;
    }
}

impl cosmic::AsWorkspaceProtocols for State {
    fn cosmic_workspace_state(&mut self) -> &mut CosmicWorkspaceManagerState {
        &mut self.cosmic_workspace_state
    }

    fn do_cosmic_commit(&mut self) {
        let mut state = std::mem::replace(
            &mut self.cosmic_workspace_state,
            CosmicWorkspaceManagerState::new::<State>(&self.display_handle.clone(), self.loop_handle.clone()),
        );
        state.commit(self);
        self.cosmic_workspace_state = state;
    }
}

impl WorkspaceProtocolSink for State {
    fn request_create_workspace(&mut self, output_name: &str, name: Option<String>) {
        let Some(output) = self.desktop.outputs.iter().find(|o| o.borrow().output.name() == output_name).cloned() else {
            return;
        };
        let workspace = crate::desktop::workspace::Workspace::new(name.unwrap_or_default());
        crate::desktop::workspace::Workspace::set_output(&workspace, Some(std::rc::Rc::downgrade(&output)));
        output.borrow_mut().workspaces.push(workspace.clone());

        let dh = self.display_handle.clone();
        self.ext_workspace_state.workspace_created::<State>(&dh, output_name, workspace.clone());
        self.cosmic_workspace_state.workspace_created::<State>(&dh, output_name, workspace);
    }

    fn request_activate(&mut self, workspace_id: u32) {
        for output in self.desktop.outputs.clone() {
            let target = output.borrow().workspaces.iter().find(|w| w.borrow().id == workspace_id).cloned();
            if let Some(target) = target {
                output::display_workspace(&output, &target);
                return;
            }
        }
    }

    fn request_deactivate(&mut self, _workspace_id: u32) {
        // No-op: exactly one workspace per output is always active
        // (§4.2); "deactivate" has nothing else to switch to.
    }

    fn request_assign(&mut self, workspace_id: u32, output_name: &str) {
        tracing::debug!("workspace {workspace_id} assign to {output_name} ignored: migration unsupported");
    }

    fn request_remove(&mut self, workspace_id: u32) {
        for output in self.desktop.outputs.clone() {
            let mut state = output.borrow_mut();
            if state.workspaces.len() <= 1 {
                continue;
            }
            if let Some(pos) = state.workspaces.iter().position(|w| w.borrow().id == workspace_id) {
                if pos == state.active_workspace {
                    continue;
                }
                state.workspaces.remove(pos);
                if state.active_workspace > pos {
                    state.active_workspace -= 1;
                }
            }
        }
        self.ext_workspace_state.workspace_removed(workspace_id);
        self.cosmic_workspace_state.workspace_removed(workspace_id);
    }
}

impl AsForeignToplevelSink for State {
    fn foreign_toplevel_sink(&mut self) -> &mut dyn ForeignToplevelSink {
        self
    }

    fn foreign_toplevel_bridge(&mut self) -> &mut ForeignToplevelBridge {
        &mut self.foreign_toplevel
    }
}

impl ForeignToplevelSink for State {
    fn request_activate(&mut self, view: &ViewHandle) {
        let container = view.borrow().container().and_then(|c| c.upgrade());
        self.desktop.seat.set_focus_view_container(container, |_| {});
    }

    fn request_fullscreen(&mut self, view: &ViewHandle, fullscreen: bool, _output: Option<Output>) {
        let Some(container) = view.borrow().container().and_then(|c| c.upgrade()) else {
            return;
        };
        let workspace = container.borrow().common.workspace.clone().and_then(|w| w.upgrade());
        let Some(workspace) = workspace else { return };
        crate::desktop::workspace::Workspace::set_fullscreen(&workspace, fullscreen.then(|| container.clone()));
        view.borrow_mut().set_fullscreen(fullscreen);
        let full = workspace.borrow().full_area;
        let tiled_area = workspace.borrow().tiled_area;
        crate::desktop::workspace::Workspace::arrange(&workspace, full, tiled_area);
    }

    fn request_close(&mut self, view: &ViewHandle) {
        view.borrow_mut().send_close();
    }
}

impl AsGammaControlState for State {
    fn gamma_control_state(&mut self) -> &mut GammaControlManagerState {
        &mut self.gamma_control_state
    }

    fn gamma_control_sink(&mut self) -> &mut dyn GammaControlSink {
        self
    }
}

impl GammaControlSink for State {
    /// Always fails under the winit backend (no hardware gamma LUT to
    /// program); the udev backend overrides this path through the DRM
    /// output's own state-commit, which is backend code outside this
    /// crate's domain-pure modules.
    fn apply_gamma(&mut self, _output: &Output, _ramp: GammaRamp) -> bool {
        false
    }
}

impl AsScreencopyState for State {
    fn screencopy_sink(&mut self) -> &mut dyn ScreencopySink {
        self
    }
}

impl ScreencopySink for State {
    /// The renderer's last-composited frame per output is backend state
    /// this crate's domain-pure `State` doesn't track; the udev/winit
    /// backends fill in the real layout once a frame has actually been
    /// rendered.
    fn screencopy_buffer_layout(
        &mut self,
        _output: &Output,
        _region: Option<smithay::utils::Rectangle<i32, smithay::utils::Logical>>,
    ) -> Option<crate::desktop::protocols::screencopy::BufferLayout> {
        None
    }

    fn copy_output_into(
        &mut self,
        _output: &Output,
        _region: Option<smithay::utils::Rectangle<i32, smithay::utils::Logical>>,
        _buffer: &smithay::reexports::wayland_server::protocol::wl_buffer::WlBuffer,
    ) -> Result<Vec<smithay::utils::Rectangle<i32, smithay::utils::Physical>>, ()> {
        Err(())
    }
}

// ---------------------------------------------------------------------
// Delegate macros: wire `State` into smithay's built-in protocol
// implementations and our own custom ones.
// ---------------------------------------------------------------------

smithay::delegate_compositor!(State);
smithay::delegate_shm!(State);
smithay::delegate_seat!(State);
smithay::delegate_data_device!(State);
smithay::delegate_output!(State);
smithay::delegate_xdg_shell!(State);
smithay::delegate_layer_shell!(State);
smithay::delegate_viewporter!(State);
smithay::delegate_cursor_shape!(State);

smithay::reexports::wayland_server::delegate_dispatch!(State: [
    smithay::reexports::wayland_protocols::ext::workspace::v1::server::ext_workspace_manager_v1::ExtWorkspaceManagerV1: ()
] => ExtWorkspaceManagerState);
smithay::reexports::wayland_server::delegate_dispatch!(State: [
    smithay::reexports::wayland_protocols::ext::workspace::v1::server::ext_workspace_group_handle_v1::ExtWorkspaceGroupHandleV1: crate::desktop::protocols::workspace::GroupResourceData
] => ExtWorkspaceManagerState);
smithay::reexports::wayland_server::delegate_dispatch!(State: [
    smithay::reexports::wayland_protocols::ext::workspace::v1::server::ext_workspace_handle_v1::ExtWorkspaceHandleV1: crate::desktop::protocols::workspace::WorkspaceResourceData
] => ExtWorkspaceManagerState);

smithay::reexports::wayland_server::delegate_dispatch!(State: [
    cosmic_protocols::workspace::v1::server::zcosmic_workspace_manager_v1::ZcosmicWorkspaceManagerV1: ()
] => CosmicWorkspaceManagerState);
smithay::reexports::wayland_server::delegate_dispatch!(State: [
    cosmic_protocols::workspace::v1::server::zcosmic_workspace_group_handle_v1::ZcosmicWorkspaceGroupHandleV1: crate::desktop::protocols::workspace::GroupResourceData
] => CosmicWorkspaceManagerState);
smithay::reexports::wayland_server::delegate_dispatch!(State: [
    cosmic_protocols::workspace::v1::server::zcosmic_workspace_handle_v1::ZcosmicWorkspaceHandleV1: crate::desktop::protocols::workspace::WorkspaceResourceData
] => CosmicWorkspaceManagerState);

smithay::reexports::wayland_server::delegate_dispatch!(State: [
    smithay::reexports::wayland_protocols_wlr::foreign_toplevel::v1::server::zwlr_foreign_toplevel_manager_v1::ZwlrForeignToplevelManagerV1: ()
] => ForeignToplevelBridge);
smithay::reexports::wayland_server::delegate_dispatch!(State: [
    smithay::reexports::wayland_protocols_wlr::foreign_toplevel::v1::server::zwlr_foreign_toplevel_handle_v1::ZwlrForeignToplevelHandleV1: crate::desktop::protocols::foreign_toplevel::WlrResourceData
] => ForeignToplevelBridge);
smithay::reexports::wayland_server::delegate_dispatch!(State: [
    smithay::reexports::wayland_protocols::ext::foreign_toplevel_list::v1::server::ext_foreign_toplevel_list_v1::ExtForeignToplevelListV1: ()
] => ForeignToplevelBridge);
smithay::reexports::wayland_server::delegate_dispatch!(State: [
    smithay::reexports::wayland_protocols::ext::foreign_toplevel_list::v1::server::ext_foreign_toplevel_handle_v1::ExtForeignToplevelHandleV1: crate::desktop::protocols::foreign_toplevel::ExtResourceData
] => ForeignToplevelBridge);

smithay::reexports::wayland_server::delegate_dispatch!(State: [
    smithay::reexports::wayland_protocols_wlr::gamma_control::v1::server::zwlr_gamma_control_manager_v1::ZwlrGammaControlManagerV1: ()
] => GammaControlManagerState);
smithay::reexports::wayland_server::delegate_dispatch!(State: [
    smithay::reexports::wayland_protocols_wlr::gamma_control::v1::server::zwlr_gamma_control_v1::ZwlrGammaControlV1: crate::desktop::protocols::gamma_control::ControlData
] => GammaControlManagerState);

smithay::reexports::wayland_server::delegate_dispatch!(State: [
    smithay::reexports::wayland_protocols_wlr::screencopy::v1::server::zwlr_screencopy_manager_v1::ZwlrScreencopyManagerV1: ()
] => ScreencopyManagerState);
smithay::reexports::wayland_server::delegate_dispatch!(State: [
    smithay::reexports::wayland_protocols_wlr::screencopy::v1::server::zwlr_screencopy_frame_v1::ZwlrScreencopyFrameV1: crate::desktop::protocols::screencopy::FrameData
] => ScreencopyManagerState);
