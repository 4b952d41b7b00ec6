//! Entry point: load configuration, stand up the event loop and Wayland
//! display, hand them to [`state::State`], pick an output backend, and
//! run until a client (or a keybind) asks the compositor to exit (§6).

mod backend;
mod commands;
mod config;
mod desktop;
mod error;
mod input;
mod session;
mod state;

use smithay::reexports::calloop::EventLoop;
use smithay::reexports::wayland_server::Display;

use config::{BackendChoice, CompositorConfig};
use state::State;

fn init_logging(config: &CompositorConfig) {
    use tracing_subscriber::EnvFilter;

    let default_level = config.general.log_level.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// `--backend <winit|udev>` overrides `config.json`'s `general.backend`;
/// `--help`/`--version` print and exit before anything else runs (§10.4).
/// No `clap` here, matching the teacher's own dependency-free argument
/// scan in its `main.rs`.
fn parse_cli_backend() -> Option<BackendChoice> {
    let mut args = std::env::args().skip(1);
    let mut backend = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                println!("tilewl [--backend <winit|udev>] [--version]");
                std::process::exit(0);
            }
            "--version" => {
                println!("tilewl {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--backend" => {
                if let Some(value) = args.next() {
                    match value.parse::<BackendChoice>() {
                        Ok(choice) => backend = Some(choice),
                        Err(()) => {
                            eprintln!("unrecognised --backend value {value:?} (expected winit or udev)");
                            std::process::exit(1);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    backend
}

fn main() -> anyhow::Result<()> {
    let cli_backend = parse_cli_backend();

    let config = CompositorConfig::load();
    init_logging(&config);

    session::init_env();

    let mut event_loop: EventLoop<'static, State> = EventLoop::try_new()?;
    let display: Display<State> = Display::new()?;

    let backend_choice = cli_backend.or(config.general.backend).unwrap_or(BackendChoice::Auto);

    let mut state = State::new(&display, event_loop.handle(), config);
    state.init_wayland_socket(display)?;

    spawn_xwayland(&mut state);

    if !session::run_autostart() {
        tracing::debug!("no autostart.sh found or it failed to spawn");
    }

    let result = backend::run(&mut event_loop, &mut state, backend_choice);

    tracing::info!("shutting down");
    result
}

/// Start Xwayland once at startup (see
/// `desktop::xwayland_bridge::XwaylandBridge::spawn` for why this isn't
/// deferred to first client) and wire its readiness into the X11 window
/// manager.
fn spawn_xwayland(state: &mut State) {
    use smithay::xwayland::{X11Wm, XWaylandEvent};

    let loop_handle = state.loop_handle.clone();
    let result = state.xwayland.spawn(&loop_handle, move |event, state| match event {
        XWaylandEvent::Ready {
            x11_socket,
            display_number,
        } => match X11Wm::start_wm(state.loop_handle.clone(), state.display_handle.clone(), x11_socket) {
            Ok(wm) => {
                std::env::set_var("DISPLAY", format!(":{display_number}"));
                state.xwayland.set_wm(wm);
                tracing::info!("xwayland ready on display :{display_number}");
            }
            Err(err) => tracing::error!("failed to start the X11 window manager: {err}"),
        },
        XWaylandEvent::Exited => {
            tracing::warn!("xwayland exited");
        }
    });

    if let Err(err) = result {
        tracing::warn!("failed to spawn xwayland: {err}");
    }
}
