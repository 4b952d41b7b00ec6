//! Environment export and autostart launch, per §6 and the original
//! `session.h` (`e_session_init_env`, `e_session_autostart_run`).
//!
//! Both run once at startup, before the first client can connect:
//! `init_env` so that `environment`-file variables are visible to every
//! later-spawned process (including autostart's own children), and
//! `run_autostart` to fork the user's `autostart.sh`.

use std::path::Path;

use crate::config::CompositorConfig;

/// Parse and export the `environment` file's `NAME=VALUE` lines.
///
/// Format (§6): blank lines are allowed and skipped; a line with no `=` is
/// an error; a line with `=` but no value (`NAME=`) is also an error.
/// Parsing stops at the first error — lines already exported remain set.
pub fn init_env() {
    let Some(dir) = CompositorConfig::config_dir() else {
        return;
    };
    let path = dir.join("environment");
    let Ok(contents) = std::fs::read_to_string(&path) else {
        tracing::debug!("no environment file at {:?}", path);
        return;
    };

    if let Err((line_no, line)) = apply_environment_file(&contents) {
        tracing::error!(
            "malformed line {} in {:?}: {:?}, stopping environment parse",
            line_no,
            path,
            line
        );
    }
}

/// Apply `NAME=VALUE` lines to the process environment, returning the
/// 1-indexed line number and raw line text of the first malformed entry.
fn apply_environment_file(contents: &str) -> Result<(), (usize, String)> {
    for (idx, line) in contents.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        let Some(eq_pos) = line.find('=') else {
            return Err((line_no, line.to_string()));
        };

        let (name, value) = line.split_at(eq_pos);
        let value = &value[1..]; // skip '='
        if value.is_empty() {
            return Err((line_no, line.to_string()));
        }

        // SAFETY: called once, single-threaded, before any client connects.
        std::env::set_var(name, value);
    }

    Ok(())
}

/// Fork+setsid+exec `autostart.sh` in the config directory, if present.
/// Returns `true` if the fork succeeded (mirrors the boolean return of
/// `e_session_autostart_run`); a missing script is not an error.
pub fn run_autostart() -> bool {
    let Some(dir) = CompositorConfig::config_dir() else {
        return false;
    };
    let script = dir.join("autostart.sh");
    if !script.exists() {
        tracing::debug!("no autostart script at {:?}", script);
        return false;
    }

    spawn_detached(&script)
}

/// Fork, detach into a new session, and `exec` the given script via
/// `/bin/sh`. Used both for autostart and for the `exec` keybind command
/// (§4.7) — kept here since both are "launch a process and forget about
/// it" operations with identical orphaning semantics.
pub fn spawn_detached(script: &Path) -> bool {
    use std::os::unix::process::CommandExt;

    match std::process::Command::new("/bin/sh")
        .arg(script)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .pre_exec(detach_session)
        .spawn()
    {
        Ok(_child) => true,
        Err(err) => {
            tracing::error!("failed to spawn {:?}: {err}", script);
            false
        }
    }
}

/// Run in the forked child before `exec`: start a new session so the
/// process survives the compositor exiting (§4.7 "exec").
///
/// # Safety
/// Called between `fork` and `exec` by `std::process::Command`; only
/// async-signal-safe calls are permitted here, and `libc::setsid` is one.
fn detach_session() -> std::io::Result<()> {
    if unsafe { libc::setsid() } == -1 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_blank_lines() {
        let contents = "FOO=bar\n\nBAZ=qux\n";
        assert!(apply_environment_file(contents).is_ok());
    }

    #[test]
    fn rejects_missing_equals() {
        let contents = "FOO=bar\nNOTANASSIGNMENT\nBAZ=qux\n";
        let err = apply_environment_file(contents).unwrap_err();
        assert_eq!(err.0, 2);
    }

    #[test]
    fn rejects_missing_value() {
        let contents = "FOO=\n";
        let err = apply_environment_file(contents).unwrap_err();
        assert_eq!(err.0, 1);
    }
}
