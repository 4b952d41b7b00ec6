//! Keybind command parsing and dispatch (§4.7, original `commands.c`).
//!
//! A command is just the string configured against a keybind in
//! `config.json`. `parse` tokenizes it into a typed [`Command`]; dispatch
//! against live compositor state happens through the [`CommandSink`] trait
//! so this module stays testable without a running desktop.

/// A parsed keybind command. `Exec`'s payload is the remainder of the
/// string verbatim (including internal whitespace) — it is handed to `sh
/// -c` unmodified, matching the original's "skip past the verb and one
/// space" behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exec(String),
    Exit,
    Kill,
    /// Not in the original taxonomy: reload `config.json` in place.
    Reload,
    /// Not in the original taxonomy: switch to virtual terminal `n`.
    Vt(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("exec requires an argument")]
    ExecMissingArgument,
    #[error("vt requires a numeric argument")]
    VtMissingArgument,
    #[error("unknown command verb {0:?}")]
    UnknownVerb(String),
}

/// Parse a keybind command string. The first whitespace-delimited token is
/// the verb; `exec`'s argument is everything after the first space,
/// unparsed (so an `exec` command can itself contain spaces and further
/// flags).
pub fn parse(command: &str) -> Result<Command, CommandParseError> {
    let command = command.trim();
    let verb_end = command.find(char::is_whitespace).unwrap_or(command.len());
    let verb = &command[..verb_end];
    if verb.is_empty() {
        return Err(CommandParseError::Empty);
    }
    let rest = command[verb_end..].trim_start();

    match verb {
        "exec" => {
            if rest.is_empty() {
                Err(CommandParseError::ExecMissingArgument)
            } else {
                Ok(Command::Exec(rest.to_string()))
            }
        }
        "exit" => Ok(Command::Exit),
        "kill" => Ok(Command::Kill),
        "reload" => Ok(Command::Reload),
        "vt" => rest
            .parse::<u32>()
            .map(Command::Vt)
            .map_err(|_| CommandParseError::VtMissingArgument),
        other => Err(CommandParseError::UnknownVerb(other.to_string())),
    }
}

/// Compositor-side effects a parsed command can trigger. Implemented by the
/// root compositor state; kept as a trait so command dispatch can be
/// exercised in isolation.
pub trait CommandSink {
    fn exec(&mut self, command: &str);
    fn exit(&mut self);
    fn kill_focused(&mut self);
    fn reload_config(&mut self);
    fn switch_vt(&mut self, vt: u32);
}

/// Parse and dispatch a command string in one step. An unparseable command
/// is logged and otherwise ignored (§4.7: "Unknown verbs are logged as
/// errors and ignored").
pub fn run(command: &str, sink: &mut impl CommandSink) {
    match parse(command) {
        Ok(Command::Exec(arg)) => sink.exec(&arg),
        Ok(Command::Exit) => sink.exit(),
        Ok(Command::Kill) => sink.kill_focused(),
        Ok(Command::Reload) => sink.reload_config(),
        Ok(Command::Vt(n)) => sink.switch_vt(n),
        Err(err) => tracing::error!("invalid keybind command {:?}: {err}", command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        calls: Vec<String>,
    }

    impl CommandSink for RecordingSink {
        fn exec(&mut self, command: &str) {
            self.calls.push(format!("exec:{command}"));
        }
        fn exit(&mut self) {
            self.calls.push("exit".to_string());
        }
        fn kill_focused(&mut self) {
            self.calls.push("kill".to_string());
        }
        fn reload_config(&mut self) {
            self.calls.push("reload".to_string());
        }
        fn switch_vt(&mut self, vt: u32) {
            self.calls.push(format!("vt:{vt}"));
        }
    }

    #[test]
    fn parses_exec_with_trailing_arguments() {
        assert_eq!(
            parse("exec alacritty -e tmux").unwrap(),
            Command::Exec("alacritty -e tmux".to_string())
        );
    }

    #[test]
    fn exec_without_argument_errors() {
        assert_eq!(parse("exec").unwrap_err(), CommandParseError::ExecMissingArgument);
        assert_eq!(parse("exec   ").unwrap_err(), CommandParseError::ExecMissingArgument);
    }

    #[test]
    fn parses_bare_verbs() {
        assert_eq!(parse("exit").unwrap(), Command::Exit);
        assert_eq!(parse("kill").unwrap(), Command::Kill);
        assert_eq!(parse("reload").unwrap(), Command::Reload);
    }

    #[test]
    fn parses_vt_with_numeric_argument() {
        assert_eq!(parse("vt 2").unwrap(), Command::Vt(2));
        assert!(parse("vt").is_err());
        assert!(parse("vt abc").is_err());
    }

    #[test]
    fn unknown_verb_is_rejected() {
        assert!(matches!(
            parse("frobnicate"),
            Err(CommandParseError::UnknownVerb(_))
        ));
    }

    #[test]
    fn run_dispatches_to_sink() {
        let mut sink = RecordingSink::default();
        run("exec foo", &mut sink);
        run("kill", &mut sink);
        run("bogus", &mut sink);
        assert_eq!(sink.calls, vec!["exec:foo".to_string(), "kill".to_string()]);
    }
}
