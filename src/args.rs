//! Command-line argument parsing and processing.
//!
//! The binary either runs the daemon or performs one command against a
//! running daemon. Parsing never fails hard: malformed input is reported and
//! turned into [`CliAction::ShowHelpDueToError`].

use std::path::PathBuf;

use crate::commands::preview::PreviewRequest;
use crate::logger::Log;
use crate::signals::ControlCommand;
use crate::utils::parse_duration;

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the daemon
    Run {
        debug_enabled: bool,
        config_path: Option<PathBuf>,
    },
    /// Send a command to the running daemon
    Control {
        debug_enabled: bool,
        command: ControlCommand,
    },
    /// Preview through the daemon, or in the foreground when none is running
    Preview {
        debug_enabled: bool,
        config_path: Option<PathBuf>,
        request: PreviewRequest,
    },
    /// Ask the running daemon to re-read its configuration
    Reload {
        debug_enabled: bool,
        config_path: Option<PathBuf>,
    },
    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to unknown or malformed arguments and exit
    ShowHelpDueToError,
}

/// One-shot commands; at most one may be given.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Control(ControlCommand),
    Preview(PreviewRequest),
    Reload,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse command-line arguments, the first of which is the program name.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut debug_enabled = false;
        let mut display_help = false;
        let mut display_version = false;
        let mut config_path: Option<PathBuf> = None;
        let mut command: Option<Command> = None;
        let mut error_found = false;

        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut i = 0;
        while i < args_vec.len() {
            let arg_str = args_vec[i].as_str();

            // Flags taking a value consume the next argument
            let mut value = || {
                let next = args_vec.get(i + 1).map(String::as_str);
                if next.is_some() {
                    i += 1;
                } else {
                    Log::log_warning(&format!("Missing value for {}", arg_str));
                }
                next
            };

            let parsed = match arg_str {
                "--help" | "-h" => {
                    display_help = true;
                    None
                }
                "--version" | "-V" | "-v" => {
                    display_version = true;
                    None
                }
                "--debug" | "-d" => {
                    debug_enabled = true;
                    None
                }
                "--config" | "-c" => {
                    match value() {
                        Some(path) => config_path = Some(PathBuf::from(path)),
                        None => error_found = true,
                    }
                    None
                }
                "--toggle" => Some(Command::Control(ControlCommand::Toggle)),
                "--enable" => Some(Command::Control(ControlCommand::Enable)),
                "--disable" => Some(Command::Control(ControlCommand::Disable)),
                "--disable-for" => match value().map(parse_duration) {
                    Some(Ok(duration)) if duration.is_zero() => {
                        Log::log_warning("Disable duration must be greater than zero");
                        error_found = true;
                        None
                    }
                    Some(Ok(duration)) => {
                        Some(Command::Control(ControlCommand::DisableFor(duration)))
                    }
                    Some(Err(e)) => {
                        Log::log_warning(&e.to_string());
                        error_found = true;
                        None
                    }
                    None => {
                        error_found = true;
                        None
                    }
                },
                "--preview" | "-p" => Some(Command::Preview(PreviewRequest::Cycle)),
                "--preview-temp" => match value() {
                    Some(raw) => match raw.trim_end_matches(['K', 'k']).parse::<u32>() {
                        Ok(kelvin) => Some(Command::Preview(PreviewRequest::Temperature(kelvin))),
                        Err(_) => {
                            Log::log_warning(&format!("Invalid temperature value: {}", raw));
                            error_found = true;
                            None
                        }
                    },
                    None => {
                        error_found = true;
                        None
                    }
                },
                "--stop-preview" => Some(Command::Control(ControlCommand::StopPreview)),
                "--reload" | "-r" => Some(Command::Reload),
                other => {
                    if other.starts_with('-') {
                        Log::log_warning(&format!("Unknown option: {}", other));
                    } else {
                        Log::log_warning(&format!("Unexpected argument: {}", other));
                    }
                    error_found = true;
                    None
                }
            };

            if let Some(parsed) = parsed {
                if command.is_some() {
                    Log::log_warning("Only one command can be given at a time");
                    error_found = true;
                }
                command = Some(parsed);
            }
            i += 1;
        }

        let action = if display_version {
            CliAction::ShowVersion
        } else if error_found {
            CliAction::ShowHelpDueToError
        } else if display_help {
            CliAction::ShowHelp
        } else {
            match command {
                None => CliAction::Run {
                    debug_enabled,
                    config_path,
                },
                Some(Command::Control(command)) => CliAction::Control {
                    debug_enabled,
                    command,
                },
                Some(Command::Preview(request)) => CliAction::Preview {
                    debug_enabled,
                    config_path,
                    request,
                },
                Some(Command::Reload) => CliAction::Reload {
                    debug_enabled,
                    config_path,
                },
            }
        };

        ParsedArgs { action }
    }

    /// Convenience method to parse from std::env::args()
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    Log::log_version();
    Log::log_pipe();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    Log::log_version();
    Log::log_block_start(env!("CARGO_PKG_DESCRIPTION"));
    Log::log_block_start("Usage: lightcycle [OPTIONS] [COMMAND]");
    Log::log_block_start("Options:");
    Log::log_indented("-c, --config <path>       Use this configuration file");
    Log::log_indented("-d, --debug               Enable detailed debug output");
    Log::log_indented("-h, --help                Print help information");
    Log::log_indented("-V, --version             Print version information");
    Log::log_block_start("Commands (sent to the running instance):");
    Log::log_indented("    --toggle              Toggle colour adjustment on or off");
    Log::log_indented("    --enable              Turn colour adjustment on");
    Log::log_indented("    --disable             Turn colour adjustment off");
    Log::log_indented("    --disable-for <dur>   Turn off for a while, e.g. 30m or 2h");
    Log::log_indented("-p, --preview             Sweep a full day in a few seconds");
    Log::log_indented("    --preview-temp <K>    Show a fixed temperature until stopped");
    Log::log_indented("    --stop-preview        End a running preview");
    Log::log_indented("-r, --reload              Reload the configuration file");
    Log::log_end();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn parse(args: &[&str]) -> CliAction {
        let mut full = vec!["lightcycle"];
        full.extend_from_slice(args);
        ParsedArgs::parse(full).action
    }

    #[test]
    fn test_parse_no_args() {
        assert_eq!(
            parse(&[]),
            CliAction::Run {
                debug_enabled: false,
                config_path: None
            }
        );
    }

    #[test]
    fn test_parse_debug_and_config() {
        assert_eq!(
            parse(&["-d", "--config", "/tmp/lc.toml"]),
            CliAction::Run {
                debug_enabled: true,
                config_path: Some(PathBuf::from("/tmp/lc.toml"))
            }
        );
    }

    #[test]
    fn test_parse_help_and_version() {
        assert_eq!(parse(&["--help"]), CliAction::ShowHelp);
        assert_eq!(parse(&["-h"]), CliAction::ShowHelp);
        assert_eq!(parse(&["--version"]), CliAction::ShowVersion);
        assert_eq!(parse(&["-V"]), CliAction::ShowVersion);
        assert_eq!(parse(&["-v"]), CliAction::ShowVersion);
        // Version wins over everything
        assert_eq!(parse(&["--bogus", "--version"]), CliAction::ShowVersion);
    }

    #[test]
    fn test_parse_control_commands() {
        let cases = [
            ("--toggle", ControlCommand::Toggle),
            ("--enable", ControlCommand::Enable),
            ("--disable", ControlCommand::Disable),
            ("--stop-preview", ControlCommand::StopPreview),
        ];
        for (flag, command) in cases {
            assert_eq!(
                parse(&[flag]),
                CliAction::Control {
                    debug_enabled: false,
                    command
                }
            );
        }
    }

    #[test]
    fn test_parse_disable_for() {
        assert_eq!(
            parse(&["--disable-for", "30m"]),
            CliAction::Control {
                debug_enabled: false,
                command: ControlCommand::DisableFor(Duration::from_secs(1800))
            }
        );
        assert_eq!(parse(&["--disable-for", "soon"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["--disable-for"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_disable_for_zero_rejected() {
        assert_eq!(parse(&["--disable-for", "0"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["--disable-for", "0m"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["--disable-for", "0s", "-d"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_preview() {
        assert_eq!(
            parse(&["--preview"]),
            CliAction::Preview {
                debug_enabled: false,
                config_path: None,
                request: PreviewRequest::Cycle
            }
        );
        assert_eq!(
            parse(&["--preview-temp", "3000K"]),
            CliAction::Preview {
                debug_enabled: false,
                config_path: None,
                request: PreviewRequest::Temperature(3000)
            }
        );
        assert_eq!(parse(&["--preview-temp", "warm"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_reload() {
        assert_eq!(
            parse(&["-r", "-d"]),
            CliAction::Reload {
                debug_enabled: true,
                config_path: None
            }
        );
    }

    #[test]
    fn test_parse_rejects_multiple_commands() {
        assert_eq!(parse(&["--toggle", "--reload"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_unknown_arguments() {
        assert_eq!(parse(&["--unknown"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["stray"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["--help", "--unknown"]), CliAction::ShowHelpDueToError);
    }
}
