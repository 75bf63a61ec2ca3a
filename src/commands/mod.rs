//! Command-line command handlers.
//!
//! One-shot commands that talk to a running daemon (`--toggle`, `--reload`,
//! ...) live in [`control`]; the foreground day preview lives in [`preview`].

pub mod control;
pub mod preview;
