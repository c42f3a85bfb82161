//! Text decoration and the help pager.

use std::env;
use std::io::{self, IsTerminal, Write};
use std::process::{Command, Stdio};

use owo_colors::OwoColorize;

const DEFAULT_PAGER: &str = "less";
const DEFAULT_PAGER_ARGS: [&str; 1] = ["-R"];

/// Whether help text is decorated with bold and underline escapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    decorate: bool,
}

impl Style {
    pub const PLAIN: Style = Style { decorate: false };

    pub const TERMINAL: Style = Style { decorate: true };

    pub fn bold(&self, text: &str) -> String {
        if self.decorate {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    pub fn underline(&self, text: &str) -> String {
        if self.decorate {
            text.underline().to_string()
        } else {
            text.to_string()
        }
    }
}

/// `$PAGER` split on whitespace, else `less -R`.
fn pager_command() -> (String, Vec<String>) {
    if let Some(pager) = env::var("PAGER").ok().filter(|p| !p.trim().is_empty()) {
        let mut words = pager.split_whitespace().map(str::to_string);
        if let Some(program) = words.next() {
            return (program, words.collect());
        }
    }
    (
        DEFAULT_PAGER.to_string(),
        DEFAULT_PAGER_ARGS.iter().map(|a| a.to_string()).collect(),
    )
}

/// A pager is only used on an interactive, non-Windows stdout with the
/// program on `PATH`.
pub fn terminal_pager_available() -> bool {
    if cfg!(windows) || !io::stdout().is_terminal() {
        return false;
    }
    let (program, _) = pager_command();
    which::which(&program).is_ok()
}

/// Pipe `text` through the pager and wait for it to exit.
pub fn page_with_less(text: &str) -> io::Result<()> {
    let (program, args) = pager_command();
    tracing::debug!(%program, "starting pager");
    let mut child = Command::new(&program)
        .args(&args)
        .stdin(Stdio::piped())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        // The user may quit before reading everything.
        match stdin.write_all(text.as_bytes()) {
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {}
            other => other?,
        }
    }
    child.wait()?;
    Ok(())
}

pub fn print_plain(text: &str) -> io::Result<()> {
    let mut out = io::stdout().lock();
    out.write_all(text.as_bytes())?;
    out.flush()
}
