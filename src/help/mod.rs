//! Help pages for the tool, a service and a single operation.
//!
//! A page is a lazy sequence of lines. Each section is produced only when
//! the sequence reaches it, so a schema error in the options section still
//! lets the header through first. [`render_page`] collects a page into the
//! final text; showing it is the caller's business.

pub mod operation;
pub mod pager;
pub mod service;
pub mod tool;

use std::iter;

use crate::error::SchemaError;

pub use operation::OperationHelp;
pub use pager::Style;
pub use service::ServiceHelp;
pub use tool::ToolHelp;

/// Page width in columns.
pub const WIDTH: usize = 80;

/// Wrapped paragraphs leave room for the tab indent.
const TEXT_WIDTH: usize = WIDTH - 6;

pub type HelpLine = Result<String, SchemaError>;
pub type Lines<'a> = Box<dyn Iterator<Item = HelpLine> + 'a>;

pub trait HelpPage {
    fn lines(&self) -> Lines<'_>;
}

/// Collect a page into text, one line per row.
pub fn render_page(page: &dyn HelpPage) -> Result<String, SchemaError> {
    let mut text = String::new();
    for line in page.lines() {
        text.push_str(&line?);
        text.push('\n');
    }
    Ok(text)
}

/// A section built on first demand.
pub(crate) fn section<'a, F>(build: F) -> Lines<'a>
where
    F: FnOnce() -> Result<Vec<String>, SchemaError> + 'a,
{
    Box::new(iter::once_with(build).flat_map(|built| match built {
        Ok(lines) => lines.into_iter().map(Ok).collect::<Vec<_>>(),
        Err(err) => vec![Err(err)],
    }))
}

/// Wrap every line of `text` separately.
pub(crate) fn wrap_text(text: &str, initial_indent: &str, subsequent_indent: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            let options = textwrap::Options::new(TEXT_WIDTH)
                .initial_indent(initial_indent)
                .subsequent_indent(subsequent_indent);
            textwrap::fill(line, options)
        })
        .collect()
}

fn title(name: &str) -> String {
    format!("{}()", name.to_uppercase())
}

pub(crate) fn header(name: &str, style: &Style) -> Vec<String> {
    let title = title(name);
    let pad = WIDTH.saturating_sub(title.len());
    vec![
        format!("{title}{title:>pad$}"),
        String::new(),
        String::new(),
        style.bold("NAME"),
        format!("\t{name} - "),
        String::new(),
    ]
}

pub(crate) fn description(text: &str, style: &Style) -> Vec<String> {
    let mut lines = Vec::new();
    if text.is_empty() {
        lines.push(String::new());
    }
    lines.push(style.bold("DESCRIPTION"));
    lines.extend(wrap_text(text, "\t", "\t"));
    lines.push(String::new());
    lines
}

pub(crate) fn footer(name: &str) -> Vec<String> {
    let title = title(name);
    vec![format!("{title:>WIDTH$}")]
}
