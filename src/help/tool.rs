//! `svccli help`

use crate::builder::{FlagChoices, GLOBAL_FLAGS, PROGRAM};

use super::{description, footer, header, section, HelpPage, Lines, Style};

const TOOL_DESCRIPTION: &str = "A unified command line interface to services described \
by OpenAPI documents. Every operation of every service is available as \
`svccli <service> <operation>` with one option per operation parameter.";

pub struct ToolHelp {
    pub services: Vec<String>,
    pub endpoints: Vec<String>,
    pub residencies: Vec<String>,
    pub style: Style,
}

impl ToolHelp {
    fn synopsis(&self) -> Vec<String> {
        let s = &self.style;
        vec![
            s.bold("SYNOPSIS"),
            format!("\t  {PROGRAM} [options] <service> <operation> [parameters]"),
            String::new(),
            format!(
                "\tUse {} {} {} for information on a specific service.",
                s.underline(PROGRAM),
                s.underline("service"),
                s.underline("help"),
            ),
            String::new(),
        ]
    }

    fn options(&self) -> Vec<String> {
        let mut lines = vec![self.style.bold("OPTIONS")];
        for flag in GLOBAL_FLAGS {
            lines.push(format!(
                "\t{} ({})",
                self.style.bold(&format!("--{}", flag.name)),
                flag.display_type
            ));
            lines.push(String::new());
            lines.push(format!("\t{}", flag.description));
            lines.push(String::new());

            let choices = match flag.choices {
                FlagChoices::Free => continue,
                FlagChoices::Endpoints => &self.endpoints,
                FlagChoices::Residencies => &self.residencies,
            };
            for choice in choices {
                lines.push(format!("\to {choice}"));
            }
            lines.push(String::new());
        }
        lines
    }

    fn services(&self) -> Vec<String> {
        let mut lines = vec![self.style.bold("AVAILABLE SERVICES")];
        lines.extend(self.services.iter().map(|name| format!("\to {name}")));
        lines.push(String::new());
        lines
    }
}

impl HelpPage for ToolHelp {
    fn lines(&self) -> Lines<'_> {
        Box::new(
            section(move || Ok(header(PROGRAM, &self.style)))
                .chain(section(move || Ok(description(TOOL_DESCRIPTION, &self.style))))
                .chain(section(move || Ok(self.synopsis())))
                .chain(section(move || Ok(self.options())))
                .chain(section(move || Ok(self.services())))
                .chain(section(move || Ok(footer(PROGRAM)))),
        )
    }
}
