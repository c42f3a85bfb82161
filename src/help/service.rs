//! `svccli <service> help`

use super::{description, footer, header, section, HelpPage, Lines, Style};

pub struct ServiceHelp {
    pub name: String,
    pub description: String,
    pub operations: Vec<String>,
    pub style: Style,
}

impl ServiceHelp {
    fn commands(&self) -> Vec<String> {
        let mut names: Vec<&str> = self.operations.iter().map(String::as_str).collect();
        names.sort_unstable();

        let mut lines = vec![self.style.bold("AVAILABLE COMMANDS")];
        lines.extend(names.into_iter().map(|name| format!("\to {name}")));
        lines.push(String::new());
        lines
    }
}

impl HelpPage for ServiceHelp {
    fn lines(&self) -> Lines<'_> {
        Box::new(
            section(move || Ok(header(&self.name, &self.style)))
                .chain(section(move || Ok(description(&self.description, &self.style))))
                .chain(section(move || Ok(self.commands())))
                .chain(section(move || Ok(footer(&self.name)))),
        )
    }
}
