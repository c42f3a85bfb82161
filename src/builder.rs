//! Command line → parse outcome.
//!
//! The grammar has three levels, each its own clap `Command`, built only
//! when the command line reaches it:
//!
//! ```text
//! svccli [options] <service> <operation> [--param value ...]
//! ```
//!
//! The top level knows the global options and the service names. The service
//! level loads that one service and knows its operation names. The operation
//! level compiles that one operation and registers one flag per parameter.
//! `help` at any level ends parsing with a help request instead.

use std::ffi::{OsStr, OsString};
use std::iter;

use clap::builder::{PossibleValuesParser, TypedValueParser};
use clap::error::ErrorKind;
use clap::{Arg, ArgAction, ArgMatches, Command};
use indexmap::IndexMap;
use serde_json::Value;

use crate::catalog::ServiceCatalog;
use crate::encoder::{coerce_item, RawValue};
use crate::error::{CliError, SchemaError, SdkError, UsageError};
use crate::schema::{OperationParameter, OperationSchema, PrimitiveType, Shape};
use crate::sdk::{ApiSdk, SessionOptions};

pub const PROGRAM: &str = "svccli";

/// The pseudo-choice accepted at every level.
pub const HELP: &str = "help";

pub const USAGE: &str = "svccli [options] <service> <operation> [parameters]

To see help text, you can run:

  svccli help
  svccli <service> help
  svccli <service> <operation> help";

const CHOICES_PER_LINE: usize = 2;
const SUGGESTION_CUTOFF: f64 = 0.8;
const MAX_SUGGESTIONS: usize = 3;

/// Which closed set a global option draws its values from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagChoices {
    Free,
    Endpoints,
    Residencies,
}

/// A global option as documented in tool help.
#[derive(Debug, Clone, Copy)]
pub struct GlobalFlag {
    pub name: &'static str,
    pub display_type: &'static str,
    pub description: &'static str,
    pub choices: FlagChoices,
}

pub const GLOBAL_FLAGS: [GlobalFlag; 8] = [
    GlobalFlag {
        name: "debug",
        display_type: "boolean",
        description: "Turn on debug logging.",
        choices: FlagChoices::Free,
    },
    GlobalFlag {
        name: "query",
        display_type: "string",
        description: "A JMESPath query to use in filtering the response data.",
        choices: FlagChoices::Free,
    },
    GlobalFlag {
        name: "endpoint",
        display_type: "string",
        description: "Use a specific backend.",
        choices: FlagChoices::Endpoints,
    },
    GlobalFlag {
        name: "residency",
        display_type: "string",
        description: "Use a specific data residency.",
        choices: FlagChoices::Residencies,
    },
    GlobalFlag {
        name: "profile",
        display_type: "string",
        description: "Use a specific profile from your configuration file.",
        choices: FlagChoices::Free,
    },
    GlobalFlag {
        name: "access_key_id",
        display_type: "string",
        description: "Access key id to authenticate with.",
        choices: FlagChoices::Free,
    },
    GlobalFlag {
        name: "secret_key",
        display_type: "string",
        description: "Secret key to authenticate with.",
        choices: FlagChoices::Free,
    },
    GlobalFlag {
        name: "version",
        display_type: "string",
        description: "Display the version of svccli.",
        choices: FlagChoices::Free,
    },
];

/// Global options given before the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalOptions {
    pub session: SessionOptions,
    pub query: Option<String>,
    pub debug: bool,
}

impl GlobalOptions {
    fn from_matches(matches: &ArgMatches) -> Self {
        let text = |id: &str| matches.get_one::<String>(id).cloned();
        Self {
            session: SessionOptions {
                access_key_id: text("access_key_id"),
                secret_key: text("secret_key"),
                profile: text("profile"),
                residency: text("residency"),
                endpoint: text("endpoint"),
            },
            query: text("query"),
            debug: matches.get_flag("debug"),
        }
    }
}

/// A fully parsed command line that names an operation to call.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedInvocation {
    pub service: String,
    pub operation: String,
    /// Supplied flags only, in parameter declaration order.
    pub flags: IndexMap<String, RawValue>,
    pub globals: GlobalOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub invocation: ParsedInvocation,
    pub operation: OperationSchema,
}

/// Which help page was asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum HelpTarget {
    /// No service given.
    Usage,
    /// `svccli help`
    Tool,
    /// `svccli <service> help`
    Service(String),
    /// `svccli <service> <operation> ... help ...`
    Operation {
        service: String,
        operation: Box<OperationSchema>,
    },
}

#[derive(Debug)]
pub enum ParseOutcome {
    Dispatch(Box<Dispatch>),
    Help(HelpTarget),
    Usage(UsageError),
}

/// Run the three-level grammar over `args` (program name first).
///
/// Usage errors are returned as [`ParseOutcome::Usage`]. `Err` is reserved
/// for failures to load a service or compile an operation.
pub fn parse<I, T>(
    sdk: &dyn ApiSdk,
    catalog: &mut ServiceCatalog,
    args: I,
) -> Result<ParseOutcome, CliError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = match top_level_command(sdk, catalog).try_get_matches_from(args) {
        Ok(matches) => matches,
        Err(err) => return Ok(ParseOutcome::Usage(err.into())),
    };
    let globals = GlobalOptions::from_matches(&matches);

    let Some(service) = matches.get_one::<String>("service").cloned() else {
        return Ok(ParseOutcome::Help(HelpTarget::Usage));
    };
    if service == HELP {
        return Ok(ParseOutcome::Help(HelpTarget::Tool));
    }
    tracing::debug!(%service, "service selected");

    let descriptor = catalog
        .service_mut(&service)
        .ok_or_else(|| SdkError::UnknownService {
            name: service.clone(),
        })?;
    let operation_names = descriptor.operation_names(sdk)?;

    let service_args = iter::once(service.clone()).chain(remaining(&matches));
    let matches = match service_command(&service, &operation_names).try_get_matches_from(service_args) {
        Ok(matches) => matches,
        Err(err) => return Ok(ParseOutcome::Usage(err.into())),
    };
    let Some(operation_name) = matches.get_one::<String>("operation").cloned() else {
        return Ok(ParseOutcome::Help(HelpTarget::Service(service)));
    };
    if operation_name == HELP {
        return Ok(ParseOutcome::Help(HelpTarget::Service(service)));
    }
    tracing::debug!(operation = %operation_name, "operation selected");

    let operation = match descriptor.operation(sdk, &operation_name)? {
        Some(compiled) => compiled?,
        None => {
            return Err(SchemaError::Operation {
                operation: operation_name,
                reason: format!("not defined by service {service}"),
            }
            .into())
        }
    };

    let operation_args: Vec<String> = remaining(&matches).collect();
    if operation_args.iter().any(|arg| arg == HELP) {
        return Ok(ParseOutcome::Help(HelpTarget::Operation {
            service,
            operation: Box::new(operation),
        }));
    }

    let command = operation_command(&service, &operation);
    let matches = match command.try_get_matches_from(iter::once(operation_name.clone()).chain(operation_args)) {
        Ok(matches) => matches,
        Err(err) => return Ok(ParseOutcome::Usage(err.into())),
    };
    let flags = collect_flags(&operation, &matches);

    Ok(ParseOutcome::Dispatch(Box::new(Dispatch {
        invocation: ParsedInvocation {
            service,
            operation: operation_name,
            flags,
            globals,
        },
        operation,
    })))
}

fn remaining(matches: &ArgMatches) -> impl Iterator<Item = String> + '_ {
    matches
        .get_many::<String>("remaining")
        .into_iter()
        .flatten()
        .cloned()
}

/// Everything after the positional is handed to the next level untouched.
fn remaining_arg() -> Arg {
    Arg::new("remaining")
        .num_args(1..)
        .trailing_var_arg(true)
        .allow_hyphen_values(true)
        .hide(true)
}

fn base_command(name: impl Into<String>) -> Command {
    Command::new(name.into())
        .bin_name(PROGRAM)
        .override_usage(USAGE)
        .disable_help_flag(true)
}

fn with_help_choice<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    names
        .into_iter()
        .map(str::to_string)
        .chain(iter::once(HELP.to_string()))
        .collect()
}

/// Without an SDK the enumerated options take any value.
fn with_global_flags(mut command: Command, sdk: Option<&dyn ApiSdk>) -> Command {
    for flag in GLOBAL_FLAGS.iter().filter(|f| f.name != "version") {
        let mut arg = Arg::new(flag.name).long(flag.name).help(flag.description);
        arg = match (flag.choices, sdk) {
            _ if flag.display_type == "boolean" => arg.action(ArgAction::SetTrue),
            (FlagChoices::Endpoints, Some(sdk)) => {
                arg.value_parser(PossibleValuesParser::new(sdk.endpoints()))
            }
            (FlagChoices::Residencies, Some(sdk)) => {
                arg.value_parser(PossibleValuesParser::new(sdk.residencies()))
            }
            _ => arg.action(ArgAction::Set),
        };
        command = command.arg(arg);
    }
    command
}

fn top_level_command(sdk: &dyn ApiSdk, catalog: &ServiceCatalog) -> Command {
    with_global_flags(base_command(PROGRAM).version(env!("CARGO_PKG_VERSION")), Some(sdk))
        .arg(Arg::new("service").value_parser(ChoiceParser::new(with_help_choice(catalog.names()))))
        .arg(remaining_arg())
}

/// Read the global options before any API document is loaded.
///
/// Uses the same grammar as [`parse`], so an option counts only when it comes
/// before the service. Malformed input is skipped rather than reported;
/// [`parse`] reports it later.
pub fn scan_globals<I, T>(args: I) -> GlobalOptions
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    with_global_flags(base_command(PROGRAM), None)
        .arg(Arg::new("service"))
        .arg(remaining_arg())
        .ignore_errors(true)
        .try_get_matches_from(args)
        .map(|matches| GlobalOptions::from_matches(&matches))
        .unwrap_or_default()
}

fn service_command(service: &str, operation_names: &[String]) -> Command {
    let choices = with_help_choice(operation_names.iter().map(String::as_str));
    base_command(service)
        .arg(Arg::new("operation").value_parser(ChoiceParser::new(choices)))
        .arg(remaining_arg())
}

/// How a parameter is taken on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagStyle {
    Toggle,
    Items(PrimitiveType),
    Single,
}

fn flag_style(param: &OperationParameter) -> FlagStyle {
    let Some(schema) = param.schema() else {
        return FlagStyle::Single;
    };
    match &schema.shape {
        Shape::Primitive(PrimitiveType::Boolean) => FlagStyle::Toggle,
        Shape::Array { items: Some(items) } => match items.primitive_type() {
            Some(kind) => FlagStyle::Items(kind),
            None => FlagStyle::Single,
        },
        _ => FlagStyle::Single,
    }
}

fn operation_command(service: &str, operation: &OperationSchema) -> Command {
    let mut command = base_command(operation.name.clone())
        .bin_name(format!("{PROGRAM} {service} {}", operation.name));

    for param in operation.parameters.values() {
        let arg = Arg::new(param.name.clone()).long(param.name.clone());
        let arg = match flag_style(param) {
            FlagStyle::Toggle => arg.action(ArgAction::SetTrue),
            FlagStyle::Items(kind) => arg
                .num_args(1..)
                .action(ArgAction::Append)
                .allow_negative_numbers(true)
                .value_parser(ItemParser(kind))
                .required(param.required),
            FlagStyle::Single => arg
                .action(ArgAction::Set)
                .value_name("value")
                .allow_hyphen_values(true)
                .required(param.required),
        };
        command = command.arg(arg);
    }

    command
}

fn collect_flags(operation: &OperationSchema, matches: &ArgMatches) -> IndexMap<String, RawValue> {
    let mut flags = IndexMap::new();
    for param in operation.parameters.values() {
        let id = param.name.as_str();
        let raw = match flag_style(param) {
            FlagStyle::Toggle => matches.get_flag(id).then_some(RawValue::Switch(true)),
            FlagStyle::Items(_) => matches
                .get_many::<Value>(id)
                .map(|values| RawValue::Items(values.cloned().collect())),
            FlagStyle::Single => matches
                .get_one::<String>(id)
                .map(|value| RawValue::Text(value.clone())),
        };
        if let Some(raw) = raw {
            flags.insert(param.name.clone(), raw);
        }
    }
    flags
}

/// Positional selector that reports invalid values with the full choice grid
/// and near matches.
#[derive(Debug, Clone)]
struct ChoiceParser {
    choices: Vec<String>,
}

impl ChoiceParser {
    fn new(choices: Vec<String>) -> Self {
        Self { choices }
    }
}

impl TypedValueParser for ChoiceParser {
    type Value = String;

    fn parse_ref(
        &self,
        cmd: &Command,
        _arg: Option<&Arg>,
        value: &OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let value = value
            .to_str()
            .ok_or_else(|| clap::Error::new(ErrorKind::InvalidUtf8).with_cmd(cmd))?;
        if self.choices.iter().any(|choice| choice == value) {
            return Ok(value.to_string());
        }
        Err(clap::Error::raw(
            ErrorKind::InvalidValue,
            format!("{}\n", invalid_choice_message(value, &self.choices)),
        )
        .with_cmd(cmd))
    }
}

/// List items coerced to their primitive type. `file://` references pass
/// through as text for the encoder to substitute.
#[derive(Debug, Clone, Copy)]
struct ItemParser(PrimitiveType);

impl TypedValueParser for ItemParser {
    type Value = Value;

    fn parse_ref(&self, cmd: &Command, arg: Option<&Arg>, value: &OsStr) -> Result<Value, clap::Error> {
        let raw = value
            .to_str()
            .ok_or_else(|| clap::Error::new(ErrorKind::InvalidUtf8).with_cmd(cmd))?;
        parse_item(self.0, raw).ok_or_else(|| {
            let flag = arg.map(|a| a.get_id().to_string()).unwrap_or_default();
            clap::Error::raw(
                ErrorKind::ValueValidation,
                format!("invalid {} value {raw:?} for --{flag}\n", self.0.as_str()),
            )
            .with_cmd(cmd)
        })
    }
}

fn parse_item(kind: PrimitiveType, raw: &str) -> Option<Value> {
    if raw.starts_with("file://") {
        return Some(Value::String(raw.to_string()));
    }
    coerce_item(kind, raw)
}

/// Header, a two-per-line grid of every choice but `help`, then near
/// matches if there are any.
pub fn invalid_choice_message(value: &str, choices: &[String]) -> String {
    let listed: Vec<&str> = choices
        .iter()
        .map(String::as_str)
        .filter(|choice| *choice != HELP)
        .collect();

    let mut lines = vec!["Invalid choice, valid choices are:\n".to_string()];
    for row in listed.chunks(CHOICES_PER_LINE) {
        let cells: Vec<String> = row.iter().map(|choice| format!("{choice:<40}")).collect();
        lines.push(cells.join(" | "));
    }

    let possible = suggest(value, &listed);
    if !possible.is_empty() {
        lines.push(format!("\n\nInvalid choice: '{value}', maybe you meant:\n"));
        lines.extend(possible.into_iter().map(|word| format!("  * {word}")));
    }
    lines.join("\n")
}

/// Up to three choices scoring at least 0.8, best first.
pub fn suggest<'a>(value: &str, choices: &[&'a str]) -> Vec<&'a str> {
    let mut scored: Vec<(&str, f64)> = choices
        .iter()
        .map(|choice| (*choice, strsim::jaro_winkler(value, choice)))
        .filter(|(_, score)| *score >= SUGGESTION_CUTOFF)
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(choice, _)| choice)
        .collect()
}
