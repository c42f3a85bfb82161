//! Error types for the svccli crate.
//!
//! Each layer owns its error enum; [`CliError`] is what reaches the single
//! top-level handler in [`crate::app`]. [`UsageError`] never converts into
//! it: usage errors are resolved inside the parser layer.

use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

/// A parameter schema node that matches none of the recognized shapes.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SchemaError {
    #[error("unsupported parameter type: {schema}")]
    Unsupported { schema: Value },

    #[error("unknown type {type_name:?}: {schema}")]
    UnknownType { type_name: String, schema: Value },

    #[error("schema declares both {first} and {second}: {schema}")]
    Conflicting {
        first: &'static str,
        second: &'static str,
        schema: Value,
    },

    #[error("operation {operation}: parameter --{parameter}")]
    Parameter {
        operation: String,
        parameter: String,
        #[source]
        source: Box<SchemaError>,
    },

    #[error("operation {operation}: response")]
    Response {
        operation: String,
        #[source]
        source: Box<SchemaError>,
    },

    #[error("operation {operation}: {reason}")]
    Operation { operation: String, reason: String },
}

/// Errors raised while turning raw flag values into typed arguments.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EncodingError {
    #[error("unknown parameter --{name}")]
    UnknownParameter { name: String },

    #[error("failed to read file reference: {path}")]
    FileReference {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid value for --{name}: not JSON ({json_error}) and {segment:?} is not a key=value pair")]
    InvalidObject {
        name: String,
        segment: String,
        #[source]
        json_error: serde_json::Error,
    },

    #[error("invalid {kind} value {value:?} for --{name}")]
    InvalidItem {
        name: String,
        kind: &'static str,
        value: String,
    },

    #[error("invalid JSON for --{name}")]
    InvalidJson {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Profile file and session resolution failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read config file: {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file: {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("profile {profile:?} is not defined")]
    UnknownProfile { profile: String },

    #[error("incomplete credentials: {missing} is not set")]
    IncompleteCredentials { missing: &'static str },

    #[error("cannot locate the home directory; set {var}")]
    NoHome { var: &'static str },
}

/// Failures owned by the API-client collaborator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SdkError {
    #[error("unknown service: {name}")]
    UnknownService { name: String },

    #[error("failed to list API documents in {}", path.display())]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read API document: {}", path.display())]
    DocumentRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid API document: {}", path.display())]
    DocumentParse {
        path: PathBuf,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("operation {operation} has no HTTP route")]
    NoRoute { operation: String },

    #[error("no server for endpoint {endpoint:?} and residency {residency:?}")]
    NoServer { endpoint: String, residency: String },

    #[error("unsupported HTTP method: {method}")]
    UnsupportedMethod { method: String },

    #[error("missing value for path parameter --{name}")]
    MissingPathParameter { name: String },

    #[error("invalid value for header parameter --{name}")]
    InvalidHeader { name: String },

    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("HTTP request failed")]
    RequestFailed(#[source] reqwest::Error),

    #[error("failed to read response body")]
    ResponseRead(#[source] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Authentication { status: u16, body: String },

    #[error("HTTP {status}: {body}")]
    Remote { status: u16, body: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A rejected command line. Stays inside the parser layer and is reported by
/// clap itself.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct UsageError(#[from] pub clap::Error);

impl UsageError {
    pub fn kind(&self) -> clap::error::ErrorKind {
        self.0.kind()
    }

    pub fn exit_code(&self) -> i32 {
        self.0.exit_code()
    }

    /// Print to stderr, or stdout for `--version`.
    pub fn print(&self) -> io::Result<()> {
        self.0.print()
    }
}

/// Errors that reach the top-level dispatch boundary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CliError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Sdk(#[from] SdkError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid query expression {expression:?}")]
    Query {
        expression: String,
        #[source]
        source: jmespath::JmespathError,
    },

    #[error("failed to format result")]
    Format(#[source] serde_json::Error),

    #[error("failed to display help")]
    Pager(#[source] io::Error),

    #[error("failed to write output")]
    Output(#[source] io::Error),
}

impl CliError {
    /// One-line message for the error stream.
    ///
    /// Access-denied failures are called out explicitly; everything else is
    /// the error followed by its causes.
    pub fn user_message(&self) -> String {
        match self {
            CliError::Sdk(SdkError::Authentication { .. }) => {
                format!("Access denied: {}", error_chain(self))
            }
            _ => format!("Error: {}", error_chain(self)),
        }
    }
}

/// Join an error and all of its sources with `": "`.
pub fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
