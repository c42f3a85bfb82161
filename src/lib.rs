//! Command-line client for OpenAPI-described services.
//!
//! Every service in the API directory becomes a subcommand and every
//! operation of a service a sub-subcommand, with one flag per operation
//! parameter. Nothing is written per operation: the parser, the value
//! encoding and the help pages are all derived from the operation schema
//! at run time, and only for the service and operation actually selected.
//!
//! # Usage
//!
//! ```no_run
//! use svccli::app::App;
//! use svccli::config::{Config, RuntimeConfig};
//! use svccli::sdk::OpenApiSdk;
//!
//! let config = Config::load().unwrap();
//! let sdk = OpenApiSdk::new(config.api_dir().unwrap(), config).unwrap();
//! let app = App::new(&sdk, RuntimeConfig::detect(false));
//!
//! let code = app.run(
//!     ["svccli", "users", "get_user", "--id", "42"],
//!     &mut std::io::stdout(),
//!     &mut std::io::stderr(),
//! );
//! std::process::exit(code);
//! ```

pub mod app;
pub mod builder;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod encoder;
pub mod error;
pub mod help;
pub mod output;
pub mod resolver;
pub mod schema;
pub mod sdk;

pub use app::App;
pub use builder::{parse, ParseOutcome};
pub use error::CliError;
pub use resolver::resolve_display_type;
pub use schema::{OperationSchema, ParameterSchema};
pub use sdk::ApiSdk;

// Re-export dependencies for downstream crates
pub use clap;
pub use reqwest;
