use std::env;
use std::ffi::OsString;
use std::io;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use svccli::app::exit_codes::EXIT_FAILURE;
use svccli::app::App;
use svccli::builder;
use svccli::config::{Config, RuntimeConfig};
use svccli::error::CliError;
use svccli::sdk::OpenApiSdk;

fn main() -> ExitCode {
    let args: Vec<OsString> = env::args_os().collect();
    let debug = builder::scan_globals(args.iter().cloned()).debug || env::var_os("DEBUG").is_some();
    init_tracing(debug);

    let code = match open_sdk() {
        Ok(sdk) => App::new(&sdk, RuntimeConfig::detect(debug)).run(
            args,
            &mut io::stdout(),
            &mut io::stderr(),
        ),
        Err(err) => {
            tracing::debug!(error = ?err, "startup failed");
            eprintln!("{}", err.user_message());
            EXIT_FAILURE
        }
    };
    ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX))
}

/// Logs go to stderr; `RUST_LOG` overrides the level picked from `--debug`.
fn init_tracing(debug: bool) {
    let level = if debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn open_sdk() -> Result<OpenApiSdk, CliError> {
    let config = Config::load()?;
    let api_dir = config.api_dir()?;
    tracing::debug!(api_dir = %api_dir.display(), "loading API documents");
    Ok(OpenApiSdk::new(api_dir, config)?)
}
