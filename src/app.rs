//! Process driver: one command line in, one exit code out.

use std::ffi::OsString;
use std::io::Write;

use crate::builder::{self, HelpTarget, ParseOutcome, USAGE};
use crate::catalog::ServiceCatalog;
use crate::config::RuntimeConfig;
use crate::dispatch::dispatch;
use crate::error::{CliError, SdkError};
use crate::help::{render_page, HelpPage, OperationHelp, ServiceHelp, ToolHelp};
use crate::sdk::ApiSdk;

pub mod exit_codes {
    pub const EXIT_SUCCESS: i32 = 0;
    /// No service given, or the tool help was shown.
    pub const EXIT_USAGE: i32 = 128;
    /// Anything failed after parsing started.
    pub const EXIT_FAILURE: i32 = 255;
}

use exit_codes::{EXIT_FAILURE, EXIT_SUCCESS, EXIT_USAGE};

pub struct App<'a> {
    sdk: &'a dyn ApiSdk,
    runtime: RuntimeConfig,
}

impl<'a> App<'a> {
    pub fn new(sdk: &'a dyn ApiSdk, runtime: RuntimeConfig) -> Self {
        Self { sdk, runtime }
    }

    /// Run one command line (program name first) and return the exit code.
    ///
    /// Results go to `out`; the usage banner and error messages go to `err`.
    /// Clap reports its own usage errors.
    pub fn run<I, T, W, E>(&self, args: I, out: &mut W, err: &mut E) -> i32
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
        W: Write,
        E: Write,
    {
        match self.execute(args, out, err) {
            Ok(code) => code,
            Err(error) => {
                tracing::debug!(error = ?error, "command failed");
                if self.report(&error, err).is_err() {
                    tracing::warn!("failed to write error message");
                }
                EXIT_FAILURE
            }
        }
    }

    /// The one-line message, followed in debug mode by the full error value.
    fn report<E: Write>(&self, error: &CliError, err: &mut E) -> std::io::Result<()> {
        writeln!(err, "{}", error.user_message())?;
        if self.runtime.debug {
            writeln!(err, "{error:#?}")?;
        }
        Ok(())
    }

    fn execute<I, T, W, E>(&self, args: I, out: &mut W, err: &mut E) -> Result<i32, CliError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
        W: Write,
        E: Write,
    {
        let mut catalog = ServiceCatalog::from_sdk(self.sdk)?;

        match builder::parse(self.sdk, &mut catalog, args)? {
            ParseOutcome::Usage(usage) => {
                if let Err(error) = usage.print() {
                    tracing::warn!(%error, "failed to print usage error");
                }
                Ok(usage.exit_code())
            }
            ParseOutcome::Help(target) => self.help(target, &mut catalog, err),
            ParseOutcome::Dispatch(invocation) => {
                let text = dispatch(self.sdk, *invocation)?;
                writeln!(out, "{text}").map_err(CliError::Output)?;
                Ok(EXIT_SUCCESS)
            }
        }
    }

    fn help<E: Write>(
        &self,
        target: HelpTarget,
        catalog: &mut ServiceCatalog,
        err: &mut E,
    ) -> Result<i32, CliError> {
        let style = self.runtime.style;
        match target {
            HelpTarget::Usage => {
                writeln!(err, "usage: {USAGE}").map_err(CliError::Output)?;
                Ok(EXIT_USAGE)
            }
            HelpTarget::Tool => {
                self.show(&ToolHelp {
                    services: catalog.names().map(str::to_string).collect(),
                    endpoints: self.sdk.endpoints(),
                    residencies: self.sdk.residencies(),
                    style,
                })?;
                Ok(EXIT_USAGE)
            }
            HelpTarget::Service(name) => {
                let descriptor =
                    catalog
                        .service_mut(&name)
                        .ok_or_else(|| SdkError::UnknownService {
                            name: name.clone(),
                        })?;
                let description = descriptor.description(self.sdk)?.to_string();
                let operations = descriptor.operation_names(self.sdk)?;
                self.show(&ServiceHelp {
                    name,
                    description,
                    operations,
                    style,
                })?;
                Ok(EXIT_SUCCESS)
            }
            HelpTarget::Operation { operation, .. } => {
                self.show(&OperationHelp::new(&operation, style))?;
                Ok(EXIT_SUCCESS)
            }
        }
    }

    fn show(&self, page: &dyn HelpPage) -> Result<(), CliError> {
        let text = render_page(page)?;
        (self.runtime.pager)(&text).map_err(CliError::Pager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::fake::FakeSdk;
    use serde_json::json;
    use std::cell::RefCell;
    use std::io;

    thread_local! {
        static PAGED: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    fn capture(text: &str) -> io::Result<()> {
        PAGED.with(|paged| paged.borrow_mut().push(text.to_string()));
        Ok(())
    }

    fn paged() -> Vec<String> {
        PAGED.with(|paged| paged.borrow().clone())
    }

    fn runtime() -> RuntimeConfig {
        RuntimeConfig {
            pager: capture,
            ..RuntimeConfig::plain(false)
        }
    }

    fn sdk() -> FakeSdk {
        FakeSdk::new()
            .with_service(
                "users",
                "Manage users.",
                json!({
                    "get_user": {
                        "operationId": "get_user",
                        "description": "Fetch one user.",
                        "parameters": {"id": {"type": "string", "required": true}},
                        "response": {"type": "object", "properties": {"id": {"type": "string"}}}
                    },
                    "broken": {
                        "operationId": "broken",
                        "parameters": {"bad": {"description": "no shape"}}
                    }
                }),
            )
            .with_service("billing", "Invoices.", json!({}))
    }

    struct Run {
        code: i32,
        out: String,
        err: String,
    }

    fn run(sdk: &FakeSdk, args: &[&str]) -> Run {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let argv = std::iter::once("svccli").chain(args.iter().copied());
        let code = App::new(sdk, runtime()).run(argv, &mut out, &mut err);
        Run {
            code,
            out: String::from_utf8(out).unwrap(),
            err: String::from_utf8(err).unwrap(),
        }
    }

    #[test]
    fn no_service_prints_usage() {
        let sdk = sdk();
        let run = run(&sdk, &[]);
        assert_eq!(run.code, EXIT_USAGE);
        assert!(run.err.starts_with("usage: svccli [options] <service> <operation>"));
        assert_eq!(sdk.describe_count("users"), 0);
    }

    #[test]
    fn tool_help_exits_with_usage_code_without_loading_services() {
        let sdk = sdk();
        let run = run(&sdk, &["help"]);
        assert_eq!(run.code, EXIT_USAGE);
        let page = paged().pop().unwrap();
        assert!(page.contains("AVAILABLE SERVICES\n\to users\n\to billing\n"));
        assert_eq!(sdk.describe_count("users"), 0);
        assert_eq!(sdk.describe_count("billing"), 0);
    }

    #[test]
    fn service_help_loads_only_that_service_once() {
        let sdk = sdk();
        let run = run(&sdk, &["users", "help"]);
        assert_eq!(run.code, EXIT_SUCCESS);
        let page = paged().pop().unwrap();
        assert!(page.contains("AVAILABLE COMMANDS\n\to broken\n\to get_user\n"));
        assert_eq!(sdk.describe_count("users"), 1);
        assert_eq!(sdk.describe_count("billing"), 0);
    }

    #[test]
    fn operation_help_is_success() {
        let sdk = sdk();
        let run = run(&sdk, &["users", "get_user", "help"]);
        assert_eq!(run.code, EXIT_SUCCESS);
        let page = paged().pop().unwrap();
        assert!(page.contains("\t--id <value>\n"));
        assert!(sdk.calls().is_empty());
    }

    #[test]
    fn dispatch_prints_result() {
        let sdk = sdk().respond_with(200, r#"{"id": "u-1"}"#);
        let run = run(&sdk, &["users", "get_user", "--id", "u-1"]);
        assert_eq!(run.code, EXIT_SUCCESS);
        assert_eq!(run.out, "{\n    \"id\": \"u-1\"\n}\n");
        assert_eq!(sdk.calls().len(), 1);
    }

    #[test]
    fn remote_failure_exits_255_with_message() {
        let sdk = sdk().respond_with(401, "bad credentials");
        let run = run(&sdk, &["users", "get_user", "--id", "u-1"]);
        assert_eq!(run.code, EXIT_FAILURE);
        assert_eq!(run.err, "Access denied: HTTP 401: bad credentials\n");
    }

    #[test]
    fn debug_runtime_adds_error_detail() {
        let sdk = sdk().respond_with(500, "boom");
        let mut out = Vec::new();
        let mut err = Vec::new();
        let runtime = RuntimeConfig {
            debug: true,
            ..runtime()
        };
        let code = App::new(&sdk, runtime).run(
            ["svccli", "users", "get_user", "--id", "u-1"],
            &mut out,
            &mut err,
        );
        assert_eq!(code, EXIT_FAILURE);
        let err = String::from_utf8(err).unwrap();
        let (message, detail) = err.split_once('\n').unwrap();
        assert_eq!(message, "Error: HTTP 500: boom");
        assert!(detail.contains("Remote"), "got: {detail}");
        assert!(detail.contains("status: 500"), "got: {detail}");
    }

    #[test]
    fn schema_error_exits_255() {
        let sdk = sdk();
        let run = run(&sdk, &["users", "broken", "--bad", "x"]);
        assert_eq!(run.code, EXIT_FAILURE);
        assert!(run.err.starts_with("Error: operation broken: parameter --bad"));
    }

    #[test]
    fn missing_required_flag_is_a_usage_error() {
        let sdk = sdk();
        let run = run(&sdk, &["users", "get_user"]);
        assert_eq!(run.code, 2);
        assert!(sdk.calls().is_empty());
    }
}
