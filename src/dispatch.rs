//! Parsed invocation → SDK call → printable result
//!
//! Encodes the parsed flags against the operation schema, opens a session
//! from the global options, invokes the operation and formats what came
//! back.

use crate::builder::Dispatch;
use crate::encoder::encode_arguments;
use crate::error::CliError;
use crate::output::format_result;
use crate::sdk::ApiSdk;

/// Execute one parsed invocation and return the text to print.
pub fn dispatch(sdk: &dyn ApiSdk, dispatch: Dispatch) -> Result<String, CliError> {
    let Dispatch {
        invocation,
        operation,
    } = dispatch;

    let arguments = encode_arguments(&operation, invocation.flags)?;
    tracing::debug!(
        service = %invocation.service,
        operation = %invocation.operation,
        arguments = ?arguments.keys().collect::<Vec<_>>(),
        "encoded arguments"
    );

    let session = sdk.open_session(&invocation.globals.session)?;
    let result = sdk.invoke(&session, &invocation.service, &operation, &arguments)?;
    tracing::debug!(status = result.status, "operation returned");

    format_result(&result, invocation.globals.query.as_deref())
}
