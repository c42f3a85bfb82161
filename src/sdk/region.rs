//! Endpoint and residency selectors and server selection.

use crate::schema::Server;

pub const ENDPOINTS: [&str; 2] = ["production", "integration"];
pub const RESIDENCIES: [&str; 3] = ["default", "us", "emea"];

pub const DEFAULT_ENDPOINT: &str = "production";
pub const DEFAULT_RESIDENCY: &str = "default";

/// Pick the server for an endpoint/residency pair.
///
/// A server qualifies when each of its tags is absent or equal to the
/// requested selector. Among qualifying servers the one with the most
/// matching tags wins; ties go to the earliest declared.
pub fn select_server<'a>(servers: &'a [Server], endpoint: &str, residency: &str) -> Option<&'a Server> {
    let matches = |tag: &Option<String>, wanted: &str| tag.as_deref().map_or(true, |t| t == wanted);

    servers
        .iter()
        .filter(|s| matches(&s.endpoint, endpoint) && matches(&s.residency, residency))
        // max_by_key keeps the last maximum
        .rev()
        .max_by_key(|s| usize::from(s.endpoint.is_some()) + usize::from(s.residency.is_some()))
}
