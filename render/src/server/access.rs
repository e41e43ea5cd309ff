//! Access logging for the web server.
//!
//! Events go to a dedicated `tracing` target so they can be filtered or
//! formatted separately from diagnostics.

use tracing::{info, warn};

const ACCESS_TARGET: &str = "sightline::access";

/// Log one served request.
pub fn http_request(path: &str, status: u16) {
    if status >= 500 {
        warn!(
            target: ACCESS_TARGET,
            event = "http_request",
            path = %path,
            status = %status,
        );
    } else {
        info!(
            target: ACCESS_TARGET,
            event = "http_request",
            path = %path,
            status = %status,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_target_is_static() {
        assert_eq!(ACCESS_TARGET, "sightline::access");
    }
}
