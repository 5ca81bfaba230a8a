//! Skips wiremock tests where localhost sockets cannot be bound.
//!
//! Set `HOSTFETCH_REQUIRE_SOCKET_TESTS=1` in CI to turn a skip into a failure.
//! Integration tests load this same file through `tests/support/mod.rs`.

use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

const REQUIRE_SOCKETS_VAR: &str = "HOSTFETCH_REQUIRE_SOCKET_TESTS";

fn socket_tests_required() -> bool {
    std::env::var(REQUIRE_SOCKETS_VAR)
        .ok()
        .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

#[track_caller]
fn should_skip_socket_bound_test() -> bool {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return false;
    }

    let location = Location::caller();
    let message = format!(
        "[socket-bound-test] cannot bind localhost socket at {}:{}",
        location.file(),
        location.line()
    );
    assert!(
        !socket_tests_required(),
        "{message}. Unset {REQUIRE_SOCKETS_VAR} to allow skipping."
    );
    eprintln!("{message}. Skipping test.");
    true
}

/// Starts a mock server, or returns `None` (after logging) when sockets are unavailable.
#[track_caller]
pub fn start_mock_server_or_skip() -> impl std::future::Future<Output = Option<MockServer>> {
    let skip = should_skip_socket_bound_test();
    async move {
        if skip {
            None
        } else {
            Some(MockServer::start().await)
        }
    }
}
