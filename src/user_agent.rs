//! Shared User-Agent string for provider and transport HTTP clients.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/hostfetch/hostfetch";

/// Default User-Agent for every outgoing request.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("hostfetch/{version} (+{PROJECT_UA_URL})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_version_and_url() {
        let ua = default_user_agent();
        assert!(ua.contains(PROJECT_UA_URL), "UA must contain project URL");
        assert_eq!(
            ua.strip_prefix("hostfetch/")
                .and_then(|s| s.split(' ').next()),
            Some(env!("CARGO_PKG_VERSION")),
            "UA must contain crate version: {ua}"
        );
    }
}
