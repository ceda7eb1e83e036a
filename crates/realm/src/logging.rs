//! Log output for binaries built on Realm.

use tracing_subscriber::EnvFilter;

/// Installs a global `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_directive` (for example
/// `"info"` or `"realm_area=debug,info"`) is used. Returns `false` if a
/// global subscriber was already installed, in which case nothing
/// changes.
pub fn init(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_keeps_first_subscriber() {
        init("warn");
        assert!(!init("debug"));
    }
}
