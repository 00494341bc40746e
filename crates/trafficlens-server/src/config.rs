/// Re-export `Config` from `trafficlens-core` for use within this crate.
///
/// Environment parsing lives in `trafficlens-core` so integration tests can
/// build a config without the server.
pub use trafficlens_core::config::Config;
