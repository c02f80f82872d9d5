//! Filesystem path constants.

/// Default config file path for the sync controller.
pub const DEFAULT_CONFIG: &str = "/etc/upsync/config.yaml";
