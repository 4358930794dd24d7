//! Environment variable key constants.
//!
//! Besides the observability knobs, a bootstrap run only reads the invoking
//! user set by `sudo`; everything else comes from its plan and CLI flags.

/// Observability and logging
pub mod observability {
    pub const ENVSTRAP_QUIET: &str = "ENVSTRAP_QUIET";
    pub const QUIET_ALIASES: &[&str] = &[];

    pub const ENVSTRAP_LOG_LEVEL: &str = "ENVSTRAP_LOG_LEVEL";
    pub const LOG_LEVEL_ALIASES: &[&str] = &[];

    pub const ENVSTRAP_LOG_JSON: &str = "ENVSTRAP_LOG_JSON";
    pub const LOG_JSON_ALIASES: &[&str] = &[];

    /// JSONL file that receives run/step audit records.
    pub const ENVSTRAP_AUDIT_LOG: &str = "ENVSTRAP_AUDIT_LOG";
    pub const AUDIT_LOG_ALIASES: &[&str] = &[];
}

/// Invocation context set by the host
pub mod host {
    /// Login name of the user who ran `sudo envstrap`.
    pub const SUDO_USER: &str = "SUDO_USER";
}
