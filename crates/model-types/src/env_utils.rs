//! Environment variable parsing for configuration overrides.
//!
//! ```
//! use model_builder_types::env_utils::{env_bool_or, env_var, env_var_or};
//!
//! let rounds: Option<usize> = env_var("MODEL_BUILDER_MAX_ROUNDS");
//! let threads: usize = env_var_or("MODEL_BUILDER_THREADS", 4);
//! let parallel = env_bool_or("MODEL_BUILDER_PARALLEL", false);
//! # let _ = (rounds, threads, parallel);
//! ```

use std::str::FromStr;

/// Parse `key` into `T`. `None` when unset or unparsable.
pub fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Parse `key` into `T`, falling back to `default`.
pub fn env_var_or<T: FromStr>(key: &str, default: T) -> T {
    env_var(key).unwrap_or(default)
}

/// Interpret `key` as a boolean flag.
///
/// "1", "true", "yes" and "on" (any case) are true, anything else that is set
/// is false, and an unset variable yields `default`.
pub fn env_bool_or(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => is_truthy(&v),
        Err(_) => default,
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
