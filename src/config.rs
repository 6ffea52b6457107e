//! Resolution configuration.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `MODEL_BUILDER_PARALLEL` | `false` | run builders of one round concurrently (rayon) |
//! | `MODEL_BUILDER_MAX_ROUNDS` | unset | fail with `RoundLimitExceeded` past this many rounds |
//! | `MODEL_BUILDER_WARN_EMPTY` | `true` | warn when a builder returns nothing for a non-empty batch |

use model_builder_types::env_utils::{env_bool_or, env_var};

/// Environment variable enabling parallel builder execution.
pub const PARALLEL_ENV: &str = "MODEL_BUILDER_PARALLEL";
/// Environment variable bounding the number of rounds.
pub const MAX_ROUNDS_ENV: &str = "MODEL_BUILDER_MAX_ROUNDS";
/// Environment variable toggling the empty-builder diagnostic.
pub const WARN_EMPTY_ENV: &str = "MODEL_BUILDER_WARN_EMPTY";

/// Knobs for [`ModelBuilder::resolve`](crate::ModelBuilder::resolve).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveConfig {
    /// Run the builders of a round concurrently, grouped by target namespace.
    pub parallel_builders: bool,
    /// Upper bound on rounds per `resolve` call.
    pub max_rounds: Option<usize>,
    /// Log a warning when a builder returns nothing for a non-empty batch.
    pub warn_on_empty_builder: bool,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            parallel_builders: false,
            max_rounds: None,
            warn_on_empty_builder: true,
        }
    }
}

impl ResolveConfig {
    /// Defaults overridden by `MODEL_BUILDER_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            parallel_builders: env_bool_or(PARALLEL_ENV, defaults.parallel_builders),
            max_rounds: env_var::<usize>(MAX_ROUNDS_ENV).or(defaults.max_rounds),
            warn_on_empty_builder: env_bool_or(WARN_EMPTY_ENV, defaults.warn_on_empty_builder),
        }
    }

    pub fn with_parallel_builders(mut self, parallel: bool) -> Self {
        self.parallel_builders = parallel;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = Some(max_rounds);
        self
    }

    pub fn with_warn_on_empty_builder(mut self, warn: bool) -> Self {
        self.warn_on_empty_builder = warn;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResolveConfig::default();
        assert!(!config.parallel_builders);
        assert_eq!(config.max_rounds, None);
        assert!(config.warn_on_empty_builder);
    }

    #[test]
    fn test_from_env() {
        std::env::set_var(PARALLEL_ENV, "yes");
        std::env::set_var(MAX_ROUNDS_ENV, "12");
        std::env::set_var(WARN_EMPTY_ENV, "0");
        let config = ResolveConfig::from_env();
        std::env::remove_var(PARALLEL_ENV);
        std::env::remove_var(MAX_ROUNDS_ENV);
        std::env::remove_var(WARN_EMPTY_ENV);

        assert!(config.parallel_builders);
        assert_eq!(config.max_rounds, Some(12));
        assert!(!config.warn_on_empty_builder);
    }

    #[test]
    fn test_builder_methods() {
        let config = ResolveConfig::default()
            .with_parallel_builders(true)
            .with_max_rounds(3)
            .with_warn_on_empty_builder(false);
        assert_eq!(
            config,
            ResolveConfig {
                parallel_builders: true,
                max_rounds: Some(3),
                warn_on_empty_builder: false,
            }
        );
    }
}
