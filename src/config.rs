//! Binder configuration.

use crate::descriptor::METHOD_MAX_ARGS;

/// Tunables for a [`ClassBinder`](crate::ClassBinder).
///
/// # Example
///
/// ```
/// use bindery::BinderConfig;
///
/// let config = BinderConfig::default()
///     .with_max_args(4)
///     .with_getter_validation(true);
/// assert_eq!(config.max_args, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinderConfig {
    /// Arguments considered per call; the rest are dropped. Never above
    /// [`METHOD_MAX_ARGS`].
    pub max_args: usize,
    /// Check getter results against the property's declared kind.
    pub validate_getter_results: bool,
    /// Freed string buffers kept around for reuse.
    pub buffer_pool_limit: usize,
    /// Capacity of a freshly allocated string buffer.
    pub initial_buffer_capacity: usize,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            max_args: METHOD_MAX_ARGS,
            validate_getter_results: cfg!(debug_assertions),
            buffer_pool_limit: 16,
            initial_buffer_capacity: 256,
        }
    }
}

impl BinderConfig {
    /// Set the per-call argument cap, clamped to [`METHOD_MAX_ARGS`].
    pub fn with_max_args(mut self, max_args: usize) -> Self {
        self.max_args = max_args.min(METHOD_MAX_ARGS);
        self
    }

    /// Enable or disable getter result validation.
    pub fn with_getter_validation(mut self, enabled: bool) -> Self {
        self.validate_getter_results = enabled;
        self
    }

    /// Set how many string buffers are pooled.
    pub fn with_buffer_pool_limit(mut self, limit: usize) -> Self {
        self.buffer_pool_limit = limit;
        self
    }

    /// Set the capacity of new string buffers.
    pub fn with_initial_buffer_capacity(mut self, capacity: usize) -> Self {
        self.initial_buffer_capacity = capacity;
        self
    }
}
