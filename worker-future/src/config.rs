use std::time::Duration;

use crate::Future;

const DEFAULT_NAME_PREFIX: &str = "worker-future-";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings a future is created with. Immutable once the future exists.
#[derive(Clone, Debug)]
pub struct Config {
    name_prefix: String,
    stack_size: usize,
    default_timeout: Duration,
}

impl Config {
    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    /// Zero means the platform default.
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    /// Bound used by [`Future::get_default_timeout`].
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub(crate) fn thread_name(&self, id: u64) -> String {
        format!("{}{}", self.name_prefix, id)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            stack_size: 0,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Builds futures with non-default settings.
///
/// ```
/// use std::time::Duration;
/// use worker_future::{Builder, Future};
///
/// let future: Future<u32, String> = Builder::new()
///     .name_prefix("resize-")
///     .default_timeout(Duration::from_secs(2))
///     .create();
/// assert_eq!(future.config().default_timeout(), Duration::from_secs(2));
/// ```
#[derive(Clone, Debug, Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Set the worker thread name prefix.
    ///
    /// The worker of a future with id `7` and prefix `fetch-` is named `fetch-7`.
    pub fn name_prefix<S: Into<String>>(&mut self, name_prefix: S) -> &mut Self {
        self.config.name_prefix = name_prefix.into();
        self
    }

    /// Set the stack size of the worker thread.
    pub fn stack_size(&mut self, stack_size: usize) -> &mut Self {
        self.config.stack_size = stack_size;
        self
    }

    /// Set the bound used by [`Future::get_default_timeout`].
    pub fn default_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.config.default_timeout = timeout;
        self
    }

    pub fn config(&self) -> Config {
        self.config.clone()
    }

    /// Create a pending future with the configured settings.
    pub fn create<T, E>(&self) -> Future<T, E> {
        Future::with_config(self.config())
    }
}
