//! Dispatcher configuration: queue sizing, sniff deadlines, and the
//! slow-loris byte cap called for in spec.md §9's second Open Question.

use std::time::Duration;

/// Default bound on a sub-listener's handoff queue (spec.md §3).
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default cap on bytes a single classifier may read while sniffing before
/// it is treated as a non-match, bounding how long a slow or malicious
/// client can stall classification of one connection.
pub const DEFAULT_MAX_SNIFF_BYTES: usize = 64 * 1024;

/// Tunables for a [`crate::Mux`].
#[derive(Debug, Clone)]
pub struct MuxConfig {
    pub(crate) queue_capacity: usize,
    pub(crate) read_timeout: Option<Duration>,
    pub(crate) max_sniff_bytes: Option<usize>,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            read_timeout: None,
            max_sniff_bytes: Some(DEFAULT_MAX_SNIFF_BYTES),
        }
    }
}

impl MuxConfig {
    /// Starts building a config away from the defaults.
    #[must_use]
    pub fn builder() -> MuxConfigBuilder {
        MuxConfigBuilder::default()
    }

    /// Capacity of each sub-listener's handoff queue.
    #[must_use]
    pub const fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// The per-sniff read deadline, if one is set.
    #[must_use]
    pub const fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// The byte cap a sniffing classifier is allowed to consume before it is
    /// forced to a non-match, if one is set.
    #[must_use]
    pub const fn max_sniff_bytes(&self) -> Option<usize> {
        self.max_sniff_bytes
    }
}

/// Builder for [`MuxConfig`].
#[derive(Debug, Clone, Default)]
pub struct MuxConfigBuilder {
    config: MuxConfig,
}

impl MuxConfigBuilder {
    /// Overrides the default sub-listener queue capacity.
    #[must_use]
    pub const fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Sets the per-sniff read deadline (spec.md §4.4 `set_read_timeout`).
    #[must_use]
    pub const fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = Some(timeout);
        self
    }

    /// Disables the per-sniff read deadline.
    #[must_use]
    pub const fn no_read_timeout(mut self) -> Self {
        self.config.read_timeout = None;
        self
    }

    /// Overrides the default sniff byte cap.
    #[must_use]
    pub const fn max_sniff_bytes(mut self, bytes: usize) -> Self {
        self.config.max_sniff_bytes = Some(bytes);
        self
    }

    /// Disables the sniff byte cap entirely.
    #[must_use]
    pub const fn no_sniff_byte_cap(mut self) -> Self {
        self.config.max_sniff_bytes = None;
        self
    }

    /// Finishes the builder.
    #[must_use]
    pub fn build(self) -> MuxConfig {
        self.config
    }
}
