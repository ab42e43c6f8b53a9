//! Batch run configuration.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::plan::DEFAULT_MAX_BATCH_PAGES;

/// Default time allowed for one service call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Options for a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Largest number of pages submitted in one service call
    pub max_batch_pages: u32,

    /// Keep going after a batch fails and return a partial result
    pub continue_on_batch_failure: bool,

    /// Time allowed for one service call
    pub timeout: Duration,

    /// Number of batches in flight at once (1 = sequential)
    pub concurrency: usize,

    /// Pause before each service call after the first (sequential runs only)
    pub inter_batch_delay: Duration,
}

impl BatchConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the batch size limit.
    pub fn with_max_batch_pages(mut self, pages: u32) -> Self {
        self.max_batch_pages = pages;
        self
    }

    /// Choose whether a failed batch aborts the run.
    pub fn with_continue_on_batch_failure(mut self, continue_on_failure: bool) -> Self {
        self.continue_on_batch_failure = continue_on_failure;
        self
    }

    /// Keep going after failed batches.
    pub fn lenient(mut self) -> Self {
        self.continue_on_batch_failure = true;
        self
    }

    /// Abort on the first failed batch.
    pub fn strict(mut self) -> Self {
        self.continue_on_batch_failure = false;
        self
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of concurrent batches.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Process one batch at a time.
    pub fn sequential(mut self) -> Self {
        self.concurrency = 1;
        self
    }

    /// Set the pause between service calls.
    pub fn with_inter_batch_delay(mut self, delay: Duration) -> Self {
        self.inter_batch_delay = delay;
        self
    }

    /// Whether batches run on a worker pool.
    pub fn is_concurrent(&self) -> bool {
        self.concurrency > 1
    }

    /// Reject settings the orchestrator cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_pages == 0 {
            return Err(Error::InvalidConfig(
                "max batch pages must be at least 1".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_pages: DEFAULT_MAX_BATCH_PAGES,
            continue_on_batch_failure: false,
            timeout: DEFAULT_TIMEOUT,
            concurrency: 1,
            inter_batch_delay: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_config_builder() {
        let config = BatchConfig::new()
            .with_max_batch_pages(50)
            .lenient()
            .with_timeout(Duration::from_secs(5))
            .with_concurrency(4)
            .with_inter_batch_delay(Duration::from_millis(250));

        assert_eq!(config.max_batch_pages, 50);
        assert!(config.continue_on_batch_failure);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.is_concurrent());
        assert_eq!(config.inter_batch_delay, Duration::from_millis(250));

        let config = config.strict().sequential();
        assert!(!config.continue_on_batch_failure);
        assert!(!config.is_concurrent());
    }

    #[test]
    fn test_default_config() {
        let config = BatchConfig::default();
        assert_eq!(config.max_batch_pages, 100);
        assert!(!config.continue_on_batch_failure);
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.concurrency, 1);
        assert!(config.inter_batch_delay.is_zero());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        for config in [
            BatchConfig::new().with_max_batch_pages(0),
            BatchConfig::new().with_timeout(Duration::ZERO),
            BatchConfig::new().with_concurrency(0),
        ] {
            assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        }
    }
}
