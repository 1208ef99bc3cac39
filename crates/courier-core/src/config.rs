//! Centralized configuration management
//!
//! Consolidates the configuration structures used throughout the delivery
//! core into one place.

use core::time::Duration;

// ----------------------------------------------------------------------------
// Delivery Configuration
// ----------------------------------------------------------------------------

/// Configuration for send retries and acknowledgment timeouts
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DeliveryConfig {
    /// Maximum number of send retries before a record fails
    pub max_retries: u32,
    /// Delay before the first retry
    pub retry_backoff: Duration,
    /// Maximum retry delay (cap for exponential backoff)
    pub max_retry_delay: Duration,
    /// Exponential backoff multiplier
    pub backoff_multiplier: f32,
    /// How long a sent record waits for an acknowledgment before failing
    pub ack_timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_backoff: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            ack_timeout: Duration::from_secs(60),
        }
    }
}

impl DeliveryConfig {
    /// Create configuration for aggressive retry behavior
    pub fn aggressive() -> Self {
        Self {
            max_retries: 10,
            retry_backoff: Duration::from_millis(100),
            max_retry_delay: Duration::from_secs(10),
            backoff_multiplier: 1.5,
            ack_timeout: Duration::from_secs(30),
        }
    }

    /// Create configuration for conservative retry behavior
    pub fn conservative() -> Self {
        Self {
            max_retries: 3,
            retry_backoff: Duration::from_secs(2),
            max_retry_delay: Duration::from_secs(60),
            backoff_multiplier: 3.0,
            ack_timeout: Duration::from_secs(120),
        }
    }

    /// Create configuration optimized for testing (fast retries)
    pub fn testing() -> Self {
        Self {
            max_retries: 3,
            retry_backoff: Duration::from_millis(10),
            max_retry_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            ack_timeout: Duration::from_secs(5),
        }
    }

    /// Delay before the next retry after the given number of attempts
    ///
    /// Exponential growth from `retry_backoff`, capped at `max_retry_delay`.
    pub fn backoff_delay(&self, attempts: u32) -> Duration {
        let base = self.retry_backoff.as_millis() as f32;
        let exponent = attempts.saturating_sub(1) as i32;
        let delay_ms = (base * self.backoff_multiplier.powi(exponent)) as u64;
        let delay = Duration::from_millis(delay_ms);

        if delay > self.max_retry_delay {
            self.max_retry_delay
        } else {
            delay
        }
    }
}

// ----------------------------------------------------------------------------
// Store Configuration
// ----------------------------------------------------------------------------

/// Configuration for message store validation and limits
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StoreConfig {
    /// Maximum content length for messages (in characters, not bytes)
    pub max_text_length: usize,
    /// Maximum serialized size for a single record in bytes
    pub max_record_size: usize,
    /// Maximum number of records to keep per conversation
    pub max_records_per_conversation: usize,
    /// Maximum total number of records
    pub max_total_records: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_text_length: 32768,               // 32K characters
            max_record_size: 65536,               // 64KB per record
            max_records_per_conversation: 10000,  // 10K records per conversation
            max_total_records: 100000,            // 100K total records
        }
    }
}

impl StoreConfig {
    /// Create configuration optimized for low memory environments
    pub fn low_memory() -> Self {
        Self {
            max_text_length: 2048,
            max_record_size: 4096,
            max_records_per_conversation: 1000,
            max_total_records: 10000,
        }
    }

    /// Create configuration for testing with tight limits
    pub fn testing() -> Self {
        Self {
            max_text_length: 512,
            max_record_size: 1024,
            max_records_per_conversation: 100,
            max_total_records: 1000,
        }
    }
}

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Configuration for task channel buffer sizes
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChannelConfig {
    /// Buffer size for command channels (service handle -> logic task)
    pub command_buffer_size: usize,
    /// Buffer size for event channels (transport -> logic task)
    pub event_buffer_size: usize,
    /// Buffer size for the store's change-notification channel
    pub notify_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,  // send/cancel calls are infrequent
            event_buffer_size: 128,   // network events can be bursty
            notify_buffer_size: 64,   // UI consumers drain quickly
        }
    }
}

impl ChannelConfig {
    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            command_buffer_size: 100,
            event_buffer_size: 100,
            notify_buffer_size: 100,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delay_grows_exponentially() {
        let config = DeliveryConfig::default();

        let first = config.backoff_delay(1);
        assert_eq!(first, config.retry_backoff);

        let second = config.backoff_delay(2);
        let expected = Duration::from_millis(
            (config.retry_backoff.as_millis() as f32 * config.backoff_multiplier) as u64,
        );
        assert_eq!(second, expected);
        assert!(second > first);
    }

    #[test]
    fn test_backoff_delay_caps_at_max() {
        let config = DeliveryConfig::default();
        assert_eq!(config.backoff_delay(30), config.max_retry_delay);
    }
}
