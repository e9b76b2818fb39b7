//! Hub configuration

/// Default depth of the hub's command queue
pub const DEFAULT_COMMAND_QUEUE_CAPACITY: usize = 1024;

/// Default number of frames a viewer may have pending before eviction
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// Configuration for the fan-out hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Capacity of the command queue feeding the worker task
    pub command_queue_capacity: usize,

    /// Capacity of each viewer's outbound mailbox
    pub mailbox_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            command_queue_capacity: DEFAULT_COMMAND_QUEUE_CAPACITY,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}

impl HubConfig {
    /// Set the command queue capacity (minimum 1)
    pub fn command_queue_capacity(mut self, capacity: usize) -> Self {
        self.command_queue_capacity = capacity.max(1);
        self
    }

    /// Set the per-viewer mailbox capacity (minimum 1)
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();

        assert_eq!(config.command_queue_capacity, DEFAULT_COMMAND_QUEUE_CAPACITY);
        assert_eq!(config.mailbox_capacity, DEFAULT_MAILBOX_CAPACITY);
    }

    #[test]
    fn test_builder_chaining() {
        let config = HubConfig::default()
            .command_queue_capacity(16)
            .mailbox_capacity(4);

        assert_eq!(config.command_queue_capacity, 16);
        assert_eq!(config.mailbox_capacity, 4);
    }

    #[test]
    fn test_zero_capacities_clamped() {
        // tokio channels panic on zero capacity
        let config = HubConfig::default()
            .command_queue_capacity(0)
            .mailbox_capacity(0);

        assert_eq!(config.command_queue_capacity, 1);
        assert_eq!(config.mailbox_capacity, 1);
    }
}
