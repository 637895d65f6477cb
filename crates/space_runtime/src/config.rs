//! Space configuration.

use serde::{Deserialize, Serialize};

/// How the space raises the structural events produced by entity, state,
/// and system mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralEvents {
    /// Dispatch immediately, before the mutating call returns.
    #[default]
    Process,
    /// Append to the event queue; handlers run on the next pump.
    Post,
    /// Do not raise structural events.
    Silent,
}

/// Configuration for a [`Space`](crate::Space).
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```rust
/// use space_runtime::{SpaceConfig, StructuralEvents};
///
/// let config: SpaceConfig = serde_json::from_str(r#"{ "structural_events": "post" }"#).unwrap();
/// assert_eq!(config.structural_events, StructuralEvents::Post);
/// assert_eq!(config.queue_capacity, SpaceConfig::default().queue_capacity);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceConfig {
    /// How structural events are raised.
    pub structural_events: StructuralEvents,
    /// Initial capacity of the event queue.
    pub queue_capacity: usize,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            structural_events: StructuralEvents::Process,
            queue_capacity: 64,
        }
    }
}

impl SpaceConfig {
    /// Create a config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override how structural events are raised.
    #[must_use]
    pub fn with_structural_events(mut self, mode: StructuralEvents) -> Self {
        self.structural_events = mode;
        self
    }

    /// Override the initial event queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_processes_structural_events() {
        let config = SpaceConfig::default();
        assert_eq!(config.structural_events, StructuralEvents::Process);
        assert_eq!(config.queue_capacity, 64);
    }

    #[test]
    fn test_builder() {
        let config = SpaceConfig::new()
            .with_structural_events(StructuralEvents::Silent)
            .with_queue_capacity(8);
        assert_eq!(config.structural_events, StructuralEvents::Silent);
        assert_eq!(config.queue_capacity, 8);
    }

    #[test]
    fn test_parse_empty_document_uses_defaults() {
        let config: SpaceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SpaceConfig::default());
    }

    #[test]
    fn test_parse_full_document() {
        let config: SpaceConfig =
            serde_json::from_str(r#"{ "structural_events": "silent", "queue_capacity": 3 }"#)
                .unwrap();
        assert_eq!(
            config,
            SpaceConfig::new()
                .with_structural_events(StructuralEvents::Silent)
                .with_queue_capacity(3)
        );
    }

    #[test]
    fn test_parse_rejects_unknown_mode() {
        let result: Result<SpaceConfig, _> =
            serde_json::from_str(r#"{ "structural_events": "sometimes" }"#);
        assert!(result.is_err());
    }
}
