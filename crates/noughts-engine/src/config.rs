//! Engine configuration.

/// Tunables for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capacity of each session actor's command channel.
    ///
    /// Callers wait (backpressure) once this many commands are queued for
    /// a single session.
    pub channel_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { channel_size: 64 }
    }
}
