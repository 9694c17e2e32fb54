/// Engine configuration, passed explicitly to [`crate::Engine::new`].
///
/// The core never reads configuration from the environment or any other
/// ambient state; model identity and credentials live in the completion
/// sources the caller constructs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of takeovers before the run aborts
    pub max_takeovers: u32,
    /// Generation temperature for a run with no consecutive restarts
    pub base_temperature: f32,
    /// Temperature added per consecutive restart beyond the first
    pub temperature_step: f32,
    /// Hard cap on the exploration temperature
    pub max_temperature: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_takeovers: 100,
            base_temperature: 0.0,
            temperature_step: 0.1,
            max_temperature: 1.0,
        }
    }
}

impl EngineConfig {
    pub fn with_max_takeovers(mut self, max: u32) -> Self {
        self.max_takeovers = max;
        self
    }

    pub fn with_base_temperature(mut self, temperature: f32) -> Self {
        self.base_temperature = temperature;
        self
    }
}
