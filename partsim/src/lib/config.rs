use crate::helpe::*;

/// Default degree of multiprogramming.
pub const DEFAULT_DEGREE: usize = 5;

/// Everything a run needs besides its processes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Maximum number of processes resident in memory (ready plus
    /// executing) at any moment.
    pub degree:     usize,
    pub layout:     MemoryLayout,
    /// Optional safety net. A well-formed run always ends on its own.
    pub max_ticks:  Option<Tick>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            degree:     DEFAULT_DEGREE,
            layout:     MemoryLayout::standard(),
            max_ticks:  None,
        }
    }
}

impl SimConfig {
    pub fn new(degree: usize, layout: MemoryLayout) -> Self {
        Self { degree, layout, max_ticks: None }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.degree == 0 {
            return Err(ConfigError::ZeroDegree);
        }

        self.layout.validate()
    }
}
