use crate::field::ReversibleCipher;
use crate::loader::LoaderMode;
use lazy_static::lazy_static;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Hard ceiling of trigger executions inside one unit of work.
pub const DEFAULT_TRIGGER_CEILING: usize = 1024;

/// Separator between storage codes of a multi-value choice.
pub const DEFAULT_MULTI_VALUE_SEPARATOR: char = '|';

/// Cheapest bcrypt cost accepted for one-way encrypted fields.
pub const MIN_BCRYPT_COST: u32 = 4;

/// Most expensive bcrypt cost accepted for one-way encrypted fields.
pub const MAX_BCRYPT_COST: u32 = 31;

/// Engine-wide settings shared by definitions and units of work
#[derive(Clone)]
pub struct EngineConfig {
    /// Trigger executions allowed before the breaker trips
    pub trigger_ceiling: usize,

    /// Reserved separator of multi-value choice storage strings
    pub multi_value_separator: char,

    /// bcrypt cost used by one-way encrypted fields
    pub bcrypt_cost: u32,

    /// Loader mode for columns that do not opt into lenient loading
    pub default_loader_mode: LoaderMode,

    /// Timestamps closer than this are treated as equal by loaders
    pub date_tolerance: Option<Duration>,

    /// Cipher backing reversible encrypted fields
    pub cipher: Option<Arc<dyn ReversibleCipher>>,
}

lazy_static! {
    static ref GLOBAL_CONFIG: Arc<EngineConfig> = Arc::new(EngineConfig::new());
}

impl EngineConfig {
    /// Process-wide default configuration
    pub fn global() -> &'static Arc<EngineConfig> {
        &GLOBAL_CONFIG
    }

    pub fn new() -> Self {
        Self {
            trigger_ceiling: DEFAULT_TRIGGER_CEILING,
            multi_value_separator: DEFAULT_MULTI_VALUE_SEPARATOR,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            default_loader_mode: LoaderMode::Strict,
            date_tolerance: None,
            cipher: None,
        }
    }

    pub fn trigger_ceiling(mut self, ceiling: usize) -> Self {
        self.trigger_ceiling = ceiling;
        self
    }

    pub fn multi_value_separator(mut self, separator: char) -> Self {
        self.multi_value_separator = separator;
        self
    }

    pub fn bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub fn default_loader_mode(mut self, mode: LoaderMode) -> Self {
        self.default_loader_mode = mode;
        self
    }

    pub fn date_tolerance(mut self, tolerance: Duration) -> Self {
        self.date_tolerance = Some(tolerance);
        self
    }

    pub fn cipher(mut self, cipher: Arc<dyn ReversibleCipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.trigger_ceiling == 0 {
            return Err("trigger_ceiling must be > 0".to_string());
        }

        if !self.multi_value_separator.is_ascii() || self.multi_value_separator.is_alphanumeric() {
            return Err("multi_value_separator must be an ASCII punctuation character".to_string());
        }

        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.bcrypt_cost) {
            return Err(format!(
                "bcrypt_cost must be between {} and {}",
                MIN_BCRYPT_COST, MAX_BCRYPT_COST
            ));
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("trigger_ceiling", &self.trigger_ceiling)
            .field("multi_value_separator", &self.multi_value_separator)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("default_loader_mode", &self.default_loader_mode)
            .field("date_tolerance", &self.date_tolerance)
            .field("cipher", &self.cipher.is_some())
            .finish()
    }
}
