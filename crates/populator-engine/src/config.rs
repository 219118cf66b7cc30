//! Pool and tokenizer configuration, validation, and error types.

use std::error::Error;
use std::fmt;

use populator_arena::ArenaConfig;

// ── TokenizerConfig ───────────────────────────────────────────────

/// Buffering parameters of the streaming tokenizer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TokenizerConfig {
    /// Upper bound on bytes requested from the input per read. Default: 5.
    pub chunk_size: usize,
    /// Initial buffer capacity in bytes. Default: 256.
    pub initial_capacity: usize,
    /// Multiplier applied to the capacity on each growth step. Default: 1.5.
    pub growth_factor: f64,
}

impl TokenizerConfig {
    /// Default bytes per read.
    pub const DEFAULT_CHUNK_SIZE: usize = 5;

    /// Default initial buffer capacity.
    pub const DEFAULT_INITIAL_CAPACITY: usize = 256;

    /// Default growth multiplier.
    pub const DEFAULT_GROWTH_FACTOR: f64 = 1.5;

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.initial_capacity == 0 {
            return Err(ConfigError::ZeroInitialCapacity);
        }
        if !self.growth_factor.is_finite() || self.growth_factor <= 1.0 {
            return Err(ConfigError::InvalidGrowthFactor {
                value: self.growth_factor,
            });
        }
        Ok(())
    }
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            initial_capacity: Self::DEFAULT_INITIAL_CAPACITY,
            growth_factor: Self::DEFAULT_GROWTH_FACTOR,
        }
    }
}

// ── PoolConfig ────────────────────────────────────────────────────

/// Configuration for [`WorkerPool`](crate::pool::WorkerPool).
#[derive(Clone, Debug, PartialEq)]
pub struct PoolConfig {
    /// Number of execution slots. Default: [`PoolConfig::WORKER_COUNT`].
    pub worker_count: usize,
    /// Attempts made to duplicate a stream handle before giving up on a
    /// transient failure. Default: 8.
    pub dup_attempts: u32,
    /// Prefix of worker thread names; the slot id is appended.
    pub thread_name_prefix: String,
    /// Tokenizer buffering.
    pub tokenizer: TokenizerConfig,
    /// Arena shared by every job and store of the pool.
    pub arena: ArenaConfig,
}

impl PoolConfig {
    /// Default number of slots.
    pub const WORKER_COUNT: usize = 16;

    /// Default duplication attempts.
    pub const DEFAULT_DUP_ATTEMPTS: u32 = 8;

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.dup_attempts == 0 {
            return Err(ConfigError::ZeroDupAttempts);
        }
        self.tokenizer.validate()
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: Self::WORKER_COUNT,
            dup_attempts: Self::DEFAULT_DUP_ATTEMPTS,
            thread_name_prefix: "populator-worker".into(),
            tokenizer: TokenizerConfig::default(),
            arena: ArenaConfig::default(),
        }
    }
}

// ── ConfigError ───────────────────────────────────────────────────

/// Errors detected by [`PoolConfig::validate`] and
/// [`TokenizerConfig::validate`].
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// The pool has no slots.
    ZeroWorkers,
    /// Stream duplication would never be attempted.
    ZeroDupAttempts,
    /// Reads of zero bytes cannot make progress.
    ZeroChunkSize,
    /// The tokenizer buffer would start empty.
    ZeroInitialCapacity,
    /// The record delimiter is empty.
    EmptyDelimiter,
    /// Growth factor is NaN, infinite, or not greater than one.
    InvalidGrowthFactor {
        /// The invalid value.
        value: f64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroWorkers => write!(f, "worker_count must be at least 1"),
            Self::ZeroDupAttempts => write!(f, "dup_attempts must be at least 1"),
            Self::ZeroChunkSize => write!(f, "chunk_size must be at least 1"),
            Self::ZeroInitialCapacity => write!(f, "initial_capacity must be at least 1"),
            Self::EmptyDelimiter => write!(f, "record delimiter must not be empty"),
            Self::InvalidGrowthFactor { value } => {
                write!(f, "growth_factor must be finite and > 1.0, got {value}")
            }
        }
    }
}

impl Error for ConfigError {}
