//! Configuration Module - Collector Auxiliary Parameters
//!
//! Manages the parameters that influence the liveness oracle, the CAF
//! registry, and the post-evacuation weak sweep.

/// Main configuration for RGC
///
/// # Examples
///
/// ```rust
/// use rgc::RgcConfig;
///
/// // Use default configuration
/// let config = RgcConfig::default();
///
/// // Keep every CAF alive across collections (e.g. for an interactive session)
/// let config = RgcConfig {
///     keep_cafs: true,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct RgcConfig {
    /// Treat every CAF as retained
    ///
    /// When set, CAFs registered as revertible are put on the retained list
    /// instead, so `revert_cafs` never resets them.
    ///
    /// Default: false
    pub keep_cafs: bool,

    /// Upper bound on indirection/relocation hops per liveness query
    ///
    /// Only checked in debug builds, where exceeding it means the chain is
    /// cyclic. 0 disables the check.
    ///
    /// Default: 1_000_000
    pub max_chase_steps: usize,

    /// Threads used by the parallel weak sweep
    ///
    /// If None, the global rayon pool is used.
    ///
    /// Default: min(8, num_cpus)
    pub sweep_threads: Option<usize>,

    /// Minimum weak list length before sweeping in parallel
    ///
    /// Default: 4096
    pub parallel_sweep_threshold: usize,

    /// Count liveness outcomes in `OracleStats`
    ///
    /// Default: true
    pub stats_enabled: bool,

    /// Print collector events on the console
    ///
    /// Default: false
    pub verbose: bool,

    /// Print console events as JSON lines
    ///
    /// Default: false
    pub log_json: bool,
}

impl Default for RgcConfig {
    fn default() -> Self {
        let num_cpus = num_cpus::get();

        RgcConfig {
            // CAFs
            keep_cafs: false,

            // Liveness
            max_chase_steps: 1_000_000,

            // Weak sweep
            sweep_threads: Some(num_cpus.clamp(1, 8)),
            parallel_sweep_threshold: 4096,

            // Debug
            stats_enabled: true,
            verbose: false,
            log_json: false,
        }
    }
}

impl RgcConfig {
    /// Validate configuration
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rgc::RgcConfig;
    ///
    /// let config = RgcConfig {
    ///     sweep_threads: Some(0),  // Invalid!
    ///     ..Default::default()
    /// };
    ///
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_chase_steps != 0 && self.max_chase_steps < MIN_CHASE_STEPS {
            return Err(ConfigError::InvalidChaseLimit(format!(
                "max_chase_steps must be 0 or at least {}",
                MIN_CHASE_STEPS
            )));
        }

        if let Some(threads) = self.sweep_threads {
            if threads == 0 {
                return Err(ConfigError::InvalidSweepThreads(
                    "sweep_threads must be > 0".to_string(),
                ));
            }
        }

        if self.parallel_sweep_threshold == 0 {
            return Err(ConfigError::InvalidSweepThreshold(
                "parallel_sweep_threshold must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Build configuration from environment variables
    ///
    /// Overrides defaults with environment variables:
    /// - RGC_KEEP_CAFS
    /// - RGC_MAX_CHASE_STEPS
    /// - RGC_SWEEP_THREADS
    /// - RGC_VERBOSE
    /// - RGC_LOG_JSON
    ///
    /// # Examples
    ///
    /// ```bash
    /// export RGC_KEEP_CAFS=1
    /// export RGC_SWEEP_THREADS=4
    /// ```
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("RGC_KEEP_CAFS") {
            config.keep_cafs = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("RGC_MAX_CHASE_STEPS") {
            if let Ok(steps) = val.parse::<usize>() {
                config.max_chase_steps = steps;
            }
        }

        if let Ok(val) = std::env::var("RGC_SWEEP_THREADS") {
            if let Ok(threads) = val.parse::<usize>() {
                config.sweep_threads = Some(threads);
            }
        }

        if let Ok(val) = std::env::var("RGC_VERBOSE") {
            config.verbose = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("RGC_LOG_JSON") {
            config.log_json = parse_flag(&val);
        }

        config
    }
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid chase limit: {0}")]
    InvalidChaseLimit(String),

    #[error("Invalid sweep threads: {0}")]
    InvalidSweepThreads(String),

    #[error("Invalid sweep threshold: {0}")]
    InvalidSweepThreshold(String),
}

/// Smallest nonzero chase bound; shorter chains occur in healthy heaps.
const MIN_CHASE_STEPS: usize = 16;

fn parse_flag(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}
