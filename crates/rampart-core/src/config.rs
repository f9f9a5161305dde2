//! Configuration loading and typed config structures for a Rampart match.
//!
//! The canonical configuration lives in `rampart-config.yaml`. Every field
//! has a default, so an empty file (or a file naming only the values to
//! change) is a valid configuration. Values are checked by
//! [`MatchConfig::validate`] after loading.

use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::Deserialize;

use rampart_build::{BlueprintConfig, BuildSettings, PlacementConfig, RateLimitConfig};
use rampart_types::Budget;
use rampart_world::{GridIndex, IntegrityConfig};

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "RAMPART_CONFIG";

/// Config file used when [`CONFIG_ENV_VAR`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "rampart-config.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but a value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level match configuration.
///
/// Mirrors the structure of `rampart-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MatchConfig {
    /// Placement geometry rules.
    #[serde(default)]
    pub placement: PlacementConfig,

    /// Structural integrity tuning.
    #[serde(default)]
    pub integrity: IntegrityConfig,

    /// Build request throttling.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Starting budgets.
    #[serde(default)]
    pub economy: EconomyConfig,

    /// Blueprint limits.
    #[serde(default)]
    pub blueprints: BlueprintConfig,

    /// Arena layout and timing.
    #[serde(default)]
    pub arena: ArenaConfig,

    /// Logging setup for the server binary.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MatchConfig {
    /// Resolve the config path from [`CONFIG_ENV_VAR`], falling back to
    /// [`DEFAULT_CONFIG_PATH`].
    pub fn path_from_env() -> PathBuf {
        std::env::var_os(CONFIG_ENV_VAR)
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
    }

    /// Load and validate configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] or [`ConfigError::Invalid`].
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.build_settings()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if !(self.arena.cell_size.is_finite() && self.arena.cell_size > 0.0) {
            return Err(ConfigError::Invalid("arena.cell_size must be > 0".to_owned()));
        }
        if !self.arena.ground_height.is_finite() {
            return Err(ConfigError::Invalid(
                "arena.ground_height must be finite".to_owned(),
            ));
        }
        if self.arena.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "arena.tick_interval_ms must be > 0".to_owned(),
            ));
        }
        if self.arena.spawn_points.is_empty() {
            return Err(ConfigError::Invalid(
                "arena.spawn_points must name at least one spawn".to_owned(),
            ));
        }
        if let Some(bad) = self
            .arena
            .obstacles
            .iter()
            .find(|o| !o.position.is_finite() || !(o.radius.is_finite() && o.radius >= 0.0))
        {
            return Err(ConfigError::Invalid(format!(
                "obstacle at {:?} has a bad position or radius",
                bad.position
            )));
        }
        Ok(())
    }

    /// The subset of settings the build orchestrator consumes.
    pub const fn build_settings(&self) -> BuildSettings {
        BuildSettings {
            placement: self.placement,
            integrity: self.integrity,
            rate_limit: self.rate_limit,
            blueprints: self.blueprints,
        }
    }

    /// Build the in-memory arena with its static obstacles.
    pub fn build_arena(&self) -> GridIndex {
        let mut grid = GridIndex::new(self.arena.cell_size, self.arena.ground_height);
        for obstacle in &self.arena.obstacles {
            grid.add_obstacle(obstacle.position, obstacle.radius);
        }
        grid
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Per-player starting budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EconomyConfig {
    /// Starting wall points.
    #[serde(default = "default_wall_points")]
    pub wall_points: u32,

    /// Starting elevation points.
    #[serde(default = "default_elevation_points")]
    pub elevation_points: u32,

    /// Starting trap points.
    #[serde(default = "default_trap_points")]
    pub trap_points: u32,

    /// Starting utility points.
    #[serde(default = "default_utility_points")]
    pub utility_points: u32,
}

impl EconomyConfig {
    /// The budget every new player starts with.
    pub const fn starting_budget(&self) -> Budget {
        Budget::new(
            self.wall_points,
            self.elevation_points,
            self.trap_points,
            self.utility_points,
        )
    }
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            wall_points: default_wall_points(),
            elevation_points: default_elevation_points(),
            trap_points: default_trap_points(),
            utility_points: default_utility_points(),
        }
    }
}

/// A static obstacle baked into the arena.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ObstacleConfig {
    /// Obstacle centre.
    pub position: Vec3,

    /// Obstacle radius.
    #[serde(default)]
    pub radius: f32,
}

/// Arena layout and timing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ArenaConfig {
    /// Spatial index bucket size.
    #[serde(default = "default_cell_size")]
    pub cell_size: f32,

    /// Height of the ground plane.
    #[serde(default)]
    pub ground_height: f32,

    /// Real-time milliseconds per match tick.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Spawn points handed out to joining players in turn.
    #[serde(default = "default_spawn_points")]
    pub spawn_points: Vec<Vec3>,

    /// Static obstacles.
    #[serde(default)]
    pub obstacles: Vec<ObstacleConfig>,
}

impl ArenaConfig {
    /// Spawn point for the `n`th player to join, cycling through the list.
    pub fn spawn_for(&self, n: usize) -> Option<Vec3> {
        let len = self.spawn_points.len();
        if len == 0 {
            return None;
        }
        self.spawn_points.get(n.checked_rem(len)?).copied()
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            cell_size: default_cell_size(),
            ground_height: 0.0,
            tick_interval_ms: default_tick_interval_ms(),
            spawn_points: default_spawn_points(),
            obstacles: Vec::new(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error). `RUST_LOG`
    /// takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_wall_points() -> u32 {
    20
}

const fn default_elevation_points() -> u32 {
    10
}

const fn default_trap_points() -> u32 {
    10
}

const fn default_utility_points() -> u32 {
    6
}

const fn default_cell_size() -> f32 {
    2.0
}

const fn default_tick_interval_ms() -> u64 {
    50
}

fn default_spawn_points() -> Vec<Vec3> {
    vec![Vec3::new(-20.0, 0.0, 0.0), Vec3::new(20.0, 0.0, 0.0)]
}

fn default_log_level() -> String {
    "info".to_owned()
}
