use hyphae_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Parameters of the static Fruchterman–Reingold layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FruchtermanReingoldConfig {
    /// Ideal edge length `k`. Repulsion is `k² / d`, attraction `d² / k`.
    pub edge_length: f64,
    /// Maximum displacement per node in the first iteration.
    pub initial_temperature: f64,
    /// Temperature multiplier applied after every iteration, in (0, 1).
    pub cooling_factor: f64,
    /// The run ends once the temperature falls below this.
    pub min_temperature: f64,
    /// Hard iteration budget.
    pub max_iterations: usize,
}

impl Default for FruchtermanReingoldConfig {
    fn default() -> Self {
        Self {
            edge_length: 10.0,
            initial_temperature: 10.0,
            cooling_factor: 0.97,
            min_temperature: 0.01,
            max_iterations: 1000,
        }
    }
}

impl FruchtermanReingoldConfig {
    /// Iterations the cooling schedule allows before hitting the floor,
    /// capped by `max_iterations`.
    pub fn iteration_budget(&self) -> usize {
        if self.initial_temperature <= self.min_temperature {
            return 1.min(self.max_iterations);
        }
        let steps = (self.min_temperature / self.initial_temperature).ln() / self.cooling_factor.ln();
        (steps.ceil() as usize).max(1).min(self.max_iterations)
    }
}

/// Parameters of the continuous attractive/repulsive force (ARF) layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArfParameters {
    /// Spring constant `a`; an edge pulls with `a · weight · d`.
    pub spring: f64,
    /// Repulsion strength `b`; every pair pushes with `b / d²`.
    pub repulsion: f64,
    /// Pull of every node towards the origin, proportional to its distance.
    pub gravity: f64,
    /// Velocity retained per tick, in [0, 1).
    pub damping: f64,
    /// Integration step.
    pub time_step: f64,
    /// Speed cap per node.
    pub max_speed: f64,
    /// Distances below this are treated as this, which bounds repulsion.
    pub min_distance: f64,
    /// Wall-clock period between ticks.
    pub tick_interval_ms: u64,
}

impl Default for ArfParameters {
    fn default() -> Self {
        Self {
            spring: 1.0,
            repulsion: 1000.0,
            gravity: 0.05,
            damping: 0.9,
            time_step: 0.05,
            max_speed: 50.0,
            min_distance: 1.0,
            tick_interval_ms: 16,
        }
    }
}

impl ArfParameters {
    #[inline]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Parameters of the force-directed edge bundler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundlerConfig {
    /// Number of segments per edge route; a route has `segments + 1` points.
    pub segments: usize,
    /// Stiffness keeping each route taut.
    pub spring: f64,
    /// Initial displacement step.
    pub step_size: f64,
    /// Step multiplier applied after every tick.
    pub step_decay: f64,
    /// The step never decays below this.
    pub min_step_size: f64,
    /// Edge pairs less compatible than this do not attract each other.
    pub compatibility_threshold: f64,
    /// Wall-clock period between ticks.
    pub tick_interval_ms: u64,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            segments: 8,
            spring: 0.1,
            step_size: 0.5,
            step_decay: 0.98,
            min_step_size: 0.01,
            compatibility_threshold: 0.6,
            tick_interval_ms: 16,
        }
    }
}

impl BundlerConfig {
    #[inline]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// All layout settings. Missing sections and fields fall back to defaults.
///
/// ```rust
/// use hyphae_layout::LayoutConfig;
///
/// let config = LayoutConfig::from_json_str(r#"{ "dynamic": { "repulsion": 500.0 } }"#).unwrap();
/// assert_eq!(config.dynamic.repulsion, 500.0);
/// assert_eq!(config.dynamic.spring, 1.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    #[serde(rename = "static")]
    pub static_layout: FruchtermanReingoldConfig,
    pub dynamic: ArfParameters,
    pub bundler: BundlerConfig,
}

/// Returns `config` if `check` accepts it, otherwise the defaults.
pub(crate) fn or_default<T: Default>(config: T, check: fn(&T) -> Result<()>, component: &'static str) -> T {
    match check(&config) {
        Ok(()) => config,
        Err(err) => {
            tracing::warn!(component, error = %err, "invalid configuration, using defaults");
            T::default()
        }
    }
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidConfig(msg.into())
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be finite and positive, got {value}")))
    }
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be finite and non-negative, got {value}")))
    }
}

fn unit_interval(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be in (0, 1), got {value}")))
    }
}

impl FruchtermanReingoldConfig {
    pub fn validate(&self) -> Result<()> {
        positive("static.edge_length", self.edge_length)?;
        positive("static.initial_temperature", self.initial_temperature)?;
        positive("static.min_temperature", self.min_temperature)?;
        unit_interval("static.cooling_factor", self.cooling_factor)?;
        if self.max_iterations == 0 {
            return Err(invalid("static.max_iterations must be at least 1"));
        }
        Ok(())
    }
}

impl ArfParameters {
    pub fn validate(&self) -> Result<()> {
        non_negative("dynamic.spring", self.spring)?;
        non_negative("dynamic.repulsion", self.repulsion)?;
        non_negative("dynamic.gravity", self.gravity)?;
        if !(self.damping.is_finite() && (0.0..1.0).contains(&self.damping)) {
            return Err(invalid(format!("dynamic.damping must be in [0, 1), got {}", self.damping)));
        }
        positive("dynamic.time_step", self.time_step)?;
        positive("dynamic.max_speed", self.max_speed)?;
        positive("dynamic.min_distance", self.min_distance)?;
        Ok(())
    }
}

impl BundlerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.segments == 0 {
            return Err(invalid("bundler.segments must be at least 1"));
        }
        non_negative("bundler.spring", self.spring)?;
        positive("bundler.step_size", self.step_size)?;
        unit_interval("bundler.step_decay", self.step_decay)?;
        non_negative("bundler.min_step_size", self.min_step_size)?;
        if !(0.0..=1.0).contains(&self.compatibility_threshold) {
            return Err(invalid(format!(
                "bundler.compatibility_threshold must be in [0, 1], got {}",
                self.compatibility_threshold
            )));
        }
        Ok(())
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<()> {
        self.static_layout.validate()?;
        self.dynamic.validate()?;
        self.bundler.validate()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: LayoutConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
