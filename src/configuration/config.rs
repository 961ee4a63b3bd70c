//! Engine configuration: numerical parameters, scheme selection, and the
//! canonical config hash used to pair snapshots with compatible configs.
//!
//! All enums carry their camelCase wire names; `validate()` guards every
//! invariant the stepping pipeline relies on, including the rule that
//! deterministic mode forbids the adaptive dt policy.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Time integrator used for advancing the system state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IntegratorKind {
    SemiImplicitEuler,
    VelocityVerlet,
    Rk4,
}

impl IntegratorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IntegratorKind::SemiImplicitEuler => "semiImplicitEuler",
            IntegratorKind::VelocityVerlet => "velocityVerlet",
            IntegratorKind::Rk4 => "rk4",
        }
    }
}

/// What happens when two live bodies overlap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollisionMode {
    Elastic,
    InelasticMerge,
    Ignore,
}

impl CollisionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CollisionMode::Elastic => "elastic",
            CollisionMode::InelasticMerge => "inelasticMerge",
            CollisionMode::Ignore => "ignore",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DtPolicy {
    Fixed,
    Adaptive,
}

impl DtPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            DtPolicy::Fixed => "fixed",
            DtPolicy::Adaptive => "adaptive",
        }
    }
}

/// Force solver selection. `Auto` switches on live body count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GravitySolver {
    Pairwise,
    BarnesHut,
    Auto,
}

impl GravitySolver {
    pub fn as_str(self) -> &'static str {
        match self {
            GravitySolver::Pairwise => "pairwise",
            GravitySolver::BarnesHut => "barnesHut",
            GravitySolver::Auto => "auto",
        }
    }
}

fn default_gravity_solver() -> GravitySolver {
    GravitySolver::Auto
}

fn default_barnes_hut_theta() -> f64 {
    0.6
}

fn default_barnes_hut_threshold() -> usize {
    256
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub gravity_constant: f64,
    pub softening_epsilon: f64,
    pub dt: f64,
    pub dt_policy: DtPolicy,
    pub integrator: IntegratorKind,
    pub collision_mode: CollisionMode,
    pub deterministic: bool,
    #[serde(default = "default_gravity_solver")]
    pub gravity_solver: GravitySolver,
    #[serde(default = "default_barnes_hut_theta")]
    pub barnes_hut_theta: f64,
    #[serde(default = "default_barnes_hut_threshold")]
    pub barnes_hut_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gravity_constant: 1.0,
            softening_epsilon: 1e-3,
            dt: 0.005,
            dt_policy: DtPolicy::Fixed,
            integrator: IntegratorKind::VelocityVerlet,
            collision_mode: CollisionMode::InelasticMerge,
            deterministic: true,
            gravity_solver: default_gravity_solver(),
            barnes_hut_theta: default_barnes_hut_theta(),
            barnes_hut_threshold: default_barnes_hut_threshold(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.gravity_constant.is_finite() || self.gravity_constant <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "gravityConstant must be finite and > 0".to_string(),
            ));
        }
        if !self.softening_epsilon.is_finite() || self.softening_epsilon < 0.0 {
            return Err(EngineError::InvalidConfig(
                "softeningEpsilon must be finite and >= 0".to_string(),
            ));
        }
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "dt must be finite and > 0".to_string(),
            ));
        }
        if self.deterministic && self.dt_policy == DtPolicy::Adaptive {
            return Err(EngineError::InvalidConfig(
                "adaptive dt policy is not allowed in deterministic mode".to_string(),
            ));
        }
        if !self.barnes_hut_theta.is_finite()
            || self.barnes_hut_theta <= 0.0
            || self.barnes_hut_theta > 2.0
        {
            return Err(EngineError::InvalidConfig(
                "barnesHutTheta must be finite and in (0, 2]".to_string(),
            ));
        }
        if self.barnes_hut_threshold == 0 {
            return Err(EngineError::InvalidConfig(
                "barnesHutThreshold must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Canonical text form of the config, joined with `|`.
    ///
    /// Floats are rendered in fixed 12-digit exponent notation and enums as
    /// their wire names, so the hash is identical across implementations and
    /// insensitive to JSON field ordering. Two configs hash equal iff every
    /// field that affects stepping is equal.
    pub fn config_hash(&self) -> String {
        [
            format_exp12(self.gravity_constant),
            format_exp12(self.softening_epsilon),
            format_exp12(self.dt),
            self.dt_policy.as_str().to_string(),
            self.integrator.as_str().to_string(),
            self.collision_mode.as_str().to_string(),
            self.deterministic.to_string(),
            self.gravity_solver.as_str().to_string(),
            format_exp12(self.barnes_hut_theta),
            self.barnes_hut_threshold.to_string(),
        ]
        .join("|")
    }
}

/// `%.12e`-style rendering: 12-digit mantissa, explicit exponent sign, at
/// least two exponent digits.
fn format_exp12(value: f64) -> String {
    let formatted = format!("{value:.12e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent = exponent.parse::<i32>().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exponent.abs())
        }
        None => formatted,
    }
}
