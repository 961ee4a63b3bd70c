//! Core state and wire types for the N-body engine.
//!
//! Defines the 2D vector alias and helpers, the `Body` record with its
//! JSON codec, the tagged `BodyEdit` variants used by the runtime edit
//! protocol, and the `SimulationState`/`StepSummary` views handed back
//! to callers.

use std::fmt;

use nalgebra::Vector2;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::configuration::config::EngineConfig;
use crate::error::{EngineError, Result};

pub type Vec2 = Vector2<f64>;

/// Both components are finite (no NaN, no infinities).
pub fn vec2_is_finite(v: &Vec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}

/// Unit vector along `v`, or `fallback` when `v` has zero length.
pub fn normalize_or(v: Vec2, fallback: Vec2) -> Vec2 {
    let length = v.norm();
    if length > 0.0 {
        v / length
    } else {
        fallback
    }
}

/// Serde adapter mapping `Vec2` to the `{"x":…,"y":…}` wire shape.
pub(crate) mod vec2_xy {
    use super::Vec2;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Xy {
        x: f64,
        y: f64,
    }

    pub fn serialize<S: Serializer>(v: &Vec2, serializer: S) -> Result<S::Ok, S::Error> {
        Xy { x: v.x, y: v.y }.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec2, D::Error> {
        let xy = Xy::deserialize(deserializer)?;
        Ok(Vec2::new(xy.x, xy.y))
    }
}

/// Same adapter for optional vector fields (body updates).
pub(crate) mod vec2_xy_opt {
    use super::Vec2;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Xy {
        x: f64,
        y: f64,
    }

    pub fn serialize<S: Serializer>(v: &Option<Vec2>, serializer: S) -> Result<S::Ok, S::Error> {
        v.map(|v| Xy { x: v.x, y: v.y }).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec2>, D::Error> {
        let xy = Option::<Xy>::deserialize(deserializer)?;
        Ok(xy.map(|xy| Vec2::new(xy.x, xy.y)))
    }
}

/// 32-bit ARGB color, carried on the wire as an 8-hex-digit string with an
/// optional leading `#` (`"#AARRGGBB"` on emit).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorArgb(pub u32);

impl ColorArgb {
    pub fn parse(text: &str) -> Result<Self> {
        let digits = text.strip_prefix('#').unwrap_or(text);
        if digits.len() != 8 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(EngineError::InvalidBody(format!(
                "color '{text}' must be 8 hex digits (AARRGGBB)"
            )));
        }
        let value = u32::from_str_radix(digits, 16).map_err(|error| {
            EngineError::InvalidBody(format!("color '{text}' is not valid hex: {error}"))
        })?;
        Ok(Self(value))
    }
}

impl Default for ColorArgb {
    fn default() -> Self {
        Self(0xFFFF_FFFF) // opaque white
    }
}

impl fmt::Display for ColorArgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08X}", self.0)
    }
}

impl Serialize for ColorArgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ColorArgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyMetadata {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub color: ColorArgb,
}

fn default_alive() -> bool {
    true
}

/// A massive point-like body. Bodies are value types: every edit replaces
/// the stored record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    pub id: String,
    pub mass: f64,
    pub radius: f64,
    #[serde(with = "vec2_xy")]
    pub position: Vec2,
    #[serde(with = "vec2_xy")]
    pub velocity: Vec2,
    #[serde(default = "default_alive")]
    pub alive: bool,
    #[serde(default)]
    pub metadata: BodyMetadata,
}

impl Body {
    pub fn new(
        id: impl Into<String>,
        mass: f64,
        radius: f64,
        position: Vec2,
        velocity: Vec2,
    ) -> Self {
        Self {
            id: id.into(),
            mass,
            radius,
            position,
            velocity,
            alive: true,
            metadata: BodyMetadata::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(EngineError::InvalidBody("id must not be empty".to_string()));
        }
        if !self.mass.is_finite() || self.mass <= 0.0 {
            return Err(EngineError::InvalidBody(format!(
                "body '{}' mass must be finite and > 0",
                self.id
            )));
        }
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(EngineError::InvalidBody(format!(
                "body '{}' radius must be finite and > 0",
                self.id
            )));
        }
        if !vec2_is_finite(&self.position) {
            return Err(EngineError::InvalidBody(format!(
                "body '{}' position must be finite",
                self.id
            )));
        }
        if !vec2_is_finite(&self.velocity) {
            return Err(EngineError::InvalidBody(format!(
                "body '{}' velocity must be finite",
                self.id
            )));
        }
        Ok(())
    }
}

/// Partial metadata overrides carried by an update edit. Absent entries
/// leave the stored values untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataPatch {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub color: Option<ColorArgb>,
}

/// Field overrides for an existing body. `None` means "keep".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyUpdate {
    pub id: String,
    #[serde(default)]
    pub mass: Option<f64>,
    #[serde(default)]
    pub radius: Option<f64>,
    #[serde(default, with = "vec2_xy_opt")]
    pub position: Option<Vec2>,
    #[serde(default, with = "vec2_xy_opt")]
    pub velocity: Option<Vec2>,
    #[serde(default)]
    pub alive: Option<bool>,
    #[serde(default)]
    pub metadata: Option<MetadataPatch>,
}

/// Runtime edit applied between steps. On the wire this is exactly one of
/// `{"create":…}`, `{"update":…}`, `{"delete":{"id":…}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BodyEdit {
    Create(Body),
    Update(BodyUpdate),
    Delete { id: String },
}

/// Which force solver actually ran for a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverMode {
    Pairwise,
    BarnesHut,
}

impl SolverMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SolverMode::Pairwise => "pairwise",
            SolverMode::BarnesHut => "barnes_hut",
        }
    }
}

impl fmt::Display for SolverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated diagnostics for one `step` call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSummary {
    pub ticks_applied: u32,
    pub final_tick: u64,
    pub sim_time: f64,
    pub collision_events: u64,
    pub merged_events: u64,
    pub warnings: Vec<String>,
    #[serde(default)]
    pub pairwise_ticks: u32,
    #[serde(default)]
    pub barnes_hut_ticks: u32,
    #[serde(default)]
    pub step_wall_time_micros: u64,
    #[serde(default)]
    pub average_tick_micros: u64,
    #[serde(default)]
    pub max_body_count: usize,
    #[serde(default = "default_solver_mode")]
    pub last_solver_mode: SolverMode,
}

fn default_solver_mode() -> SolverMode {
    SolverMode::Pairwise
}

impl Default for StepSummary {
    fn default() -> Self {
        Self {
            ticks_applied: 0,
            final_tick: 0,
            sim_time: 0.0,
            collision_events: 0,
            merged_events: 0,
            warnings: Vec::new(),
            pairwise_ticks: 0,
            barnes_hut_ticks: 0,
            step_wall_time_micros: 0,
            average_tick_micros: 0,
            max_body_count: 0,
            last_solver_mode: SolverMode::Pairwise,
        }
    }
}

/// Deep-cloned view of the engine between ticks. Equal by value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    pub tick: u64,
    pub sim_time: f64,
    pub config: EngineConfig,
    pub bodies: Vec<Body>,
}
