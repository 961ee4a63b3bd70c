//! Engine orchestrator
//!
//! Owns the body list and the discrete clock, drives the per-tick
//! pipeline (adaptive dt, integrator, collision pass), applies runtime
//! edits, and produces the durable scenario/snapshot documents. The
//! lifecycle is a strict state machine: Uninitialized until seeded,
//! Active while stepping, Disposed forever after `dispose`.

use std::collections::HashSet;
use std::time::Instant;

use log::{debug, info, warn};

use crate::configuration::config::EngineConfig;
use crate::configuration::scenario::{Scenario, ScenarioMetadata, Snapshot, SCHEMA_VERSION};
use crate::error::{EngineError, Result};
use crate::simulation::collisions::resolve_collisions;
use crate::simulation::integrator::{effective_dt, integrate_step};
use crate::simulation::states::{
    vec2_is_finite, Body, BodyEdit, BodyUpdate, SimulationState, SolverMode, StepSummary,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EnginePhase {
    Uninitialized,
    Active,
    Disposed,
}

/// Single-threaded synchronous simulation engine.
///
/// The engine exclusively owns its bodies and clock; `get_state`,
/// `snapshot`, and `save_scenario` hand out deep clones so callers can
/// never alias internal storage.
#[derive(Clone, Debug)]
pub struct SimulationEngine {
    phase: EnginePhase,
    config: EngineConfig,
    bodies: Vec<Body>,
    tick: u64,
    sim_time: f64,
}

impl Default for SimulationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationEngine {
    /// A fresh engine in the Uninitialized phase. Seed it with
    /// [`initialize`](Self::initialize), [`load_scenario`](Self::load_scenario),
    /// or [`restore_snapshot`](Self::restore_snapshot).
    pub fn new() -> Self {
        Self {
            phase: EnginePhase::Uninitialized,
            config: EngineConfig::default(),
            bodies: Vec::new(),
            tick: 0,
            sim_time: 0.0,
        }
    }

    /// Seed the engine with a validated config and body set and activate it.
    /// An empty body list is valid (the empty universe still ticks).
    pub fn initialize(&mut self, config: EngineConfig, bodies: Vec<Body>) -> Result<()> {
        self.require_not_disposed()?;
        config.validate()?;
        validate_body_set(&bodies)?;

        self.config = config;
        self.bodies = bodies;
        self.tick = 0;
        self.sim_time = 0.0;
        self.phase = EnginePhase::Active;
        info!("engine initialized with {} bodies", self.bodies.len());
        Ok(())
    }

    /// Replace the configuration. The body set and clock are untouched.
    pub fn set_config(&mut self, config: EngineConfig) -> Result<()> {
        self.require_active()?;
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Apply a single create/update/delete edit. Failures leave the body
    /// set unchanged.
    pub fn apply_edit(&mut self, edit: BodyEdit) -> Result<()> {
        self.require_active()?;
        match edit {
            BodyEdit::Create(body) => self.create_body(body),
            BodyEdit::Update(update) => self.update_body(update),
            BodyEdit::Delete { id } => self.delete_body(&id),
        }
    }

    /// Advance the simulation by `ticks` substeps.
    ///
    /// Each substep decides its dt, integrates, resolves collisions, and
    /// asserts finiteness before the clock advances; a failing substep
    /// aborts the call with the engine left at the last completed substep.
    pub fn step(&mut self, ticks: u32) -> Result<StepSummary> {
        self.require_active()?;

        let mut summary = StepSummary {
            max_body_count: self.bodies.len(),
            ..StepSummary::default()
        };

        if ticks == 0 {
            summary.final_tick = self.tick;
            summary.sim_time = self.sim_time;
            return Ok(summary);
        }

        let wall_start = Instant::now();
        let mut warnings = Vec::new();

        for _ in 0..ticks {
            let dt_used = effective_dt(&self.bodies, &self.config, &mut warnings);
            let mode = integrate_step(&mut self.bodies, &self.config, dt_used, &mut warnings)?;
            let collision_stats =
                resolve_collisions(&mut self.bodies, self.config.collision_mode);
            self.ensure_finite_bodies()?;

            summary.collision_events += collision_stats.collisions;
            summary.merged_events += collision_stats.merges;
            match mode {
                SolverMode::Pairwise => summary.pairwise_ticks += 1,
                SolverMode::BarnesHut => summary.barnes_hut_ticks += 1,
            }
            summary.last_solver_mode = mode;

            self.tick += 1;
            self.sim_time += dt_used;
            summary.ticks_applied += 1;
            summary.max_body_count = summary.max_body_count.max(self.bodies.len());
        }

        summary.step_wall_time_micros = wall_start.elapsed().as_micros() as u64;
        if summary.ticks_applied > 0 {
            summary.average_tick_micros =
                summary.step_wall_time_micros / u64::from(summary.ticks_applied);
        }
        summary.final_tick = self.tick;
        summary.sim_time = self.sim_time;
        summary.warnings = warnings;

        debug!(
            "stepped {} ticks to t={} ({} bodies, {} collisions)",
            summary.ticks_applied,
            summary.sim_time,
            self.bodies.len(),
            summary.collision_events
        );
        Ok(summary)
    }

    /// Deep-cloned view of the current state.
    pub fn get_state(&self) -> Result<SimulationState> {
        self.require_active()?;
        Ok(SimulationState {
            tick: self.tick,
            sim_time: self.sim_time,
            config: self.config.clone(),
            bodies: self.bodies.clone(),
        })
    }

    /// Replace config and bodies from a scenario and reset the clock.
    pub fn load_scenario(&mut self, scenario: Scenario) -> Result<()> {
        self.require_not_disposed()?;
        if !scenario.schema_version.starts_with('1') {
            return Err(EngineError::SchemaValidation(format!(
                "unsupported scenario schema version '{}'",
                scenario.schema_version
            )));
        }

        scenario.engine_config.validate()?;
        validate_body_set(&scenario.bodies)?;

        self.config = scenario.engine_config;
        self.bodies = scenario.bodies;
        self.tick = 0;
        self.sim_time = 0.0;
        self.phase = EnginePhase::Active;
        info!(
            "loaded scenario '{}' with {} bodies",
            scenario.metadata.name,
            self.bodies.len()
        );
        Ok(())
    }

    /// Current config and bodies as a portable scenario document.
    /// Callers may rewrite the metadata before persisting.
    pub fn save_scenario(&self) -> Result<Scenario> {
        self.require_active()?;
        Ok(Scenario {
            schema_version: SCHEMA_VERSION.to_string(),
            metadata: ScenarioMetadata {
                name: "Untitled".to_string(),
                description: None,
                author: None,
                created_at: "1970-01-01T00:00:00Z".to_string(),
                tags: Vec::new(),
            },
            engine_config: self.config.clone(),
            bodies: self.bodies.clone(),
        })
    }

    /// Point-in-time capture of the clock and bodies. The config travels
    /// only as its hash; `created_at` is left for the caller to stamp so
    /// snapshots of identical states compare equal.
    pub fn snapshot(&self) -> Result<Snapshot> {
        self.require_active()?;
        Ok(Snapshot {
            schema_version: SCHEMA_VERSION.to_string(),
            created_at: None,
            tick: self.tick,
            sim_time: self.sim_time,
            config_hash: self.config.config_hash(),
            bodies: self.bodies.clone(),
        })
    }

    /// Overwrite clock and bodies from a snapshot. The current config is
    /// kept; a hash mismatch is logged but does not fail the restore.
    pub fn restore_snapshot(&mut self, snapshot: Snapshot) -> Result<()> {
        self.require_not_disposed()?;
        if !snapshot.schema_version.starts_with('1') {
            return Err(EngineError::SchemaValidation(format!(
                "unsupported snapshot schema version '{}'",
                snapshot.schema_version
            )));
        }

        validate_body_set(&snapshot.bodies)?;

        if snapshot.config_hash != self.config.config_hash() {
            warn!(
                "snapshot config hash does not match the current config; replay may diverge"
            );
        }

        self.tick = snapshot.tick;
        self.sim_time = snapshot.sim_time;
        self.bodies = snapshot.bodies;
        self.phase = EnginePhase::Active;
        Ok(())
    }

    /// Terminate the engine. Idempotent; every other operation fails from
    /// here on.
    pub fn dispose(&mut self) {
        if self.phase == EnginePhase::Disposed {
            return;
        }
        self.bodies.clear();
        self.phase = EnginePhase::Disposed;
        info!("engine disposed");
    }

    // helpers ==============================================================

    fn require_active(&self) -> Result<()> {
        match self.phase {
            EnginePhase::Uninitialized => Err(EngineError::NotInitialized),
            EnginePhase::Disposed => Err(EngineError::Disposed),
            EnginePhase::Active => Ok(()),
        }
    }

    fn require_not_disposed(&self) -> Result<()> {
        if self.phase == EnginePhase::Disposed {
            return Err(EngineError::Disposed);
        }
        Ok(())
    }

    fn ensure_finite_bodies(&self) -> Result<()> {
        for body in self.bodies.iter().filter(|body| body.alive) {
            if !vec2_is_finite(&body.position) || !vec2_is_finite(&body.velocity) {
                return Err(EngineError::NumericalInstability(format!(
                    "body '{}' produced non-finite state",
                    body.id
                )));
            }
        }
        Ok(())
    }

    fn create_body(&mut self, body: Body) -> Result<()> {
        body.validate()?;
        if self.bodies.iter().any(|existing| existing.id == body.id) {
            return Err(EngineError::DuplicateBodyId(body.id));
        }
        self.bodies.push(body);
        Ok(())
    }

    fn update_body(&mut self, update: BodyUpdate) -> Result<()> {
        let index = self
            .bodies
            .iter()
            .position(|body| body.id == update.id)
            .ok_or_else(|| EngineError::BodyNotFound(update.id.clone()))?;

        // Build the replacement first so a validation failure leaves the
        // stored record untouched.
        let mut body = self.bodies[index].clone();
        if let Some(mass) = update.mass {
            body.mass = mass;
        }
        if let Some(radius) = update.radius {
            body.radius = radius;
        }
        if let Some(position) = update.position {
            body.position = position;
        }
        if let Some(velocity) = update.velocity {
            body.velocity = velocity;
        }
        if let Some(alive) = update.alive {
            body.alive = alive;
        }
        if let Some(patch) = update.metadata {
            if let Some(label) = patch.label {
                body.metadata.label = Some(label);
            }
            if let Some(kind) = patch.kind {
                body.metadata.kind = Some(kind);
            }
            if let Some(color) = patch.color {
                body.metadata.color = color;
            }
        }
        body.validate()?;

        self.bodies[index] = body;
        Ok(())
    }

    fn delete_body(&mut self, id: &str) -> Result<()> {
        let initial_count = self.bodies.len();
        self.bodies.retain(|body| body.id != id);
        if self.bodies.len() == initial_count {
            return Err(EngineError::BodyNotFound(id.to_string()));
        }
        Ok(())
    }
}

fn validate_body_set(bodies: &[Body]) -> Result<()> {
    let mut ids = HashSet::new();
    for body in bodies {
        body.validate()?;
        if !ids.insert(body.id.as_str()) {
            return Err(EngineError::DuplicateBodyId(body.id.clone()));
        }
    }
    Ok(())
}
