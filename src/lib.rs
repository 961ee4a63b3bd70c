pub mod configuration;
pub mod error;
pub mod protocol;
pub mod simulation;

pub use configuration::config::{
    CollisionMode, DtPolicy, EngineConfig, GravitySolver, IntegratorKind,
};
pub use configuration::scenario::{
    migrate_to_latest, validate_scenario_document, Scenario, ScenarioMetadata, SchemaIssue,
    Snapshot, SCHEMA_VERSION,
};
pub use error::{EngineError, Result};
pub use protocol::{dispatch, WorkerReply, WorkerRequest};
pub use simulation::engine::SimulationEngine;
pub use simulation::forces::{Acceleration, BarnesHutGravity, PairwiseGravity};
pub use simulation::states::{
    Body, BodyEdit, BodyMetadata, BodyUpdate, ColorArgb, MetadataPatch, SimulationState,
    SolverMode, StepSummary, Vec2,
};
