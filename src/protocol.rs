//! Worker command envelope
//!
//! Boundary contract for wrappers that offload the engine to a worker:
//! requests carry an id, a command name, and a JSON payload; replies are
//! tagged envelopes carrying either the result data or an error string.
//! Successful mutating commands return the fresh serialized state so the
//! wrapper never has to reach into the engine. Transport, back-pressure,
//! and timeouts stay on the wrapper side; dispatch here is synchronous.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::configuration::config::EngineConfig;
use crate::configuration::scenario::{Scenario, Snapshot};
use crate::simulation::engine::SimulationEngine;
use crate::simulation::states::{Body, BodyEdit};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub id: i64,
    pub command: String,
    #[serde(default)]
    pub payload: Value,
}

/// Replies and startup messages, discriminated by `type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerReply {
    #[serde(rename_all = "camelCase")]
    Response {
        id: i64,
        ok: bool,
        data: Option<Value>,
        error: Option<String>,
    },
    Ready,
    Fatal {
        error: String,
    },
}

impl WorkerReply {
    fn success(id: i64, data: Value) -> Self {
        WorkerReply::Response {
            id,
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    fn failure(id: i64, error: String) -> Self {
        WorkerReply::Response {
            id,
            ok: false,
            data: None,
            error: Some(error),
        }
    }
}

#[derive(Deserialize)]
struct InitializePayload {
    config: EngineConfig,
    #[serde(default)]
    bodies: Vec<Body>,
}

#[derive(Deserialize)]
struct SetConfigPayload {
    config: EngineConfig,
}

#[derive(Deserialize)]
struct ApplyEditPayload {
    edit: BodyEdit,
}

#[derive(Deserialize)]
struct StepPayload {
    ticks: u32,
}

#[derive(Deserialize)]
struct LoadScenarioPayload {
    scenario: Scenario,
}

#[derive(Deserialize)]
struct RestoreSnapshotPayload {
    snapshot: Snapshot,
}

/// Execute one request against the engine and wrap the outcome.
pub fn dispatch(engine: &mut SimulationEngine, request: WorkerRequest) -> WorkerReply {
    match run_command(engine, &request.command, request.payload) {
        Ok(data) => WorkerReply::success(request.id, data),
        Err(error) => WorkerReply::failure(request.id, error),
    }
}

fn run_command(
    engine: &mut SimulationEngine,
    command: &str,
    payload: Value,
) -> std::result::Result<Value, String> {
    match command {
        "initialize" => {
            let args: InitializePayload = decode(payload, command)?;
            engine
                .initialize(args.config, args.bodies)
                .map_err(|error| error.to_string())?;
            state_data(engine)
        }
        "setConfig" => {
            let args: SetConfigPayload = decode(payload, command)?;
            engine
                .set_config(args.config)
                .map_err(|error| error.to_string())?;
            state_data(engine)
        }
        "applyEdit" => {
            let args: ApplyEditPayload = decode(payload, command)?;
            engine
                .apply_edit(args.edit)
                .map_err(|error| error.to_string())?;
            state_data(engine)
        }
        "step" => {
            let args: StepPayload = decode(payload, command)?;
            let summary = engine.step(args.ticks).map_err(|error| error.to_string())?;
            let state = engine.get_state().map_err(|error| error.to_string())?;
            Ok(json!({ "summary": summary, "state": state }))
        }
        "getState" => state_data(engine),
        "loadScenario" => {
            let args: LoadScenarioPayload = decode(payload, command)?;
            engine
                .load_scenario(args.scenario)
                .map_err(|error| error.to_string())?;
            state_data(engine)
        }
        "saveScenario" => {
            let scenario = engine.save_scenario().map_err(|error| error.to_string())?;
            Ok(json!({ "scenario": scenario }))
        }
        "snapshot" => {
            let snapshot = engine.snapshot().map_err(|error| error.to_string())?;
            Ok(json!({ "snapshot": snapshot }))
        }
        "restoreSnapshot" => {
            let args: RestoreSnapshotPayload = decode(payload, command)?;
            engine
                .restore_snapshot(args.snapshot)
                .map_err(|error| error.to_string())?;
            state_data(engine)
        }
        "dispose" => {
            engine.dispose();
            Ok(json!({ "disposed": true }))
        }
        other => Err(format!("unknown command '{other}'")),
    }
}

fn decode<T: DeserializeOwned>(payload: Value, command: &str) -> std::result::Result<T, String> {
    serde_json::from_value(payload)
        .map_err(|error| format!("invalid {command} payload: {error}"))
}

fn state_data(engine: &SimulationEngine) -> std::result::Result<Value, String> {
    let state = engine.get_state().map_err(|error| error.to_string())?;
    Ok(json!({ "state": state }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::states::Vec2;

    fn request(id: i64, command: &str, payload: Value) -> WorkerRequest {
        WorkerRequest {
            id,
            command: command.to_string(),
            payload,
        }
    }

    fn init_payload() -> Value {
        json!({
            "config": serde_json::to_value(EngineConfig::default()).unwrap(),
            "bodies": [
                serde_json::to_value(Body::new(
                    "a", 1.0, 0.1, Vec2::new(-1.0, 0.0), Vec2::zeros()
                )).unwrap(),
                serde_json::to_value(Body::new(
                    "b", 1.0, 0.1, Vec2::new(1.0, 0.0), Vec2::zeros()
                )).unwrap(),
            ]
        })
    }

    fn expect_ok(reply: WorkerReply) -> Value {
        match reply {
            WorkerReply::Response {
                ok: true,
                data: Some(data),
                ..
            } => data,
            other => panic!("expected successful response, got {other:?}"),
        }
    }

    #[test]
    fn initialize_then_step_returns_summary_and_state() {
        let mut engine = SimulationEngine::new();
        let data = expect_ok(dispatch(&mut engine, request(1, "initialize", init_payload())));
        assert_eq!(data["state"]["tick"], json!(0));

        let data = expect_ok(dispatch(&mut engine, request(2, "step", json!({"ticks": 3}))));
        assert_eq!(data["summary"]["ticksApplied"], json!(3));
        assert_eq!(data["state"]["tick"], json!(3));
    }

    #[test]
    fn commands_fail_before_initialization() {
        let mut engine = SimulationEngine::new();
        let reply = dispatch(&mut engine, request(7, "step", json!({"ticks": 1})));
        match reply {
            WorkerReply::Response {
                id, ok, error: Some(error), ..
            } => {
                assert_eq!(id, 7);
                assert!(!ok);
                assert!(error.contains("not initialized"));
            }
            other => panic!("expected error response, got {other:?}"),
        }
    }

    #[test]
    fn unknown_command_and_bad_payload_are_reported() {
        let mut engine = SimulationEngine::new();
        expect_ok(dispatch(&mut engine, request(1, "initialize", init_payload())));

        let reply = dispatch(&mut engine, request(2, "teleport", Value::Null));
        assert!(matches!(
            reply,
            WorkerReply::Response { ok: false, .. }
        ));

        let reply = dispatch(&mut engine, request(3, "step", json!({"ticks": "many"})));
        match reply {
            WorkerReply::Response {
                ok: false,
                error: Some(error),
                ..
            } => assert!(error.contains("payload")),
            other => panic!("expected decode failure, got {other:?}"),
        }
    }

    #[test]
    fn apply_edit_round_trips_through_the_wire_form() {
        let mut engine = SimulationEngine::new();
        expect_ok(dispatch(&mut engine, request(1, "initialize", init_payload())));

        let edit = json!({"edit": {"delete": {"id": "b"}}});
        let data = expect_ok(dispatch(&mut engine, request(2, "applyEdit", edit)));
        assert_eq!(data["state"]["bodies"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn reply_envelope_wire_shape() {
        let reply = WorkerReply::success(5, json!({"x": 1}));
        let encoded = serde_json::to_value(&reply).unwrap();
        assert_eq!(encoded["type"], json!("response"));
        assert_eq!(encoded["id"], json!(5));
        assert_eq!(encoded["ok"], json!(true));

        let fatal: WorkerReply =
            serde_json::from_value(json!({"type": "fatal", "error": "boom"})).unwrap();
        assert_eq!(
            fatal,
            WorkerReply::Fatal {
                error: "boom".to_string()
            }
        );
    }

    #[test]
    fn dispose_succeeds_and_later_commands_fail() {
        let mut engine = SimulationEngine::new();
        expect_ok(dispatch(&mut engine, request(1, "initialize", init_payload())));
        let data = expect_ok(dispatch(&mut engine, request(2, "dispose", Value::Null)));
        assert_eq!(data["disposed"], json!(true));

        let reply = dispatch(&mut engine, request(3, "getState", Value::Null));
        assert!(matches!(reply, WorkerReply::Response { ok: false, .. }));
    }
}
