//! JSON command protocol for driving the harness from scripts and scenario files.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::gesture::{PointerEvent, PointerPhase};
use crate::harness::TestHarness;
use crate::orchestrator::ActionOutcome;
use crate::platform::FetchFailure;

fn one() -> usize {
    1
}

/// A scripted input.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum HarnessCommand {
    StartSession,
    EndSession,
    Pause,
    Resume,
    /// Surface point reported by following frames; `null` for no surface
    SetHit {
        position: Option<[f32; 3]>,
    },
    Frame {
        #[serde(default = "one")]
        count: usize,
    },
    /// Advance the virtual clock
    Wait {
        ms: u64,
    },
    Tap,
    Select {
        model_id: String,
    },
    FetchProgress {
        received: u64,
        #[serde(default)]
        total: Option<u64>,
    },
    CompleteFetch,
    /// HTTP failure when `status` is set, network error otherwise
    FailFetch {
        #[serde(default)]
        status: Option<u16>,
    },
    FinishParsing,
    /// Complete download, parse and bounds of the in-flight load
    FinishLoad,
    Cancel,
    Reload,
    Clear {
        #[serde(default)]
        evict: bool,
    },
    SetLayer {
        name: String,
        visible: bool,
    },
    Pointer {
        pointer_id: u32,
        phase: PointerPhase,
        x: f32,
        y: f32,
        /// UI markers of the touched element and its ancestors
        #[serde(default)]
        ancestry: Vec<String>,
    },
    Inspect,
}

/// Response from executing a command.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl CommandResponse {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
            data: None,
        }
    }

    fn ok_with_data(data: serde_json::Value) -> Self {
        Self {
            success: true,
            error: None,
            data: Some(data),
        }
    }

    fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(msg.into()),
            data: None,
        }
    }

    fn outcome(outcome: ActionOutcome) -> Self {
        match outcome {
            ActionOutcome::Applied => {
                Self::ok_with_data(serde_json::json!({ "outcome": "applied" }))
            }
            ActionOutcome::Ignored(reason) => Self::ok_with_data(serde_json::json!({
                "outcome": "ignored",
                "reason": format!("{reason:?}"),
            })),
        }
    }

    fn no_request() -> Self {
        Self::err("No fetch has been requested")
    }
}

/// Execute a single command on the harness.
pub fn execute_command(harness: &mut TestHarness, cmd: HarnessCommand) -> CommandResponse {
    match cmd {
        HarnessCommand::StartSession => match harness.start_session() {
            Ok(info) => CommandResponse::ok_with_data(serde_json::json!({
                "session": info.request.describe(),
                "reference_space": format!("{:?}", info.reference_space),
            })),
            Err(e) => CommandResponse::err(e.to_string()),
        },

        HarnessCommand::EndSession => {
            harness.end_session();
            CommandResponse::ok()
        }

        HarnessCommand::Pause => {
            harness.pause();
            CommandResponse::ok()
        }

        HarnessCommand::Resume => {
            harness.resume();
            CommandResponse::ok()
        }

        HarnessCommand::SetHit { position } => {
            harness.set_hit(position.map(Vec3::from_array));
            CommandResponse::ok()
        }

        HarnessCommand::Frame { count } => {
            harness.frames(count);
            CommandResponse::ok()
        }

        HarnessCommand::Wait { ms } => {
            harness.advance_ms(ms);
            CommandResponse::ok()
        }

        HarnessCommand::Tap => CommandResponse::outcome(harness.tap()),

        HarnessCommand::Select { model_id } => match harness.select(&model_id) {
            Ok(outcome) => CommandResponse::outcome(outcome),
            Err(e) => CommandResponse::err(e.to_string()),
        },

        HarnessCommand::FetchProgress { received, total } => harness
            .fetch_progress(received, total)
            .map(CommandResponse::outcome)
            .unwrap_or_else(CommandResponse::no_request),

        HarnessCommand::CompleteFetch => harness
            .complete_fetch()
            .map(CommandResponse::outcome)
            .unwrap_or_else(CommandResponse::no_request),

        HarnessCommand::FailFetch { status } => {
            let failure = match status {
                Some(code) => FetchFailure::Http(code),
                None => FetchFailure::Network("connection reset".into()),
            };
            harness
                .fail_fetch(failure)
                .map(CommandResponse::outcome)
                .unwrap_or_else(CommandResponse::no_request)
        }

        HarnessCommand::FinishParsing => {
            let outcomes = harness.finish_parsing();
            CommandResponse::ok_with_data(serde_json::json!({ "parsed": outcomes.len() }))
        }

        HarnessCommand::FinishLoad => {
            if !harness.state().is_model_loading {
                return CommandResponse::err("No model is loading");
            }
            harness.finish_load();
            CommandResponse::ok_with_data(harness.status_json())
        }

        HarnessCommand::Cancel => CommandResponse::outcome(harness.cancel()),

        HarnessCommand::Reload => CommandResponse::outcome(harness.reload()),

        HarnessCommand::Clear { evict } => CommandResponse::outcome(harness.clear(evict)),

        HarnessCommand::SetLayer { name, visible } => {
            CommandResponse::outcome(harness.set_layer_visible(&name, visible))
        }

        HarnessCommand::Pointer {
            pointer_id,
            phase,
            x,
            y,
            ancestry,
        } => {
            let mut event = PointerEvent::new(pointer_id, phase, Vec2::new(x, y));
            event.ancestry = ancestry;
            CommandResponse::outcome(harness.send_pointer(event))
        }

        HarnessCommand::Inspect => CommandResponse::ok_with_data(harness.status_json()),
    }
}

/// Parse and execute a single JSON command string.
pub fn execute_json(harness: &mut TestHarness, json: &str) -> Result<CommandResponse, String> {
    let cmd: HarnessCommand =
        serde_json::from_str(json).map_err(|e| format!("Invalid command JSON: {e}"))?;
    Ok(execute_command(harness, cmd))
}

/// Parse and execute multiple JSON commands (array).
pub fn execute_json_batch(
    harness: &mut TestHarness,
    json: &str,
) -> Result<Vec<CommandResponse>, String> {
    let cmds: Vec<HarnessCommand> =
        serde_json::from_str(json).map_err(|e| format!("Invalid commands JSON: {e}"))?;
    Ok(cmds
        .into_iter()
        .map(|cmd| execute_command(harness, cmd))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_serde_tap() {
        let cmd: HarnessCommand = serde_json::from_str(r#"{"command": "tap"}"#).unwrap();
        assert!(matches!(cmd, HarnessCommand::Tap));
    }

    #[test]
    fn test_command_serde_frame_default_count() {
        let cmd: HarnessCommand = serde_json::from_str(r#"{"command": "frame"}"#).unwrap();
        assert!(matches!(cmd, HarnessCommand::Frame { count: 1 }));
    }

    #[test]
    fn test_command_serde_set_hit_null() {
        let cmd: HarnessCommand =
            serde_json::from_str(r#"{"command": "set_hit", "position": null}"#).unwrap();
        assert!(matches!(cmd, HarnessCommand::SetHit { position: None }));
    }

    #[test]
    fn test_command_serde_pointer() {
        let json = r#"{"command": "pointer", "pointer_id": 2, "phase": "move", "x": 10.0, "y": 5.0}"#;
        match serde_json::from_str::<HarnessCommand>(json).unwrap() {
            HarnessCommand::Pointer { pointer_id, phase, ancestry, .. } => {
                assert_eq!(pointer_id, 2);
                assert_eq!(phase, PointerPhase::Move);
                assert!(ancestry.is_empty());
            }
            _ => panic!("Expected Pointer"),
        }
    }

    #[test]
    fn test_execute_select_unknown_model() {
        let mut h = TestHarness::new();
        let resp = execute_json(&mut h, r#"{"command": "select", "model_id": "nope"}"#).unwrap();
        assert!(!resp.success);
        assert!(resp.error.unwrap().contains("nope"));
    }

    #[test]
    fn test_execute_cancel_when_idle_is_ignored() {
        let mut h = TestHarness::new();
        let resp = execute_json(&mut h, r#"{"command": "cancel"}"#).unwrap();
        assert!(resp.success);
        let data = resp.data.unwrap();
        assert_eq!(data["outcome"], "ignored");
        assert_eq!(data["reason"], "NotLoading");
    }

    #[test]
    fn test_execute_batch_place_scenario() {
        let mut h = TestHarness::new();
        let script = r#"[
            {"command": "start_session"},
            {"command": "select", "model_id": "house1"},
            {"command": "finish_load"},
            {"command": "set_hit", "position": [1.0, 0.0, -2.0]},
            {"command": "wait", "ms": 300},
            {"command": "frame"},
            {"command": "tap"},
            {"command": "inspect"}
        ]"#;
        let responses = execute_json_batch(&mut h, script).unwrap();
        assert_eq!(responses.len(), 8);
        assert!(responses.iter().all(|r| r.success));
        assert_eq!(responses[6].data.as_ref().unwrap()["outcome"], "applied");
        let status = responses[7].data.as_ref().unwrap();
        assert_eq!(status["placed"], true);
        assert_eq!(status["last_placed_hit"][0], 1.0);
    }

    #[test]
    fn test_execute_finish_load_without_load() {
        let mut h = TestHarness::new();
        let resp = execute_json(&mut h, r#"{"command": "finish_load"}"#).unwrap();
        assert!(!resp.success);
    }

    #[test]
    fn test_execute_invalid_json() {
        let mut h = TestHarness::new();
        assert!(execute_json(&mut h, "not valid json").is_err());
    }
}
