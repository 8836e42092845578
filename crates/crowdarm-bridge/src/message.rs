//! Wire-message parsing and the operation allow-list.
//!
//! Each decoded frame is one JSON object:
//!
//! ```json
//! {"v": 1, "function": "position", "args": [2, 5], "kwargs": {}}
//! ```
//!
//! or the sentinel `{"disconnect": true}` that ends the connection. The
//! historical controller resolved `function` by reflection onto the driver
//! object, which let a client invoke *any* method; here the name is matched
//! against the closed [`BridgeCommand`] table instead, and arity and types
//! are validated before anything executes. A missing `v` is read as
//! version 1 so pre-versioning clients keep working.

use crowdarm_types::ArmError;
use serde::Deserialize;
use serde_json::Value;

/// Wire protocol version this build speaks.
pub const WIRE_VERSION: u64 = 1;

/// Raw shape of one frame before validation.
#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    v: Option<u64>,
    #[serde(default)]
    disconnect: Option<bool>,
    #[serde(default)]
    function: Option<String>,
    #[serde(default)]
    args: Option<Vec<Value>>,
    #[serde(default)]
    kwargs: Option<serde_json::Map<String, Value>>,
}

/// A validated inbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeRequest {
    /// End this connection cleanly; the listener stays up.
    Disconnect,
    /// Execute one allow-listed operation.
    Invoke(BridgeCommand),
}

/// The closed set of operations a bridge client may invoke.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeCommand {
    Home,
    MoveTo { x: f64, y: f64, z: f64 },
    SetJointAngle { joint_id: u8, angle_deg: f64 },
    SetEndEffector { on: bool },
    GetPosition,
    Height { z: i64 },
    Position { x: i64, y: i64 },
    Hold,
}

/// Parse and validate one decoded frame.
///
/// # Errors
///
/// * [`ArmError::Decode`] – malformed JSON or an unsupported `v`.
/// * [`ArmError::UnknownFunction`] – `function` is not in the allow-list.
/// * [`ArmError::ArgumentMismatch`] – wrong arity, wrong types, or
///   unexpected keyword arguments.
pub fn parse_request(frame: &str) -> Result<BridgeRequest, ArmError> {
    let raw: RawMessage =
        serde_json::from_str(frame).map_err(|e| ArmError::Decode(e.to_string()))?;

    if raw.disconnect == Some(true) {
        return Ok(BridgeRequest::Disconnect);
    }

    match raw.v {
        None => {}
        Some(v) if v == WIRE_VERSION => {}
        Some(v) => {
            return Err(ArmError::Decode(format!(
                "unsupported wire version {v} (this build speaks {WIRE_VERSION})"
            )));
        }
    }

    let function = raw
        .function
        .ok_or_else(|| ArmError::Decode("missing 'function' field".to_string()))?;
    let args = raw.args.unwrap_or_default();

    if let Some(kwargs) = &raw.kwargs
        && !kwargs.is_empty()
    {
        return Err(ArmError::ArgumentMismatch {
            function,
            details: "unexpected keyword arguments".to_string(),
        });
    }

    let command = match function.as_str() {
        "home" => {
            expect_arity(&function, &args, 0)?;
            BridgeCommand::Home
        }
        "move_to" => {
            expect_arity(&function, &args, 3)?;
            BridgeCommand::MoveTo {
                x: number(&function, &args, 0)?,
                y: number(&function, &args, 1)?,
                z: number(&function, &args, 2)?,
            }
        }
        "set_joint_angle" => {
            expect_arity(&function, &args, 2)?;
            let joint = integer(&function, &args, 0)?;
            let joint_id = u8::try_from(joint).map_err(|_| ArmError::ArgumentMismatch {
                function: function.clone(),
                details: format!("joint id {joint} out of range"),
            })?;
            BridgeCommand::SetJointAngle {
                joint_id,
                angle_deg: number(&function, &args, 1)?,
            }
        }
        "set_end_effector" => {
            expect_arity(&function, &args, 1)?;
            BridgeCommand::SetEndEffector {
                on: boolean(&function, &args, 0)?,
            }
        }
        "get_position" => {
            expect_arity(&function, &args, 0)?;
            BridgeCommand::GetPosition
        }
        "height" => {
            expect_arity(&function, &args, 1)?;
            BridgeCommand::Height {
                z: integer(&function, &args, 0)?,
            }
        }
        "position" => {
            expect_arity(&function, &args, 2)?;
            BridgeCommand::Position {
                x: integer(&function, &args, 0)?,
                y: integer(&function, &args, 1)?,
            }
        }
        "hold" => {
            expect_arity(&function, &args, 0)?;
            BridgeCommand::Hold
        }
        _ => return Err(ArmError::UnknownFunction(function)),
    };
    Ok(BridgeRequest::Invoke(command))
}

fn expect_arity(function: &str, args: &[Value], want: usize) -> Result<(), ArmError> {
    if args.len() != want {
        return Err(ArmError::ArgumentMismatch {
            function: function.to_string(),
            details: format!("expected {want} argument(s), got {}", args.len()),
        });
    }
    Ok(())
}

fn number(function: &str, args: &[Value], index: usize) -> Result<f64, ArmError> {
    args[index].as_f64().ok_or_else(|| ArmError::ArgumentMismatch {
        function: function.to_string(),
        details: format!("argument {index} must be a number"),
    })
}

fn integer(function: &str, args: &[Value], index: usize) -> Result<i64, ArmError> {
    args[index].as_i64().ok_or_else(|| ArmError::ArgumentMismatch {
        function: function.to_string(),
        details: format!("argument {index} must be an integer"),
    })
}

fn boolean(function: &str, args: &[Value], index: usize) -> Result<bool, ArmError> {
    args[index].as_bool().ok_or_else(|| ArmError::ArgumentMismatch {
        function: function.to_string(),
        details: format!("argument {index} must be a boolean"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_commands_parse() {
        assert_eq!(
            parse_request(r#"{"v":1,"function":"height","args":[3],"kwargs":{}}"#).unwrap(),
            BridgeRequest::Invoke(BridgeCommand::Height { z: 3 })
        );
        assert_eq!(
            parse_request(r#"{"function":"position","args":[2,5]}"#).unwrap(),
            BridgeRequest::Invoke(BridgeCommand::Position { x: 2, y: 5 })
        );
        assert_eq!(
            parse_request(r#"{"function":"move_to","args":[150.0,10.0,82.0]}"#).unwrap(),
            BridgeRequest::Invoke(BridgeCommand::MoveTo {
                x: 150.0,
                y: 10.0,
                z: 82.0
            })
        );
        assert_eq!(
            parse_request(r#"{"function":"set_end_effector","args":[true]}"#).unwrap(),
            BridgeRequest::Invoke(BridgeCommand::SetEndEffector { on: true })
        );
    }

    #[test]
    fn missing_version_is_read_as_version_one() {
        // Pre-versioning clients send no "v" field.
        assert!(parse_request(r#"{"function":"hold","args":[]}"#).is_ok());
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let result = parse_request(r#"{"v":2,"function":"hold","args":[]}"#);
        assert!(matches!(result, Err(ArmError::Decode(_))));
    }

    #[test]
    fn disconnect_sentinel_is_recognised() {
        assert_eq!(
            parse_request(r#"{"disconnect":true}"#).unwrap(),
            BridgeRequest::Disconnect
        );
    }

    #[test]
    fn unknown_function_is_rejected_not_reflected() {
        let result = parse_request(r#"{"function":"flush_cmd","args":[]}"#);
        assert_eq!(result, Err(ArmError::UnknownFunction("flush_cmd".to_string())));
    }

    #[test]
    fn wrong_arity_is_an_argument_mismatch() {
        let result = parse_request(r#"{"function":"height","args":[]}"#);
        assert!(matches!(result, Err(ArmError::ArgumentMismatch { .. })));

        let result = parse_request(r#"{"function":"position","args":[1,2,3]}"#);
        assert!(matches!(result, Err(ArmError::ArgumentMismatch { .. })));
    }

    #[test]
    fn wrong_type_is_an_argument_mismatch() {
        let result = parse_request(r#"{"function":"height","args":["three"]}"#);
        assert!(matches!(result, Err(ArmError::ArgumentMismatch { .. })));

        let result = parse_request(r#"{"function":"set_end_effector","args":[1]}"#);
        assert!(matches!(result, Err(ArmError::ArgumentMismatch { .. })));
    }

    #[test]
    fn unexpected_kwargs_are_rejected() {
        let result = parse_request(r#"{"function":"hold","args":[],"kwargs":{"wait":true}}"#);
        assert!(matches!(result, Err(ArmError::ArgumentMismatch { .. })));
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        assert!(matches!(
            parse_request(r#"{"function": "#),
            Err(ArmError::Decode(_))
        ));
    }
}
