//! # Simulator event protocol
//!
//! The driving simulator speaks in event frames of the form `42["<event>",<data>]`. The leading
//! `4` marks a message frame and the `2` marks an event. The data is a JSON object whose contents
//! depend on the event:
//!
//! - `telemetry` (simulator to controller): `cte`, `speed` and `steering_angle`. The simulator
//!   sends these as strings holding numbers, plain JSON numbers are also accepted.
//! - `steer` (controller to simulator): `steering_angle` and `throttle`.
//! - `reset` (controller to simulator): restart the driving episode.
//! - `manual` (controller to simulator): no-op reply to a frame carrying no data.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Prefix of every event frame.
pub const EVENT_PREFIX: &str = "42";

/// Event name for telemetry frames.
pub const TELEMETRY_EVENT: &str = "telemetry";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single telemetry sample from the simulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Telemetry {
    /// Cross track error, the signed lateral distance between the vehicle and the path.
    pub cte: f64,

    /// Vehicle speed.
    pub speed: f64,

    /// Steering angle currently applied in the simulator, if reported.
    pub steering_angle: Option<f64>
}

/// Data of a steer command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct SteerData {
    steering_angle: f64,
    throttle: f64
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// An event received from the simulator.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    /// A telemetry sample.
    Telemetry(Telemetry),

    /// The event carried no data, the simulator is being driven manually.
    NoPayload,

    /// An event this software has no use for.
    Other(String)
}

/// A command sent to the simulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimCommand {
    /// Steer the vehicle. `steering_angle` is normalised to `[-1, 1]`.
    Steer {
        steering_angle: f64,
        throttle: f64
    },

    /// Restart the episode from the initial position.
    Reset,

    /// Acknowledge a frame without data.
    Manual
}

/// Errors which can occur encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum SimMessageError {
    #[error("The frame is not an event frame")]
    NotAnEvent,

    #[error("The frame contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("The frame does not start with an event name")]
    MissingEventName,

    #[error("The {0} event has no data object")]
    MissingData(String),

    #[error("The required field `{0}` is missing")]
    MissingField(&'static str),

    #[error("The field `{field}` is not a finite number (found {value})")]
    InvalidNumber {
        field: &'static str,
        value: String
    },

    #[error("Unknown command event `{0}`")]
    UnknownCommand(String),

    #[error("Could not serialize the frame: {0}")]
    SerializationError(serde_json::Error)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimEvent {
    /// Parse an event frame received from the simulator.
    pub fn from_frame(frame: &str) -> Result<Self, SimMessageError> {
        let body = match event_body(frame)? {
            Some(b) => b,
            None => return Ok(SimEvent::NoPayload)
        };

        let (name, data) = split_event(body)?;

        if name != TELEMETRY_EVENT {
            return Ok(SimEvent::Other(name))
        }

        let data = data.ok_or_else(|| SimMessageError::MissingData(name.clone()))?;

        Ok(SimEvent::Telemetry(Telemetry {
            cte: required_number(&data, "cte")?,
            speed: required_number(&data, "speed")?,
            steering_angle: optional_number(&data, "steering_angle")?
        }))
    }
}

impl Telemetry {
    /// Encode this sample as a telemetry frame, the way the simulator does.
    pub fn to_frame(&self) -> Result<String, SimMessageError> {
        let mut data = json!({
            "cte": self.cte.to_string(),
            "speed": self.speed.to_string()
        });

        if let Some(a) = self.steering_angle {
            data["steering_angle"] = Value::String(a.to_string());
        }

        encode_event(TELEMETRY_EVENT, data)
    }
}

impl SimCommand {
    /// Encode the command as an event frame.
    pub fn to_frame(&self) -> Result<String, SimMessageError> {
        match *self {
            SimCommand::Steer { steering_angle, throttle } => {
                let data = serde_json::to_value(SteerData { steering_angle, throttle })
                    .map_err(SimMessageError::SerializationError)?;
                encode_event("steer", data)
            },
            SimCommand::Reset => encode_event("reset", json!({})),
            SimCommand::Manual => encode_event("manual", json!({}))
        }
    }

    /// Parse a command frame, as the simulator would.
    pub fn from_frame(frame: &str) -> Result<Self, SimMessageError> {
        let body = event_body(frame)?.ok_or(SimMessageError::MissingEventName)?;

        let (name, data) = split_event(body)?;

        match name.as_str() {
            "steer" => {
                let data = data.ok_or_else(|| SimMessageError::MissingData(name.clone()))?;
                let steer: SteerData = serde_json::from_value(data)
                    .map_err(SimMessageError::InvalidJson)?;
                Ok(SimCommand::Steer {
                    steering_angle: steer.steering_angle,
                    throttle: steer.throttle
                })
            },
            "reset" => Ok(SimCommand::Reset),
            "manual" => Ok(SimCommand::Manual),
            _ => Err(SimMessageError::UnknownCommand(name))
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Extract the JSON array part of an event frame.
///
/// Returns `None` if the frame carries no data, which is the case when the frame contains `null`
/// or has no array section.
fn event_body(frame: &str) -> Result<Option<&str>, SimMessageError> {
    if frame.len() <= EVENT_PREFIX.len() || !frame.starts_with(EVENT_PREFIX) {
        return Err(SimMessageError::NotAnEvent)
    }

    if frame.contains("null") {
        return Ok(None)
    }

    match (frame.find('['), frame.rfind(']')) {
        (Some(b1), Some(b2)) if b1 < b2 => Ok(Some(&frame[b1..=b2])),
        _ => Ok(None)
    }
}

/// Split an event array into the event name and optional data object.
fn split_event(body: &str) -> Result<(String, Option<Value>), SimMessageError> {
    let value: Value = serde_json::from_str(body)
        .map_err(SimMessageError::InvalidJson)?;

    let name = value
        .get(0)
        .and_then(Value::as_str)
        .ok_or(SimMessageError::MissingEventName)?
        .to_owned();

    let data = value.get(1).filter(|d| d.is_object()).cloned();

    Ok((name, data))
}

/// Encode an event name and data into a frame.
fn encode_event(name: &str, data: Value) -> Result<String, SimMessageError> {
    let body = serde_json::to_string(&json!([name, data]))
        .map_err(SimMessageError::SerializationError)?;

    Ok(format!("{}{}", EVENT_PREFIX, body))
}

/// Read a finite number from the data object, accepting either a number or a numeric string.
fn optional_number(data: &Value, field: &'static str) -> Result<Option<f64>, SimMessageError> {
    let raw = match data.get(field) {
        Some(Value::Null) | None => return Ok(None),
        Some(v) => v
    };

    let invalid = || SimMessageError::InvalidNumber {
        field,
        value: raw.to_string()
    };

    let num = match raw {
        Value::Number(n) => n.as_f64().ok_or_else(invalid)?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| invalid())?,
        _ => return Err(invalid())
    };

    if !num.is_finite() {
        return Err(invalid())
    }

    Ok(Some(num))
}

fn required_number(data: &Value, field: &'static str) -> Result<f64, SimMessageError> {
    optional_number(data, field)?.ok_or(SimMessageError::MissingField(field))
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
