//! JSON command envelopes sent to the bridge and routing of its replies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ParseError;
use crate::payload::RCPayload;

/// Radio link the bridge relays payloads over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadioProtocol {
    Espnow,
    Nrf24,
}

impl RadioProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            RadioProtocol::Espnow => "espnow",
            RadioProtocol::Nrf24 => "nrf24",
        }
    }
}

impl fmt::Display for RadioProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RadioProtocol {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "espnow" => Ok(RadioProtocol::Espnow),
            "nrf24" => Ok(RadioProtocol::Nrf24),
            _ => Err(ParseError::UnknownProtocol(s.to_string())),
        }
    }
}

/// Payload fields as they appear in a JSON envelope.
///
/// Missing fields read as zero; the bridge accepts partial data commands.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataFields {
    pub id1: u8,
    pub id2: u8,
    pub id3: u8,
    pub id4: u8,
    pub v1: f32,
    pub v2: f32,
    pub v3: f32,
    pub v4: f32,
    pub v5: f32,
    pub flags: u8,
}

impl From<&RCPayload> for DataFields {
    fn from(p: &RCPayload) -> Self {
        Self {
            id1: p.id1,
            id2: p.id2,
            id3: p.id3,
            id4: p.id4,
            v1: p.value1,
            v2: p.value2,
            v3: p.value3,
            v4: p.value4,
            v5: p.value5,
            flags: p.flags,
        }
    }
}

impl From<DataFields> for RCPayload {
    fn from(d: DataFields) -> Self {
        RCPayload::new(
            [d.id1, d.id2, d.id3, d.id4],
            [d.v1, d.v2, d.v3, d.v4, d.v5],
            d.flags,
        )
    }
}

/// A command understood by the bridge firmware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum BridgeCommand {
    /// Relay a payload over the active radio.
    Data(DataFields),
    /// Ask the bridge for its current state.
    Status,
    /// Change the active radio.
    Switch { protocol: RadioProtocol },
    /// Scan for peers on the active radio.
    Discover,
    /// Ask the bridge to print its command list.
    Help,
}

impl BridgeCommand {
    pub fn data(payload: &RCPayload) -> Self {
        BridgeCommand::Data(DataFields::from(payload))
    }

    /// Value of the `cmd` key.
    pub fn name(&self) -> &'static str {
        match self {
            BridgeCommand::Data(_) => "data",
            BridgeCommand::Status => "status",
            BridgeCommand::Switch { .. } => "switch",
            BridgeCommand::Discover => "discover",
            BridgeCommand::Help => "help",
        }
    }

    pub fn to_value(&self) -> Result<Value, ParseError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Render as a single JSON line without the trailing newline.
    pub fn to_line(&self) -> Result<String, ParseError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn parse_line(line: &str) -> Result<Self, ParseError> {
        Ok(serde_json::from_str(line.trim())?)
    }
}

/// Build the JSON envelope for `command`.
pub fn encode_json_command(command: &BridgeCommand) -> Result<Value, ParseError> {
    command.to_value()
}

/// Event name the bridge uses when a peer payload arrives.
pub const DATA_RECEIVED_EVENT: &str = "data_received";

/// A JSON object received from the bridge, routed by its leading key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BridgeMessage {
    /// An echoed command (`cmd` key).
    Command { command: String, body: Map<String, Value> },
    /// A status report (`status` key).
    Status { status: String, body: Map<String, Value> },
    /// An asynchronous event (`event` key); `data_received` carries a payload.
    Event {
        event: String,
        payload: Option<RCPayload>,
        body: Map<String, Value>,
    },
    /// An error reported by the bridge (`error` key).
    Error { error: String, body: Map<String, Value> },
    /// Any other object: banners, help text, discovery results, heartbeats.
    Other { body: Map<String, Value> },
}

impl BridgeMessage {
    /// Parse one line as a JSON object and route it.
    ///
    /// Routing takes the first key present in the order `cmd`, `status`,
    /// `event`, `error`.
    pub fn parse_line(line: &str) -> Result<Self, ParseError> {
        let body: Map<String, Value> = serde_json::from_str(line.trim())?;
        Ok(Self::route(body))
    }

    pub fn route(body: Map<String, Value>) -> Self {
        if let Some(cmd) = body.get("cmd") {
            return BridgeMessage::Command {
                command: text_of(cmd),
                body,
            };
        }
        if let Some(status) = body.get("status") {
            return BridgeMessage::Status {
                status: text_of(status),
                body,
            };
        }
        if let Some(event) = body.get("event") {
            let event = text_of(event);
            let payload = if event == DATA_RECEIVED_EVENT {
                event_payload(&body)
            } else {
                None
            };
            return BridgeMessage::Event {
                event,
                payload,
                body,
            };
        }
        if let Some(error) = body.get("error") {
            return BridgeMessage::Error {
                error: text_of(error),
                body,
            };
        }
        BridgeMessage::Other { body }
    }

    /// The payload carried by a `data_received` event, if any.
    pub fn payload(&self) -> Option<&RCPayload> {
        match self {
            BridgeMessage::Event { payload, .. } => payload.as_ref(),
            _ => None,
        }
    }

    pub fn body(&self) -> &Map<String, Value> {
        match self {
            BridgeMessage::Command { body, .. }
            | BridgeMessage::Status { body, .. }
            | BridgeMessage::Event { body, .. }
            | BridgeMessage::Error { body, .. }
            | BridgeMessage::Other { body } => body,
        }
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn event_payload(body: &Map<String, Value>) -> Option<RCPayload> {
    match DataFields::deserialize(Value::Object(body.clone())) {
        Ok(fields) => Some(fields.into()),
        Err(err) => {
            debug!(error = %err, "data_received event without a usable payload");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_envelope_shape() {
        let payload = RCPayload::new([12, 1, 0, 200], [35.0, 0.0, 0.85, 0.0, 1.0], 1);
        let value = encode_json_command(&BridgeCommand::data(&payload)).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 11);
        assert_eq!(obj["cmd"], "data");
        assert_eq!(obj["id1"], 12);
        assert_eq!(obj["id4"], 200);
        assert_eq!(obj["v3"].as_f64().unwrap() as f32, 0.85);
        assert_eq!(obj["flags"], 1);
    }

    #[test]
    fn control_envelope_shapes() {
        assert_eq!(BridgeCommand::Status.to_line().unwrap(), r#"{"cmd":"status"}"#);
        assert_eq!(BridgeCommand::Help.to_line().unwrap(), r#"{"cmd":"help"}"#);
        assert_eq!(
            BridgeCommand::Discover.to_line().unwrap(),
            r#"{"cmd":"discover"}"#
        );
        let switch = BridgeCommand::Switch {
            protocol: RadioProtocol::Nrf24,
        };
        assert_eq!(
            switch.to_line().unwrap(),
            r#"{"cmd":"switch","protocol":"nrf24"}"#
        );
        assert_eq!(switch.name(), "switch");
    }

    #[test]
    fn partial_data_command_defaults_to_zero() {
        let cmd = BridgeCommand::parse_line(r#"{"cmd":"data","id1":5,"v2":1.5}"#).unwrap();
        let BridgeCommand::Data(fields) = cmd else {
            panic!("expected data command");
        };
        let payload = RCPayload::from(fields);
        assert_eq!(payload.ids(), [5, 0, 0, 0]);
        assert_eq!(payload.values(), [0.0, 1.5, 0.0, 0.0, 0.0]);
        assert_eq!(payload.flags, 0);
    }

    #[test]
    fn unknown_protocol_is_rejected() {
        assert_eq!("ESPNOW".parse::<RadioProtocol>().unwrap(), RadioProtocol::Espnow);
        assert!(matches!(
            "lora".parse::<RadioProtocol>(),
            Err(ParseError::UnknownProtocol(name)) if name == "lora"
        ));
        assert!(BridgeCommand::parse_line(r#"{"cmd":"switch","protocol":"lora"}"#).is_err());
    }

    #[test]
    fn routes_by_first_present_key() {
        let msg = BridgeMessage::parse_line(r#"{"status":"ok","protocol":"espnow"}"#).unwrap();
        assert!(matches!(msg, BridgeMessage::Status { ref status, .. } if status == "ok"));

        let msg = BridgeMessage::parse_line(r#"{"error":"bad cmd","status":"fail"}"#).unwrap();
        assert!(matches!(msg, BridgeMessage::Status { ref status, .. } if status == "fail"));

        let msg = BridgeMessage::parse_line(r#"{"error":"unknown command"}"#).unwrap();
        assert!(matches!(msg, BridgeMessage::Error { ref error, .. } if error == "unknown command"));

        let msg = BridgeMessage::parse_line(r#"{"cmd":"status"}"#).unwrap();
        assert!(matches!(msg, BridgeMessage::Command { ref command, .. } if command == "status"));

        let msg = BridgeMessage::parse_line(r#"{"bridge":"ready","version":2}"#).unwrap();
        assert!(matches!(msg, BridgeMessage::Other { .. }));
        assert_eq!(msg.body()["version"], 2);
    }

    #[test]
    fn data_received_event_carries_payload() {
        let line = r#"{"event":"data_received","id1":1,"id2":2,"id3":3,"id4":4,"v1":1.5,"v2":0,"v3":0,"v4":0,"v5":-2,"flags":3}"#;
        let msg = BridgeMessage::parse_line(line).unwrap();
        let payload = msg.payload().copied().unwrap();
        assert_eq!(payload.ids(), [1, 2, 3, 4]);
        assert_eq!(payload.value1, 1.5);
        assert_eq!(payload.value5, -2.0);
        assert_eq!(payload.flags, 3);

        let msg = BridgeMessage::parse_line(r#"{"event":"peer_lost"}"#).unwrap();
        assert!(matches!(msg, BridgeMessage::Event { payload: None, .. }));
    }

    #[test]
    fn non_object_json_is_an_error() {
        assert!(BridgeMessage::parse_line("42").is_err());
        assert!(BridgeMessage::parse_line("[1,2]").is_err());
        assert!(BridgeMessage::parse_line("ESP32 bridge booting").is_err());
    }
}
