use rcbridge_frame::{encode_csv, RCPayload, BYTE_SLOTS, FLOAT_SLOTS};
use serde::Serialize;

use crate::error::ValidationError;
use crate::registry::ChannelConfig;
use crate::value::NamedValues;

/// A channel's value as it was packed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResolvedValue {
    Byte(u8),
    Float(f32),
    Flag(bool),
}

/// One defined channel in a built packet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedChannel {
    pub key: String,
    pub label: String,
    pub value: ResolvedValue,
}

/// A payload built from named values, with the per-channel values for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Packet {
    pub payload: RCPayload,
    pub channels: Vec<ResolvedChannel>,
}

impl Packet {
    /// The payload in host-facing CSV form.
    pub fn csv(&self) -> String {
        encode_csv(&self.payload)
    }

    pub fn get(&self, key: &str) -> Option<ResolvedValue> {
        self.channels
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.value)
    }
}

impl ChannelConfig {
    /// Pack named values into a payload.
    ///
    /// Each defined slot takes the caller's value when its key is present and
    /// its frozen default otherwise. Keys with no definition are ignored.
    /// Fails without producing a packet if any supplied value cannot be
    /// converted to its slot type.
    pub fn build_packet(&self, values: &NamedValues) -> Result<Packet, ValidationError> {
        let mut ids = [0u8; BYTE_SLOTS];
        let mut floats = [0f32; FLOAT_SLOTS];
        let mut flags = 0u8;
        let mut channels = Vec::with_capacity(self.len());

        for (slot, def) in self.byte_channels() {
            let value = match values.get(&def.key) {
                Some(value) => def.resolve(value)?,
                None => def.default,
            };
            ids[slot] = value;
            channels.push(ResolvedChannel {
                key: def.key.clone(),
                label: def.label.clone(),
                value: ResolvedValue::Byte(value),
            });
        }

        for (slot, def) in self.float_channels() {
            let value = match values.get(&def.key) {
                Some(value) => def.resolve(value)?,
                None => def.default as f32,
            };
            floats[slot] = value;
            channels.push(ResolvedChannel {
                key: def.key.clone(),
                label: def.label.clone(),
                value: ResolvedValue::Float(value),
            });
        }

        for def in self.flag_channels() {
            let on = match values.get(&def.key) {
                Some(value) => def.resolve(value)?,
                None => def.default,
            };
            if on {
                flags |= def.mask();
            }
            channels.push(ResolvedChannel {
                key: def.key.clone(),
                label: def.label.clone(),
                value: ResolvedValue::Flag(on),
            });
        }

        Ok(Packet {
            payload: RCPayload::new(ids, floats, flags),
            channels,
        })
    }
}
