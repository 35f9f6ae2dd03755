use serde::{Deserialize, Serialize};

/// Size of the packed binary form: 4 ids + 5 little-endian f32 + flags.
pub const PAYLOAD_SIZE: usize = 25;

/// Number of 8-bit id slots.
pub const BYTE_SLOTS: usize = 4;

/// Number of float value slots.
pub const FLOAT_SLOTS: usize = 5;

/// Number of flag bits.
pub const FLAG_BITS: usize = 8;

/// The fixed remote-control data unit exchanged with a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RCPayload {
    pub id1: u8,
    pub id2: u8,
    pub id3: u8,
    pub id4: u8,
    pub value1: f32,
    pub value2: f32,
    pub value3: f32,
    pub value4: f32,
    pub value5: f32,
    pub flags: u8,
}

impl RCPayload {
    /// Build a payload from slot arrays.
    pub fn new(ids: [u8; BYTE_SLOTS], values: [f32; FLOAT_SLOTS], flags: u8) -> Self {
        let [id1, id2, id3, id4] = ids;
        let [value1, value2, value3, value4, value5] = values;
        Self {
            id1,
            id2,
            id3,
            id4,
            value1,
            value2,
            value3,
            value4,
            value5,
            flags,
        }
    }

    /// The id slots in wire order.
    pub fn ids(&self) -> [u8; BYTE_SLOTS] {
        [self.id1, self.id2, self.id3, self.id4]
    }

    /// The value slots in wire order.
    pub fn values(&self) -> [f32; FLOAT_SLOTS] {
        [self.value1, self.value2, self.value3, self.value4, self.value5]
    }

    /// Whether flag `bit` is set. Bits outside 0-7 are never set.
    pub fn flag(&self, bit: u8) -> bool {
        bit < FLAG_BITS as u8 && self.flags & (1 << bit) != 0
    }
}
