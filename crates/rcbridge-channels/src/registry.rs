use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use rcbridge_frame::{BYTE_SLOTS, FLAG_BITS, FLOAT_SLOTS};
use serde::Serialize;
use tracing::debug;

use crate::config::{ByteEntry, ChannelFile, FlagEntry, FloatEntry, LoadConfig};
use crate::error::{ConfigError, Result, ValidationError};
use crate::value::{ChannelValue, NamedValues};

/// Bounds applied to float channels that do not declare their own.
pub const DEFAULT_FLOAT_MIN: f64 = -1000.0;
pub const DEFAULT_FLOAT_MAX: f64 = 1000.0;

/// Smallest float step; finer steps are raised to this.
pub const MIN_FLOAT_STEP: f64 = 0.01;

/// Most decimal places a float channel is rounded to.
pub const MAX_FLOAT_DECIMALS: u8 = 2;

/// An 8-bit id slot bound to a name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ByteChannel {
    pub key: String,
    pub label: String,
    pub min: u8,
    pub max: u8,
    pub default: u8,
}

/// A float value slot bound to a name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloatChannel {
    pub key: String,
    pub label: String,
    pub min: f64,
    pub max: f64,
    /// Already clamped and rounded.
    pub default: f64,
    pub step: f64,
    pub decimals: u8,
}

/// One flag bit bound to a name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlagChannel {
    pub key: String,
    pub label: String,
    pub bit: u8,
    pub default: bool,
}

/// Which wire slot group a channel belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Byte,
    Float,
    Flag,
}

impl ByteChannel {
    /// Truncate toward zero, then clamp into bounds.
    pub fn resolve(&self, value: &ChannelValue) -> std::result::Result<u8, ValidationError> {
        let number = numeric(&self.key, value)?;
        let clamped = number
            .trunc()
            .clamp(f64::from(self.min), f64::from(self.max));
        Ok(clamped as u8)
    }
}

impl FloatChannel {
    /// Clamp into bounds, then round to the channel precision.
    pub fn resolve(&self, value: &ChannelValue) -> std::result::Result<f32, ValidationError> {
        let number = numeric(&self.key, value)?;
        Ok(round_to(number.clamp(self.min, self.max), self.decimals) as f32)
    }
}

impl FlagChannel {
    pub fn resolve(&self, value: &ChannelValue) -> std::result::Result<bool, ValidationError> {
        if let ChannelValue::Float(v) = value {
            if !v.is_finite() {
                return Err(ValidationError::NonFinite {
                    key: self.key.clone(),
                });
            }
        }
        value.as_bool().ok_or_else(|| ValidationError::NotBoolean {
            key: self.key.clone(),
            value: value.to_string(),
        })
    }

    pub fn mask(&self) -> u8 {
        1 << self.bit
    }
}

fn numeric(key: &str, value: &ChannelValue) -> std::result::Result<f64, ValidationError> {
    let number = value.as_number().ok_or_else(|| ValidationError::NotNumeric {
        key: key.to_string(),
        value: value.to_string(),
    })?;
    if !number.is_finite() {
        return Err(ValidationError::NonFinite {
            key: key.to_string(),
        });
    }
    Ok(number)
}

/// Round half away from zero to `decimals` places.
pub(crate) fn round_to(value: f64, decimals: u8) -> f64 {
    let scale = 10f64.powi(i32::from(decimals));
    (value * scale).round() / scale
}

/// Named channels mapped onto the fixed payload slots.
///
/// Immutable once loaded. Slots without a definition are unavailable and
/// always contribute zero (ids and values) or a cleared bit (flags).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChannelConfig {
    bytes: [Option<ByteChannel>; BYTE_SLOTS],
    floats: [Option<FloatChannel>; FLOAT_SLOTS],
    flags: Vec<FlagChannel>,
}

impl ChannelConfig {
    /// Load and validate definitions from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_file_with_config(path, LoadConfig::default())
    }

    /// Load from a file with explicit limits.
    pub fn from_file_with_config(path: &Path, config: LoadConfig) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|err| ConfigError::LoadFailed(format!("{}: {err}", path.display())))?;
        let metadata = file
            .metadata()
            .map_err(|err| ConfigError::LoadFailed(err.to_string()))?;
        if !metadata.is_file() {
            return Err(ConfigError::LoadFailed(format!(
                "{}: not a regular file",
                path.display()
            )));
        }
        if metadata.len() > config.max_file_size as u64 {
            return Err(ConfigError::TooLarge {
                size: metadata.len(),
                max: config.max_file_size,
            });
        }

        let read_limit = u64::try_from(config.max_file_size.saturating_add(1)).unwrap_or(u64::MAX);
        let mut content = String::new();
        file.take(read_limit)
            .read_to_string(&mut content)
            .map_err(|err| {
                ConfigError::LoadFailed(format!("failed reading {}: {err}", path.display()))
            })?;
        if content.len() > config.max_file_size {
            return Err(ConfigError::TooLarge {
                size: content.len() as u64,
                max: config.max_file_size,
            });
        }

        let loaded = Self::from_json_str(&content)?;
        debug!(path = %path.display(), channels = loaded.len(), "loaded channel file");
        Ok(loaded)
    }

    /// Parse and validate definitions from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: ChannelFile = serde_json::from_str(json)?;
        Self::from_channel_file(&file)
    }

    /// Validate a parsed definition file.
    pub fn from_channel_file(file: &ChannelFile) -> Result<Self> {
        check_count("byte", file.bytes.len(), BYTE_SLOTS)?;
        check_count("float", file.floats.len(), FLOAT_SLOTS)?;
        check_count("flag", file.flags.len(), FLAG_BITS)?;

        let mut keys = HashSet::new();
        let mut config = Self::default();

        for (index, entry) in file.bytes.iter().enumerate() {
            claim_key(&mut keys, "byte", index, &entry.key)?;
            config.bytes[index] = Some(byte_channel(entry)?);
        }
        for (index, entry) in file.floats.iter().enumerate() {
            claim_key(&mut keys, "float", index, &entry.key)?;
            config.floats[index] = Some(float_channel(entry)?);
        }
        for (index, entry) in file.flags.iter().enumerate() {
            claim_key(&mut keys, "flag", index, &entry.key)?;
        }
        config.flags = flag_channels(&file.flags)?;

        Ok(config)
    }

    /// Byte channels with their slot index.
    pub fn byte_channels(&self) -> impl Iterator<Item = (usize, &ByteChannel)> {
        self.bytes
            .iter()
            .enumerate()
            .filter_map(|(slot, def)| def.as_ref().map(|def| (slot, def)))
    }

    /// Float channels with their slot index.
    pub fn float_channels(&self) -> impl Iterator<Item = (usize, &FloatChannel)> {
        self.floats
            .iter()
            .enumerate()
            .filter_map(|(slot, def)| def.as_ref().map(|def| (slot, def)))
    }

    /// Flag channels in definition order.
    pub fn flag_channels(&self) -> &[FlagChannel] {
        &self.flags
    }

    /// Number of defined channels.
    pub fn len(&self) -> usize {
        self.byte_channels().count() + self.float_channels().count() + self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every defined key: bytes, then floats, then flags.
    pub fn keys(&self) -> Vec<&str> {
        self.byte_channels()
            .map(|(_, c)| c.key.as_str())
            .chain(self.float_channels().map(|(_, c)| c.key.as_str()))
            .chain(self.flags.iter().map(|c| c.key.as_str()))
            .collect()
    }

    pub fn kind_of(&self, key: &str) -> Option<ChannelKind> {
        if self.byte_channels().any(|(_, c)| c.key == key) {
            Some(ChannelKind::Byte)
        } else if self.float_channels().any(|(_, c)| c.key == key) {
            Some(ChannelKind::Float)
        } else if self.flags.iter().any(|c| c.key == key) {
            Some(ChannelKind::Flag)
        } else {
            None
        }
    }

    /// True if `key` names a flag channel.
    pub fn is_flag(&self, key: &str) -> bool {
        self.kind_of(key) == Some(ChannelKind::Flag)
    }

    /// The frozen default of every defined channel.
    pub fn default_values(&self) -> NamedValues {
        let mut values = NamedValues::new();
        for (_, c) in self.byte_channels() {
            values.insert(c.key.clone(), ChannelValue::Int(i64::from(c.default)));
        }
        for (_, c) in self.float_channels() {
            values.insert(c.key.clone(), ChannelValue::Float(c.default));
        }
        for c in &self.flags {
            values.insert(c.key.clone(), ChannelValue::Bool(c.default));
        }
        values
    }

    /// Check that `value` can be packed into the channel named `key`.
    pub fn check_value(
        &self,
        key: &str,
        value: &ChannelValue,
    ) -> std::result::Result<(), ValidationError> {
        if let Some((_, c)) = self.byte_channels().find(|(_, c)| c.key == key) {
            return c.resolve(value).map(|_| ());
        }
        if let Some((_, c)) = self.float_channels().find(|(_, c)| c.key == key) {
            return c.resolve(value).map(|_| ());
        }
        if let Some(c) = self.flags.iter().find(|c| c.key == key) {
            return c.resolve(value).map(|_| ());
        }
        Err(ValidationError::UnknownChannel(key.to_string()))
    }
}

fn check_count(group: &'static str, count: usize, max: usize) -> Result<()> {
    if count > max {
        return Err(ConfigError::TooManyChannels { group, count, max });
    }
    Ok(())
}

fn claim_key(
    keys: &mut HashSet<String>,
    group: &'static str,
    index: usize,
    key: &str,
) -> Result<()> {
    if key.trim().is_empty() {
        return Err(ConfigError::EmptyKey { group, index });
    }
    if !keys.insert(key.to_string()) {
        return Err(ConfigError::DuplicateKey(key.to_string()));
    }
    Ok(())
}

fn label_of(key: &str, label: &Option<String>) -> String {
    label.clone().unwrap_or_else(|| key.to_string())
}

fn byte_bound(key: &str, value: i64) -> Result<u8> {
    u8::try_from(value).map_err(|_| ConfigError::ByteOutOfRange {
        key: key.to_string(),
        value,
    })
}

fn byte_channel(entry: &ByteEntry) -> Result<ByteChannel> {
    let min = byte_bound(&entry.key, entry.min.unwrap_or(0))?;
    let max = byte_bound(&entry.key, entry.max.unwrap_or(255))?;
    if min > max {
        return Err(ConfigError::InvalidBounds {
            key: entry.key.clone(),
            min: f64::from(min),
            max: f64::from(max),
        });
    }
    let default = entry
        .default
        .unwrap_or(0)
        .clamp(i64::from(min), i64::from(max)) as u8;

    Ok(ByteChannel {
        key: entry.key.clone(),
        label: label_of(&entry.key, &entry.label),
        min,
        max,
        default,
    })
}

fn float_channel(entry: &FloatEntry) -> Result<FloatChannel> {
    let min = entry.min.unwrap_or(DEFAULT_FLOAT_MIN);
    let max = entry.max.unwrap_or(DEFAULT_FLOAT_MAX);
    // Packed as f32; the default is clamped into these bounds below.
    if !fits_f32(min) || !fits_f32(max) || min > max {
        return Err(ConfigError::InvalidBounds {
            key: entry.key.clone(),
            min,
            max,
        });
    }

    let step = entry
        .step
        .filter(|s| s.is_finite())
        .unwrap_or(MIN_FLOAT_STEP)
        .max(MIN_FLOAT_STEP);
    let decimals = match entry.decimals {
        Some(d) => d.min(u32::from(MAX_FLOAT_DECIMALS)) as u8,
        None => decimals_for_step(step),
    };
    let default = round_to(entry.default.unwrap_or(0.0).clamp(min, max), decimals);

    Ok(FloatChannel {
        key: entry.key.clone(),
        label: label_of(&entry.key, &entry.label),
        min,
        max,
        default,
        step,
        decimals,
    })
}

fn fits_f32(value: f64) -> bool {
    value.is_finite() && (f64::from(f32::MIN)..=f64::from(f32::MAX)).contains(&value)
}

/// Fewest decimal places (up to two) that represent `step` exactly.
fn decimals_for_step(step: f64) -> u8 {
    (0..=MAX_FLOAT_DECIMALS)
        .find(|d| {
            let scaled = step * 10f64.powi(i32::from(*d));
            (scaled - scaled.round()).abs() < 1e-9
        })
        .unwrap_or(MAX_FLOAT_DECIMALS)
}

/// Reserve explicit bits first, then give the rest the lowest free bit in
/// definition order.
fn flag_channels(entries: &[FlagEntry]) -> Result<Vec<FlagChannel>> {
    let mut taken = [false; FLAG_BITS];
    let mut bits: Vec<Option<u8>> = Vec::with_capacity(entries.len());

    for entry in entries {
        let Some(raw) = entry.bit else {
            bits.push(None);
            continue;
        };
        let bit = u8::try_from(raw)
            .ok()
            .filter(|b| usize::from(*b) < FLAG_BITS)
            .ok_or_else(|| ConfigError::BitOutOfRange {
                key: entry.key.clone(),
                bit: raw,
            })?;
        if taken[usize::from(bit)] {
            return Err(ConfigError::DuplicateBit {
                key: entry.key.clone(),
                bit,
            });
        }
        taken[usize::from(bit)] = true;
        bits.push(Some(bit));
    }

    let mut channels = Vec::with_capacity(entries.len());
    for (entry, bit) in entries.iter().zip(bits) {
        let bit = match bit {
            Some(bit) => bit,
            None => {
                let free = taken.iter().position(|t| !t).ok_or(ConfigError::TooManyChannels {
                    group: "flag",
                    count: entries.len(),
                    max: FLAG_BITS,
                })?;
                taken[free] = true;
                free as u8
            }
        };
        channels.push(FlagChannel {
            key: entry.key.clone(),
            label: label_of(&entry.key, &entry.label),
            bit,
            default: entry.default.unwrap_or(false),
        });
    }
    Ok(channels)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "rcbridge-channels-{tag}-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn defaults_for_unspecified_bounds() {
        let config =
            ChannelConfig::from_json_str(r#"{"bytes":[{"key":"id"}],"floats":[{"key":"kp"}]}"#)
                .unwrap();
        let (_, byte) = config.byte_channels().next().unwrap();
        assert_eq!((byte.min, byte.max, byte.default), (0, 255, 0));
        assert_eq!(byte.label, "id");

        let (_, float) = config.float_channels().next().unwrap();
        assert_eq!((float.min, float.max), (-1000.0, 1000.0));
        assert_eq!(float.step, 0.01);
        assert_eq!(float.decimals, 2);
    }

    #[test]
    fn defaults_are_clamped_at_load() {
        let config = ChannelConfig::from_json_str(
            r#"{"bytes":[{"key":"b","min":10,"max":20,"default":3}],
                "floats":[{"key":"f","min":-1,"max":1,"default":7.5}]}"#,
        )
        .unwrap();
        let values = config.default_values();
        assert_eq!(values["b"], ChannelValue::Int(10));
        assert_eq!(values["f"], ChannelValue::Float(1.0));
    }

    #[test]
    fn precision_from_step_or_decimals() {
        let config = ChannelConfig::from_json_str(
            r#"{"floats":[
                {"key":"a","step":1},
                {"key":"b","step":0.5},
                {"key":"c","step":0.05},
                {"key":"d","step":0.001},
                {"key":"e","decimals":7}
            ]}"#,
        )
        .unwrap();
        let decimals: Vec<u8> = config.float_channels().map(|(_, c)| c.decimals).collect();
        assert_eq!(decimals, vec![0, 1, 2, 2, 2]);
        let (_, d) = config.float_channels().nth(3).unwrap();
        assert_eq!(d.step, 0.01);
    }

    #[test]
    fn rejects_too_many_channels() {
        let err = ChannelConfig::from_json_str(
            r#"{"bytes":[{"key":"a"},{"key":"b"},{"key":"c"},{"key":"d"},{"key":"e"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::TooManyChannels {
                group: "byte",
                count: 5,
                max: 4
            }
        ));

        let flags: Vec<String> = (0..9).map(|i| format!(r#"{{"key":"f{i}"}}"#)).collect();
        let json = format!(r#"{{"flags":[{}]}}"#, flags.join(","));
        assert!(matches!(
            ChannelConfig::from_json_str(&json),
            Err(ConfigError::TooManyChannels { group: "flag", .. })
        ));
    }

    #[test]
    fn rejects_inverted_bounds() {
        let err = ChannelConfig::from_json_str(r#"{"floats":[{"key":"x","min":5,"max":1}]}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBounds { ref key, .. } if key == "x"));

        let err = ChannelConfig::from_json_str(r#"{"bytes":[{"key":"y","min":9,"max":2}]}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBounds { .. }));
    }

    #[test]
    fn rejects_float_bounds_outside_f32() {
        let err = ChannelConfig::from_json_str(r#"{"floats":[{"key":"big","max":1e300}]}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBounds { ref key, .. } if key == "big"));

        let err = ChannelConfig::from_json_str(
            r#"{"floats":[{"key":"low","min":-1e39,"max":0,"default":-1e39}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBounds { ref key, .. } if key == "low"));

        let config = ChannelConfig::from_json_str(
            r#"{"floats":[{"key":"wide","min":-3e38,"max":3e38,"default":1e300}]}"#,
        )
        .unwrap();
        let packet = config.build_packet(&NamedValues::new()).unwrap();
        assert!(packet.payload.value1.is_finite());
    }

    #[test]
    fn rejects_byte_bounds_outside_u8() {
        let err = ChannelConfig::from_json_str(r#"{"bytes":[{"key":"y","max":300}]}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ByteOutOfRange { value: 300, .. }
        ));
    }

    #[test]
    fn rejects_duplicate_and_empty_keys() {
        let err = ChannelConfig::from_json_str(
            r#"{"bytes":[{"key":"speed"}],"floats":[{"key":"speed"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateKey(ref k) if k == "speed"));

        let err = ChannelConfig::from_json_str(r#"{"flags":[{"key":" "}]}"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::EmptyKey {
                group: "flag",
                index: 0
            }
        ));
    }

    #[test]
    fn auto_bits_take_lowest_free_after_explicit() {
        let config = ChannelConfig::from_json_str(
            r#"{"flags":[{"key":"a"},{"key":"b","bit":0},{"key":"c"},{"key":"d","bit":2}]}"#,
        )
        .unwrap();
        let bits: Vec<(&str, u8)> = config
            .flag_channels()
            .iter()
            .map(|c| (c.key.as_str(), c.bit))
            .collect();
        assert_eq!(bits, vec![("a", 1), ("b", 0), ("c", 3), ("d", 2)]);
    }

    #[test]
    fn rejects_bit_collisions_and_overflow() {
        let err = ChannelConfig::from_json_str(
            r#"{"flags":[{"key":"a","bit":3},{"key":"b","bit":3}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateBit { bit: 3, ref key } if key == "b"));

        let err = ChannelConfig::from_json_str(r#"{"flags":[{"key":"a","bit":8}]}"#).unwrap_err();
        assert!(matches!(err, ConfigError::BitOutOfRange { bit: 8, .. }));

        let err = ChannelConfig::from_json_str(r#"{"flags":[{"key":"a","bit":-1}]}"#).unwrap_err();
        assert!(matches!(err, ConfigError::BitOutOfRange { bit: -1, .. }));
    }

    #[test]
    fn lookup_helpers() {
        let config = ChannelConfig::from_json_str(
            r#"{"bytes":[{"key":"mode"}],"floats":[{"key":"kp"}],"flags":[{"key":"arm"}]}"#,
        )
        .unwrap();
        assert_eq!(config.keys(), vec!["mode", "kp", "arm"]);
        assert_eq!(config.len(), 3);
        assert!(config.is_flag("arm"));
        assert!(!config.is_flag("kp"));
        assert_eq!(config.kind_of("kp"), Some(ChannelKind::Float));
        assert_eq!(config.kind_of("nope"), None);

        assert!(config.check_value("kp", &ChannelValue::Float(1.0)).is_ok());
        assert!(matches!(
            config.check_value("kp", &ChannelValue::Text("fast".into())),
            Err(ValidationError::NotNumeric { .. })
        ));
        assert!(matches!(
            config.check_value("arm", &ChannelValue::Text("maybe".into())),
            Err(ValidationError::NotBoolean { .. })
        ));
        assert!(matches!(
            config.check_value("nope", &ChannelValue::Int(1)),
            Err(ValidationError::UnknownChannel(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = temp_dir("load");
        let path = dir.join("channels.json");
        std::fs::write(&path, r#"{"floats":[{"key":"speed","min":0,"max":100}]}"#).unwrap();

        let config = ChannelConfig::from_file(&path).unwrap();
        assert_eq!(config.keys(), vec!["speed"]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn rejects_oversized_file() {
        let dir = temp_dir("oversized");
        let path = dir.join("channels.json");
        std::fs::write(&path, format!(r#"{{"bytes":[],"pad":"{}"}}"#, "x".repeat(256))).unwrap();

        let err = ChannelConfig::from_file_with_config(&path, LoadConfig { max_file_size: 64 })
            .unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge { max: 64, .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_fails_to_load() {
        let err = ChannelConfig::from_file(Path::new("/nonexistent/rcbridge/channels.json"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::LoadFailed(_)));
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(
            ChannelConfig::from_json_str("{not json"),
            Err(ConfigError::InvalidJson(_))
        ));
    }
}
