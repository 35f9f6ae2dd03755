use serde::{Deserialize, Serialize};

/// Limits applied while loading a channel definition file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadConfig {
    /// Maximum bytes read from a definition file.
    pub max_file_size: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 256 * 1024,
        }
    }
}

/// On-disk shape of a channel definition file.
///
/// ```json
/// {
///   "bytes":  [{"key": "mode", "label": "Mode", "min": 0, "max": 3, "default": 1}],
///   "floats": [{"key": "kp", "min": 0, "max": 50, "step": 0.05, "default": 12.5}],
///   "flags":  [{"key": "arm", "bit": 0}, {"key": "lights"}]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelFile {
    pub bytes: Vec<ByteEntry>,
    pub floats: Vec<FloatEntry>,
    pub flags: Vec<FlagEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ByteEntry {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatEntry {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<f64>,
    /// UI increment; also fixes the rounding precision when `decimals` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagEntry {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_groups_default_to_empty() {
        let file: ChannelFile = serde_json::from_str(r#"{"floats":[{"key":"kp"}]}"#).unwrap();
        assert!(file.bytes.is_empty());
        assert!(file.flags.is_empty());
        assert_eq!(file.floats[0].key, "kp");
        assert_eq!(file.floats[0].step, None);
    }

    #[test]
    fn key_is_required() {
        assert!(serde_json::from_str::<ChannelFile>(r#"{"bytes":[{"min":0}]}"#).is_err());
    }

    #[test]
    fn load_config_defaults() {
        assert_eq!(LoadConfig::default().max_file_size, 262_144);
    }
}
