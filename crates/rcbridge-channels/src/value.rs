use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A caller-supplied value for one named channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Caller-supplied values keyed by channel name.
pub type NamedValues = BTreeMap<String, ChannelValue>;

impl ChannelValue {
    /// Numeric view of the value, if it has one. Text is parsed.
    pub(crate) fn as_number(&self) -> Option<f64> {
        match self {
            ChannelValue::Int(v) => Some(*v as f64),
            ChannelValue::Float(v) => Some(*v),
            ChannelValue::Text(s) => s.trim().parse::<f64>().ok(),
            ChannelValue::Bool(_) => None,
        }
    }

    /// Boolean view of the value, if it has one.
    pub(crate) fn as_bool(&self) -> Option<bool> {
        match self {
            ChannelValue::Bool(v) => Some(*v),
            ChannelValue::Int(v) => Some(*v != 0),
            ChannelValue::Float(v) => Some(*v != 0.0),
            ChannelValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "on" | "yes" | "1" => Some(true),
                "false" | "off" | "no" | "0" => Some(false),
                _ => None,
            },
        }
    }
}

impl fmt::Display for ChannelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelValue::Bool(v) => write!(f, "{v}"),
            ChannelValue::Int(v) => write!(f, "{v}"),
            ChannelValue::Float(v) => write!(f, "{v}"),
            ChannelValue::Text(s) => write!(f, "'{s}'"),
        }
    }
}

/// Parses `true`/`false`, then integers, then floats; anything else is text.
impl FromStr for ChannelValue {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(match trimmed {
            "true" => ChannelValue::Bool(true),
            "false" => ChannelValue::Bool(false),
            _ => {
                if let Ok(v) = trimmed.parse::<i64>() {
                    ChannelValue::Int(v)
                } else if let Ok(v) = trimmed.parse::<f64>() {
                    ChannelValue::Float(v)
                } else {
                    ChannelValue::Text(trimmed.to_string())
                }
            }
        })
    }
}

impl From<bool> for ChannelValue {
    fn from(v: bool) -> Self {
        ChannelValue::Bool(v)
    }
}

impl From<i64> for ChannelValue {
    fn from(v: i64) -> Self {
        ChannelValue::Int(v)
    }
}

impl From<i32> for ChannelValue {
    fn from(v: i32) -> Self {
        ChannelValue::Int(v.into())
    }
}

impl From<u8> for ChannelValue {
    fn from(v: u8) -> Self {
        ChannelValue::Int(v.into())
    }
}

impl From<f64> for ChannelValue {
    fn from(v: f64) -> Self {
        ChannelValue::Float(v)
    }
}

impl From<f32> for ChannelValue {
    fn from(v: f32) -> Self {
        ChannelValue::Float(v.into())
    }
}

impl From<&str> for ChannelValue {
    fn from(v: &str) -> Self {
        ChannelValue::Text(v.to_string())
    }
}

impl From<String> for ChannelValue {
    fn from(v: String) -> Self {
        ChannelValue::Text(v)
    }
}

/// Split a `key=value` assignment.
pub fn parse_assignment(text: &str) -> Option<(String, ChannelValue)> {
    let (key, value) = text.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let Ok(value) = value.parse::<ChannelValue>();
    Some((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_most_specific_type() {
        assert_eq!("true".parse::<ChannelValue>().unwrap(), ChannelValue::Bool(true));
        assert_eq!("12".parse::<ChannelValue>().unwrap(), ChannelValue::Int(12));
        assert_eq!("0.85".parse::<ChannelValue>().unwrap(), ChannelValue::Float(0.85));
        assert_eq!(
            "fast".parse::<ChannelValue>().unwrap(),
            ChannelValue::Text("fast".to_string())
        );
    }

    #[test]
    fn assignment_splits_on_first_equals() {
        assert_eq!(
            parse_assignment("speed = 35.5"),
            Some(("speed".to_string(), ChannelValue::Float(35.5)))
        );
        assert_eq!(
            parse_assignment("note=a=b"),
            Some(("note".to_string(), ChannelValue::Text("a=b".to_string())))
        );
        assert_eq!(parse_assignment("no_equals"), None);
        assert_eq!(parse_assignment("=5"), None);
    }

    #[test]
    fn deserializes_untagged_json() {
        let values: NamedValues =
            serde_json::from_str(r#"{"a":true,"b":3,"c":1.5,"d":"x"}"#).unwrap();
        assert_eq!(values["a"], ChannelValue::Bool(true));
        assert_eq!(values["b"], ChannelValue::Int(3));
        assert_eq!(values["c"], ChannelValue::Float(1.5));
        assert_eq!(values["d"], ChannelValue::Text("x".to_string()));
    }

    #[test]
    fn conversions() {
        assert_eq!(ChannelValue::Text(" 7 ".to_string()).as_number(), Some(7.0));
        assert_eq!(ChannelValue::Bool(true).as_number(), None);
        assert_eq!(ChannelValue::Text("ON".to_string()).as_bool(), Some(true));
        assert_eq!(ChannelValue::Int(0).as_bool(), Some(false));
        assert_eq!(ChannelValue::Text("maybe".to_string()).as_bool(), None);
    }
}
