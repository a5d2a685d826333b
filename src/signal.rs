//! The uniform `Signal` representation (C1) — the on-the-wire and in-memory
//! shape every upstream adapter normalizes into.
//!
//! Grounded on `lumehaven/core/signal.py`'s `Signal` dataclass, extended
//! with the `signal_type`/`available` split that ADR-010 in that codebase
//! added (visible in `lumehaven/api/routes.py`'s `SignalResponse`).

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// The upstream sentinel meaning "unavailable". Normalized away by every
/// adapter and, for legacy callers, by `Signal`'s own `Deserialize` impl.
pub const UNDEF: &str = "UNDEF";
/// The other upstream sentinel meaning "unavailable".
pub const NULL: &str = "NULL";

/// Is `raw` one of the upstream's "unavailable" sentinels?
pub fn is_unavailable_sentinel(raw: &str) -> bool {
    raw == UNDEF || raw == NULL
}

/// Tagged variant over a signal's domain. Wire form is the lowercase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    String,
    Number,
    Boolean,
    Enum,
    DateTime,
}

/// Tagged union over a signal's value. Wire form is JSON's native string,
/// number, boolean, or `null` for `Absent`.
///
/// Variant order matters for `#[serde(untagged)]` deserialization: whole
/// JSON numbers must try `Integer` before `Float` falls back for
/// fractional ones, and `String` must be tried before the numeric/bool
/// variants reject it outright.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Absent,
}

impl SignalValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, SignalValue::Absent)
    }

    /// Canonical string form used as the default `display_value` when the
    /// caller doesn't supply one.
    pub fn canonical_display(&self) -> String {
        match self {
            SignalValue::String(s) => s.clone(),
            SignalValue::Integer(i) => i.to_string(),
            SignalValue::Float(f) => f.to_string(),
            SignalValue::Boolean(b) => b.to_string(),
            SignalValue::Absent => String::new(),
        }
    }
}

/// A single smart-home value, normalized to this crate's uniform shape.
///
/// Immutable after construction and value-semantic (`PartialEq` compares
/// all fields). Field order matches the wire contract's key order exactly:
/// `id, value, display_value, unit, label, available, signal_type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub id: String,
    pub value: SignalValue,
    pub display_value: String,
    pub unit: String,
    pub label: String,
    pub available: bool,
    pub signal_type: SignalType,
}

impl Signal {
    /// Construct a signal with only the required fields. `label` defaults
    /// to `id`, `unit` and `display_value` default empty (display_value is
    /// then derived from `value` unless `value` is absent), and
    /// `available` defaults to `!value.is_absent()`.
    pub fn new(id: impl Into<String>, value: SignalValue, signal_type: SignalType) -> Self {
        let id = id.into();
        let available = !value.is_absent();
        let display_value = if available {
            value.canonical_display()
        } else {
            String::new()
        };
        let label = id.clone();
        Signal {
            id,
            value,
            display_value,
            unit: String::new(),
            label,
            available,
            signal_type,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Override the default canonical `display_value`. Has no effect if
    /// the signal is unavailable (`display_value` stays `""` per the
    /// invariant).
    pub fn with_display_value(mut self, display_value: impl Into<String>) -> Self {
        if self.available {
            self.display_value = display_value.into();
        }
        self
    }

    /// Force unavailability: clears `value` to `Absent` and `display_value`
    /// to `""`, per the invariant `available = false ⇒ value = absent ∧
    /// display_value = ""`.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self.value = SignalValue::Absent;
        self.display_value = String::new();
        self
    }
}

impl<'de> Deserialize<'de> for Signal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            id: Option<String>,
            value: Option<serde_json::Value>,
            #[serde(default)]
            display_value: String,
            #[serde(default)]
            unit: String,
            #[serde(default)]
            label: String,
            #[serde(default)]
            available: Option<bool>,
            #[serde(default)]
            signal_type: Option<SignalType>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let id = raw.id.ok_or_else(|| de::Error::missing_field("id"))?;
        let raw_value = raw.value.ok_or_else(|| de::Error::missing_field("value"))?;

        // Legacy payloads encode "unavailable" as the literal strings
        // UNDEF/NULL rather than JSON null; normalize both to Absent.
        let (value, forced_unavailable) = match raw_value {
            serde_json::Value::Null => (SignalValue::Absent, true),
            serde_json::Value::String(s) if is_unavailable_sentinel(&s) => {
                (SignalValue::Absent, true)
            }
            serde_json::Value::String(s) => (SignalValue::String(s), false),
            serde_json::Value::Bool(b) => (SignalValue::Boolean(b), false),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    (SignalValue::Integer(i), false)
                } else if let Some(f) = n.as_f64() {
                    (SignalValue::Float(f), false)
                } else {
                    return Err(de::Error::custom("value: unrepresentable number"));
                }
            }
            other => {
                return Err(de::Error::custom(format!(
                    "value: unsupported JSON type {other:?}"
                )));
            }
        };

        let available = if forced_unavailable {
            false
        } else {
            raw.available.unwrap_or(!value.is_absent())
        };
        let display_value = if forced_unavailable {
            String::new()
        } else {
            raw.display_value
        };
        let label = if raw.label.is_empty() { id.clone() } else { raw.label };
        let signal_type = raw.signal_type.unwrap_or(SignalType::String);

        Ok(Signal {
            id,
            value,
            display_value,
            unit: raw.unit,
            label,
            available,
            signal_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_derives_display_value_and_availability() {
        let s = Signal::new("oh:Temp", SignalValue::Float(21.5), SignalType::Number);
        assert_eq!(s.display_value, "21.5");
        assert!(s.available);
        assert_eq!(s.label, "oh:Temp");
    }

    #[test]
    fn new_with_absent_value_has_no_display_value() {
        let s = Signal::new("oh:Temp", SignalValue::Absent, SignalType::Number);
        assert!(!s.available);
        assert_eq!(s.display_value, "");
    }

    #[test]
    fn unavailable_clears_value_and_display() {
        let s = Signal::new("oh:Temp", SignalValue::Float(21.5), SignalType::Number).unavailable();
        assert!(!s.available);
        assert_eq!(s.value, SignalValue::Absent);
        assert_eq!(s.display_value, "");
    }

    #[test]
    fn serialize_uses_lowercase_signal_type() {
        let s = Signal::new("a", SignalValue::Boolean(true), SignalType::Boolean);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["signal_type"], "boolean");
        assert_eq!(json["value"], true);
    }

    #[test]
    fn serialize_absent_value_is_null() {
        let s = Signal::new("a", SignalValue::Absent, SignalType::Number);
        let json = serde_json::to_value(&s).unwrap();
        assert!(json["value"].is_null());
    }

    #[test]
    fn deserialize_requires_id_and_value() {
        let err = serde_json::from_str::<Signal>(r#"{"id":"a"}"#).unwrap_err();
        assert!(err.to_string().contains("value"));

        let err = serde_json::from_str::<Signal>(r#"{"value":"x"}"#).unwrap_err();
        assert!(err.to_string().contains("id"));
    }

    #[test]
    fn deserialize_defaults_signal_type_to_string() {
        let s: Signal = serde_json::from_str(r#"{"id":"a","value":"hi"}"#).unwrap();
        assert_eq!(s.signal_type, SignalType::String);
        assert_eq!(s.label, "a");
    }

    #[test]
    fn deserialize_normalizes_legacy_undef_and_null() {
        let s: Signal = serde_json::from_str(r#"{"id":"a","value":"UNDEF"}"#).unwrap();
        assert!(!s.available);
        assert_eq!(s.value, SignalValue::Absent);

        let s: Signal = serde_json::from_str(r#"{"id":"a","value":"NULL"}"#).unwrap();
        assert!(!s.available);
        assert_eq!(s.value, SignalValue::Absent);
    }

    #[test]
    fn deserialize_json_null_value_is_absent() {
        let s: Signal = serde_json::from_str(r#"{"id":"a","value":null}"#).unwrap();
        assert!(!s.available);
        assert_eq!(s.value, SignalValue::Absent);
    }

    #[test]
    fn round_trip_identity_for_well_formed_signal() {
        let original = Signal::new("oh:Temp", SignalValue::Float(21.5), SignalType::Number)
            .with_unit("°C")
            .with_label("Living Room");

        let json = serde_json::to_string(&original).unwrap();
        let restored: Signal = serde_json::from_str(&json).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn round_trip_identity_for_integer_number() {
        let original = Signal::new("oh:Count", SignalValue::Integer(3), SignalType::Number);
        let json = serde_json::to_string(&original).unwrap();
        let restored: Signal = serde_json::from_str(&json).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn round_trip_identity_for_unavailable_signal() {
        let original = Signal::new("oh:Temp", SignalValue::Float(1.0), SignalType::Number)
            .with_unit("°C")
            .unavailable();
        let json = serde_json::to_string(&original).unwrap();
        let restored: Signal = serde_json::from_str(&json).unwrap();
        assert_eq!(original, restored);
    }
}
