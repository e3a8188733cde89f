//! Core value model for tfplug
//!
//! Configuration, plans and state all travel as [`DynamicValue`] objects.
//! Providers read and write them through the typed accessors rather than by
//! matching on [`Dynamic`] directly.

use crate::error::{Result, TfplugError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// msgpack extension type carrying an unknown value. No string, number or
/// container decodes to it.
const UNKNOWN_EXT_TYPE: i8 = 0;

/// A single declarative value
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    Null,
    Bool(bool),
    /// All numbers are f64
    Number(f64),
    String(String),
    List(Vec<Dynamic>),
    /// Objects are maps with string keys
    Map(HashMap<String, Dynamic>),
    /// Not known until apply
    Unknown,
}

impl Dynamic {
    pub fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Null => "null",
            Dynamic::Bool(_) => "bool",
            Dynamic::Number(_) => "number",
            Dynamic::String(_) => "string",
            Dynamic::List(_) => "list",
            Dynamic::Map(_) => "map",
            Dynamic::Unknown => "unknown",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Dynamic::String(s) => Some(s),
            _ => None,
        }
    }

    /// True if this value or anything nested in it is unknown
    pub fn contains_unknown(&self) -> bool {
        match self {
            Dynamic::Unknown => true,
            Dynamic::List(items) => items.iter().any(Dynamic::contains_unknown),
            Dynamic::Map(map) => map.values().any(Dynamic::contains_unknown),
            _ => false,
        }
    }
}

impl From<&str> for Dynamic {
    fn from(s: &str) -> Self {
        Dynamic::String(s.to_string())
    }
}

impl From<String> for Dynamic {
    fn from(s: String) -> Self {
        Dynamic::String(s)
    }
}

impl From<bool> for Dynamic {
    fn from(b: bool) -> Self {
        Dynamic::Bool(b)
    }
}

impl Serialize for Dynamic {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Dynamic::Null => serializer.serialize_unit(),
            Dynamic::Bool(b) => serializer.serialize_bool(*b),
            Dynamic::Number(n) => serializer.serialize_f64(*n),
            Dynamic::String(s) => serializer.serialize_str(s),
            Dynamic::List(items) => items.serialize(serializer),
            Dynamic::Map(map) => map.serialize(serializer),
            Dynamic::Unknown => serializer.serialize_newtype_struct(
                rmp_serde::MSGPACK_EXT_STRUCT_NAME,
                &(UNKNOWN_EXT_TYPE, ExtPayload(&[0])),
            ),
        }
    }
}

/// Raw bytes of a msgpack extension value
struct ExtPayload<'a>(&'a [u8]);

impl Serialize for ExtPayload<'_> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(self.0)
    }
}

impl<'de> Deserialize<'de> for Dynamic {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{Error, MapAccess, SeqAccess, Visitor};
        use std::fmt;

        struct DynamicVisitor;

        impl<'de> Visitor<'de> for DynamicVisitor {
            type Value = Dynamic;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a declarative value")
            }

            fn visit_unit<E: Error>(self) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Null)
            }

            fn visit_none<E: Error>(self) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Null)
            }

            fn visit_bool<E: Error>(self, v: bool) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Bool(v))
            }

            fn visit_i64<E: Error>(self, v: i64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(v as f64))
            }

            fn visit_u64<E: Error>(self, v: u64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(v as f64))
            }

            fn visit_f64<E: Error>(self, v: f64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(v))
            }

            fn visit_str<E: Error>(self, v: &str) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::String(v.to_string()))
            }

            // rmp-serde hands extension values over as a newtype of (type, bytes).
            fn visit_newtype_struct<N>(
                self,
                deserializer: N,
            ) -> std::result::Result<Dynamic, N::Error>
            where
                N: serde::Deserializer<'de>,
            {
                let (ext_type, _payload): (i8, serde::de::IgnoredAny) =
                    Deserialize::deserialize(deserializer)?;
                if ext_type == UNKNOWN_EXT_TYPE {
                    Ok(Dynamic::Unknown)
                } else {
                    Err(N::Error::custom(format!(
                        "unsupported msgpack extension type {}",
                        ext_type
                    )))
                }
            }

            fn visit_seq<A: SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> std::result::Result<Dynamic, A::Error> {
                let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(item) = seq.next_element()? {
                    items.push(item);
                }
                Ok(Dynamic::List(items))
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Dynamic, A::Error> {
                let mut map = HashMap::new();
                while let Some((key, value)) = access.next_entry::<String, Dynamic>()? {
                    map.insert(key, value);
                }
                Ok(Dynamic::Map(map))
            }
        }

        deserializer.deserialize_any(DynamicVisitor)
    }
}

/// Root of a configuration, plan or state object
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicValue {
    pub value: Dynamic,
}

impl DynamicValue {
    pub fn new(value: Dynamic) -> Self {
        Self { value }
    }

    pub fn null() -> Self {
        Self::new(Dynamic::Null)
    }

    /// Build an object from attribute name/value pairs
    pub fn object<K, I>(attributes: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Dynamic)>,
    {
        Self::new(Dynamic::Map(
            attributes
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
        ))
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, Dynamic::Null)
    }

    pub fn get(&self, path: &AttributePath) -> Result<&Dynamic> {
        let mut current = &self.value;

        for step in &path.steps {
            current = match (current, step) {
                (Dynamic::Map(map), AttributePathStep::AttributeName(name)) => map
                    .get(name)
                    .ok_or_else(|| TfplugError::AttributeNotFound(path.to_string()))?,
                (Dynamic::List(items), AttributePathStep::ElementKeyInt(idx)) => {
                    usize::try_from(*idx)
                        .ok()
                        .and_then(|idx| items.get(idx))
                        .ok_or_else(|| TfplugError::AttributeNotFound(path.to_string()))?
                }
                (other, _) => {
                    return Err(TfplugError::TypeMismatch {
                        expected: "map or list".to_string(),
                        actual: other.type_name().to_string(),
                    })
                }
            };
        }

        Ok(current)
    }

    pub fn get_string(&self, path: &AttributePath) -> Result<String> {
        match self.get(path)? {
            Dynamic::String(s) => Ok(s.clone()),
            other => Err(TfplugError::TypeMismatch {
                expected: "string".to_string(),
                actual: other.type_name().to_string(),
            }),
        }
    }

    pub fn set_string(&mut self, path: &AttributePath, value: impl Into<String>) -> Result<()> {
        self.set_value(path, Dynamic::String(value.into()))
    }

    /// Set a value, creating intermediate objects as needed
    pub fn set_value(&mut self, path: &AttributePath, new_value: Dynamic) -> Result<()> {
        let Some((last, parents)) = path.steps.split_last() else {
            self.value = new_value;
            return Ok(());
        };

        if !matches!(self.value, Dynamic::Map(_) | Dynamic::List(_)) {
            self.value = Dynamic::Map(HashMap::new());
        }

        let mut current = &mut self.value;
        for step in parents {
            current = match (current, step) {
                (Dynamic::Map(map), AttributePathStep::AttributeName(name)) => map
                    .entry(name.clone())
                    .or_insert_with(|| Dynamic::Map(HashMap::new())),
                (Dynamic::List(items), AttributePathStep::ElementKeyInt(idx)) => {
                    let len = items.len();
                    usize::try_from(*idx)
                        .ok()
                        .and_then(|idx| items.get_mut(idx))
                        .ok_or_else(|| {
                            TfplugError::InvalidState(format!(
                                "list index {} out of bounds (len {})",
                                idx, len
                            ))
                        })?
                }
                (other, _) => {
                    return Err(TfplugError::TypeMismatch {
                        expected: "map or list".to_string(),
                        actual: other.type_name().to_string(),
                    })
                }
            };
        }

        match (current, last) {
            (Dynamic::Map(map), AttributePathStep::AttributeName(name)) => {
                map.insert(name.clone(), new_value);
                Ok(())
            }
            (Dynamic::List(items), AttributePathStep::ElementKeyInt(idx)) => {
                let len = items.len();
                let slot = usize::try_from(*idx)
                    .ok()
                    .and_then(|idx| items.get_mut(idx))
                    .ok_or_else(|| {
                        TfplugError::InvalidState(format!(
                            "list index {} out of bounds (len {})",
                            idx, len
                        ))
                    })?;
                *slot = new_value;
                Ok(())
            }
            (other, _) => Err(TfplugError::TypeMismatch {
                expected: "map or list".to_string(),
                actual: other.type_name().to_string(),
            }),
        }
    }

    /// State persistence format. Null encodes to an empty buffer.
    pub fn encode_msgpack(&self) -> Result<Vec<u8>> {
        if self.is_null() {
            return Ok(Vec::new());
        }
        rmp_serde::to_vec(&self.value)
            .map_err(|e| TfplugError::EncodingError(format!("msgpack encoding failed: {}", e)))
    }

    pub fn decode_msgpack(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::null());
        }
        rmp_serde::from_slice(data)
            .map(Self::new)
            .map_err(|e| TfplugError::DecodingError(format!("msgpack decoding failed: {}", e)))
    }
}

/// Path to an attribute within a [`DynamicValue`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributePath {
    pub steps: Vec<AttributePathStep>,
}

impl AttributePath {
    pub fn new(name: &str) -> Self {
        Self::root().attribute(name)
    }

    pub fn root() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn attribute(mut self, name: &str) -> Self {
        self.steps
            .push(AttributePathStep::AttributeName(name.to_string()));
        self
    }

    pub fn index(mut self, idx: i64) -> Self {
        self.steps.push(AttributePathStep::ElementKeyInt(idx));
        self
    }
}

impl std::fmt::Display for AttributePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                AttributePathStep::AttributeName(name) if i == 0 => write!(f, "{}", name)?,
                AttributePathStep::AttributeName(name) => write!(f, ".{}", name)?,
                AttributePathStep::ElementKeyInt(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributePathStep {
    AttributeName(String),
    ElementKeyInt(i64),
}

/// Warning or error attached to an operation's outcome
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    pub detail: String,
    pub attribute: Option<AttributePath>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn with_attribute(mut self, path: AttributePath) -> Self {
        self.attribute = Some(path);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            DiagnosticSeverity::Error => "Error",
            DiagnosticSeverity::Warning => "Warning",
        };
        write!(f, "{}: {}", level, self.summary)?;
        if let Some(path) = &self.attribute {
            write!(f, " (at {})", path)?;
        }
        if !self.detail.is_empty() && self.detail != self.summary {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Provider configuration values
pub type Config = DynamicValue;

/// Resource state values
pub type State = DynamicValue;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_attribute_round_trips_through_setter() {
        let mut dv = DynamicValue::null();
        dv.set_string(&AttributePath::new("name"), "web1").unwrap();

        assert_eq!(dv.get_string(&AttributePath::new("name")).unwrap(), "web1");
    }

    #[test]
    fn nested_set_creates_intermediate_objects() {
        let mut dv = DynamicValue::null();
        let path = AttributePath::new("connection").attribute("endpoint");
        dv.set_string(&path, "https://example.com/").unwrap();

        assert_eq!(dv.get_string(&path).unwrap(), "https://example.com/");
        assert!(matches!(
            dv.get(&AttributePath::new("connection")).unwrap(),
            Dynamic::Map(_)
        ));
    }

    #[test]
    fn missing_attribute_is_reported_with_its_path() {
        let dv = DynamicValue::object([("name", Dynamic::from("web1"))]);
        let err = dv.get_string(&AttributePath::new("id")).unwrap_err();

        assert!(matches!(err, TfplugError::AttributeNotFound(ref p) if p == "id"));
    }

    #[test]
    fn null_attribute_is_a_type_mismatch_for_strings() {
        let dv = DynamicValue::object([("id", Dynamic::Null)]);
        let err = dv.get_string(&AttributePath::new("id")).unwrap_err();

        assert!(matches!(err, TfplugError::TypeMismatch { ref actual, .. } if actual == "null"));
    }

    #[test]
    fn list_index_out_of_bounds_fails() {
        let mut dv = DynamicValue::object([("tags", Dynamic::List(vec![]))]);
        let path = AttributePath::new("tags").index(2);

        assert!(dv.get(&path).is_err());
        assert!(dv.set_string(&path, "x").is_err());
    }

    #[test]
    fn msgpack_preserves_objects_and_unknowns() {
        let dv = DynamicValue::object([
            ("id", Dynamic::Unknown),
            ("name", Dynamic::from("web1")),
            ("enabled", Dynamic::Bool(true)),
        ]);

        let decoded = DynamicValue::decode_msgpack(&dv.encode_msgpack().unwrap()).unwrap();
        assert_eq!(decoded, dv);
        assert!(decoded.value.contains_unknown());
    }

    #[test]
    fn string_that_looks_like_a_placeholder_stays_a_string() {
        let dv = DynamicValue::object([
            ("name", Dynamic::from("__unknown__")),
            ("ipv4", Dynamic::Unknown),
        ]);

        let decoded = DynamicValue::decode_msgpack(&dv.encode_msgpack().unwrap()).unwrap();
        assert_eq!(
            decoded.get(&AttributePath::new("name")).unwrap(),
            &Dynamic::from("__unknown__")
        );
        assert_eq!(
            decoded.get(&AttributePath::new("ipv4")).unwrap(),
            &Dynamic::Unknown
        );
    }

    #[test]
    fn numbers_decode_as_f64() {
        let encoded = rmp_serde::to_vec(&HashMap::from([("count", 3u8)])).unwrap();
        let dv = DynamicValue::decode_msgpack(&encoded).unwrap();

        assert_eq!(
            dv.get(&AttributePath::new("count")).unwrap(),
            &Dynamic::Number(3.0)
        );
    }

    #[test]
    fn null_encodes_to_empty_buffer() {
        assert!(DynamicValue::null().encode_msgpack().unwrap().is_empty());
        assert!(DynamicValue::decode_msgpack(&[]).unwrap().is_null());
    }

    #[test]
    fn attribute_path_display() {
        let path = AttributePath::new("disks").index(0).attribute("size");
        assert_eq!(path.to_string(), "disks[0].size");
    }

    #[test]
    fn diagnostics_error_detection() {
        let diags = vec![Diagnostic::warning("careful", "")];
        assert!(!has_errors(&diags));

        let diags = vec![
            Diagnostic::warning("careful", ""),
            Diagnostic::error("HTTP Error", "Received non-OK HTTP status: 500"),
        ];
        assert!(has_errors(&diags));
        assert_eq!(
            diags[1].to_string(),
            "Error: HTTP Error: Received non-OK HTTP status: 500"
        );
    }
}
