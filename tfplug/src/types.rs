//! Value tree, attribute paths and diagnostics
//!
//! Configuration, plan and state all travel as [`DynamicValue`]s. Providers
//! read and write them through the typed accessors rather than matching on
//! [`Dynamic`] directly.

use crate::error::{Result, TfplugError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const UNKNOWN_SENTINEL: &str = "__unknown__";

/// A Terraform value of any type
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    Null,
    Bool(bool),
    /// Terraform numbers are carried as f64
    Number(f64),
    String(String),
    /// Lists, sets and tuples
    List(Vec<Dynamic>),
    /// Maps and objects
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

    /// Builds a list of strings
    pub fn string_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Dynamic::List(
            items
                .into_iter()
                .map(|s| Dynamic::String(s.into()))
                .collect(),
        )
    }

    /// Builds a map of strings
    pub fn string_map<I, K, V>(items: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Dynamic::Map(
            items
                .into_iter()
                .map(|(k, v)| (k.into(), Dynamic::String(v.into())))
                .collect(),
        )
    }
}

impl From<&str> for Dynamic {
    fn from(value: &str) -> Self {
        Dynamic::String(value.to_string())
    }
}

impl From<String> for Dynamic {
    fn from(value: String) -> Self {
        Dynamic::String(value)
    }
}

impl From<bool> for Dynamic {
    fn from(value: bool) -> Self {
        Dynamic::Bool(value)
    }
}

impl From<f64> for Dynamic {
    fn from(value: f64) -> Self {
        Dynamic::Number(value)
    }
}

impl<T: Into<Dynamic>> From<Option<T>> for Dynamic {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Dynamic::Null)
    }
}

impl From<serde_json::Value> for Dynamic {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Dynamic::Null,
            serde_json::Value::Bool(b) => Dynamic::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map(Dynamic::Number).unwrap_or(Dynamic::Null),
            serde_json::Value::String(s) => Dynamic::String(s),
            serde_json::Value::Array(items) => {
                Dynamic::List(items.into_iter().map(Dynamic::from).collect())
            }
            serde_json::Value::Object(fields) => Dynamic::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Dynamic::from(v)))
                    .collect(),
            ),
        }
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
            Dynamic::List(l) => l.serialize(serializer),
            Dynamic::Map(m) => m.serialize(serializer),
            Dynamic::Unknown => serializer.serialize_str(UNKNOWN_SENTINEL),
        }
    }
}

impl<'de> Deserialize<'de> for Dynamic {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};
        use std::fmt;

        struct DynamicVisitor;

        impl<'de> Visitor<'de> for DynamicVisitor {
            type Value = Dynamic;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a terraform value")
            }

            fn visit_unit<E: de::Error>(self) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Null)
            }

            fn visit_none<E: de::Error>(self) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Null)
            }

            fn visit_bool<E: de::Error>(self, value: bool) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Bool(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(value as f64))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(value as f64))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(value))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Dynamic, E> {
                self.visit_string(value.to_string())
            }

            fn visit_string<E: de::Error>(self, value: String) -> std::result::Result<Dynamic, E> {
                if value == UNKNOWN_SENTINEL {
                    Ok(Dynamic::Unknown)
                } else {
                    Ok(Dynamic::String(value))
                }
            }

            fn visit_seq<V>(self, mut seq: V) -> std::result::Result<Dynamic, V::Error>
            where
                V: de::SeqAccess<'de>,
            {
                let mut items = Vec::new();
                while let Some(item) = seq.next_element()? {
                    items.push(item);
                }
                Ok(Dynamic::List(items))
            }

            fn visit_map<V>(self, mut map: V) -> std::result::Result<Dynamic, V::Error>
            where
                V: de::MapAccess<'de>,
            {
                let mut fields = HashMap::new();
                while let Some((key, value)) = map.next_entry()? {
                    fields.insert(key, value);
                }
                Ok(Dynamic::Map(fields))
            }
        }

        deserializer.deserialize_any(DynamicVisitor)
    }
}

/// DynamicValue is the unit exchanged between Terraform and the provider:
/// a whole configuration, plan or state object
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicValue {
    pub value: Dynamic,
}

impl DynamicValue {
    pub fn new(value: Dynamic) -> Self {
        Self { value }
    }

    /// An empty object, the usual starting point for a new state
    pub fn object() -> Self {
        Self {
            value: Dynamic::Map(HashMap::new()),
        }
    }

    pub fn null() -> Self {
        Self {
            value: Dynamic::Null,
        }
    }

    pub fn unknown() -> Self {
        Self {
            value: Dynamic::Unknown,
        }
    }

    pub fn encode_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.value)
            .map_err(|e| TfplugError::EncodingError(format!("json encoding failed: {}", e)))
    }

    pub fn decode_json(data: &[u8]) -> Result<Self> {
        let value = serde_json::from_slice(data)
            .map_err(|e| TfplugError::DecodingError(format!("json decoding failed: {}", e)))?;
        Ok(Self { value })
    }

    /// Raw access to the value at `path`
    pub fn get(&self, path: &AttributePath) -> Result<&Dynamic> {
        self.navigate_path(path)
    }

    pub fn get_string(&self, path: &AttributePath) -> Result<String> {
        match self.navigate_path(path)? {
            Dynamic::String(s) => Ok(s.clone()),
            other => Err(mismatch("string", other)),
        }
    }

    pub fn get_number(&self, path: &AttributePath) -> Result<f64> {
        match self.navigate_path(path)? {
            Dynamic::Number(n) => Ok(*n),
            other => Err(mismatch("number", other)),
        }
    }

    pub fn get_bool(&self, path: &AttributePath) -> Result<bool> {
        match self.navigate_path(path)? {
            Dynamic::Bool(b) => Ok(*b),
            other => Err(mismatch("bool", other)),
        }
    }

    pub fn get_list(&self, path: &AttributePath) -> Result<Vec<Dynamic>> {
        match self.navigate_path(path)? {
            Dynamic::List(l) => Ok(l.clone()),
            other => Err(mismatch("list", other)),
        }
    }

    pub fn get_map(&self, path: &AttributePath) -> Result<HashMap<String, Dynamic>> {
        match self.navigate_path(path)? {
            Dynamic::Map(m) => Ok(m.clone()),
            other => Err(mismatch("map", other)),
        }
    }

    /// Reads a list or set of strings. Null and missing read as empty.
    pub fn get_string_list(&self, path: &AttributePath) -> Result<Vec<String>> {
        match self.navigate_path(path) {
            Ok(Dynamic::List(items)) => items
                .iter()
                .map(|item| match item {
                    Dynamic::String(s) => Ok(s.clone()),
                    other => Err(mismatch("string", other)),
                })
                .collect(),
            Ok(Dynamic::Null) => Ok(Vec::new()),
            Ok(other) => Err(mismatch("list", other)),
            Err(e) if e.is_missing() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// A set, non-empty string, `None` otherwise
    pub fn get_optional_string(&self, path: &AttributePath) -> Option<String> {
        self.get_string(path).ok().filter(|s| !s.is_empty())
    }

    pub fn get_optional_number(&self, path: &AttributePath) -> Option<f64> {
        self.get_number(path).ok()
    }

    pub fn get_optional_bool(&self, path: &AttributePath) -> Option<bool> {
        self.get_bool(path).ok()
    }

    pub fn set_string(&mut self, path: &AttributePath, value: String) -> Result<()> {
        self.set_value(path, Dynamic::String(value))
    }

    pub fn set_number(&mut self, path: &AttributePath, value: f64) -> Result<()> {
        self.set_value(path, Dynamic::Number(value))
    }

    pub fn set_bool(&mut self, path: &AttributePath, value: bool) -> Result<()> {
        self.set_value(path, Dynamic::Bool(value))
    }

    pub fn set_list(&mut self, path: &AttributePath, value: Vec<Dynamic>) -> Result<()> {
        self.set_value(path, Dynamic::List(value))
    }

    pub fn set_map(&mut self, path: &AttributePath, value: HashMap<String, Dynamic>) -> Result<()> {
        self.set_value(path, Dynamic::Map(value))
    }

    /// Sets any value, including null
    pub fn set(&mut self, path: &AttributePath, value: impl Into<Dynamic>) -> Result<()> {
        self.set_value(path, value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, Dynamic::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.value, Dynamic::Unknown)
    }

    /// Used while planning for computed values
    pub fn mark_unknown(&mut self, path: &AttributePath) -> Result<()> {
        self.set_value(path, Dynamic::Unknown)
    }

    /// True when the value at `path` differs between `self` and `other`.
    /// A missing attribute compares equal to null.
    pub fn differs_at(&self, other: &DynamicValue, path: &AttributePath) -> bool {
        let ours = self.navigate_path(path).unwrap_or(&Dynamic::Null);
        let theirs = other.navigate_path(path).unwrap_or(&Dynamic::Null);
        !values_equal(ours, theirs)
    }

    fn navigate_path<'a>(&'a self, path: &AttributePath) -> Result<&'a Dynamic> {
        let mut current = &self.value;

        for step in &path.steps {
            current = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name))
                | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => m
                    .get(name)
                    .ok_or_else(|| TfplugError::AttributeNotFound(name.clone()))?,
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => {
                    let idx = *idx as usize;
                    l.get(idx).ok_or_else(|| {
                        TfplugError::InvalidPath(format!("list index {} out of bounds", idx))
                    })?
                }
                (Dynamic::Null, AttributePathStep::AttributeName(name)) => {
                    return Err(TfplugError::AttributeNotFound(name.clone()))
                }
                (other, step) => {
                    return Err(TfplugError::InvalidPath(format!(
                        "cannot apply {:?} to {}",
                        step,
                        other.type_name()
                    )))
                }
            };
        }

        Ok(current)
    }

    fn set_value(&mut self, path: &AttributePath, new_value: Dynamic) -> Result<()> {
        let Some((last, parents)) = path.steps.split_last() else {
            self.value = new_value;
            return Ok(());
        };

        if !matches!(self.value, Dynamic::Map(_)) {
            self.value = Dynamic::Map(HashMap::new());
        }

        let mut current = &mut self.value;
        for (idx, step) in parents.iter().enumerate() {
            let next_is_index = matches!(
                path.steps.get(idx + 1),
                Some(AttributePathStep::ElementKeyInt(_))
            );
            current = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name))
                | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => {
                    let slot = m.entry(name.clone()).or_insert(Dynamic::Null);
                    if matches!(slot, Dynamic::Null | Dynamic::Unknown) {
                        *slot = if next_is_index {
                            Dynamic::List(Vec::new())
                        } else {
                            Dynamic::Map(HashMap::new())
                        };
                    }
                    slot
                }
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => {
                    let idx = *idx as usize;
                    l.get_mut(idx).ok_or_else(|| {
                        TfplugError::InvalidPath(format!("list index {} out of bounds", idx))
                    })?
                }
                (other, step) => {
                    return Err(TfplugError::InvalidPath(format!(
                        "cannot apply {:?} to {}",
                        step,
                        other.type_name()
                    )))
                }
            };
        }

        match (current, last) {
            (Dynamic::Map(m), AttributePathStep::AttributeName(name))
            | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => {
                m.insert(name.clone(), new_value);
                Ok(())
            }
            (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => {
                let idx = *idx as usize;
                let len = l.len();
                if idx < len {
                    l[idx] = new_value;
                    Ok(())
                } else if idx == len {
                    l.push(new_value);
                    Ok(())
                } else {
                    Err(TfplugError::InvalidPath(format!(
                        "list index {} out of bounds",
                        idx
                    )))
                }
            }
            (other, step) => Err(TfplugError::InvalidPath(format!(
                "cannot apply {:?} to {}",
                step,
                other.type_name()
            ))),
        }
    }
}

fn mismatch(expected: &str, actual: &Dynamic) -> TfplugError {
    TfplugError::TypeMismatch {
        expected: expected.to_string(),
        actual: actual.type_name().to_string(),
    }
}

/// Structural equality with a tolerance for numbers and order-insensitive
/// comparison of string sets
pub fn values_equal(a: &Dynamic, b: &Dynamic) -> bool {
    match (a, b) {
        (Dynamic::Null, Dynamic::Null) => true,
        (Dynamic::Bool(a), Dynamic::Bool(b)) => a == b,
        (Dynamic::Number(a), Dynamic::Number(b)) => (a - b).abs() < f64::EPSILON,
        (Dynamic::String(a), Dynamic::String(b)) => a == b,
        (Dynamic::List(a), Dynamic::List(b)) => {
            if a.len() != b.len() {
                return false;
            }
            match (sorted_strings(a), sorted_strings(b)) {
                (Some(x), Some(y)) => x == y,
                _ => a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y)),
            }
        }
        (Dynamic::Map(a), Dynamic::Map(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| values_equal(v, other)))
        }
        (Dynamic::Unknown, Dynamic::Unknown) => true,
        _ => false,
    }
}

fn sorted_strings(items: &[Dynamic]) -> Option<Vec<&str>> {
    let mut strings = items.iter().map(Dynamic::as_str).collect::<Option<Vec<_>>>()?;
    strings.sort_unstable();
    Some(strings)
}

/// Path to an attribute inside a DynamicValue
#[derive(Debug, Clone, PartialEq)]
pub struct AttributePath {
    pub steps: Vec<AttributePathStep>,
}

impl AttributePath {
    pub fn new(name: &str) -> Self {
        Self {
            steps: vec![AttributePathStep::AttributeName(name.to_string())],
        }
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

    pub fn key(mut self, key: &str) -> Self {
        self.steps
            .push(AttributePathStep::ElementKeyString(key.to_string()));
        self
    }
}

impl std::fmt::Display for AttributePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                AttributePathStep::AttributeName(name) if i == 0 => write!(f, "{}", name)?,
                AttributePathStep::AttributeName(name) => write!(f, ".{}", name)?,
                AttributePathStep::ElementKeyString(key) => write!(f, "[{:?}]", key)?,
                AttributePathStep::ElementKeyInt(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributePathStep {
    AttributeName(String),
    ElementKeyString(String),
    ElementKeyInt(i64),
}

/// Diagnostic represents a warning or error reported back to Terraform
#[derive(Debug, Clone)]
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

/// True when any diagnostic is an error
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiagnosticSeverity {
    Invalid,
    Error,
    Warning,
}

/// Capabilities the provider announces to Terraform
#[derive(Debug, Clone, Default)]
pub struct ServerCapabilities {
    pub plan_destroy: bool,
    pub get_provider_schema_optional: bool,
    pub move_resource_state: bool,
}

/// Capabilities Terraform announces to the provider
#[derive(Debug, Clone, Default)]
pub struct ClientCapabilities {
    pub deferral_allowed: bool,
    pub write_only_attributes_allowed: bool,
}

#[derive(Debug, Clone)]
pub struct Deferred {
    pub reason: DeferredReason,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeferredReason {
    Unknown,
    ResourceConfigUnknown,
    ProviderConfigUnknown,
    AbsentPrereq,
}

#[derive(Debug, Clone)]
pub struct ResourceIdentityData {
    pub identity_data: DynamicValue,
}

pub type Config = DynamicValue;

pub type State = DynamicValue;
