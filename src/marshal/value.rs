use serde_json::{Map, Number, Value as JsonValue};

/// In-memory value domain carried through the marshaller.
///
/// `Dict` keeps its entries in insertion order; the encoder walks them in that order,
/// which is what makes a marshalled result byte-for-byte reproducible.
#[derive(Debug, Clone, PartialEq)]
pub enum MarshalValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<MarshalValue>),
    Tuple(Vec<MarshalValue>),
    Dict(Vec<(String, MarshalValue)>),
}

impl MarshalValue {
    pub fn text(s: impl Into<String>) -> Self { MarshalValue::Text(s.into()) }

    pub fn as_text(&self) -> Option<&str> {
        match self { MarshalValue::Text(s) => Some(s.as_str()), _ => None }
    }

    pub fn as_list(&self) -> Option<&[MarshalValue]> {
        match self { MarshalValue::List(v) | MarshalValue::Tuple(v) => Some(v.as_slice()), _ => None }
    }

    /// Look up a dict entry by key. Linear; dicts here are one entry per result column.
    pub fn get(&self, key: &str) -> Option<&MarshalValue> {
        match self {
            MarshalValue::Dict(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            MarshalValue::Null => "null",
            MarshalValue::Bool(_) => "bool",
            MarshalValue::Int(_) => "int",
            MarshalValue::Float(_) => "float",
            MarshalValue::Text(_) => "text",
            MarshalValue::Bytes(_) => "bytes",
            MarshalValue::List(_) => "list",
            MarshalValue::Tuple(_) => "tuple",
            MarshalValue::Dict(_) => "dict",
        }
    }

    /// JSON rendering for diagnostics and the CLI `--decode` mode.
    /// Bytes become `{"$bytes": [..]}`; non-finite floats become strings.
    pub fn to_json(&self) -> JsonValue {
        match self {
            MarshalValue::Null => JsonValue::Null,
            MarshalValue::Bool(b) => JsonValue::Bool(*b),
            MarshalValue::Int(i) => JsonValue::Number((*i).into()),
            MarshalValue::Float(f) => Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(f.to_string())),
            MarshalValue::Text(s) => JsonValue::String(s.clone()),
            MarshalValue::Bytes(b) => {
                let mut m = Map::new();
                m.insert("$bytes".into(), JsonValue::Array(b.iter().map(|x| JsonValue::from(*x)).collect()));
                JsonValue::Object(m)
            }
            MarshalValue::List(items) | MarshalValue::Tuple(items) => JsonValue::Array(items.iter().map(|v| v.to_json()).collect()),
            MarshalValue::Dict(entries) => {
                let mut m = Map::new();
                for (k, v) in entries { m.insert(k.clone(), v.to_json()); }
                JsonValue::Object(m)
            }
        }
    }
}

impl From<i64> for MarshalValue { fn from(v: i64) -> Self { MarshalValue::Int(v) } }
impl From<f64> for MarshalValue { fn from(v: f64) -> Self { MarshalValue::Float(v) } }
impl From<bool> for MarshalValue { fn from(v: bool) -> Self { MarshalValue::Bool(v) } }
impl From<&str> for MarshalValue { fn from(v: &str) -> Self { MarshalValue::Text(v.to_string()) } }
impl From<String> for MarshalValue { fn from(v: String) -> Self { MarshalValue::Text(v) } }
impl From<Vec<u8>> for MarshalValue { fn from(v: Vec<u8>) -> Self { MarshalValue::Bytes(v) } }
