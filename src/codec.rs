//! Packing of typed value tuples into the single string carried by an engine parameter.

use crate::{Error, Result};
use itertools::Itertools;
use smallvec::SmallVec;
use std::fmt;

/// Separator used by the delimited dialect.
pub const SEPARATOR: char = ':';

/// A decoded tuple. Most engine replies carry fewer than eight fields.
pub type Values = SmallVec<[Value; 8]>;

/// A scalar carried inside a parameter payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Double(f64),
    Str(String),
}

impl Value {
    /// The single-character code identifying the value's type on the wire.
    pub fn type_code(&self) -> char {
        match self {
            Value::Int(_) => 'i',
            Value::Double(_) => 'd',
            Value::Str(_) => 's',
        }
    }

    /// Parses the textual form of a value of the given type.
    fn parse(code: char, text: &str, payload: &str) -> Result<Self> {
        match code {
            'i' => text
                .parse()
                .map(Value::Int)
                .map_err(|_| Error::protocol(payload, format!("bad integer {:?}", text))),
            'd' => text
                .parse()
                .map(Value::Double)
                .map_err(|_| Error::protocol(payload, format!("bad double {:?}", text))),
            's' => Ok(Value::Str(text.to_owned())),
            other => Err(Error::protocol(payload, format!("unknown type code {:?}", other))),
        }
    }

    /// Reads the value as a float. Integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            Value::Str(_) => None,
        }
    }

    /// Reads the value as an integer. Doubles are only accepted when integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Double(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Reads the value as a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// A wire dialect for value tuples.
pub trait Codec {
    /// Packs an ordered, non-empty tuple into one string.
    fn pack(&self, values: &[Value]) -> Result<String>;

    /// Unpacks a string produced by [Codec::pack].
    fn unpack(&self, wire: &str) -> Result<Values>;
}

/// Encodes an operation tag followed by its arguments.
pub fn encode(codec: &dyn Codec, tag: &str, values: &[Value]) -> Result<String> {
    let tuple = std::iter::once(Value::from(tag))
        .chain(values.iter().cloned())
        .collect::<Values>();
    codec.pack(&tuple)
}

/// Decodes a string produced by [encode] into its tag and arguments.
pub fn decode(codec: &dyn Codec, wire: &str) -> Result<(String, Values)> {
    let mut values = codec.unpack(wire)?;
    if values.is_empty() {
        return Err(Error::protocol(wire, "empty tuple"));
    }
    match values.remove(0) {
        Value::Str(tag) => Ok((tag, values)),
        _ => Err(Error::protocol(wire, "missing operation tag")),
    }
}

/// The `<types>:<v1>:<v2>...` dialect used by current engines.
///
/// The header holds one type code per value. Strings must not contain the separator.
#[derive(Clone, Copy, Debug, Default)]
pub struct DelimitedCodec;

impl Codec for DelimitedCodec {
    fn pack(&self, values: &[Value]) -> Result<String> {
        if values.is_empty() {
            return Err(Error::InvalidParameter("cannot pack an empty tuple".into()));
        }
        if let Some(bad) = values
            .iter()
            .filter_map(Value::as_str)
            .find(|s| s.contains(SEPARATOR))
        {
            return Err(Error::InvalidParameter(format!(
                "string {:?} contains the separator {:?}",
                bad, SEPARATOR
            )));
        }
        let types = values.iter().map(Value::type_code).collect::<String>();
        Ok(format!("{}{}{}", types, SEPARATOR, values.iter().join(":")))
    }

    fn unpack(&self, wire: &str) -> Result<Values> {
        let (types, fields) = wire
            .split_once(SEPARATOR)
            .ok_or_else(|| Error::protocol(wire, "missing type header"))?;
        if types.is_empty() {
            return Err(Error::protocol(wire, "empty type header"));
        }
        let fields = fields.split(SEPARATOR).collect::<SmallVec<[&str; 8]>>();
        if fields.len() != types.chars().count() {
            return Err(Error::protocol(
                wire,
                format!(
                    "expected {} fields, found {}",
                    types.chars().count(),
                    fields.len()
                ),
            ));
        }
        types
            .chars()
            .zip(fields)
            .map(|(code, text)| Value::parse(code, text, wire))
            .collect()
    }
}

/// The `<type><len>:<text>` dialect used by legacy engines.
///
/// Every value carries its byte length, so any content survives the trip.
#[derive(Clone, Copy, Debug, Default)]
pub struct LengthPrefixedCodec;

impl Codec for LengthPrefixedCodec {
    fn pack(&self, values: &[Value]) -> Result<String> {
        if values.is_empty() {
            return Err(Error::InvalidParameter("cannot pack an empty tuple".into()));
        }
        Ok(values
            .iter()
            .map(|v| {
                let text = v.to_string();
                format!("{}{}:{}", v.type_code(), text.len(), text)
            })
            .collect())
    }

    fn unpack(&self, wire: &str) -> Result<Values> {
        if wire.is_empty() {
            return Err(Error::protocol(wire, "empty payload"));
        }
        let mut values = Values::new();
        let mut rest = wire;
        while let Some(code) = rest.chars().next() {
            rest = &rest[code.len_utf8()..];
            let (len, tail) = rest
                .split_once(':')
                .ok_or_else(|| Error::protocol(wire, "missing length prefix"))?;
            let len = len
                .parse::<usize>()
                .map_err(|_| Error::protocol(wire, format!("bad length {:?}", len)))?;
            let text = tail
                .get(..len)
                .ok_or_else(|| Error::protocol(wire, "truncated value"))?;
            values.push(Value::parse(code, text, wire)?);
            rest = &tail[len..];
        }
        Ok(values)
    }
}
