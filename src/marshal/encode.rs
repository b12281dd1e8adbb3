use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::marshal::codes::{self, MarshalVersion};
use crate::marshal::value::MarshalValue;
use crate::marshal::MAX_DEPTH;

/// Encoder switches. Defaults produce what the sandbox expects from a result buffer:
/// version 2 floats, dict keys as byte strings, text values as unicode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarshalOptions {
    pub version: MarshalVersion,
    /// Write dict keys with the `s` (bytes) tag instead of `u`.
    pub keys_are_buffers: bool,
    /// Write every text value with the `s` tag.
    pub string_to_buffer: bool,
}

impl Default for MarshalOptions {
    fn default() -> Self {
        Self { version: MarshalVersion::V2, keys_are_buffers: true, string_to_buffer: false }
    }
}

/// Streaming encoder; values are appended to an internal buffer.
pub struct Marshaller {
    opts: MarshalOptions,
    buf: Vec<u8>,
}

impl Marshaller {
    pub fn new(opts: MarshalOptions) -> Self { Self::with_capacity(opts, 64) }

    pub fn with_capacity(opts: MarshalOptions, cap: usize) -> Self {
        Self { opts, buf: Vec::with_capacity(cap) }
    }

    pub fn options(&self) -> MarshalOptions { self.opts }

    pub fn marshal(&mut self, value: &MarshalValue) -> AppResult<()> {
        self.write_value(value, 0)
    }

    /// Encode `{name: [values...], ...}` straight from columnar storage, without first
    /// assembling a `MarshalValue::Dict`.
    pub fn marshal_columns(&mut self, names: &[String], columns: &[Vec<MarshalValue>]) -> AppResult<()> {
        if names.len() != columns.len() {
            return Err(AppError::integrity(
                "column_count_mismatch",
                format!("{} names for {} columns", names.len(), columns.len()),
            ));
        }
        self.buf.push(codes::DICT);
        for (name, column) in names.iter().zip(columns) {
            self.write_key(name)?;
            self.buf.push(codes::LIST);
            self.write_len(column.len())?;
            for v in column { self.write_value(v, 2)?; }
        }
        self.buf.push(codes::NULL);
        Ok(())
    }

    pub fn dump(&self) -> &[u8] { &self.buf }

    pub fn into_bytes(self) -> Vec<u8> { self.buf }

    fn write_value(&mut self, value: &MarshalValue, depth: usize) -> AppResult<()> {
        if depth > MAX_DEPTH {
            return Err(AppError::encoding("nesting_too_deep", format!("value nesting exceeds {MAX_DEPTH} levels")));
        }
        match value {
            MarshalValue::Null => self.buf.push(codes::NONE),
            MarshalValue::Bool(b) => self.buf.push(if *b { codes::TRUE } else { codes::FALSE }),
            MarshalValue::Int(i) => self.write_int(*i),
            MarshalValue::Float(f) => self.write_float(*f)?,
            MarshalValue::Text(s) => {
                let code = if self.opts.string_to_buffer { codes::STRING } else { codes::UNICODE };
                self.write_bytes(code, s.as_bytes())?;
            }
            MarshalValue::Bytes(b) => self.write_bytes(codes::STRING, b)?,
            MarshalValue::List(items) | MarshalValue::Tuple(items) => {
                self.buf.push(if matches!(value, MarshalValue::List(_)) { codes::LIST } else { codes::TUPLE });
                self.write_len(items.len())?;
                for item in items { self.write_value(item, depth + 1)?; }
            }
            MarshalValue::Dict(entries) => {
                self.buf.push(codes::DICT);
                for (k, v) in entries {
                    self.write_key(k)?;
                    self.write_value(v, depth + 1)?;
                }
                self.buf.push(codes::NULL);
            }
        }
        Ok(())
    }

    fn write_key(&mut self, key: &str) -> AppResult<()> {
        let code = if self.opts.keys_are_buffers || self.opts.string_to_buffer { codes::STRING } else { codes::UNICODE };
        self.write_bytes(code, key.as_bytes())
    }

    fn write_int(&mut self, v: i64) {
        if let Ok(small) = i32::try_from(v) {
            self.buf.push(codes::INT);
            self.buf.extend_from_slice(&small.to_le_bytes());
            return;
        }
        // Arbitrary-precision form: signed digit count, then base-2^15 digits, low first.
        let mut mag = v.unsigned_abs();
        let mut digits: Vec<u16> = Vec::with_capacity(5);
        while mag != 0 {
            digits.push((mag & codes::LONG_DIGIT_MASK) as u16);
            mag >>= codes::LONG_DIGIT_BITS;
        }
        let n = digits.len() as i32;
        self.buf.push(codes::LONG);
        self.buf.extend_from_slice(&(if v < 0 { -n } else { n }).to_le_bytes());
        for d in digits { self.buf.extend_from_slice(&d.to_le_bytes()); }
    }

    fn write_float(&mut self, f: f64) -> AppResult<()> {
        if self.opts.version >= MarshalVersion::V2 {
            self.buf.push(codes::BINARY_FLOAT);
            self.buf.extend_from_slice(&f.to_le_bytes());
            return Ok(());
        }
        let repr = float_repr(f);
        let len = u8::try_from(repr.len())
            .map_err(|_| AppError::encoding("float_repr_too_long", format!("float repr '{repr}' exceeds 255 bytes")))?;
        self.buf.push(codes::FLOAT);
        self.buf.push(len);
        self.buf.extend_from_slice(repr.as_bytes());
        Ok(())
    }

    fn write_bytes(&mut self, code: u8, bytes: &[u8]) -> AppResult<()> {
        self.buf.push(code);
        self.write_len(bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn write_len(&mut self, len: usize) -> AppResult<()> {
        let n = i32::try_from(len)
            .map_err(|_| AppError::encoding("length_overflow", format!("length {len} does not fit the 32-bit marshal size field")))?;
        self.buf.extend_from_slice(&n.to_le_bytes());
        Ok(())
    }
}

/// Encode a single value into a fresh buffer.
pub fn dumps(value: &MarshalValue, opts: MarshalOptions) -> AppResult<Vec<u8>> {
    let mut m = Marshaller::new(opts);
    m.marshal(value)?;
    debug!(target: "sqlmarshal::marshal", "dumps: type={} bytes={}", value.type_name(), m.dump().len());
    Ok(m.into_bytes())
}

/// Python-style `repr()` of a float, as written by protocol 0/1.
pub(crate) fn float_repr(f: f64) -> String {
    if f.is_nan() { return "nan".into(); }
    if f.is_infinite() { return if f > 0.0 { "inf".into() } else { "-inf".into() }; }
    let s = format!("{:?}", f);
    match s.split_once('e') {
        // Python writes an explicit sign and at least two exponent digits: 1e-05, 1e+16.
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => s,
    }
}
