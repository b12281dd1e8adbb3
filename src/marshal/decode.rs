use std::io::{ErrorKind, Read};

use crate::error::{AppError, AppResult};
use crate::marshal::codes::{self, MarshalVersion};
use crate::marshal::value::MarshalValue;
use crate::marshal::MAX_DEPTH;

// Upper bound on container pre-allocation; counts come from untrusted input.
const MAX_PREALLOC: usize = 4096;

/// Reference decoder for the stream format written by `Marshaller`.
///
/// Reads from any `Read`, so the same code serves in-memory buffers and pipes.
/// A decoder configured for version N rejects tags that first appeared after N.
pub struct Unmarshaller<R: Read> {
    reader: R,
    version: MarshalVersion,
    interned: Vec<Vec<u8>>,
}

impl<R: Read> Unmarshaller<R> {
    pub fn new(reader: R, version: MarshalVersion) -> Self {
        Self { reader, version, interned: Vec::new() }
    }

    pub fn into_inner(self) -> R { self.reader }

    /// Next top-level value, or `None` if the stream ended cleanly before a tag byte.
    pub fn read_value(&mut self) -> AppResult<Option<MarshalValue>> {
        let mut tag = [0u8; 1];
        loop {
            match self.reader.read(&mut tag) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.read_tagged(tag[0], 0).map(Some)
    }

    fn read_tagged(&mut self, code: u8, depth: usize) -> AppResult<MarshalValue> {
        if depth > MAX_DEPTH {
            return Err(AppError::corrupt("nesting_too_deep", format!("input nesting exceeds {MAX_DEPTH} levels")));
        }
        self.check_version(code)?;
        let value = match code {
            codes::NONE => MarshalValue::Null,
            codes::TRUE => MarshalValue::Bool(true),
            codes::FALSE => MarshalValue::Bool(false),
            codes::INT => MarshalValue::Int(self.read_i32()? as i64),
            codes::INT64 => MarshalValue::Int(i64::from_le_bytes(self.read_array::<8>()?)),
            codes::LONG => MarshalValue::Int(self.read_long()?),
            codes::FLOAT => {
                let len = self.read_array::<1>()?[0] as usize;
                let raw = self.read_vec(len)?;
                let text = std::str::from_utf8(&raw)
                    .map_err(|_| AppError::corrupt("bad_float", "float repr is not ascii"))?;
                let f = text.trim().parse::<f64>()
                    .map_err(|_| AppError::corrupt("bad_float", format!("cannot parse float repr '{text}'")))?;
                MarshalValue::Float(f)
            }
            codes::BINARY_FLOAT => MarshalValue::Float(f64::from_le_bytes(self.read_array::<8>()?)),
            codes::STRING => MarshalValue::Bytes(self.read_sized()?),
            codes::INTERNED => {
                let b = self.read_sized()?;
                self.interned.push(b.clone());
                MarshalValue::Bytes(b)
            }
            codes::STRINGREF => {
                let idx = self.read_i32()?;
                let b = usize::try_from(idx).ok().and_then(|i| self.interned.get(i)).cloned()
                    .ok_or_else(|| AppError::corrupt("bad_stringref", format!("string reference {idx} out of range")))?;
                MarshalValue::Bytes(b)
            }
            codes::UNICODE => {
                let b = self.read_sized()?;
                MarshalValue::Text(String::from_utf8(b).map_err(|_| AppError::corrupt("bad_unicode", "unicode payload is not valid utf-8"))?)
            }
            codes::LIST | codes::TUPLE => {
                let n = self.read_count()?;
                let mut items = Vec::with_capacity(n.min(MAX_PREALLOC));
                for _ in 0..n {
                    let tag = self.read_array::<1>()?[0];
                    items.push(self.read_tagged(tag, depth + 1)?);
                }
                if code == codes::LIST { MarshalValue::List(items) } else { MarshalValue::Tuple(items) }
            }
            codes::DICT => {
                let mut entries = Vec::new();
                loop {
                    let tag = self.read_array::<1>()?[0];
                    if tag == codes::NULL { break; }
                    let key = self.read_key(tag, depth + 1)?;
                    let vtag = self.read_array::<1>()?[0];
                    let value = self.read_tagged(vtag, depth + 1)?;
                    entries.push((key, value));
                }
                MarshalValue::Dict(entries)
            }
            codes::NULL => return Err(AppError::corrupt("unexpected_null_tag", "null tag outside a dict")),
            codes::COMPLEX | codes::BINARY_COMPLEX | codes::CODE | codes::SET | codes::FROZENSET
            | codes::STOPITER | codes::ELLIPSIS => {
                return Err(AppError::unsupported("unsupported_type", format!("marshal type '{}' is not supported", code as char)));
            }
            other => return Err(AppError::corrupt("unknown_tag", format!("unknown marshal tag 0x{other:02x}"))),
        };
        Ok(value)
    }

    fn check_version(&self, code: u8) -> AppResult<()> {
        if code & codes::FLAG_REF != 0 {
            return Err(codes::unsupported_version(3));
        }
        match codes::min_version_for(code) {
            Some(min) if min > self.version.number() => {
                if min > 2 { return Err(codes::unsupported_version(min)); }
                Err(AppError::unsupported(
                    "marshal_version",
                    format!("tag '{}' requires marshal version {min}, decoder is version {}", code as char, self.version.number()),
                ))
            }
            _ => Ok(()),
        }
    }

    fn read_key(&mut self, tag: u8, depth: usize) -> AppResult<String> {
        match self.read_tagged(tag, depth)? {
            MarshalValue::Text(s) => Ok(s),
            MarshalValue::Bytes(b) => String::from_utf8(b).map_err(|_| AppError::corrupt("bad_key", "dict key is not valid utf-8")),
            other => Err(AppError::unsupported("unsupported_key", format!("dict key of type {} is not supported", other.type_name()))),
        }
    }

    fn read_long(&mut self) -> AppResult<i64> {
        let n = self.read_i32()?;
        let mut mag: u128 = 0;
        for i in 0..n.unsigned_abs() {
            let d = u16::from_le_bytes(self.read_array::<2>()?) as u128;
            if d > codes::LONG_DIGIT_MASK as u128 {
                return Err(AppError::corrupt("bad_long", "long digit out of range"));
            }
            let shift = i.saturating_mul(codes::LONG_DIGIT_BITS);
            if d != 0 && shift >= 64 {
                return Err(AppError::unsupported("int_overflow", "marshalled integer exceeds 64 bits"));
            }
            if shift < 128 { mag |= d << shift; }
        }
        let v = if n < 0 { -(mag as i128) } else { mag as i128 };
        i64::try_from(v).map_err(|_| AppError::unsupported("int_overflow", "marshalled integer exceeds 64 bits"))
    }

    fn read_count(&mut self) -> AppResult<usize> {
        let n = self.read_i32()?;
        usize::try_from(n).map_err(|_| AppError::corrupt("bad_length", format!("negative length {n}")))
    }

    fn read_sized(&mut self) -> AppResult<Vec<u8>> {
        let n = self.read_count()?;
        self.read_vec(n)
    }

    fn read_i32(&mut self) -> AppResult<i32> { Ok(i32::from_le_bytes(self.read_array::<4>()?)) }

    fn read_array<const N: usize>(&mut self) -> AppResult<[u8; N]> {
        let mut out = [0u8; N];
        self.reader.read_exact(&mut out).map_err(truncated)?;
        Ok(out)
    }

    fn read_vec(&mut self, n: usize) -> AppResult<Vec<u8>> {
        let mut out = Vec::with_capacity(n.min(MAX_PREALLOC * 16));
        let read = (&mut self.reader).take(n as u64).read_to_end(&mut out).map_err(truncated)?;
        if read != n { return Err(truncated_at(n, read)); }
        Ok(out)
    }
}

fn truncated(e: std::io::Error) -> AppError {
    if e.kind() == ErrorKind::UnexpectedEof { AppError::corrupt("truncated", "marshal stream ended mid-value") } else { e.into() }
}

fn truncated_at(want: usize, got: usize) -> AppError {
    AppError::corrupt("truncated", format!("marshal stream ended mid-value (wanted {want} bytes, got {got})"))
}

/// Decode exactly one value from `bytes`; trailing input is an error.
pub fn loads(bytes: &[u8], version: MarshalVersion) -> AppResult<MarshalValue> {
    let mut u = Unmarshaller::new(bytes, version);
    let value = u.read_value()?.ok_or_else(|| AppError::corrupt("empty_input", "no marshalled value in empty buffer"))?;
    let rest = u.into_inner();
    if !rest.is_empty() {
        return Err(AppError::corrupt("trailing_bytes", format!("{} bytes after the marshalled value", rest.len())));
    }
    Ok(value)
}
