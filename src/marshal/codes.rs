//! Type tags of the Python `marshal` stream format.
//! Values here are a compatibility contract with `marshal.load` on the sandbox side;
//! they are not ours to change.

use crate::error::{AppError, AppResult};

pub const NULL: u8 = b'0';
pub const NONE: u8 = b'N';
pub const FALSE: u8 = b'F';
pub const TRUE: u8 = b'T';
pub const STOPITER: u8 = b'S';
pub const ELLIPSIS: u8 = b'.';
pub const INT: u8 = b'i';
pub const INT64: u8 = b'I';
pub const FLOAT: u8 = b'f';
pub const BINARY_FLOAT: u8 = b'g';
pub const COMPLEX: u8 = b'x';
pub const BINARY_COMPLEX: u8 = b'y';
pub const LONG: u8 = b'l';
pub const STRING: u8 = b's';
pub const INTERNED: u8 = b't';
pub const STRINGREF: u8 = b'R';
pub const UNICODE: u8 = b'u';
pub const TUPLE: u8 = b'(';
pub const LIST: u8 = b'[';
pub const DICT: u8 = b'{';
pub const CODE: u8 = b'c';
pub const SET: u8 = b'<';
pub const FROZENSET: u8 = b'>';

// Introduced by protocol 3 and 4; never produced or accepted here.
pub const REF: u8 = b'r';
pub const ASCII: u8 = b'a';
pub const ASCII_INTERNED: u8 = b'A';
pub const SHORT_ASCII: u8 = b'z';
pub const SHORT_ASCII_INTERNED: u8 = b'Z';
pub const SMALL_TUPLE: u8 = b')';
pub const FLAG_REF: u8 = 0x80;

/// Digits of a marshalled `long` are base 2^15, stored in u16 slots.
pub const LONG_DIGIT_BITS: u32 = 15;
pub const LONG_DIGIT_MASK: u64 = (1 << LONG_DIGIT_BITS) - 1;

/// Marshal protocol version. The sandbox reads version 2 streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, serde::Serialize, serde::Deserialize)]
pub enum MarshalVersion {
    V0,
    V1,
    #[default]
    V2,
}

impl MarshalVersion {
    pub const SUPPORTED: &'static [u8] = &[0, 1, 2];

    pub fn from_number(n: u8) -> AppResult<Self> {
        match n {
            0 => Ok(MarshalVersion::V0),
            1 => Ok(MarshalVersion::V1),
            2 => Ok(MarshalVersion::V2),
            other => Err(unsupported_version(other)),
        }
    }

    pub fn number(self) -> u8 {
        match self {
            MarshalVersion::V0 => 0,
            MarshalVersion::V1 => 1,
            MarshalVersion::V2 => 2,
        }
    }
}

pub fn unsupported_version(detected: u8) -> AppError {
    let supported = MarshalVersion::SUPPORTED
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    AppError::unsupported(
        "marshal_version".to_string(),
        format!("unsupported marshal version {detected} (supported: {supported})"),
    )
}

/// Lowest protocol version that may contain `code`, or None if the tag is outside
/// everything up to version 2.
pub fn min_version_for(code: u8) -> Option<u8> {
    match code {
        NULL | NONE | FALSE | TRUE | STOPITER | ELLIPSIS | INT | INT64 | FLOAT | COMPLEX | LONG
        | STRING | UNICODE | TUPLE | LIST | DICT | CODE | SET | FROZENSET => Some(0),
        INTERNED | STRINGREF => Some(1),
        BINARY_FLOAT | BINARY_COMPLEX => Some(2),
        REF | ASCII | ASCII_INTERNED | SHORT_ASCII | SHORT_ASCII_INTERNED | SMALL_TUPLE => Some(if code == REF { 3 } else { 4 }),
        _ => None,
    }
}
