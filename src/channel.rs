//! Sandbox message channel
//! -----------------------
//! Messages are `(code, body)` pairs with `CALL = None`, `DATA = True`, `EXC = False`.
//! Outgoing messages are marshalled as one tuple and then written again as a single
//! byte string, so the reader gets the whole frame in one read. Incoming calls may
//! also arrive unframed, as two consecutive values.

use std::io::{Read, Write};

use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::marshal::{dumps, MarshalOptions, MarshalValue, MarshalVersion, Unmarshaller};

const CHANNEL_VERSION: MarshalVersion = MarshalVersion::V2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageCode {
    Call,
    Data,
    Exc,
}

impl MessageCode {
    pub fn to_value(self) -> MarshalValue {
        match self {
            MessageCode::Call => MarshalValue::Null,
            MessageCode::Data => MarshalValue::Bool(true),
            MessageCode::Exc => MarshalValue::Bool(false),
        }
    }

    pub fn from_value(v: &MarshalValue) -> AppResult<Self> {
        match v {
            MarshalValue::Null => Ok(MessageCode::Call),
            MarshalValue::Bool(true) => Ok(MessageCode::Data),
            MarshalValue::Bool(false) => Ok(MessageCode::Exc),
            other => Err(AppError::corrupt("bad_message_code", format!("message code must be None/True/False, got {}", other.type_name()))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub code: MessageCode,
    pub body: MarshalValue,
}

fn channel_options() -> MarshalOptions {
    MarshalOptions { version: CHANNEL_VERSION, ..MarshalOptions::default() }
}

pub fn write_message<W: Write>(w: &mut W, code: MessageCode, body: MarshalValue) -> AppResult<()> {
    let opts = channel_options();
    let inner = dumps(&MarshalValue::Tuple(vec![code.to_value(), body]), opts)?;
    let frame = dumps(&MarshalValue::Bytes(inner), opts)?;
    debug!(target: "sqlmarshal::channel", "write_message: code={:?} frame_bytes={}", code, frame.len());
    w.write_all(&frame)?;
    w.flush()?;
    Ok(())
}

/// Ship a marshalled result buffer back as a `DATA` reply.
pub fn write_data<W: Write>(w: &mut W, buf: &[u8]) -> AppResult<()> {
    write_message(w, MessageCode::Data, MarshalValue::Bytes(buf.to_vec()))
}

/// Send an exception reply; the body is the rendered error.
pub fn write_exc<W: Write>(w: &mut W, err: &AppError) -> AppResult<()> {
    write_message(w, MessageCode::Exc, MarshalValue::text(err.to_string()))
}

/// Request `name(args...)` from the other side.
pub fn write_call<W: Write>(w: &mut W, name: &str, args: Vec<MarshalValue>) -> AppResult<()> {
    let mut items = Vec::with_capacity(args.len() + 1);
    items.push(MarshalValue::text(name));
    items.extend(args);
    write_message(w, MessageCode::Call, MarshalValue::Tuple(items))
}

/// Read one framed message; `None` at a clean end of stream.
pub fn read_message<R: Read>(r: &mut R) -> AppResult<Option<Message>> {
    let mut outer = Unmarshaller::new(r, CHANNEL_VERSION);
    let frame = match outer.read_value()? {
        None => return Ok(None),
        Some(MarshalValue::Bytes(b)) => b,
        Some(other) => return Err(AppError::corrupt("bad_frame", format!("frame must be a byte string, got {}", other.type_name()))),
    };
    let mut inner = Unmarshaller::new(frame.as_slice(), CHANNEL_VERSION);
    let tuple = inner.read_value()?.ok_or_else(|| AppError::corrupt("empty_frame", "frame holds no message"))?;
    if !inner.into_inner().is_empty() {
        return Err(AppError::corrupt("trailing_bytes", "frame holds data after the message"));
    }
    match tuple {
        MarshalValue::Tuple(mut items) if items.len() == 2 => {
            let body = items.pop().unwrap_or(MarshalValue::Null);
            let code = MessageCode::from_value(&items[0])?;
            Ok(Some(Message { code, body }))
        }
        other => Err(AppError::corrupt("bad_message", format!("message must be a (code, body) pair, got {}", other.type_name()))),
    }
}

/// Read a message sent as two consecutive values, code first.
pub fn read_unframed_message<R: Read>(r: &mut R) -> AppResult<Option<Message>> {
    let mut un = Unmarshaller::new(r, CHANNEL_VERSION);
    let code = match un.read_value()? {
        None => return Ok(None),
        Some(v) => MessageCode::from_value(&v)?,
    };
    let body = un.read_value()?.ok_or_else(|| AppError::corrupt("truncated", "message code without a body"))?;
    Ok(Some(Message { code, body }))
}
