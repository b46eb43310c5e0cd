//! Order-preserving binary encoding of values.
//!
//! [`as_hollerith`] turns a [`Value`] (usually a [`Value::List`] acting as a
//! composite key) into bytes whose lexicographic order matches the order of
//! the values themselves, so encoded keys can be stored in a `BLOB` index
//! column and range-scanned. [`from_hollerith`] reverses the encoding.
//!
//! # Layout
//!
//! Each value starts with a one-byte tag. Across kinds the order is
//! null < false < true < number < text < blob < list.
//!
//! - numbers: 12 bytes. A big-endian IEEE-754 double with the sign bit
//!   flipped for non-negative numbers and all bits inverted for negative
//!   ones, followed by a 4-byte offset with its sign bit flipped. The double is the number rounded
//!   to the nearest `f64`; the offset is the exact integer distance from it
//!   (always 0 for floats), so integers beyond 2^53 keep distinct keys
//! - text and blob: payload bytes with `0x00` escaped as `0x01 0x01` and
//!   `0x01` as `0x01 0x02`, followed by a `0x00` terminator
//! - list: encoded elements followed by a `0x00` terminator, so a list sorts
//!   before every list it is a proper prefix of
//!
//! Integers and floats share one numeric space. Decoding yields
//! [`Value::Integer`] for integral numbers within the `i64` range and
//! [`Value::Float`] otherwise; every `i64` decodes to itself.
//!
//! Lists may nest at most [`MAX_DEPTH`] levels deep.
//!
//! ```
//! use dba_core::{Value, as_hollerith, from_hollerith};
//!
//! let a = as_hollerith(&Value::List(vec![1.into(), "b".into()])).unwrap();
//! let b = as_hollerith(&Value::List(vec![2.into(), "a".into()])).unwrap();
//! assert!(a < b);
//! assert_eq!(from_hollerith(&a).unwrap(), Value::List(vec![1.into(), "b".into()]));
//! ```

use crate::error::{CoreError, Result};
use crate::value::Value;

const END: u8 = 0x00;
const ESCAPE: u8 = 0x01;
const TAG_NULL: u8 = 0x10;
const TAG_FALSE: u8 = 0x20;
const TAG_TRUE: u8 = 0x21;
const TAG_NUMBER: u8 = 0x30;
const TAG_TEXT: u8 = 0x40;
const TAG_BLOB: u8 = 0x50;
const TAG_LIST: u8 = 0x60;

/// 2^63, the exclusive upper bound of `i64` as an `f64`.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Deepest list nesting accepted by the encoder and decoder.
pub const MAX_DEPTH: usize = 128;

/// Encodes a value into its sortable byte form.
///
/// # Errors
///
/// Returns [`CoreError::HollerithError`] for [`Value::Undefined`], NaN and
/// lists nested deeper than [`MAX_DEPTH`].
pub fn as_hollerith(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode_into(value, &mut out, 0)?;
    Ok(out)
}

/// Decodes bytes produced by [`as_hollerith`].
///
/// # Errors
///
/// Returns [`CoreError::HollerithError`] on unknown tags, truncated input,
/// invalid UTF-8 in text payloads, lists nested deeper than [`MAX_DEPTH`],
/// or trailing bytes.
pub fn from_hollerith(bytes: &[u8]) -> Result<Value> {
    let mut decoder = Decoder {
        bytes,
        pos: 0,
        depth: 0,
    };
    let value = decoder.value()?;
    if decoder.pos != bytes.len() {
        return Err(CoreError::HollerithError(format!(
            "{} trailing bytes after value",
            bytes.len() - decoder.pos
        )));
    }
    Ok(value)
}

fn encode_into(value: &Value, out: &mut Vec<u8>, depth: usize) -> Result<()> {
    match value {
        Value::Null => out.push(TAG_NULL),
        Value::Boolean(false) => out.push(TAG_FALSE),
        Value::Boolean(true) => out.push(TAG_TRUE),
        Value::Integer(n) => {
            // rounding to nearest is monotonic, so (approx, offset) sorts exactly
            let approx = *n as f64;
            let offset = i128::from(*n) - approx as i128;
            encode_number(approx, offset as i32, out)?;
        }
        Value::Float(x) => encode_number(*x, 0, out)?,
        Value::Text(s) => {
            out.push(TAG_TEXT);
            encode_bytes(s.as_bytes(), out);
        }
        Value::Blob(b) => {
            out.push(TAG_BLOB);
            encode_bytes(b, out);
        }
        Value::List(items) => {
            if depth >= MAX_DEPTH {
                return Err(too_deep());
            }
            out.push(TAG_LIST);
            for item in items {
                encode_into(item, out, depth + 1)?;
            }
            out.push(END);
        }
        Value::Undefined => {
            return Err(CoreError::HollerithError(
                "unable to encode 'undefined'".to_string(),
            ));
        }
    }
    Ok(())
}

fn encode_number(x: f64, offset: i32, out: &mut Vec<u8>) -> Result<()> {
    if x.is_nan() {
        return Err(CoreError::HollerithError("unable to encode NaN".to_string()));
    }
    // -0.0 and 0.0 must produce the same key
    let x = if x == 0.0 { 0.0 } else { x };
    let bits = x.to_bits();
    let sortable = if bits >> 63 == 1 { !bits } else { bits | (1 << 63) };
    out.push(TAG_NUMBER);
    out.extend_from_slice(&sortable.to_be_bytes());
    out.extend_from_slice(&((offset as u32) ^ (1 << 31)).to_be_bytes());
    Ok(())
}

fn too_deep() -> CoreError {
    CoreError::HollerithError(format!("lists nested deeper than {MAX_DEPTH} levels"))
}

fn encode_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    for &b in bytes {
        match b {
            0x00 => out.extend_from_slice(&[ESCAPE, 0x01]),
            0x01 => out.extend_from_slice(&[ESCAPE, 0x02]),
            _ => out.push(b),
        }
    }
    out.push(END);
}

struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl Decoder<'_> {
    fn next_byte(&mut self) -> Result<u8> {
        let b = *self
            .bytes
            .get(self.pos)
            .ok_or_else(|| CoreError::HollerithError("unexpected end of input".to_string()))?;
        self.pos += 1;
        Ok(b)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn value(&mut self) -> Result<Value> {
        let tag = self.next_byte()?;
        match tag {
            TAG_NULL => Ok(Value::Null),
            TAG_FALSE => Ok(Value::Boolean(false)),
            TAG_TRUE => Ok(Value::Boolean(true)),
            TAG_NUMBER => self.number(),
            TAG_TEXT => {
                let bytes = self.escaped_bytes()?;
                String::from_utf8(bytes)
                    .map(Value::Text)
                    .map_err(|e| CoreError::HollerithError(format!("invalid UTF-8 in text: {e}")))
            }
            TAG_BLOB => Ok(Value::Blob(self.escaped_bytes()?)),
            TAG_LIST => {
                if self.depth >= MAX_DEPTH {
                    return Err(too_deep());
                }
                self.depth += 1;
                let mut items = Vec::new();
                loop {
                    match self.peek() {
                        Some(END) => {
                            self.pos += 1;
                            self.depth -= 1;
                            return Ok(Value::List(items));
                        }
                        Some(_) => items.push(self.value()?),
                        None => {
                            return Err(CoreError::HollerithError(
                                "unterminated list".to_string(),
                            ));
                        }
                    }
                }
            }
            other => Err(CoreError::HollerithError(format!(
                "unknown tag 0x{other:02x} at offset {}",
                self.pos - 1
            ))),
        }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.pos + N;
        let chunk = self
            .bytes
            .get(self.pos..end)
            .ok_or_else(|| CoreError::HollerithError("truncated number".to_string()))?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(chunk);
        self.pos = end;
        Ok(buf)
    }

    fn number(&mut self) -> Result<Value> {
        let sortable = u64::from_be_bytes(self.take::<8>()?);
        let offset = (u32::from_be_bytes(self.take::<4>()?) ^ (1 << 31)) as i32;

        let bits = if sortable >> 63 == 1 {
            sortable & !(1 << 63)
        } else {
            !sortable
        };
        let x = f64::from_bits(bits);
        let integral = x.fract() == 0.0 && (-I64_BOUND..=I64_BOUND).contains(&x);
        if offset == 0 {
            return Ok(if integral && x < I64_BOUND {
                Value::Integer(x as i64)
            } else {
                Value::Float(x)
            });
        }
        if !integral {
            return Err(CoreError::HollerithError(format!(
                "integer offset {offset} on non-integral number {x}"
            )));
        }
        i64::try_from(x as i128 + i128::from(offset))
            .map(Value::Integer)
            .map_err(|_| CoreError::HollerithError(format!("integer out of range near {x}")))
    }

    fn escaped_bytes(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            match self.next_byte()? {
                END => return Ok(out),
                ESCAPE => match self.next_byte()? {
                    0x01 => out.push(0x00),
                    0x02 => out.push(0x01),
                    other => {
                        return Err(CoreError::HollerithError(format!(
                            "invalid escape sequence 0x01 0x{other:02x}"
                        )));
                    }
                },
                b => out.push(b),
            }
        }
    }
}
