//! Boundary conversions between stored channel types and interpreter values
//!
//! Reads widen or narrow every stored primitive to its canonical form
//! (`float32`, `int32`, `bool`). Writes go the other way under three rules:
//! floats may only land in float channels, integers only in integer
//! channels, and bools anywhere (as 0 or 1).
//!
//! Author: Moroya Sakamoto

use super::channel_map::{ChannelAccessor, ChannelError};
use super::{DataType, ScalarType, Value};
use glam::{Quat, Vec3};

/// Verify that a value of type `from` may be written to a channel of type `to`
pub fn check_assignable(channel: &str, from: DataType, to: DataType) -> Result<(), ChannelError> {
    if from.arity != to.arity {
        return Err(ChannelError::ArityMismatch {
            channel: channel.to_string(),
            expected: to.arity,
            found: from.arity,
        });
    }
    let ok = match from.scalar.canonical() {
        ScalarType::Bool => true,
        ScalarType::Float32 => to.scalar.is_float(),
        _ => to.scalar.is_int(),
    };
    if ok {
        Ok(())
    } else {
        Err(ChannelError::IncompatibleTypes {
            channel: channel.to_string(),
            from,
            to,
        })
    }
}

impl ChannelAccessor {
    /// Read this channel from a record, converted to its canonical value
    ///
    /// Returns `None` if the canonical type is not one a [`Value`] can hold
    /// (for example an `int32[3]` channel).
    pub fn read(&self, record: &[u8]) -> Option<Value> {
        let canonical = self.data_type.canonical();
        if !canonical.is_value_type() {
            return None;
        }
        let scalar = self.data_type.scalar;
        let size = scalar.size();
        let bytes = &record[self.range()];

        let mut lanes = [0.0f64; 4];
        let mut ints = [0i64; 4];
        for i in 0..self.data_type.arity as usize {
            let elem = &bytes[i * size..(i + 1) * size];
            if scalar.is_float() {
                lanes[i] = read_float(scalar, elem);
            } else {
                ints[i] = read_int(scalar, elem);
            }
        }

        Some(match canonical {
            DataType::FLOAT => Value::Float(lanes[0] as f32),
            DataType::INT => Value::Int(ints[0] as i32),
            DataType::BOOL => Value::Bool(ints[0] != 0),
            DataType::VEC3 => Value::Vec3(Vec3::new(
                lanes[0] as f32,
                lanes[1] as f32,
                lanes[2] as f32,
            )),
            _ => Value::Quat(Quat::from_xyzw(
                lanes[0] as f32,
                lanes[1] as f32,
                lanes[2] as f32,
                lanes[3] as f32,
            )),
        })
    }

    /// Write a canonical value into this channel of a record
    ///
    /// The caller is expected to have validated the combination with
    /// [`check_assignable`]; an arity mismatch writes the common prefix.
    pub fn write(&self, record: &mut [u8], value: &Value) {
        let scalar = self.data_type.scalar;
        let size = scalar.size();
        let (words, count) = value.to_words();
        let bytes = &mut record[self.range()];
        let lanes = count.min(self.data_type.arity as usize);

        for (i, &word) in words.iter().enumerate().take(lanes) {
            let elem = &mut bytes[i * size..(i + 1) * size];
            match value {
                Value::Int(_) | Value::Bool(_) => {
                    let v = word as i32 as i64;
                    if scalar.is_float() {
                        write_float(scalar, elem, v as f64);
                    } else {
                        write_int(scalar, elem, v);
                    }
                }
                _ => {
                    let v = f32::from_bits(word) as f64;
                    if scalar.is_float() {
                        write_float(scalar, elem, v);
                    } else {
                        write_int(scalar, elem, v as i64);
                    }
                }
            }
        }
    }
}

fn read_float(scalar: ScalarType, b: &[u8]) -> f64 {
    match scalar {
        ScalarType::Float16 => f16_to_f32(u16::from_le_bytes([b[0], b[1]])) as f64,
        ScalarType::Float32 => f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
        _ => f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
    }
}

fn read_int(scalar: ScalarType, b: &[u8]) -> i64 {
    match scalar {
        ScalarType::Bool => (b[0] != 0) as i64,
        ScalarType::Int8 => b[0] as i8 as i64,
        ScalarType::UInt8 => b[0] as i64,
        ScalarType::Int16 => i16::from_le_bytes([b[0], b[1]]) as i64,
        ScalarType::UInt16 => u16::from_le_bytes([b[0], b[1]]) as i64,
        ScalarType::Int32 => i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64,
        ScalarType::UInt32 => u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64,
        ScalarType::Int64 => i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
        _ => u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as i64,
    }
}

fn write_float(scalar: ScalarType, b: &mut [u8], v: f64) {
    match scalar {
        ScalarType::Float16 => b.copy_from_slice(&f32_to_f16(v as f32).to_le_bytes()),
        ScalarType::Float32 => b.copy_from_slice(&(v as f32).to_le_bytes()),
        _ => b.copy_from_slice(&v.to_le_bytes()),
    }
}

fn write_int(scalar: ScalarType, b: &mut [u8], v: i64) {
    match scalar {
        ScalarType::Bool => b[0] = (v != 0) as u8,
        ScalarType::Int8 | ScalarType::UInt8 => b[0] = v as u8,
        ScalarType::Int16 | ScalarType::UInt16 => b.copy_from_slice(&(v as u16).to_le_bytes()),
        ScalarType::Int32 | ScalarType::UInt32 => b.copy_from_slice(&(v as u32).to_le_bytes()),
        _ => b.copy_from_slice(&(v as u64).to_le_bytes()),
    }
}

/// Decode an IEEE 754 half precision bit pattern
pub fn f16_to_f32(bits: u16) -> f32 {
    let sign = ((bits >> 15) as u32) << 31;
    let exp = ((bits >> 10) & 0x1f) as u32;
    let mant = (bits & 0x3ff) as u32;

    let out = match (exp, mant) {
        (0, 0) => sign,
        (0, _) => {
            // Subnormal: renormalise the mantissa
            let mut e = 127 - 15 + 1;
            let mut m = mant;
            while m & 0x400 == 0 {
                m <<= 1;
                e -= 1;
            }
            sign | (e << 23) | ((m & 0x3ff) << 13)
        }
        (0x1f, 0) => sign | 0x7f80_0000,
        (0x1f, _) => sign | 0x7fc0_0000 | (mant << 13),
        _ => sign | ((exp + 127 - 15) << 23) | (mant << 13),
    };
    f32::from_bits(out)
}

/// Encode an `f32` as IEEE 754 half precision (round to nearest even)
pub fn f32_to_f16(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exp = ((bits >> 23) & 0xff) as i32;
    let mant = bits & 0x7f_ffff;

    if exp == 0xff {
        let nan = if mant != 0 { 0x200 } else { 0 };
        return sign | 0x7c00 | nan;
    }

    let half_exp = exp - 127 + 15;
    if half_exp >= 0x1f {
        return sign | 0x7c00;
    }
    if half_exp <= 0 {
        if half_exp < -10 {
            return sign;
        }
        let m = mant | 0x80_0000;
        let shift = (14 - half_exp) as u32;
        let half_mant = m >> shift;
        let round = (m >> (shift - 1)) & 1;
        let sticky = m & ((1 << (shift - 1)) - 1);
        let rounded = half_mant + (round & ((sticky != 0) as u32 | (half_mant & 1)));
        return sign | rounded as u16;
    }

    let half_mant = mant >> 13;
    let round = (mant >> 12) & 1;
    let sticky = mant & 0xfff;
    let mut out = ((half_exp as u32) << 10) | half_mant;
    out += round & ((sticky != 0) as u32 | (half_mant & 1));
    sign | out as u16
}
