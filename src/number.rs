//! Numeric objects: integers, bignums, based integers, fractions and
//! decimals, with the promotion rules between them.
//!
//! Small integers keep their magnitude in LEB128 with the sign in the type
//! id. Arithmetic that overflows u64 promotes to a little-endian byte
//! bignum; inexact integer division produces a reduced fraction; any
//! decimal operand makes the result decimal. The decimal backend is an
//! external library wrapped behind an opaque 16-byte payload.

use std::cmp::Ordering;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::leb128;
use crate::object::{self, Id, ObjRef};
use crate::runtime::Runtime;
use crate::settings::{AngleMode, Settings};
use crate::{CoreError, Result};

/// Byte width of a decimal payload.
pub const DECIMAL_PAYLOAD: usize = 16;

const U64_MAX: u128 = u64::MAX as u128;

/// A numeric object decoded into native form. No variant references the
/// arena, so holding one across an allocation is collection-safe.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Magnitude bounded by u64; anything larger becomes `Big`.
    Int(i128),
    /// Sign and little-endian magnitude, always above u64.
    Big(bool, Vec<u8>),
    /// Sign, reduced numerator and denominator; denominator > 1.
    Frac(bool, u64, u64),
    Dec(Decimal),
    /// Based integer and the id carrying its base.
    Based(Id, u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrigOp {
    Sin,
    Cos,
    Tan,
}

// ----------------------------------------------------------------------
// Constructors
// ----------------------------------------------------------------------

pub fn make_integer(rt: &mut Runtime, value: i128) -> Result<ObjRef> {
    let neg = value < 0;
    let mag = value.unsigned_abs();
    if mag <= U64_MAX {
        let mut payload = Vec::new();
        leb128::write(&mut payload, mag);
        rt.allocate(if neg { Id::NegInteger } else { Id::Integer }, &payload)
    } else {
        make_bignum(rt, neg, &big_from_u128(mag))
    }
}

pub fn make_based(rt: &mut Runtime, id: Id, value: u64) -> Result<ObjRef> {
    debug_assert!(id.is_based());
    let mut payload = Vec::new();
    leb128::write(&mut payload, value as u128);
    rt.allocate(id, &payload)
}

/// Allocate a bignum; collapses back to an integer when the magnitude
/// fits u64.
pub fn make_bignum(rt: &mut Runtime, neg: bool, magnitude: &[u8]) -> Result<ObjRef> {
    let mag = big_norm(magnitude);
    if let Some(small) = big_to_u128(&mag).filter(|&v| v <= U64_MAX) {
        let signed = if neg { -(small as i128) } else { small as i128 };
        return make_integer(rt, signed);
    }
    let mut payload = Vec::new();
    leb128::write(&mut payload, mag.len() as u128);
    payload.extend_from_slice(&mag);
    rt.allocate(if neg { Id::NegBignum } else { Id::Bignum }, &payload)
}

/// Allocate a reduced fraction; collapses to an integer when the reduced
/// denominator is one.
pub fn make_fraction(rt: &mut Runtime, neg: bool, num: u64, den: u64) -> Result<ObjRef> {
    debug_assert!(den != 0);
    let g = gcd(num as u128, den as u128) as u64;
    let (num, den) = (num / g, den / g);
    if den == 1 {
        let signed = if neg { -(num as i128) } else { num as i128 };
        return make_integer(rt, signed);
    }
    let mut payload = Vec::new();
    leb128::write(&mut payload, num as u128);
    leb128::write(&mut payload, den as u128);
    rt.allocate(if neg { Id::NegFraction } else { Id::Fraction }, &payload)
}

pub fn make_decimal(rt: &mut Runtime, value: Decimal) -> Result<ObjRef> {
    rt.allocate(Id::Decimal, &value.serialize())
}

pub fn encode(rt: &mut Runtime, value: &Value) -> Result<ObjRef> {
    match value {
        Value::Int(v) => make_integer(rt, *v),
        Value::Big(neg, mag) => make_bignum(rt, *neg, mag),
        Value::Frac(neg, n, d) => make_fraction(rt, *neg, *n, *d),
        Value::Dec(d) => make_decimal(rt, *d),
        Value::Based(id, v) => make_based(rt, *id, *v),
    }
}

// ----------------------------------------------------------------------
// Accessors
// ----------------------------------------------------------------------

pub fn int_value(rt: &Runtime, o: ObjRef) -> Option<i128> {
    let body = object::payload(rt, o);
    let (mag, _) = leb128::read(rt.mem_from(body))?;
    match object::id_of(rt, o) {
        Id::Integer => Some(mag as i128),
        Id::NegInteger => Some(-(mag as i128)),
        _ => None,
    }
}

pub fn based_value(rt: &Runtime, o: ObjRef) -> Option<(Id, u64)> {
    let id = object::id_of(rt, o);
    if !id.is_based() {
        return None;
    }
    let body = object::payload(rt, o);
    let (value, _) = leb128::read(rt.mem_from(body))?;
    Some((id, value as u64))
}

pub fn decimal_value(rt: &Runtime, o: ObjRef) -> Option<Decimal> {
    if object::id_of(rt, o) != Id::Decimal {
        return None;
    }
    let body = object::payload(rt, o);
    let bytes: [u8; DECIMAL_PAYLOAD] =
        rt.slice(body, DECIMAL_PAYLOAD).try_into().ok()?;
    Some(Decimal::deserialize(bytes))
}

/// Decode any numeric object into native form.
pub fn decode(rt: &Runtime, o: ObjRef) -> Option<Value> {
    let id = object::id_of(rt, o);
    let body = object::payload(rt, o);
    match id {
        Id::Integer | Id::NegInteger => int_value(rt, o).map(Value::Int),
        Id::BinInteger | Id::OctInteger | Id::DecInteger | Id::HexInteger => {
            based_value(rt, o).map(|(id, v)| Value::Based(id, v))
        }
        Id::Bignum | Id::NegBignum => {
            let (count, n) = leb128::read(rt.mem_from(body))?;
            let mag = rt.slice(body + n, count as usize).to_vec();
            Some(Value::Big(id == Id::NegBignum, mag))
        }
        Id::Fraction | Id::NegFraction => {
            let (num, n1) = leb128::read(rt.mem_from(body))?;
            let (den, _) = leb128::read(rt.mem_from(body + n1))?;
            Some(Value::Frac(id == Id::NegFraction, num as u64, den as u64))
        }
        Id::Decimal => decimal_value(rt, o).map(Value::Dec),
        _ => None,
    }
}

/// Plain integer argument for the mode commands; based integers and
/// fractions do not qualify.
pub fn int_arg(rt: &Runtime, o: ObjRef) -> Option<i128> {
    int_value(rt, o)
}

pub fn eq_numeric(rt: &Runtime, a: ObjRef, b: ObjRef) -> bool {
    match (decode(rt, a), decode(rt, b)) {
        (Some(va), Some(vb)) => value_eq(&va, &vb),
        _ => false,
    }
}

pub fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Big(sa, ma), Value::Big(sb, mb)) => sa == sb && ma == mb,
        (Value::Frac(sa, na, da), Value::Frac(sb, nb, db)) => {
            sa == sb && na == nb && da == db
        }
        (Value::Dec(x), Value::Dec(y)) => x == y,
        (Value::Based(ia, va), Value::Based(ib, vb)) => ia == ib && va == vb,
        _ => match (to_decimal(a), to_decimal(b)) {
            (Ok(x), Ok(y)) => x == y,
            _ => false,
        },
    }
}

// ----------------------------------------------------------------------
// Arithmetic
// ----------------------------------------------------------------------

type Arith = std::result::Result<Value, CoreError>;

/// Apply `op` with the numeric promotion rules.
pub fn binary(op: ArithOp, a: &Value, b: &Value, settings: &Settings) -> Arith {
    use Value::*;
    match (a, b) {
        (Based(..), _) | (_, Based(..)) => based_op(op, a, b, settings),
        (Dec(_), _) | (_, Dec(_)) => decimal_op(op, a, b, settings),
        (Frac(..), Big(..)) | (Big(..), Frac(..)) => decimal_op(op, a, b, settings),
        (Frac(..), _) | (_, Frac(..)) => frac_op(op, a, b, settings),
        (Big(..), _) | (_, Big(..)) => big_op(op, a, b, settings),
        (Int(x), Int(y)) => int_op(op, *x, *y),
    }
}

pub fn negate(v: &Value, settings: &Settings) -> Value {
    match v {
        Value::Int(x) => Value::Int(-x),
        Value::Big(neg, mag) => Value::Big(!neg, mag.clone()),
        Value::Frac(neg, n, d) => Value::Frac(!neg, *n, *d),
        Value::Dec(d) => Value::Dec(-*d),
        Value::Based(id, x) => {
            Value::Based(*id, x.wrapping_neg() & wordsize_mask(settings.wordsize))
        }
    }
}

pub fn invert(v: &Value, settings: &Settings) -> Arith {
    binary(ArithOp::Div, &Value::Int(1), v, settings)
}

pub fn sqrt(v: &Value, settings: &Settings) -> Arith {
    let d = to_decimal(v)?;
    if d.is_sign_negative() && !d.is_zero() {
        return Err(CoreError::UndefinedResult);
    }
    let x = d.to_f64().ok_or(CoreError::Overflow)?;
    from_f64(x.sqrt(), settings)
}

pub fn trig(op: TrigOp, v: &Value, settings: &Settings) -> Arith {
    let x = to_decimal(v)?.to_f64().ok_or(CoreError::Overflow)?;
    let radians = match settings.angle_mode {
        AngleMode::Degrees => x.to_radians(),
        AngleMode::Radians => x,
        AngleMode::Grads => x * std::f64::consts::PI / 200.0,
    };
    let y = match op {
        TrigOp::Sin => radians.sin(),
        TrigOp::Cos => radians.cos(),
        TrigOp::Tan => radians.tan(),
    };
    from_f64(y, settings)
}

fn from_f64(x: f64, settings: &Settings) -> Arith {
    let d = Decimal::from_f64_retain(x).ok_or(CoreError::UndefinedResult)?;
    // The f64 carries no more than ~16 meaningful digits.
    let digits = (settings.precision as u32).min(15);
    Ok(Value::Dec(d.round_sf(digits).unwrap_or(d)))
}

fn norm_int(v: i128) -> Value {
    if v.unsigned_abs() <= U64_MAX {
        Value::Int(v)
    } else {
        Value::Big(v < 0, big_from_u128(v.unsigned_abs()))
    }
}

fn norm_big(neg: bool, mag: Vec<u8>) -> Value {
    let mag = big_norm(&mag);
    match big_to_u128(&mag).filter(|&v| v <= U64_MAX) {
        Some(v) if neg => Value::Int(-(v as i128)),
        Some(v) => Value::Int(v as i128),
        None => Value::Big(neg, mag),
    }
}

fn int_op(op: ArithOp, x: i128, y: i128) -> Arith {
    match op {
        ArithOp::Add => Ok(norm_int(x + y)),
        ArithOp::Sub => Ok(norm_int(x - y)),
        ArithOp::Mul => match x.checked_mul(y) {
            Some(p) => Ok(norm_int(p)),
            None => {
                let mag = x.unsigned_abs() * y.unsigned_abs();
                Ok(Value::Big((x < 0) != (y < 0), big_from_u128(mag)))
            }
        },
        ArithOp::Div => {
            if y == 0 {
                return Err(if x == 0 {
                    CoreError::UndefinedResult
                } else {
                    CoreError::DivideByZero
                });
            }
            if x % y == 0 {
                return Ok(norm_int(x / y));
            }
            let neg = (x < 0) != (y < 0);
            let (num, den) = (x.unsigned_abs() as u64, y.unsigned_abs() as u64);
            let g = gcd(num as u128, den as u128) as u64;
            Ok(Value::Frac(neg, num / g, den / g))
        }
    }
}

fn as_frac(v: &Value) -> (i128, u128) {
    match v {
        Value::Int(x) => (*x, 1),
        Value::Frac(neg, n, d) => {
            let num = if *neg { -(*n as i128) } else { *n as i128 };
            (num, *d as u128)
        }
        _ => (0, 1),
    }
}

fn frac_op(op: ArithOp, a: &Value, b: &Value, settings: &Settings) -> Arith {
    let (n1, d1) = as_frac(a);
    let (n2, d2) = as_frac(b);
    let exact = (|| -> Option<(i128, u128)> {
        match op {
            ArithOp::Add | ArithOp::Sub => {
                let l = n1.checked_mul(d2 as i128)?;
                let r = n2.checked_mul(d1 as i128)?;
                let num = if op == ArithOp::Add {
                    l.checked_add(r)?
                } else {
                    l.checked_sub(r)?
                };
                Some((num, d1.checked_mul(d2)?))
            }
            ArithOp::Mul => Some((n1.checked_mul(n2)?, d1.checked_mul(d2)?)),
            ArithOp::Div => {
                if n2 == 0 {
                    return None;
                }
                let num = n1.checked_mul(d2 as i128)?;
                let den = d1.checked_mul(n2.unsigned_abs())?;
                Some((if n2 < 0 { -num } else { num }, den))
            }
        }
    })();
    if op == ArithOp::Div && n2 == 0 {
        return Err(if n1 == 0 {
            CoreError::UndefinedResult
        } else {
            CoreError::DivideByZero
        });
    }
    match exact {
        Some((num, den)) => {
            let g = gcd(num.unsigned_abs(), den);
            let (nm, dn) = (num.unsigned_abs() / g, den / g);
            if dn == 1 {
                Ok(norm_int(if num < 0 { -(nm as i128) } else { nm as i128 }))
            } else if nm <= U64_MAX && dn <= U64_MAX {
                Ok(Value::Frac(num < 0, nm as u64, dn as u64))
            } else {
                decimal_op(op, a, b, settings)
            }
        }
        None => decimal_op(op, a, b, settings),
    }
}

fn as_big(v: &Value) -> (bool, Vec<u8>) {
    match v {
        Value::Int(x) => (*x < 0, big_from_u128(x.unsigned_abs())),
        Value::Big(neg, mag) => (*neg, mag.clone()),
        _ => (false, Vec::new()),
    }
}

fn big_op(op: ArithOp, a: &Value, b: &Value, settings: &Settings) -> Arith {
    let (sa, ma) = as_big(a);
    let (sb, mb) = as_big(b);
    match op {
        ArithOp::Add => Ok(big_signed_add(sa, &ma, sb, &mb)),
        ArithOp::Sub => Ok(big_signed_add(sa, &ma, !sb, &mb)),
        ArithOp::Mul => Ok(norm_big(sa != sb, big_mul(&ma, &mb))),
        // Exact bignum division is outside the integer tower; approximate.
        ArithOp::Div => decimal_op(op, a, b, settings),
    }
}

fn big_signed_add(sa: bool, ma: &[u8], sb: bool, mb: &[u8]) -> Value {
    if sa == sb {
        return norm_big(sa, big_add(ma, mb));
    }
    match big_cmp(ma, mb) {
        Ordering::Equal => Value::Int(0),
        Ordering::Greater => norm_big(sa, big_sub(ma, mb)),
        Ordering::Less => norm_big(sb, big_sub(mb, ma)),
    }
}

fn based_op(op: ArithOp, a: &Value, b: &Value, settings: &Settings) -> Arith {
    let mask = wordsize_mask(settings.wordsize);
    let operand = |v: &Value| -> std::result::Result<(Option<Id>, u64), CoreError> {
        match v {
            Value::Based(id, x) => Ok((Some(*id), *x & mask)),
            Value::Int(x) => Ok((None, *x as u64 & mask)),
            _ => Err(CoreError::BadArgumentType),
        }
    };
    let (ia, x) = operand(a)?;
    let (ib, y) = operand(b)?;
    let id = ia.or(ib).unwrap_or(Id::HexInteger);
    let r = match op {
        ArithOp::Add => x.wrapping_add(y),
        ArithOp::Sub => x.wrapping_sub(y),
        ArithOp::Mul => x.wrapping_mul(y),
        ArithOp::Div => {
            if y == 0 {
                return Err(if x == 0 {
                    CoreError::UndefinedResult
                } else {
                    CoreError::DivideByZero
                });
            }
            x / y
        }
    };
    Ok(Value::Based(id, r & mask))
}

fn decimal_op(op: ArithOp, a: &Value, b: &Value, settings: &Settings) -> Arith {
    let x = to_decimal(a)?;
    let y = to_decimal(b)?;
    let r = match op {
        ArithOp::Add => x.checked_add(y).ok_or(CoreError::Overflow)?,
        ArithOp::Sub => x.checked_sub(y).ok_or(CoreError::Overflow)?,
        ArithOp::Mul => x.checked_mul(y).ok_or(CoreError::Overflow)?,
        ArithOp::Div => {
            if y.is_zero() {
                return Err(if x.is_zero() {
                    CoreError::UndefinedResult
                } else {
                    CoreError::DivideByZero
                });
            }
            x.checked_div(y).ok_or(CoreError::Overflow)?
        }
    };
    let digits = settings.precision as u32;
    Ok(Value::Dec(r.round_sf(digits).unwrap_or(r)))
}

pub fn to_decimal(v: &Value) -> std::result::Result<Decimal, CoreError> {
    match v {
        Value::Int(x) => {
            Decimal::try_from_i128_with_scale(*x, 0).map_err(|_| CoreError::Overflow)
        }
        Value::Big(neg, mag) => {
            let s = big_to_string(*neg, mag);
            Decimal::from_str(&s).map_err(|_| CoreError::Overflow)
        }
        Value::Frac(neg, n, d) => {
            let num = Decimal::from(*n);
            let den = Decimal::from(*d);
            let q = num.checked_div(den).ok_or(CoreError::Overflow)?;
            Ok(if *neg { -q } else { q })
        }
        Value::Dec(d) => Ok(*d),
        Value::Based(_, x) => Ok(Decimal::from(*x)),
    }
}

fn wordsize_mask(wordsize: u16) -> u64 {
    if wordsize == 0 || wordsize >= 64 {
        u64::MAX
    } else {
        (1u64 << wordsize) - 1
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

// ----------------------------------------------------------------------
// Bignum helpers (little-endian byte magnitudes)
// ----------------------------------------------------------------------

fn big_norm(mag: &[u8]) -> Vec<u8> {
    let mut end = mag.len();
    while end > 0 && mag[end - 1] == 0 {
        end -= 1;
    }
    mag[..end].to_vec()
}

pub fn big_from_u128(value: u128) -> Vec<u8> {
    big_norm(&value.to_le_bytes())
}

pub fn big_to_u128(mag: &[u8]) -> Option<u128> {
    if mag.len() > 16 {
        return None;
    }
    let mut bytes = [0u8; 16];
    bytes[..mag.len()].copy_from_slice(mag);
    Some(u128::from_le_bytes(bytes))
}

fn big_cmp(a: &[u8], b: &[u8]) -> Ordering {
    if a.len() != b.len() {
        return a.len().cmp(&b.len());
    }
    for i in (0..a.len()).rev() {
        match a[i].cmp(&b[i]) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

fn big_add(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(a.len().max(b.len()) + 1);
    let mut carry = 0u16;
    for i in 0..a.len().max(b.len()) {
        let x = *a.get(i).unwrap_or(&0) as u16;
        let y = *b.get(i).unwrap_or(&0) as u16;
        let sum = x + y + carry;
        out.push(sum as u8);
        carry = sum >> 8;
    }
    if carry != 0 {
        out.push(carry as u8);
    }
    out
}

/// `a - b`, requiring `a >= b`.
fn big_sub(a: &[u8], b: &[u8]) -> Vec<u8> {
    debug_assert!(big_cmp(a, b) != Ordering::Less);
    let mut out = Vec::with_capacity(a.len());
    let mut borrow = 0i16;
    for i in 0..a.len() {
        let x = a[i] as i16;
        let y = *b.get(i).unwrap_or(&0) as i16;
        let mut diff = x - y - borrow;
        if diff < 0 {
            diff += 256;
            borrow = 1;
        } else {
            borrow = 0;
        }
        out.push(diff as u8);
    }
    big_norm(&out)
}

fn big_mul(a: &[u8], b: &[u8]) -> Vec<u8> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0u8; a.len() + b.len()];
    for (i, &x) in a.iter().enumerate() {
        let mut carry = 0u32;
        for (j, &y) in b.iter().enumerate() {
            let t = out[i + j] as u32 + (x as u32) * (y as u32) + carry;
            out[i + j] = t as u8;
            carry = t >> 8;
        }
        let mut k = i + b.len();
        while carry != 0 {
            let t = out[k] as u32 + carry;
            out[k] = t as u8;
            carry = t >> 8;
            k += 1;
        }
    }
    big_norm(&out)
}

fn big_divmod_small(mag: &[u8], divisor: u32) -> (Vec<u8>, u32) {
    let mut quotient = vec![0u8; mag.len()];
    let mut rem = 0u64;
    for i in (0..mag.len()).rev() {
        let cur = (rem << 8) | mag[i] as u64;
        quotient[i] = (cur / divisor as u64) as u8;
        rem = cur % divisor as u64;
    }
    (big_norm(&quotient), rem as u32)
}

/// Decimal rendering of a magnitude, with sign.
pub fn big_to_string(neg: bool, mag: &[u8]) -> String {
    let mut mag = big_norm(mag);
    if mag.is_empty() {
        return "0".to_string();
    }
    let mut chunks = Vec::new();
    while !mag.is_empty() {
        let (q, r) = big_divmod_small(&mag, 1_000_000_000);
        chunks.push(r);
        mag = q;
    }
    let mut out = String::new();
    if neg {
        out.push('-');
    }
    out.push_str(&chunks.pop().unwrap_or(0).to_string());
    while let Some(chunk) = chunks.pop() {
        out.push_str(&format!("{chunk:09}"));
    }
    out
}

/// Magnitude from a run of decimal digits.
pub fn big_from_digits(digits: &str) -> Vec<u8> {
    let mut mag: Vec<u8> = Vec::new();
    for c in digits.chars() {
        let d = c.to_digit(10).unwrap_or(0);
        let mut carry = d;
        for byte in mag.iter_mut() {
            let t = (*byte as u32) * 10 + carry;
            *byte = t as u8;
            carry = t >> 8;
        }
        while carry != 0 {
            mag.push(carry as u8);
            carry >>= 8;
        }
    }
    mag
}
