//! Strict decimal integers
//!
//! Integers in the stream are plain ASCII digits. Unsigned slots reject any
//! sign; signed slots accept a leading `-` only. The whole field must be
//! consumed, so `5x` is an error rather than `5`.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum IntegerError {
    #[error("sign not permitted")]
    ForbiddenSign,
    #[error("unexpected byte after digits")]
    TrailingBytes,
    #[error("no digits")]
    NoDigits,
    #[error("value out of range")]
    Overflow,
}

/// Scan the leading digits of `field`
///
/// # Returns
///
/// The value of the digits and how many bytes they span
fn scan_digits(field: &[u8]) -> Result<(u64, usize), IntegerError> {
    let len = field.iter().take_while(|b| b.is_ascii_digit()).count();
    if len == 0 {
        return Err(IntegerError::NoDigits);
    }

    let value = field[..len].iter().try_fold(0u64, |acc, &digit| {
        acc.checked_mul(10)
            .and_then(|acc| acc.checked_add(u64::from(digit - b'0')))
            .ok_or(IntegerError::Overflow)
    })?;

    Ok((value, len))
}

fn reject_sign(field: &[u8]) -> Result<(), IntegerError> {
    match field.first() {
        Some(b'+' | b'-') => Err(IntegerError::ForbiddenSign),
        _ => Ok(()),
    }
}

pub fn parse_u64(field: &[u8]) -> Result<u64, IntegerError> {
    reject_sign(field)?;
    let (value, len) = scan_digits(field)?;
    if len != field.len() {
        return Err(IntegerError::TrailingBytes);
    }
    Ok(value)
}

pub fn parse_u32(field: &[u8]) -> Result<u32, IntegerError> {
    u32::try_from(parse_u64(field)?).map_err(|_| IntegerError::Overflow)
}

pub fn parse_u16(field: &[u8]) -> Result<u16, IntegerError> {
    u16::try_from(parse_u64(field)?).map_err(|_| IntegerError::Overflow)
}

pub fn parse_i64(field: &[u8]) -> Result<i64, IntegerError> {
    let (negative, digits) = match field.split_first() {
        Some((b'-', rest)) => (true, rest),
        Some((b'+', _)) => return Err(IntegerError::ForbiddenSign),
        _ => (false, field),
    };
    let magnitude = parse_u64(digits).map_err(|err| match err {
        // "--5" reads as a second sign, not a signed magnitude
        IntegerError::ForbiddenSign => IntegerError::NoDigits,
        err => err,
    })?;

    if negative {
        0i64.checked_sub_unsigned(magnitude)
            .ok_or(IntegerError::Overflow)
    } else {
        i64::try_from(magnitude).map_err(|_| IntegerError::Overflow)
    }
}

/// Parse an unsigned integer that ends at `terminator` or at the end of `field`
///
/// # Returns
///
/// The value and the bytes after the terminator, or `None` when the digits
/// ran to the end of the field
pub fn split_u64(field: &[u8], terminator: u8) -> Result<(u64, Option<&[u8]>), IntegerError> {
    reject_sign(field)?;
    let (value, len) = scan_digits(field)?;
    match field.get(len) {
        None => Ok((value, None)),
        Some(&b) if b == terminator => Ok((value, Some(&field[len + 1..]))),
        Some(_) => Err(IntegerError::TrailingBytes),
    }
}

/// Whether a digit string carries redundant leading zeros
pub fn is_zero_padded(field: &[u8]) -> bool {
    field.len() > 1 && field[0] == b'0'
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UnitFactor {
    #[default]
    Byte,
    Kibi,
    Mebi,
    Gibi,
}

impl UnitFactor {
    pub fn multiplier(&self) -> u64 {
        match self {
            UnitFactor::Byte => 1,
            UnitFactor::Kibi => 1 << 10,
            UnitFactor::Mebi => 1 << 20,
            UnitFactor::Gibi => 1 << 30,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            UnitFactor::Byte => "",
            UnitFactor::Kibi => "k",
            UnitFactor::Mebi => "m",
            UnitFactor::Gibi => "g",
        }
    }
}

/// A byte count with an optional `k`, `m` or `g` suffix, as used by
/// `option git --max-pack-size=` and friends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileSize {
    pub value: u32,
    pub unit: UnitFactor,
}

impl FileSize {
    pub fn parse(field: &[u8]) -> Result<Self, IntegerError> {
        let (digits, unit) = match field.split_last() {
            Some((b'k' | b'K', digits)) => (digits, UnitFactor::Kibi),
            Some((b'm' | b'M', digits)) => (digits, UnitFactor::Mebi),
            Some((b'g' | b'G', digits)) => (digits, UnitFactor::Gibi),
            _ => (field, UnitFactor::Byte),
        };
        Ok(Self {
            value: parse_u32(digits)?,
            unit,
        })
    }

    pub fn bytes(&self) -> u64 {
        u64::from(self.value) * self.unit.multiplier()
    }
}

impl std::fmt::Display for FileSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}
