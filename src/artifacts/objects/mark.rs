use crate::artifacts::codec::integer::parse_u64;
use crate::artifacts::core::error::ParseError;

/// Session-local object name, written `:<n>` with `n >= 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Mark(u64);

impl Mark {
    pub fn new(id: u64) -> Option<Self> {
        (id != 0).then_some(Self(id))
    }

    /// Parse `:<n>`
    pub fn parse(field: &[u8]) -> Result<Self, ParseError> {
        let digits = field.strip_prefix(b":").ok_or(ParseError::MarkMissingColon)?;
        Self::new(parse_u64(digits)?).ok_or(ParseError::ZeroMark)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Mark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, ":{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::codec::integer::IntegerError;
    use rstest::rstest;

    #[rstest]
    #[case(b"1", ParseError::MarkMissingColon)]
    #[case(b":0", ParseError::ZeroMark)]
    #[case(b":", ParseError::Integer(IntegerError::NoDigits))]
    #[case(b":+1", ParseError::Integer(IntegerError::ForbiddenSign))]
    #[case(b":1a", ParseError::Integer(IntegerError::TrailingBytes))]
    fn malformed_marks(#[case] field: &[u8], #[case] expected: ParseError) {
        assert_eq!(Mark::parse(field), Err(expected));
    }

    #[test]
    fn displays_with_colon() {
        let mark = Mark::parse(b":42").unwrap();
        assert_eq!(mark.id(), 42);
        assert_eq!(mark.to_string(), ":42");
    }
}
