//! Person identifiers of `author`, `committer` and `tagger` lines
//!
//! ## Format
//!
//! ```text
//! (<name> SP)? LT <email> GT SP <date>
//! ```
//!
//! The name is absent when the field starts with `<`. Neither name nor
//! email may contain `<`, `>`, LF or NUL.

use crate::artifacts::codec::date::{Date, DateError, DateFormat};
use crate::artifacts::core::error::PackError;
use bstr::BString;
use derive_new::new;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum IdentError {
    #[error("contains NUL")]
    ContainsNul,
    #[error("missing '<'")]
    MissingLt,
    #[error("missing '>' after '<'")]
    MissingGt,
    #[error("name must be followed by a space")]
    MissingSpaceBeforeLt,
    #[error("email must be followed by a space")]
    MissingSpaceAfterGt,
    #[error("{0}")]
    Date(#[from] DateError),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, new)]
pub struct PersonIdent {
    pub name: Option<BString>,
    pub email: BString,
    pub date: Date,
}

impl PersonIdent {
    /// Parse the field after `author `, `committer ` or `tagger `
    ///
    /// # Arguments
    ///
    /// * `field` - Identifier bytes without the keyword
    /// * `format` - Date format active at this point of the stream
    pub fn parse(field: &[u8], format: DateFormat) -> Result<Self, IdentError> {
        if field.contains(&0) {
            return Err(IdentError::ContainsNul);
        }

        let lt = memchr::memchr2(b'<', b'>', field).ok_or(IdentError::MissingLt)?;
        if field[lt] != b'<' {
            return Err(IdentError::MissingLt);
        }
        let name = match lt {
            0 => None,
            _ if field[lt - 1] == b' ' => Some(BString::from(&field[..lt - 1])),
            _ => return Err(IdentError::MissingSpaceBeforeLt),
        };

        let gt = memchr::memchr2(b'<', b'>', &field[lt + 1..])
            .map(|i| lt + 1 + i)
            .filter(|&i| field[i] == b'>')
            .ok_or(IdentError::MissingGt)?;
        let email = BString::from(&field[lt + 1..gt]);

        let date = field[gt + 1..]
            .strip_prefix(b" ")
            .ok_or(IdentError::MissingSpaceAfterGt)?;
        let date = Date::parse(date, format)?;

        Ok(Self { name, email, date })
    }

    /// Append the identifier in stream form
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<(), PackError> {
        if let Some(name) = &self.name {
            check_field(name, "name")?;
            out.extend_from_slice(name);
            out.push(b' ');
        }
        check_field(&self.email, "email")?;
        out.push(b'<');
        out.extend_from_slice(&self.email);
        out.extend_from_slice(b"> ");
        self.date.write_to(out);
        Ok(())
    }
}

fn check_field(value: &[u8], what: &'static str) -> Result<(), PackError> {
    if value.contains(&0) {
        return Err(PackError::ContainsNul(what));
    }
    if value.contains(&b'\n') {
        return Err(PackError::ContainsNewline(what));
    }
    if value.iter().any(|&b| b == b'<' || b == b'>') {
        return Err(PackError::IdentDelimiter(what));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn parses_full_identifier() {
        let ident =
            PersonIdent::parse(b"A U Thor <thor@example.com> 1700000000 +0100", DateFormat::Raw)
                .unwrap();
        assert_eq!(ident.name, Some("A U Thor".into()));
        assert_eq!(ident.email, "thor@example.com");

        let mut out = Vec::new();
        ident.write_to(&mut out).unwrap();
        assert_eq!(out, b"A U Thor <thor@example.com> 1700000000 +0100".to_vec());
    }

    #[test]
    fn name_is_optional() {
        let ident = PersonIdent::parse(b"<nobody@example.com> 0 +0000", DateFormat::Raw).unwrap();
        assert_eq!(ident.name, None);

        let empty = PersonIdent::parse(b" <e> 0 +0000", DateFormat::Raw).unwrap();
        assert_eq!(empty.name, Some("".into()));
    }

    #[rstest]
    #[case(&b"Name email> 0 +0000"[..], IdentError::MissingLt)]
    #[case(&b"Name <email 0 +0000"[..], IdentError::MissingGt)]
    #[case(&b"Name<email> 0 +0000"[..], IdentError::MissingSpaceBeforeLt)]
    #[case(&b"Name <email>0 +0000"[..], IdentError::MissingSpaceAfterGt)]
    #[case(&b"Na\0me <email> 0 +0000"[..], IdentError::ContainsNul)]
    #[case(&b"Name <email> x +0000"[..], IdentError::Date(DateError::Seconds(crate::artifacts::codec::integer::IntegerError::NoDigits)))]
    fn malformed_identifiers(#[case] field: &[u8], #[case] expected: IdentError) {
        assert_eq!(PersonIdent::parse(field, DateFormat::Raw), Err(expected));
    }

    #[test]
    fn refuses_to_write_delimiters() {
        let ident = PersonIdent::new(Some("bad <name".into()), "e".into(), Date::Now);
        assert_eq!(
            ident.write_to(&mut Vec::new()),
            Err(PackError::IdentDelimiter("name"))
        );
    }
}
