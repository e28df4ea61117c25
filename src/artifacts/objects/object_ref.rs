use crate::artifacts::core::error::ParseError;
use crate::artifacts::objects::mark::Mark;
use crate::artifacts::objects::object_id::ObjectId;
use bstr::{BStr, BString};

/// Reference to an object from `from`, `merge`, `M`, `N`, `ls` and friends
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectRef {
    Mark(Mark),
    ObjectId(ObjectId),
    /// Any other committish, e.g. a branch name or `HEAD^`
    Symbolic(BString),
}

impl ObjectRef {
    pub fn parse(field: &[u8]) -> Result<Self, ParseError> {
        match field {
            [] => Err(ParseError::EmptyReference),
            [b':', ..] => Ok(ObjectRef::Mark(Mark::parse(field)?)),
            _ if ObjectId::is_object_id(field) => match ObjectId::try_parse(field) {
                Ok(oid) => Ok(ObjectRef::ObjectId(oid)),
                Err(_) => Ok(ObjectRef::Symbolic(field.into())),
            },
            _ => {
                if field.contains(&0) {
                    return Err(ParseError::ContainsNul("object reference"));
                }
                Ok(ObjectRef::Symbolic(field.into()))
            }
        }
    }

    pub fn mark(&self) -> Option<Mark> {
        match self {
            ObjectRef::Mark(mark) => Some(*mark),
            _ => None,
        }
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            ObjectRef::Mark(mark) => out.extend_from_slice(mark.to_string().as_bytes()),
            ObjectRef::ObjectId(oid) => out.extend_from_slice(oid.as_ref().as_bytes()),
            ObjectRef::Symbolic(name) => out.extend_from_slice(name),
        }
    }
}

impl From<Mark> for ObjectRef {
    fn from(mark: Mark) -> Self {
        ObjectRef::Mark(mark)
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectRef::Mark(mark) => write!(f, "{mark}"),
            ObjectRef::ObjectId(oid) => write!(f, "{oid}"),
            ObjectRef::Symbolic(name) => write!(f, "{}", BStr::new(name)),
        }
    }
}
