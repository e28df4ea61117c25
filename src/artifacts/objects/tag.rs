//! Annotated tag command
//!
//! ```text
//! tag <name>
//! mark :<n>?
//! from <committish>
//! original-oid <id>?
//! tagger <ident>
//! data ...
//! ```

use crate::artifacts::core::error::PackError;
use crate::artifacts::data::DataBlock;
use crate::artifacts::objects::mark::Mark;
use crate::artifacts::objects::object::{PackStyle, Packable, put_line, put_ref};
use crate::artifacts::objects::object_ref::ObjectRef;
use crate::artifacts::objects::person::PersonIdent;
use bstr::BString;
use derive_new::new;

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Tag {
    pub name: BString,
    pub mark: Option<Mark>,
    pub from: ObjectRef,
    pub original_oid: Option<BString>,
    /// Only absent when the session allows tags without a tagger
    pub tagger: Option<PersonIdent>,
    pub message: DataBlock,
}

impl Packable for Tag {
    fn pack(&self, out: &mut Vec<u8>, _style: &PackStyle) -> Result<(), PackError> {
        put_line(out, b"tag", &self.name, "tag name")?;
        if let Some(mark) = self.mark {
            put_line(out, b"mark", mark.to_string().as_bytes(), "mark")?;
        }
        put_ref(out, b"from", &self.from)?;
        if let Some(oid) = &self.original_oid {
            put_line(out, b"original-oid", oid, "original-oid")?;
        }
        if let Some(tagger) = &self.tagger {
            out.extend_from_slice(b"tagger ");
            tagger.write_to(out)?;
            out.push(b'\n');
        }
        self.message.write_to(out);
        Ok(())
    }
}
