pub mod aom;
pub mod catalog;
pub mod decor;
pub mod error;
pub mod source;
pub mod xml;

pub use aom::{
    Archetype, ArchetypeSlot, ArchetypeTerm, ArchetypeTerminology, Assertion, CAttribute,
    CComplexObject, CComplexObjectProxy, CObject, CTerminologyCode, Interval, ValueSet,
};
pub use catalog::{CodebookCatalog, CodebookSettings, SourceKind};
pub use decor::{DatasetDocument, TerminologyAssociation, has_valid_status, text_in};
pub use error::{IngestError, Result};
pub use source::{DirectorySource, DocumentSource, IdentifierResolver};
pub use xml::{XmlElement, parse_document};
