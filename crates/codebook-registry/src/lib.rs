pub mod archetype;
pub mod error;
pub mod registry;

pub use archetype::{ArchetypeRecord, TermBinding};
pub use error::{RegistryError, Result};
pub use registry::Registry;
