pub mod adl;
pub mod decor;
pub mod error;
pub mod ids;
pub mod issues;

pub use adl::AdlBuilder;
pub use decor::DecorBuilder;
pub use error::{BuildError, Result};
pub use issues::{BuildIssue, CodebookBuild, IssueKind};

use codebook_ingest::{CodebookSettings, IdentifierResolver, SourceKind};
use codebook_registry::Registry;

/// One build request: which document of a codebook, in which language.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Dataset id (dataset-XML codebooks) or archetype id (archetype
    /// codebooks).
    pub document: String,
    /// Build language, e.g. `nl-NL` or `en`.
    pub language: String,
}

/// Build the normalized tree for one request, dispatching on the
/// codebook's source kind.
pub fn build(
    registry: &Registry,
    resolver: &dyn IdentifierResolver,
    settings: &CodebookSettings,
    request: &BuildRequest,
) -> Result<CodebookBuild> {
    match settings.kind {
        SourceKind::Decor => {
            DecorBuilder::build(registry, settings, &request.document, &request.language)
        }
        SourceKind::Archetype => AdlBuilder::build(
            registry,
            resolver,
            settings,
            &request.document,
            &request.language,
        ),
    }
}
