//! Content model, lookup collaborators and mutation events for derivq.

pub mod error;
pub mod events;
pub mod lookup;
pub mod memory;
pub mod model;
pub mod site;
pub mod template;

pub use error::{LookupError, Result};
pub use lookup::{EntityIndex, MediaSource, PrincipalProvider, StaticPrincipal, TermIndex};
pub use memory::{Fixture, MemoryRepository};
pub use model::{
    Entity, EntityRef, FieldDescriptor, FileArtifact, MEDIA_ENTITY_TYPE, Principal,
    TERM_ENTITY_TYPE, Term, compare_ids,
};
pub use site::SiteUrls;
pub use template::{Segment, TemplateSyntaxError, parse_template};
