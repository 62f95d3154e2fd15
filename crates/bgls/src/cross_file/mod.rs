//
// cross_file/mod.rs
//
// Cross-file awareness: file identity, content access and include discovery
//

pub mod content_provider;
pub mod dependency;
pub mod path_resolve;


pub use content_provider::{DiskReader, FileReader, OverlayReader, PinnedDocument, ReadError};
pub use dependency::{direct_includes, resolve_dependencies, DependencySet};
pub use path_resolve::FileId;
