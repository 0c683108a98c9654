use crate::ids::IdGenerator;
use crate::library::BlockLibrary;
use crate::registry::CompatibilityRegistry;
use std::sync::Arc;

/// A building-block space: the library together with the rules for joining its blocks.
///
/// Immutable once built and meant to be shared between workers by reference or behind an `Arc`.
#[derive(Debug)]
pub struct BlockSpace {
    library: BlockLibrary,
    registry: CompatibilityRegistry,
}

impl BlockSpace {
    pub fn new(library: BlockLibrary, registry: CompatibilityRegistry) -> Self {
        BlockSpace { library, registry }
    }

    pub fn library(&self) -> &BlockLibrary {
        &self.library
    }

    pub fn registry(&self) -> &CompatibilityRegistry {
        &self.registry
    }

    pub fn ids(&self) -> &Arc<IdGenerator> {
        self.library.ids()
    }
}
