//! Building-block spaces and the graphs assembled from them.
//!
//! A [`BlockSpace`] bundles a [`BlockLibrary`] of multi-port building blocks with the
//! [`CompatibilityRegistry`] that decides which ports may be joined. [`Graph`]s are spanning trees
//! of block instances with ring chords and symmetry bookkeeping; the [`operators`] grow, mutate,
//! recombine and edit them, and the [`rings`] module tracks which paths may close into rings.

pub mod graph;
pub mod ids;
pub mod library;
pub mod operators;
pub mod registry;
pub mod rings;
pub mod settings;
pub mod space;
pub mod util;
pub mod vertex;

pub use graph::{Edge, Graph, GraphError, Ring, SymmetricVertices};
pub use ids::{GraphId, IdGenerator, VertexId};
pub use library::{BlockLibrary, BlockRef, BuildingBlock, LibraryError, Pool, PortRef};
pub use operators::{GraphOperators, GrowthOptions, GrowthOutcome, OperatorError, OperatorResult};
pub use registry::{BondOrder, CompatibilityRegistry, PortClass, RegistryError};
pub use rings::{ClosableChain, PathSubGraph, RingClosuresArchive};
pub use settings::{GrowthSettings, ProbabilityScheme, RingClosureSettings};
pub use space::BlockSpace;
pub use vertex::{ApRef, MutationKind, Vertex, VertexPayload};
