//! The building-block library: three pools of block templates plus the classification indices
//! that growth queries.

use crate::ids::IdGenerator;
use crate::registry::{CompatibilityRegistry, PortClass};
use crate::util::log;
use crate::vertex::{AttachmentPoint, MutationKind, SymmetricAps, Vertex, VertexPayload};
use rand::Rng;
use rand::seq::IndexedRandom;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Pool {
    Scaffold,
    Fragment,
    Capping,
}

impl Pool {
    pub const ALL: [Pool; 3] = [Pool::Scaffold, Pool::Fragment, Pool::Capping];

    /// Numeric code used in chain identifiers.
    pub fn code(self) -> i64 {
        match self {
            Pool::Scaffold => 0,
            Pool::Fragment => 1,
            Pool::Capping => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Pool> {
        match code {
            0 => Some(Pool::Scaffold),
            1 => Some(Pool::Fragment),
            2 => Some(Pool::Capping),
            _ => None,
        }
    }
}

impl Display for Pool {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Pool::Scaffold => "scaffold",
            Pool::Fragment => "fragment",
            Pool::Capping => "capping",
        };
        write!(f, "{name}")
    }
}

/// Position of a template in the library.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[debug("{pool}#{index}")]
pub struct BlockRef {
    pub pool: Pool,
    pub index: usize,
}

impl BlockRef {
    pub fn new(pool: Pool, index: usize) -> Self {
        BlockRef { pool, index }
    }
}

/// One attachment point of one library template.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[debug("{block:?}.ap{ap}")]
pub struct PortRef {
    pub block: BlockRef,
    pub ap: usize,
}

impl PortRef {
    pub fn new(block: BlockRef, ap: usize) -> Self {
        PortRef { block, ap }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LibraryError {
    #[error("the building-block library has not been configured")]
    NotConfigured,
    #[error("{pool} pool has {len} blocks, index {index} is out of range")]
    IndexOutOfRange { pool: Pool, index: usize, len: usize },
    #[error("block {block:?} has {len} ports, port {ap} is out of range")]
    PortOutOfRange { block: BlockRef, ap: usize, len: usize },
    #[error("symmetric port group {group:?} of block {block:?} is invalid")]
    InvalidSymmetryGroup { block: BlockRef, group: Vec<usize> },
    #[error("capping block {block:?} must have exactly one port, found {ports}")]
    CappingPortCount { block: BlockRef, ports: usize },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortDecl {
    pub class: PortClass,
    pub multiplicity_capable: bool,
}

/// A library template. Vertices are produced from it with [`BuildingBlock::instantiate`].
#[derive(Clone, Debug)]
pub struct BuildingBlock {
    ports: Vec<PortDecl>,
    symmetric_ports: Vec<SymmetricAps>,
    mutation_kinds: Option<BTreeSet<MutationKind>>,
    payload: VertexPayload,
}

impl BuildingBlock {
    pub fn new(payload: VertexPayload) -> Self {
        BuildingBlock {
            ports: Vec::new(),
            symmetric_ports: Vec::new(),
            mutation_kinds: None,
            payload,
        }
    }

    pub fn fragment(label: impl Into<String>) -> Self {
        Self::new(VertexPayload::Fragment {
            label: label.into(),
        })
    }

    pub fn empty() -> Self {
        Self::new(VertexPayload::Empty)
    }

    pub fn with_port(mut self, class: impl Into<PortClass>) -> Self {
        self.ports.push(PortDecl {
            class: class.into(),
            multiplicity_capable: false,
        });
        self
    }

    pub fn with_multiplicity_port(mut self, class: impl Into<PortClass>) -> Self {
        self.ports.push(PortDecl {
            class: class.into(),
            multiplicity_capable: true,
        });
        self
    }

    pub fn with_symmetric_ports(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.symmetric_ports.push(SymmetricAps::new(indices));
        self
    }

    pub fn with_mutation_kinds(mut self, kinds: impl IntoIterator<Item = MutationKind>) -> Self {
        self.mutation_kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn ports(&self) -> &[PortDecl] {
        &self.ports
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    pub fn payload(&self) -> &VertexPayload {
        &self.payload
    }

    fn validate(&self, block: BlockRef) -> Result<(), LibraryError> {
        let mut seen = BTreeSet::new();
        for group in &self.symmetric_ports {
            let members: Vec<usize> = group.iter().collect();
            let in_range = members.iter().all(|i| *i < self.ports.len());
            let disjoint = members.iter().all(|i| seen.insert(*i));
            if group.len() < 2 || !in_range || !disjoint {
                return Err(LibraryError::InvalidSymmetryGroup {
                    block,
                    group: members,
                });
            }
        }
        if block.pool == Pool::Capping && self.ports.len() != 1 {
            return Err(LibraryError::CappingPortCount {
                block,
                ports: self.ports.len(),
            });
        }
        Ok(())
    }

    /// Produces an independent vertex: fresh ports (all available), copied symmetry groups,
    /// provenance set to `source`.
    pub fn instantiate(&self, ids: &IdGenerator, source: BlockRef) -> Vertex {
        let aps = self
            .ports
            .iter()
            .enumerate()
            .map(|(i, p)| AttachmentPoint::new(i, p.class, p.multiplicity_capable))
            .collect();
        let kinds = self
            .mutation_kinds
            .clone()
            .unwrap_or_else(|| MutationKind::defaults_for(source.pool));
        Vertex::from_parts(
            ids.next_vertex_id(),
            Some(source),
            aps,
            self.symmetric_ports.clone(),
            kinds,
            self.payload.clone(),
        )
    }
}

#[derive(Debug, Default)]
struct Classification {
    fragments_by_port_count: BTreeMap<usize, Vec<BlockRef>>,
    fragment_ports_by_class: HashMap<PortClass, Vec<PortRef>>,
    classes_per_block: HashMap<BlockRef, Vec<PortClass>>,
    capping_by_class: HashMap<PortClass, Vec<BlockRef>>,
}

#[derive(Debug)]
struct Pools {
    scaffolds: Vec<BuildingBlock>,
    fragments: Vec<BuildingBlock>,
    cappings: Vec<BuildingBlock>,
    index: Classification,
}

impl Pools {
    fn pool(&self, pool: Pool) -> &[BuildingBlock] {
        match pool {
            Pool::Scaffold => &self.scaffolds,
            Pool::Fragment => &self.fragments,
            Pool::Capping => &self.cappings,
        }
    }
}

/// Read-only collection of building blocks shared by all workers.
#[derive(Debug)]
pub struct BlockLibrary {
    ids: Arc<IdGenerator>,
    pools: Option<Pools>,
}

impl BlockLibrary {
    /// A library without any pools; every lookup of a block fails with
    /// [`LibraryError::NotConfigured`].
    pub fn unconfigured(ids: Arc<IdGenerator>) -> Self {
        BlockLibrary { ids, pools: None }
    }

    pub fn new(
        ids: Arc<IdGenerator>,
        scaffolds: Vec<BuildingBlock>,
        fragments: Vec<BuildingBlock>,
        cappings: Vec<BuildingBlock>,
    ) -> Result<Self, LibraryError> {
        let mut pools = Pools {
            scaffolds,
            fragments,
            cappings,
            index: Classification::default(),
        };
        for pool in Pool::ALL {
            for (i, block) in pools.pool(pool).iter().enumerate() {
                block.validate(BlockRef::new(pool, i))?;
            }
        }
        pools.index = classify(&pools);
        log::debug!(
            "Library with {} scaffolds, {} fragments, {} capping groups",
            pools.scaffolds.len(),
            pools.fragments.len(),
            pools.cappings.len()
        );
        Ok(BlockLibrary {
            ids,
            pools: Some(pools),
        })
    }

    pub fn ids(&self) -> &Arc<IdGenerator> {
        &self.ids
    }

    pub fn is_configured(&self) -> bool {
        self.pools.is_some()
    }

    fn pools(&self) -> Result<&Pools, LibraryError> {
        self.pools.as_ref().ok_or(LibraryError::NotConfigured)
    }

    pub fn pool_len(&self, pool: Pool) -> usize {
        self.pools.as_ref().map_or(0, |p| p.pool(pool).len())
    }

    pub fn template(&self, block: BlockRef) -> Result<&BuildingBlock, LibraryError> {
        let blocks = self.pools()?.pool(block.pool);
        blocks
            .get(block.index)
            .ok_or(LibraryError::IndexOutOfRange {
                pool: block.pool,
                index: block.index,
                len: blocks.len(),
            })
    }

    /// Instantiates the block at `index` of `pool` with a fresh vertex id.
    pub fn get_block(&self, pool: Pool, index: usize) -> Result<Vertex, LibraryError> {
        let block = BlockRef::new(pool, index);
        Ok(self.template(block)?.instantiate(&self.ids, block))
    }

    pub fn port_class(&self, port: PortRef) -> Result<PortClass, LibraryError> {
        let template = self.template(port.block)?;
        template
            .ports
            .get(port.ap)
            .map(|p| p.class)
            .ok_or(LibraryError::PortOutOfRange {
                block: port.block,
                ap: port.ap,
                len: template.ports.len(),
            })
    }

    /// Fragments with exactly `n` ports.
    pub fn blocks_with_port_count(&self, n: usize) -> &[BlockRef] {
        self.pools
            .as_ref()
            .and_then(|p| p.index.fragments_by_port_count.get(&n))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Fragment ports carrying `class`, ordered by block then port.
    pub fn ports_with_class(&self, class: &PortClass) -> &[PortRef] {
        self.pools
            .as_ref()
            .and_then(|p| p.index.fragment_ports_by_class.get(class))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Fragments with at least one port of `class`.
    pub fn blocks_with_port_class(&self, class: &PortClass) -> Vec<BlockRef> {
        let mut blocks: Vec<BlockRef> = self
            .ports_with_class(class)
            .iter()
            .map(|p| p.block)
            .collect();
        blocks.dedup();
        blocks
    }

    /// Distinct port classes of a block, in port order.
    pub fn classes_of(&self, block: BlockRef) -> &[PortClass] {
        self.pools
            .as_ref()
            .and_then(|p| p.index.classes_per_block.get(&block))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Fragment ports that may be attached to a port of class `class`.
    pub fn ports_compatible_with(
        &self,
        registry: &CompatibilityRegistry,
        class: &PortClass,
    ) -> Vec<PortRef> {
        let mut ports: Vec<PortRef> = registry
            .compatible_classes(class)
            .iter()
            .flat_map(|c| self.ports_with_class(c).iter().copied())
            .collect();
        ports.sort();
        ports.dedup();
        ports
    }

    /// Fragments that offer, for every one of `ports`, a port compatible with it.
    pub fn blocks_compatible_with_all_of(
        &self,
        registry: &CompatibilityRegistry,
        ports: &[PortRef],
    ) -> Result<Vec<BlockRef>, LibraryError> {
        let mut common: Option<BTreeSet<PortRef>> = None;
        for port in ports {
            let class = self.port_class(*port)?;
            let compatible: BTreeSet<PortRef> = self
                .ports_compatible_with(registry, &class)
                .into_iter()
                .collect();
            common = Some(match common {
                None => compatible,
                Some(acc) => acc.intersection(&compatible).copied().collect(),
            });
        }
        let mut blocks: Vec<BlockRef> = common
            .unwrap_or_default()
            .into_iter()
            .map(|p| p.block)
            .collect();
        blocks.dedup();
        Ok(blocks)
    }

    /// Capping blocks whose single port carries `class`.
    pub fn capping_blocks_with_class(&self, class: &PortClass) -> &[BlockRef] {
        self.pools
            .as_ref()
            .and_then(|p| p.index.capping_by_class.get(class))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Any fragment port, chosen uniformly over fragments and then over their ports.
    pub fn random_fragment_port<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<PortRef> {
        let pools = self.pools.as_ref()?;
        let candidates: Vec<usize> = (0..pools.fragments.len())
            .filter(|i| pools.fragments[*i].port_count() > 0)
            .collect();
        let index = *candidates.choose(rng)?;
        let ap = rng.random_range(0..pools.fragments[index].port_count());
        Some(PortRef::new(BlockRef::new(Pool::Fragment, index), ap))
    }
}

fn classify(pools: &Pools) -> Classification {
    let mut index = Classification::default();
    for pool in Pool::ALL {
        for (i, block) in pools.pool(pool).iter().enumerate() {
            let block_ref = BlockRef::new(pool, i);
            let mut classes = Vec::new();
            for (ap, port) in block.ports.iter().enumerate() {
                if !classes.contains(&port.class) {
                    classes.push(port.class);
                }
                match pool {
                    Pool::Fragment => index
                        .fragment_ports_by_class
                        .entry(port.class)
                        .or_default()
                        .push(PortRef::new(block_ref, ap)),
                    Pool::Capping => index
                        .capping_by_class
                        .entry(port.class)
                        .or_default()
                        .push(block_ref),
                    Pool::Scaffold => {}
                }
            }
            if pool == Pool::Fragment {
                index
                    .fragments_by_port_count
                    .entry(block.port_count())
                    .or_default()
                    .push(block_ref);
            }
            index.classes_per_block.insert(block_ref, classes);
        }
    }
    index
}
