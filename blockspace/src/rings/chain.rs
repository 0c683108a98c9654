//! Closable chains: paths between two ring-closing ends described by the library blocks they
//! run through, independent of any concrete graph.

use crate::library::{BlockRef, Pool};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainParseError {
    #[error("chain id {0:?} has no turning point marker")]
    MissingTurningPoint(String),
    #[error("invalid turning point in chain id {0:?}")]
    BadTurningPoint(String),
    #[error("invalid chain link {0:?}")]
    BadLink(String),
}

/// One internal vertex of a chain: which block it is and which of its ports lead towards the
/// head (`left_ap`) and the tail (`right_ap`) of the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChainLink {
    block: Option<BlockRef>,
    left_ap: usize,
    right_ap: usize,
}

impl ChainLink {
    pub fn new(block: Option<BlockRef>, left_ap: usize, right_ap: usize) -> Self {
        ChainLink {
            block,
            left_ap,
            right_ap,
        }
    }

    pub fn block(&self) -> Option<BlockRef> {
        self.block
    }

    pub fn left_ap(&self) -> usize {
        self.left_ap
    }

    pub fn right_ap(&self) -> usize {
        self.right_ap
    }

    pub fn flipped(&self) -> ChainLink {
        ChainLink::new(self.block, self.right_ap, self.left_ap)
    }

    /// Whether the link passes through `block` using exactly the ports `a` and `b`, in any order.
    pub fn uses(&self, block: BlockRef, a: usize, b: usize) -> bool {
        self.block == Some(block)
            && ((self.left_ap == a && self.right_ap == b) || (self.left_ap == b && self.right_ap == a))
    }
}

impl Display for ChainLink {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.block {
            Some(b) => write!(f, "{}/{}", b.index, b.pool.code())?,
            None => write!(f, "-1/-1")?,
        }
        write!(f, "/ap{}ap{}", self.left_ap, self.right_ap)
    }
}

impl FromStr for ChainLink {
    type Err = ChainParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ChainParseError::BadLink(s.to_string());
        let mut parts = s.splitn(3, '/');
        let index: i64 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
        let pool: i64 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
        let aps = parts.next().and_then(|p| p.strip_prefix("ap")).ok_or_else(bad)?;
        let (left, right) = aps.split_once("ap").ok_or_else(bad)?;
        let left_ap = left.parse().map_err(|_| bad())?;
        let right_ap = right.parse().map_err(|_| bad())?;
        let block = match (index, pool) {
            (-1, -1) => None,
            (i, p) => {
                let pool = Pool::from_code(p).ok_or_else(bad)?;
                let index = usize::try_from(i).map_err(|_| bad())?;
                Some(BlockRef::new(pool, index))
            }
        };
        Ok(ChainLink::new(block, left_ap, right_ap))
    }
}

/// An ordered sequence of links with an optional turning point (the position of the vertex
/// closest to the root of the graph the chain was found in).
///
/// The turning point is always a position in [`links`](Self::links): [`reversed`](Self::reversed)
/// mirrors it to `len - 1 - tp` and [`rotated`](Self::rotated) moves it with its link. Indexes
/// written by tools that keep the turning point of the forward reading on reversed or rotated
/// spellings (`len + 1 - tp`, unchanged under rotation) agree on the forward id only, so such
/// records are found when the path is read in its original direction or reversed, but not under
/// a rotation whose turning point they spell differently.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct ClosableChain {
    links: Vec<ChainLink>,
    turning_point: Option<usize>,
}

impl ClosableChain {
    pub fn new(links: Vec<ChainLink>, turning_point: Option<usize>) -> Self {
        let turning_point = turning_point.filter(|tp| *tp < links.len());
        ClosableChain {
            links,
            turning_point,
        }
    }

    pub fn parse(id: &str) -> Result<Self, ChainParseError> {
        id.parse()
    }

    pub fn links(&self) -> &[ChainLink] {
        &self.links
    }

    pub fn link(&self, position: usize) -> Option<&ChainLink> {
        self.links.get(position)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn turning_point(&self) -> Option<usize> {
        self.turning_point
    }

    pub fn turning_point_link(&self) -> Option<&ChainLink> {
        self.link(self.turning_point?)
    }

    /// First position whose link is an instance of `block`.
    pub fn involves_block(&self, block: BlockRef) -> Option<usize> {
        self.links.iter().position(|l| l.block == Some(block))
    }

    /// First position whose link goes through `block` via ports `a` and `b`.
    pub fn involves_block_and_aps(&self, block: BlockRef, a: usize, b: usize) -> Option<usize> {
        self.links.iter().position(|l| l.uses(block, a, b))
    }

    /// The same chain read from tail to head.
    pub fn reversed(&self) -> ClosableChain {
        let len = self.links.len();
        ClosableChain {
            links: self.links.iter().rev().map(ChainLink::flipped).collect(),
            turning_point: self.turning_point.map(|tp| len - 1 - tp),
        }
    }

    /// The chain rotated left by `by` positions.
    pub fn rotated(&self, by: usize) -> ClosableChain {
        let len = self.links.len();
        if len == 0 {
            return self.clone();
        }
        let by = by % len;
        let mut links = self.links.clone();
        links.rotate_left(by);
        ClosableChain {
            links,
            turning_point: self.turning_point.map(|tp| (tp + len - by) % len),
        }
    }
}

impl Display for ClosableChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for link in &self.links {
            write!(f, "{link}_")?;
        }
        match self.turning_point {
            Some(tp) => write!(f, "%{tp}"),
            None => write!(f, "%-1"),
        }
    }
}

impl FromStr for ClosableChain {
    type Err = ChainParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (body, tp) = s
            .rsplit_once('%')
            .ok_or_else(|| ChainParseError::MissingTurningPoint(s.to_string()))?;
        let tp: i64 = tp
            .parse()
            .map_err(|_| ChainParseError::BadTurningPoint(s.to_string()))?;
        let links = body
            .split('_')
            .filter(|l| !l.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<ChainLink>, _>>()?;
        let turning_point = match tp {
            -1 => None,
            tp => match usize::try_from(tp) {
                Ok(tp) if tp < links.len() => Some(tp),
                _ => return Err(ChainParseError::BadTurningPoint(s.to_string())),
            },
        };
        Ok(ClosableChain {
            links,
            turning_point,
        })
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ClosableChain {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ClosableChain {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_ids_parse_and_render() {
        let id = "3/1/ap0ap2_0/0/ap1ap0_-1/-1/ap0ap1_%1";
        let chain = ClosableChain::parse(id).unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.turning_point(), Some(1));
        assert_eq!(
            chain.turning_point_link().unwrap().block(),
            Some(BlockRef::new(Pool::Scaffold, 0))
        );
        assert_eq!(chain.link(2).unwrap().block(), None);
        assert_eq!(chain.to_string(), id);
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!(matches!(
            ClosableChain::parse("3/1/ap0ap2_"),
            Err(ChainParseError::MissingTurningPoint(_))
        ));
        assert!(matches!(
            ClosableChain::parse("3/1/ap0ap2_%4"),
            Err(ChainParseError::BadTurningPoint(_))
        ));
        assert!(matches!(
            ClosableChain::parse("3/9/ap0ap2_%0"),
            Err(ChainParseError::BadLink(_))
        ));
        assert!(matches!(
            ClosableChain::parse("x/1/ap0_%0"),
            Err(ChainParseError::BadLink(_))
        ));
    }

    #[test]
    fn reversal_flips_links_and_turning_point() {
        let chain = ClosableChain::parse("3/1/ap0ap2_0/0/ap1ap0_5/1/ap1ap0_%1").unwrap();
        let rev = chain.reversed();
        assert_eq!(rev.to_string(), "5/1/ap0ap1_0/0/ap0ap1_3/1/ap2ap0_%1");
        assert_eq!(rev.reversed(), chain);
        let rotated = chain.rotated(1);
        assert_eq!(rotated.to_string(), "0/0/ap1ap0_5/1/ap1ap0_3/1/ap0ap2_%0");
    }

    #[test]
    fn membership_queries() {
        let chain = ClosableChain::parse("3/1/ap0ap2_0/0/ap1ap0_3/1/ap1ap0_%1").unwrap();
        let frag3 = BlockRef::new(Pool::Fragment, 3);
        assert_eq!(chain.involves_block(frag3), Some(0));
        assert_eq!(chain.involves_block_and_aps(frag3, 0, 1), Some(2));
        assert_eq!(chain.involves_block_and_aps(frag3, 2, 0), Some(0));
        assert_eq!(chain.involves_block_and_aps(frag3, 1, 2), None);
        assert_eq!(chain.involves_block(BlockRef::new(Pool::Capping, 0)), None);
    }
}
