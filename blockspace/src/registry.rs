//! Port classes and the rules that say which ports may be joined.

use crate::interned_string_newtype;
use crate::util::InternString;
use derive_more::From;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Label of an attachment point, e.g. `"A:0"`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Debug, From)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[debug("{_0}")]
pub struct PortClass(InternString);

interned_string_newtype!(PortClass);

impl PortClass {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PortClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Multiplicity of the bond an edge stands for.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Debug, From)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[debug("BO{_0}")]
pub struct BondOrder(pub u8);

impl BondOrder {
    pub const SINGLE: BondOrder = BondOrder(1);
}

impl Default for BondOrder {
    fn default() -> Self {
        BondOrder::SINGLE
    }
}

/// Whether growth must replicate across symmetric ports of a given class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymmetryConstraint {
    ForcedOn,
    ForcedOff,
    /// No rule for the class; the global symmetry settings decide.
    Defer,
}

const SYMMETRY_TOLERANCE: f64 = 1e-6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("duplicate {table} entry for class {class}")]
    DuplicateKey { table: &'static str, class: PortClass },
    #[error("{table} entry refers to undefined class {class}")]
    UndefinedClass { table: &'static str, class: PortClass },
    #[error("symmetry constraint for {class} must be a probability, got {value}")]
    InvalidProbability { class: PortClass, value: f64 },
}

/// Immutable compatibility rules of a building-block space.
#[derive(Debug, Clone, Default)]
pub struct CompatibilityRegistry {
    class_based: bool,
    compatibility: HashMap<PortClass, Vec<PortClass>>,
    ring_closure_compatibility: HashMap<PortClass, Vec<PortClass>>,
    bond_orders: HashMap<PortClass, BondOrder>,
    capping: HashMap<PortClass, PortClass>,
    forbidden_ends: HashSet<PortClass>,
    symmetry_constraints: HashMap<PortClass, f64>,
}

impl CompatibilityRegistry {
    /// A registry without class rules: every port may be joined to every other port.
    pub fn unrestricted() -> Self {
        CompatibilityRegistry::default()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn is_class_based(&self) -> bool {
        self.class_based
    }

    pub fn compatible_classes(&self, source: &PortClass) -> &[PortClass] {
        self.compatibility
            .get(source)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn ring_closure_compatible_classes(&self, source: &PortClass) -> &[PortClass] {
        self.ring_closure_compatibility
            .get(source)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether a port of class `source` may receive a port of class `target`.
    pub fn is_compatible(&self, source: &PortClass, target: &PortClass) -> bool {
        !self.class_based || self.compatible_classes(source).contains(target)
    }

    pub fn bond_order(&self, class: &PortClass) -> BondOrder {
        self.bond_orders.get(class).copied().unwrap_or_default()
    }

    pub fn capping_class(&self, class: &PortClass) -> Option<PortClass> {
        self.capping.get(class).copied()
    }

    pub fn is_forbidden_end(&self, class: &PortClass) -> bool {
        self.forbidden_ends.contains(class)
    }

    pub fn symmetry_constraint(&self, class: &PortClass) -> SymmetryConstraint {
        match self.symmetry_constraints.get(class) {
            Some(p) if *p >= 1.0 - SYMMETRY_TOLERANCE => SymmetryConstraint::ForcedOn,
            Some(_) => SymmetryConstraint::ForcedOff,
            None => SymmetryConstraint::Defer,
        }
    }

    /// Every class mentioned as a key or target of the compatibility rules or the bond orders.
    pub fn known_classes(&self) -> BTreeSet<PortClass> {
        self.compatibility
            .iter()
            .flat_map(|(k, v)| std::iter::once(k).chain(v.iter()))
            .chain(self.bond_orders.keys())
            .copied()
            .collect()
    }
}

/// Collects rule entries and validates them in [`RegistryBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    compatibility: Vec<(PortClass, Vec<PortClass>)>,
    ring_closure_compatibility: Vec<(PortClass, Vec<PortClass>)>,
    bond_orders: Vec<(PortClass, BondOrder)>,
    capping: Vec<(PortClass, PortClass)>,
    forbidden_ends: Vec<PortClass>,
    symmetry_constraints: Vec<(PortClass, f64)>,
}

impl RegistryBuilder {
    pub fn compatibility(
        &mut self,
        source: impl Into<PortClass>,
        targets: impl IntoIterator<Item = impl Into<PortClass>>,
    ) -> &mut Self {
        self.compatibility.push((
            source.into(),
            targets.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn ring_closure_compatibility(
        &mut self,
        source: impl Into<PortClass>,
        targets: impl IntoIterator<Item = impl Into<PortClass>>,
    ) -> &mut Self {
        self.ring_closure_compatibility.push((
            source.into(),
            targets.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn bond_order(&mut self, class: impl Into<PortClass>, order: u8) -> &mut Self {
        self.bond_orders.push((class.into(), BondOrder(order)));
        self
    }

    pub fn capping(
        &mut self,
        class: impl Into<PortClass>,
        capping_class: impl Into<PortClass>,
    ) -> &mut Self {
        self.capping.push((class.into(), capping_class.into()));
        self
    }

    pub fn forbidden_end(&mut self, class: impl Into<PortClass>) -> &mut Self {
        self.forbidden_ends.push(class.into());
        self
    }

    pub fn symmetry_constraint(&mut self, class: impl Into<PortClass>, probability: f64) -> &mut Self {
        self.symmetry_constraints.push((class.into(), probability));
        self
    }

    pub fn build(&self) -> Result<CompatibilityRegistry, RegistryError> {
        let compatibility = unique_map("compatibility", self.compatibility.iter().cloned())?;
        let bond_orders = unique_map("bond order", self.bond_orders.iter().copied())?;
        let mut registry = CompatibilityRegistry {
            class_based: true,
            compatibility,
            bond_orders,
            ..CompatibilityRegistry::default()
        };
        let known = registry.known_classes();
        let check = |table: &'static str, class: &PortClass| {
            if known.contains(class) {
                Ok(())
            } else {
                Err(RegistryError::UndefinedClass {
                    table,
                    class: *class,
                })
            }
        };

        for (source, targets) in &self.ring_closure_compatibility {
            check("ring-closure compatibility", source)?;
            for target in targets {
                check("ring-closure compatibility", target)?;
            }
        }
        for (class, capping_class) in &self.capping {
            check("capping", class)?;
            check("capping", capping_class)?;
        }
        for class in &self.forbidden_ends {
            check("forbidden end", class)?;
        }
        for (class, p) in &self.symmetry_constraints {
            check("symmetry constraint", class)?;
            if !(0.0..=1.0).contains(p) {
                return Err(RegistryError::InvalidProbability {
                    class: *class,
                    value: *p,
                });
            }
        }

        registry.ring_closure_compatibility = unique_map(
            "ring-closure compatibility",
            self.ring_closure_compatibility.iter().cloned(),
        )?;
        registry.capping = unique_map("capping", self.capping.iter().copied())?;
        registry.forbidden_ends = self.forbidden_ends.iter().copied().collect();
        registry.symmetry_constraints =
            unique_map("symmetry constraint", self.symmetry_constraints.iter().copied())?;
        Ok(registry)
    }
}

fn unique_map<V>(
    table: &'static str,
    entries: impl Iterator<Item = (PortClass, V)>,
) -> Result<HashMap<PortClass, V>, RegistryError> {
    let mut map = HashMap::new();
    for (class, value) in entries {
        if map.insert(class, value).is_some() {
            return Err(RegistryError::DuplicateKey { table, class });
        }
    }
    Ok(map)
}
