use serde::{Deserialize, Serialize};

/// The capability with which a value is observed or moved across a boundary.
///
/// The order of the variants matters: later effects subsume earlier ones when
/// the IR narrows an abstract access request to a concrete capability.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum AccessEffect {
    Let,
    Inout,
    Set,
    Sink,
    Yielded,
}

impl AccessEffect {
    /// Whether the capability permits mutation of the accessed value.
    pub fn is_mutating(self) -> bool {
        matches!(self, AccessEffect::Inout | AccessEffect::Set | AccessEffect::Sink)
    }
}

impl std::fmt::Display for AccessEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AccessEffect::Let => "let",
            AccessEffect::Inout => "inout",
            AccessEffect::Set => "set",
            AccessEffect::Sink => "sink",
            AccessEffect::Yielded => "yielded",
        };
        write!(f, "{}", s)
    }
}

const ALL_EFFECTS: [AccessEffect; 5] = [
    AccessEffect::Let,
    AccessEffect::Inout,
    AccessEffect::Set,
    AccessEffect::Sink,
    AccessEffect::Yielded,
];

/// A set of access effects, stored as a bitset.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AccessEffectSet(u8);

impl AccessEffectSet {
    pub fn empty() -> AccessEffectSet {
        AccessEffectSet(0)
    }

    pub fn singleton(effect: AccessEffect) -> AccessEffectSet {
        AccessEffectSet(1 << effect as u8)
    }

    pub fn insert(&mut self, effect: AccessEffect) {
        self.0 |= 1 << effect as u8;
    }

    pub fn contains(&self, effect: AccessEffect) -> bool {
        self.0 & (1 << effect as u8) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = AccessEffect> + '_ {
        ALL_EFFECTS.into_iter().filter(|e| self.contains(*e))
    }

    /// The strongest capability in the set, if any.
    pub fn strongest(&self) -> Option<AccessEffect> {
        self.iter().max()
    }
}

impl FromIterator<AccessEffect> for AccessEffectSet {
    fn from_iter<T: IntoIterator<Item = AccessEffect>>(iter: T) -> AccessEffectSet {
        let mut set = AccessEffectSet::empty();
        for e in iter {
            set.insert(e);
        }
        set
    }
}

impl std::fmt::Display for AccessEffectSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts = self.iter().map(|e| e.to_string()).collect::<Vec<_>>();
        write!(f, "[{}]", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessEffect, AccessEffectSet};

    #[test]
    fn strongest_prefers_sink_over_inout() {
        let set = AccessEffectSet::from_iter([AccessEffect::Inout, AccessEffect::Sink]);
        assert_eq!(set.strongest(), Some(AccessEffect::Sink));
    }

    #[test]
    fn iteration_order_is_declaration_order() {
        let set = AccessEffectSet::from_iter([AccessEffect::Set, AccessEffect::Let]);
        let effects = set.iter().collect::<Vec<_>>();
        assert_eq!(effects, vec![AccessEffect::Let, AccessEffect::Set]);
    }
}
