//! Planning of the formats that can be derived from the ones present.
//!
//! After a session that changed the contents closes, every family with some but not all of its
//! members present gets its absent members recorded as derivable from the richest present one.
//! Nothing is converted at this point; see [`crate::render`].

use std::collections::HashMap;

use crate::format::{Family, Format};

/// One absent format and the present format it can be derived from.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub struct Derivation {
    pub target: Format,
    pub source: Format,
}

/// The outcome of planning.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Plan {
    /// A locale entry must be added because text is present without one.
    pub set_locale: bool,
    pub derivations: Vec<Derivation>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        !self.set_locale && self.derivations.is_empty()
    }
}

/// Computes the derivable formats given which formats are present.
pub fn plan(is_present: impl Fn(Format) -> bool) -> Plan {
    let mut plan = Plan::default();

    for family in Family::ALL {
        let members = family.members();
        let present: Vec<bool> = members.iter().map(|&format| is_present(format)).collect();

        let Some(source) = present.iter().position(|&p| p).map(|index| members[index]) else {
            continue;
        };

        if family == Family::Text && !is_present(Format::LOCALE) {
            plan.set_locale = true;
        }

        plan.derivations.extend(
            members
                .iter()
                .zip(&present)
                .filter(|(_, &present)| !present)
                .map(|(&target, _)| Derivation { target, source }),
        );
    }

    plan
}

/// Client-side record of which absent formats can be derived, and from what.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct SynthesisTable {
    sources: HashMap<Format, Format>,
}

impl SynthesisTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `target` as derivable from `source`.
    pub fn record(&mut self, target: Format, source: Format) {
        self.sources.insert(target, source);
    }

    /// Returns the format `target` is derived from, if it is derivable.
    pub fn source(&self, target: Format) -> Option<Format> {
        self.sources.get(&target).copied()
    }

    /// Forgets `target`, which now has a real entry.
    pub fn remove(&mut self, target: Format) -> Option<Format> {
        self.sources.remove(&target)
    }

    pub fn clear(&mut self) {
        self.sources.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }
}
