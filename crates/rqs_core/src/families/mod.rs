//! Family construction over the similarity graph.
//!
//! Qualifying pairs are undirected edges between event identifiers; a
//! family is a connected component, so two events can belong together
//! without ever having been compared directly. Events that never enter
//! the graph produce no family at all.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::analysis::types::PairSummary;

/// A repeater family: one connected component of the similarity graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Family {
    /// Stable index assigned in output order.
    pub index: usize,
    /// Member event identifiers, sorted.
    pub events: Vec<String>,
}

/// Incremental union-find over event identifiers.
#[derive(Debug, Default)]
pub struct FamilyBuilder {
    ids: HashMap<String, usize>,
    labels: Vec<String>,
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl FamilyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every qualifying pair as an edge, applying each pair's own
    /// minimum-station requirement.
    pub fn add_qualifying_pairs<'a>(&mut self, pairs: impl IntoIterator<Item = &'a PairSummary>) {
        for pair in pairs {
            if pair.qualifies() {
                self.add_edge(&pair.pair.first, &pair.pair.second);
            }
        }
    }

    /// Connect two event identifiers.
    pub fn add_edge(&mut self, a: &str, b: &str) {
        let ia = self.node(a);
        let ib = self.node(b);
        self.union(ia, ib);
    }

    /// Consume the builder and emit families ordered by smallest member,
    /// with stable indices in that order.
    pub fn families(mut self) -> Vec<Family> {
        let mut components: HashMap<usize, Vec<String>> = HashMap::new();
        for i in 0..self.parent.len() {
            let root = self.find(i);
            components
                .entry(root)
                .or_default()
                .push(self.labels[i].clone());
        }

        let mut families: Vec<Vec<String>> = components.into_values().collect();
        for events in &mut families {
            events.sort();
        }
        families.sort();

        families
            .into_iter()
            .enumerate()
            .map(|(index, events)| Family { index, events })
            .collect()
    }

    fn node(&mut self, id: &str) -> usize {
        if let Some(&i) = self.ids.get(id) {
            return i;
        }
        let i = self.parent.len();
        self.ids.insert(id.to_string(), i);
        self.labels.push(id.to_string());
        self.parent.push(i);
        self.rank.push(0);
        i
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// Build families from completed pair summaries.
pub fn build_families(pairs: &[PairSummary]) -> Vec<Family> {
    let mut builder = FamilyBuilder::new();
    builder.add_qualifying_pairs(pairs);
    builder.families()
}
