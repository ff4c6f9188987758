use std::collections::{HashMap, HashSet};

use crate::shared::Relationships;

pub type ASN = u32;

/// Undirected labeled multigraph of AS business relationships, stored as
/// adjacency lists. Each edge appears in both endpoints' lists with the
/// label seen from that endpoint.
#[derive(Debug, Clone, Default)]
pub struct ASGraph {
    adjacency: HashMap<ASN, Vec<(ASN, Relationships)>>,
    asns: HashSet<ASN>,
}

impl ASGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the edge and its mirror. `rel` is the role of `asn2` relative
    /// to `asn1`: `Customers` means asn1 is provider of asn2. Duplicate adds
    /// are permitted and recorded in insertion order.
    pub fn add_relationship(&mut self, asn1: ASN, asn2: ASN, rel: Relationships) {
        self.adjacency.entry(asn1).or_default().push((asn2, rel));
        self.adjacency.entry(asn2).or_default().push((asn1, rel.invert()));
        self.asns.insert(asn1);
        self.asns.insert(asn2);
    }

    /// Registers an ASN with no edges, e.g. a seed origin that never appears
    /// in the relationships file. Ranked 0 by the flattener.
    pub fn register_asn(&mut self, asn: ASN) {
        self.asns.insert(asn);
    }

    /// Neighbors of `asn` with their role relative to `asn`, in insertion
    /// order, duplicates preserved.
    pub fn neighbors(&self, asn: ASN) -> &[(ASN, Relationships)] {
        self.adjacency.get(&asn).map_or(&[], Vec::as_slice)
    }

    pub fn all_asns(&self) -> impl Iterator<Item = ASN> + '_ {
        self.asns.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.asns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.asns.is_empty()
    }

    /// Directed edge counts by label: (customer->provider, peer, provider->customer).
    pub fn edge_stats(&self) -> (usize, usize, usize) {
        let mut up = 0;
        let mut across = 0;
        let mut down = 0;
        for entries in self.adjacency.values() {
            for (_, rel) in entries {
                match rel {
                    Relationships::Providers => up += 1,
                    Relationships::Peers => across += 1,
                    Relationships::Customers => down += 1,
                }
            }
        }
        (up, across, down)
    }

    /// True iff the customer->provider directed subgraph contains a cycle.
    /// Three-color DFS with an explicit stack: CAIDA-scale graphs overflow
    /// the process stack under the recursive form.
    pub fn has_customer_provider_cycle(&self) -> bool {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut color: HashMap<ASN, Color> =
            self.asns.iter().map(|&asn| (asn, Color::White)).collect();

        for &root in &self.asns {
            if color[&root] != Color::White {
                continue;
            }
            color.insert(root, Color::Gray);
            let mut stack: Vec<(ASN, usize)> = vec![(root, 0)];

            while let Some(frame) = stack.last_mut() {
                let u = frame.0;
                let adj = self.neighbors(u);

                let mut descend = None;
                while frame.1 < adj.len() {
                    let (v, rel) = adj[frame.1];
                    frame.1 += 1;
                    if rel != Relationships::Providers {
                        continue;
                    }
                    match color[&v] {
                        // Back edge to a node on the recursion stack
                        Color::Gray => return true,
                        Color::White => {
                            descend = Some(v);
                            break;
                        }
                        Color::Black => {}
                    }
                }

                match descend {
                    Some(v) => {
                        color.insert(v, Color::Gray);
                        stack.push((v, 0));
                    }
                    None => {
                        color.insert(u, Color::Black);
                        stack.pop();
                    }
                }
            }
        }

        false
    }
}
