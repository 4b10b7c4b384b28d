//! Clone clusters: connected components of the above-threshold similarity graph.

use std::collections::{BTreeMap, HashMap};

use crate::models::{CloneCluster, SimilarityPair};

/// Disjoint-set forest with path compression and union by rank.
#[derive(Clone, Debug, Default)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    pub fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Add a singleton set and return its index.
    pub fn push(&mut self) -> usize {
        let idx = self.parent.len();
        self.parent.push(idx);
        self.rank.push(0);
        idx
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    /// Merge the sets of `a` and `b`; returns false if they were already joined.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] = self.rank[ra].saturating_add(1);
            }
        }
        true
    }

    pub fn connected(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }
}

#[derive(Default)]
struct ComponentStats {
    members: Vec<String>,
    edge_count: usize,
    max_similarity: f64,
    min_edge_similarity: f64,
}

/// Group contracts joined by `full_similarity >= threshold`, directly or
/// through other members.
///
/// Components with fewer than two members are dropped.  Members are sorted,
/// clusters are ordered by size (largest first) then first member, and ids
/// are assigned in that order starting at 1.
pub fn build_clusters(pairs: &[SimilarityPair], threshold: f64) -> Vec<CloneCluster> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut names: Vec<&str> = Vec::new();
    let mut uf = UnionFind::default();
    let mut edges: Vec<(usize, f64)> = Vec::new();

    for pair in pairs {
        if pair.full_similarity < threshold {
            continue;
        }
        let a = *index.entry(pair.contract_a.as_str()).or_insert_with(|| {
            names.push(pair.contract_a.as_str());
            uf.push()
        });
        let b = *index.entry(pair.contract_b.as_str()).or_insert_with(|| {
            names.push(pair.contract_b.as_str());
            uf.push()
        });
        uf.union(a, b);
        edges.push((a, pair.full_similarity));
    }

    let mut components: BTreeMap<usize, ComponentStats> = BTreeMap::new();
    for (idx, name) in names.iter().enumerate() {
        let root = uf.find(idx);
        components
            .entry(root)
            .or_default()
            .members
            .push(name.to_string());
    }
    for (node, similarity) in edges {
        let root = uf.find(node);
        if let Some(stats) = components.get_mut(&root) {
            if stats.edge_count == 0 {
                stats.max_similarity = similarity;
                stats.min_edge_similarity = similarity;
            } else {
                stats.max_similarity = stats.max_similarity.max(similarity);
                stats.min_edge_similarity = stats.min_edge_similarity.min(similarity);
            }
            stats.edge_count += 1;
        }
    }

    let mut stats: Vec<ComponentStats> = components
        .into_values()
        .filter(|c| c.members.len() >= 2)
        .map(|mut c| {
            c.members.sort();
            c
        })
        .collect();
    stats.sort_by(|x, y| {
        y.members
            .len()
            .cmp(&x.members.len())
            .then_with(|| x.members[0].cmp(&y.members[0]))
    });

    stats
        .into_iter()
        .enumerate()
        .map(|(i, c)| CloneCluster {
            cluster_id: i + 1,
            members: c.members,
            edge_count: c.edge_count,
            max_similarity: c.max_similarity,
            min_edge_similarity: c.min_edge_similarity,
        })
        .collect()
}
