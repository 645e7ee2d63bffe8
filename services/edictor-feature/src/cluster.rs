//! Cognate clustering within concept groups.

use std::collections::BTreeMap;

use ahash::AHashMap;

use crate::phonetic::AlignmentProvider;
use crate::types::{CognateSet, Row};

/// Union-Find data structure for connected components
pub struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    /// Create new UnionFind with n elements
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    /// Find root with path compression (path halving)
    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Attach the root of `y` under the root of `x`.
    pub fn union(&mut self, x: usize, y: usize) {
        let root_x = self.find(x);
        let root_y = self.find(y);
        if root_x != root_y {
            self.parent[root_y] = root_x;
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Components as member lists, ordered by their first member.
    pub fn components(&mut self) -> Vec<Vec<usize>> {
        let mut slot: AHashMap<usize, usize> = AHashMap::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();

        for i in 0..self.parent.len() {
            let root = self.find(i);
            let next = groups.len();
            let at = *slot.entry(root).or_insert(next);
            if at == next {
                groups.push(Vec::new());
            }
            groups[at].push(i);
        }

        groups
    }
}

/// Rows grouped by a key, groups and members in first-seen order.
pub fn group_by<'r, F>(rows: &'r [Row], key: F) -> Vec<(&'r str, Vec<&'r Row>)>
where
    F: Fn(&'r Row) -> Option<&'r str>,
{
    let mut slot: AHashMap<&'r str, usize> = AHashMap::new();
    let mut groups: Vec<(&'r str, Vec<&'r Row>)> = Vec::new();

    for row in rows {
        let Some(k) = key(row) else {
            continue;
        };
        match slot.get(k) {
            Some(&at) => groups[at].1.push(row),
            None => {
                slot.insert(k, groups.len());
                groups.push((k, vec![row]));
            }
        }
    }

    groups
}

/// Cognate sets of one concept group.
///
/// Two forms are linked when their sequence distance is at most
/// `threshold`; sets are the connected components. IDs start at
/// `first_id` and follow the order of each set's first member.
pub fn cluster_group(
    provider: &dyn AlignmentProvider,
    items: &[&Row],
    threshold: f64,
    first_id: usize,
) -> Vec<CognateSet> {
    let mut uf = UnionFind::new(items.len());

    for i in 0..items.len() {
        for j in i + 1..items.len() {
            let dist = provider.sequence_distance(&items[i].tokens, &items[j].tokens);
            if dist <= threshold {
                uf.union(i, j);
            }
        }
    }

    uf.components()
        .into_iter()
        .enumerate()
        .map(|(offset, members)| {
            let members = members.into_iter().map(|i| items[i].index.clone()).collect();
            CognateSet::new(first_id + offset, members)
        })
        .collect()
}

/// Cognate ID for every row, keyed by row index.
///
/// Rows are clustered per concept; IDs are unique across the whole run.
pub fn assign_cognates(
    provider: &dyn AlignmentProvider,
    rows: &[Row],
    threshold: f64,
) -> BTreeMap<String, usize> {
    let mut next_id = 1;
    let mut values = BTreeMap::new();

    for (concept, items) in group_by(rows, |row| Some(row.concept.as_str())) {
        let sets = cluster_group(provider, &items, threshold, next_id);
        tracing::debug!(concept, forms = items.len(), sets = sets.len(), "clustered concept");
        next_id += sets.len();
        for set in sets {
            for member in set.members {
                values.insert(member, set.id);
            }
        }
    }

    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phonetic::IdentityAligner;

    #[test]
    fn test_union_find() {
        let mut uf = UnionFind::new(5);
        uf.union(0, 1);
        uf.union(2, 3);
        uf.union(1, 2);

        assert_eq!(uf.find(0), uf.find(3));
        assert_ne!(uf.find(0), uf.find(4));
    }

    #[test]
    fn test_union_keeps_first_representative() {
        let mut uf = UnionFind::new(3);
        uf.union(1, 2);
        uf.union(0, 1);
        assert_eq!(uf.find(2), 0);
    }

    #[test]
    fn test_components_in_first_member_order() {
        let mut uf = UnionFind::new(5);
        uf.union(4, 1);
        uf.union(3, 0);
        assert_eq!(uf.components(), vec![vec![0, 3], vec![1, 4], vec![2]]);
    }

    #[test]
    fn test_group_by_first_seen() {
        let rows = vec![
            Row::new("1", "A", "head", &["t", "a"]),
            Row::new("2", "A", "hand", &["k", "o"]),
            Row::new("3", "B", "head", &["t", "a"]),
        ];
        let groups = group_by(&rows, |row| Some(row.concept.as_str()));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "head");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "hand");
    }

    #[test]
    fn test_identical_forms_share_id() {
        let rows = vec![
            Row::new("1", "A", "water", &["w", "a", "t", "e", "r"]),
            Row::new("2", "B", "water", &["w", "a", "t", "e", "r"]),
            Row::new("3", "C", "water", &["w", "a", "t", "e", "r"]),
        ];
        let ids = assign_cognates(&IdentityAligner, &rows, 0.45);
        assert_eq!(ids["1"], ids["2"]);
        assert_eq!(ids["2"], ids["3"]);
    }

    #[test]
    fn test_cluster_group_sets() {
        let rows = vec![
            Row::new("1", "A", "x", &["p", "a"]),
            Row::new("2", "B", "x", &["k", "u"]),
            Row::new("3", "C", "x", &["p", "a"]),
        ];
        let items: Vec<&Row> = rows.iter().collect();
        let sets = cluster_group(&IdentityAligner, &items, 0.0, 5);
        assert_eq!(
            sets,
            vec![
                CognateSet::new(5, vec!["1".to_string(), "3".to_string()]),
                CognateSet::new(6, vec!["2".to_string()]),
            ]
        );
    }

    #[test]
    fn test_ids_are_global() {
        let rows = vec![
            Row::new("1", "A", "one", &["u", "n"]),
            Row::new("2", "B", "one", &["i", "k", "i"]),
            Row::new("3", "A", "two", &["d", "u", "o"]),
            Row::new("4", "B", "two", &["d", "u", "o"]),
        ];
        let ids = assign_cognates(&IdentityAligner, &rows, 0.45);
        assert_eq!(ids["1"], 1);
        assert_eq!(ids["2"], 2);
        assert_eq!(ids["3"], 3);
        assert_eq!(ids["4"], 3);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let rows = vec![
            Row::new("1", "A", "x", &["a", "b"]),
            Row::new("2", "B", "x", &["a", "c"]),
        ];
        // distance 0.5
        let ids = assign_cognates(&IdentityAligner, &rows, 0.5);
        assert_eq!(ids["1"], ids["2"]);
        let ids = assign_cognates(&IdentityAligner, &rows, 0.45);
        assert_ne!(ids["1"], ids["2"]);
    }
}
