//! Distance-based trees over taxa.
//!
//! Trees are stored as a rooted petgraph graph with branch lengths on the
//! edges. Neighbor-joining is the preferred construction; UPGMA is always
//! available and used when neighbor-joining cannot handle the input.

use ahash::AHashMap;
use ndarray::Array2;
use ordered_float::OrderedFloat;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::config::TreeMethod;
use crate::error::{FeatureError, Result};

/// Width of one indentation level in [`Tree::ascii_art`].
const ASCII_INDENT: usize = 10;

fn branch(length: f64) -> f64 {
    if length > 0.0 {
        length
    } else {
        0.0
    }
}

/// Rooted tree; leaves carry taxon labels, internal nodes are unlabelled.
#[derive(Debug, Clone)]
pub struct Tree {
    graph: DiGraph<Option<String>, f64>,
    root: NodeIndex,
}

impl Tree {
    fn with_leaves(labels: &[String]) -> (DiGraph<Option<String>, f64>, Vec<NodeIndex>) {
        let mut graph = DiGraph::new();
        let leaves = labels
            .iter()
            .map(|label| graph.add_node(Some(label.clone())))
            .collect();
        (graph, leaves)
    }

    fn join(graph: &mut DiGraph<Option<String>, f64>, children: &[(NodeIndex, f64)]) -> NodeIndex {
        let parent = graph.add_node(None);
        for &(child, length) in children {
            graph.add_edge(parent, child, branch(length));
        }
        parent
    }

    /// Children of `node` with their branch lengths, in insertion order.
    pub fn children(&self, node: NodeIndex) -> Vec<(NodeIndex, f64)> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|e| (e.id(), e.target(), *e.weight()))
            .collect();
        edges.sort_by_key(|(id, _, _)| id.index());
        edges.into_iter().map(|(_, child, len)| (child, len)).collect()
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn label(&self, node: NodeIndex) -> Option<&str> {
        self.graph[node].as_deref()
    }

    /// Leaf labels in left-to-right order.
    pub fn leaves(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            let children = self.children(node);
            if children.is_empty() {
                out.extend(self.label(node));
            } else {
                stack.extend(children.into_iter().rev().map(|(child, _)| child));
            }
        }
        out
    }

    /// Newick text with four-decimal branch lengths, terminated by `;`.
    pub fn to_newick(&self) -> String {
        let mut out = String::new();
        self.write_newick(self.root, &mut out);
        out.push(';');
        out
    }

    fn write_newick(&self, node: NodeIndex, out: &mut String) {
        let children = self.children(node);
        if children.is_empty() {
            out.push_str(self.label(node).unwrap_or_default());
            return;
        }
        out.push('(');
        for (i, (child, length)) in children.into_iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            self.write_newick(child, out);
            out.push_str(&format!(":{length:.4}"));
        }
        out.push(')');
    }

    /// Text drawing of the topology.
    ///
    /// ```text
    ///           /-A
    /// ---------|
    ///           \-B
    /// ```
    pub fn ascii_art(&self) -> String {
        self.ascii_lines(self.root, '-').0.join("\n")
    }

    fn ascii_lines(&self, node: NodeIndex, connector: char) -> (Vec<String>, usize) {
        let children = self.children(node);
        if children.is_empty() {
            let name = self.label(node).unwrap_or_default();
            return (vec![format!("{connector}-{name}")], 0);
        }

        let last = children.len() - 1;
        let mut lines: Vec<String> = Vec::new();
        let mut mids = Vec::with_capacity(children.len());
        for (i, (child, _)) in children.into_iter().enumerate() {
            let marker = if i == 0 {
                '/'
            } else if i == last {
                '\\'
            } else {
                '-'
            };
            let (child_lines, mid) = self.ascii_lines(child, marker);
            mids.push(mid + lines.len());
            lines.extend(child_lines);
            lines.push(String::new());
        }
        lines.pop();

        let (lo, hi, end) = (mids[0], mids[mids.len() - 1], lines.len());
        let pad = " ".repeat(ASCII_INDENT);
        let bar = format!("{}|", " ".repeat(ASCII_INDENT - 1));
        let mut prefixes: Vec<String> = std::iter::repeat(pad.clone())
            .take(lo + 1)
            .chain(std::iter::repeat(bar).take(hi.saturating_sub(lo + 1)))
            .chain(std::iter::repeat(pad).take(end - hi))
            .take(end)
            .collect();

        let mid = (lo + hi) / 2;
        let tail = prefixes[mid].chars().last().unwrap_or(' ');
        prefixes[mid] = format!("{connector}{}{tail}", "-".repeat(ASCII_INDENT - 2));

        let lines = prefixes
            .into_iter()
            .zip(lines)
            .map(|(prefix, line)| prefix + &line)
            .collect();
        (lines, mid)
    }
}

/// Tree construction from a square distance matrix.
pub trait TreeBuilder {
    fn name(&self) -> &'static str;

    fn build(&self, distances: &Array2<f64>, labels: &[String]) -> Result<Tree>;
}

fn check_input(distances: &Array2<f64>, labels: &[String]) -> Result<()> {
    let (rows, cols) = distances.dim();
    if rows != cols || rows != labels.len() {
        return Err(FeatureError::tree(format!(
            "{rows}x{cols} matrix for {} taxa",
            labels.len()
        )));
    }
    if labels.len() < 2 {
        return Err(FeatureError::tree("at least two taxa are required"));
    }
    Ok(())
}

/// Saitou-Nei neighbor-joining.
///
/// The last three nodes are joined at a common centre, so the result is
/// an unrooted tree drawn from a trifurcating root.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeighborJoining;

impl TreeBuilder for NeighborJoining {
    fn name(&self) -> &'static str {
        "neighbor"
    }

    fn build(&self, distances: &Array2<f64>, labels: &[String]) -> Result<Tree> {
        check_input(distances, labels)?;
        if distances.iter().any(|d| !d.is_finite()) {
            return Err(FeatureError::tree("distance matrix has non-finite entries"));
        }

        let (mut graph, mut nodes) = Tree::with_leaves(labels);
        let mut d: Vec<Vec<f64>> = distances.outer_iter().map(|row| row.to_vec()).collect();

        if nodes.len() == 2 {
            let half = d[0][1] / 2.0;
            let root = Tree::join(&mut graph, &[(nodes[0], half), (nodes[1], half)]);
            return Ok(Tree { graph, root });
        }

        while nodes.len() > 3 {
            let r = nodes.len();
            let sums: Vec<f64> = d.iter().map(|row| row.iter().sum()).collect();

            let mut best = (0, 1);
            let mut best_q = f64::INFINITY;
            for i in 0..r {
                for j in i + 1..r {
                    let q = (r - 2) as f64 * d[i][j] - sums[i] - sums[j];
                    if q < best_q {
                        best_q = q;
                        best = (i, j);
                    }
                }
            }

            let (i, j) = best;
            let dij = d[i][j];
            let li = 0.5 * dij + (sums[i] - sums[j]) / (2.0 * (r - 2) as f64);
            let lj = dij - li;
            let joined = Tree::join(&mut graph, &[(nodes[i], li), (nodes[j], lj)]);

            let to_joined: Vec<f64> = (0..r)
                .filter(|&k| k != i && k != j)
                .map(|k| (d[i][k] + d[j][k] - dij) / 2.0)
                .collect();

            for row in d.iter_mut() {
                row.remove(j);
                row.remove(i);
            }
            d.remove(j);
            d.remove(i);
            nodes.remove(j);
            nodes.remove(i);

            for (row, value) in d.iter_mut().zip(&to_joined) {
                row.push(*value);
            }
            let mut last = to_joined;
            last.push(0.0);
            d.push(last);
            nodes.push(joined);
        }

        let l0 = (d[0][1] + d[0][2] - d[1][2]) / 2.0;
        let l1 = (d[0][1] + d[1][2] - d[0][2]) / 2.0;
        let l2 = (d[0][2] + d[1][2] - d[0][1]) / 2.0;
        let root = Tree::join(&mut graph, &[(nodes[0], l0), (nodes[1], l1), (nodes[2], l2)]);

        Ok(Tree { graph, root })
    }
}

/// Unweighted pair-group clustering with arithmetic means.
#[derive(Debug, Clone, Copy, Default)]
pub struct Upgma;

struct Cluster {
    node: NodeIndex,
    size: usize,
    height: f64,
}

impl TreeBuilder for Upgma {
    fn name(&self) -> &'static str {
        "upgma"
    }

    fn build(&self, distances: &Array2<f64>, labels: &[String]) -> Result<Tree> {
        check_input(distances, labels)?;
        let n = labels.len();
        let (mut graph, leaves) = Tree::with_leaves(labels);

        let mut clusters: Vec<Cluster> = leaves
            .into_iter()
            .map(|node| Cluster {
                node,
                size: 1,
                height: 0.0,
            })
            .collect();
        let mut active: Vec<usize> = (0..n).collect();

        // pairs in insertion order so that ties go to the earliest pair
        let mut pairs: Vec<(usize, usize)> = Vec::new();
        let mut dist: AHashMap<(usize, usize), f64> = AHashMap::new();
        for i in 0..n {
            for j in i + 1..n {
                pairs.push((i, j));
                dist.insert((i, j), distances[[i, j]]);
            }
        }
        let key = |a: usize, b: usize| (a.min(b), a.max(b));

        while active.len() > 1 {
            let (i, j) = *pairs
                .iter()
                .min_by_key(|pair| OrderedFloat(dist[pair]))
                .ok_or_else(|| FeatureError::tree("no cluster pair left"))?;
            let dij = dist[&(i, j)];

            let height = dij / 2.0;
            let (ci, cj) = (&clusters[i], &clusters[j]);
            let bi = height - ci.height;
            let bj = height - cj.height;
            let size = ci.size + cj.size;
            let (size_i, size_j) = (ci.size as f64, cj.size as f64);

            let node = Tree::join(&mut graph, &[(ci.node, bi), (cj.node, bj)]);
            let merged = clusters.len();
            clusters.push(Cluster { node, size, height });

            for &k in active.iter().filter(|&&k| k != i && k != j) {
                let dik = dist[&key(i, k)];
                let djk = dist[&key(j, k)];
                let pair = key(merged, k);
                pairs.push(pair);
                dist.insert(pair, (dik * size_i + djk * size_j) / size as f64);
            }

            pairs.retain(|&(a, b)| a != i && a != j && b != i && b != j);
            dist.retain(|&(a, b), _| a != i && a != j && b != i && b != j);
            active.retain(|&k| k != i && k != j);
            active.push(merged);
        }

        let root = clusters[active[0]].node;
        Ok(Tree { graph, root })
    }
}

/// Tree over `labels` by `method`, or `None` below two taxa.
///
/// A failing neighbor-joining run falls back to UPGMA.
pub fn build_tree(method: TreeMethod, distances: &Array2<f64>, labels: &[String]) -> Option<Tree> {
    if labels.len() < 2 {
        return None;
    }

    let preferred: &dyn TreeBuilder = match method {
        TreeMethod::Neighbor => &NeighborJoining,
        TreeMethod::Upgma => &Upgma,
    };

    match preferred.build(distances, labels) {
        Ok(tree) => Some(tree),
        Err(err) if method == TreeMethod::Neighbor => {
            tracing::warn!(error = %err, "neighbor-joining failed, falling back to UPGMA");
            Upgma.build(distances, labels).ok()
        }
        Err(err) => {
            tracing::warn!(error = %err, builder = preferred.name(), "tree construction failed");
            None
        }
    }
}
