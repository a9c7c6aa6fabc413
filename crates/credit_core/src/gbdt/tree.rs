//! Decision tree structures for GBDT inference
//!
//! Nodes are stored flat; node 0 is the root and every child index is
//! strictly greater than its parent's, so a validated tree is acyclic.

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// For internal nodes:
/// - `feature_idx >= 0`: index into the preprocessed vector
/// - `left` and `right` point to child node indices
/// - `leaf` is `None`
///
/// For leaf nodes:
/// - `feature_idx == -1`
/// - `leaf` contains the margin contribution
///
/// `cover` is the (weighted) count of training rows that reached the node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Node ID (for reference, not used in traversal)
    pub id: i32,

    /// Left child index (-1 for leaf nodes)
    pub left: i32,

    /// Right child index (-1 for leaf nodes)
    pub right: i32,

    /// Feature index to split on (-1 for leaf nodes)
    #[serde(rename = "feature_idx", alias = "feature")]
    pub feature_idx: i32,

    /// Split threshold in preprocessed units
    pub threshold: f64,

    /// Leaf value (Some for leaf nodes, None for internal nodes)
    pub leaf: Option<f64>,

    /// Training rows reaching this node
    pub cover: f64,
}

impl Node {
    /// Create a new internal (split) node
    pub fn internal(id: i32, feature_idx: i32, threshold: f64, left: i32, right: i32, cover: f64) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            leaf: None,
            cover,
        }
    }

    /// Create a new leaf node
    pub fn leaf(id: i32, value: f64, cover: f64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0.0,
            leaf: Some(value),
            cover,
        }
    }

    /// Check if this node is a leaf
    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }

    /// Child followed by a sample with `value` on the split feature
    #[inline]
    pub(crate) fn next(&self, value: f64) -> usize {
        if value <= self.threshold {
            self.left as usize
        } else {
            self.right as usize
        }
    }
}

/// A single regression tree of the ensemble
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    /// Tree nodes (node 0 is the root)
    pub nodes: Vec<Node>,

    /// Multiplier applied to every leaf of this tree
    pub weight: f64,
}

impl Tree {
    /// Create a new tree with the given nodes and weight
    pub fn new(nodes: Vec<Node>, weight: f64) -> Self {
        Self { nodes, weight }
    }

    /// Index of the leaf reached by `features`.
    ///
    /// `None` on a malformed tree: a child out of range or not after its
    /// parent, or a split feature beyond the vector.
    pub fn leaf_index(&self, features: &[f64]) -> Option<usize> {
        let mut idx = 0usize;
        loop {
            let node = self.nodes.get(idx)?;
            if node.is_leaf() {
                return Some(idx);
            }

            let value = *features.get(usize::try_from(node.feature_idx).ok()?)?;
            let next = node.next(value);
            // Children sit after their parent; anything else could cycle.
            if next <= idx || next >= self.nodes.len() {
                return None;
            }
            idx = next;
        }
    }

    /// Raw (unweighted) leaf value reached by `features`, 0 on a malformed tree
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        self.leaf_index(features)
            .and_then(|idx| self.nodes[idx].leaf)
            .unwrap_or(0.0)
    }

    /// Cover-weighted mean leaf value, i.e. the tree's output when no
    /// feature is known.
    ///
    /// 0 on a tree that fails [`Tree::validate`].
    pub fn expected_value(&self) -> f64 {
        if self.validate().is_err() {
            return 0.0;
        }

        // Children always sit after their parent, so a reverse sweep sees
        // both children before the parent.
        let mut expectations = vec![0.0; self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate().rev() {
            expectations[i] = match node.leaf {
                Some(value) if node.is_leaf() => value,
                _ if node.is_leaf() => 0.0,
                _ => {
                    let left = &self.nodes[node.left as usize];
                    let right = &self.nodes[node.right as usize];
                    (left.cover * expectations[node.left as usize]
                        + right.cover * expectations[node.right as usize])
                        / node.cover
                }
            };
        }
        expectations[0]
    }

    /// Largest feature index used by any split, if any
    pub fn max_feature_index(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter(|n| !n.is_leaf())
            .map(|n| n.feature_idx as usize)
            .max()
    }

    /// Validate tree structure
    pub fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }
        if !self.weight.is_finite() {
            return Err(format!("Tree weight is not finite: {}", self.weight));
        }

        let len = self.nodes.len() as i32;
        for (i, node) in self.nodes.iter().enumerate() {
            let at = i as i32;

            if !node.cover.is_finite() || node.cover <= 0.0 {
                return Err(format!("Node {i} has invalid cover: {}", node.cover));
            }

            if node.is_leaf() {
                match node.leaf {
                    Some(v) if v.is_finite() => {}
                    Some(v) => return Err(format!("Leaf node {i} has non-finite value {v}")),
                    None => return Err(format!("Leaf node {i} has no leaf value")),
                }
                continue;
            }

            if node.feature_idx < 0 {
                return Err(format!(
                    "Internal node {i} has invalid feature index: {}",
                    node.feature_idx
                ));
            }
            if !node.threshold.is_finite() {
                return Err(format!("Internal node {i} has non-finite threshold"));
            }
            if node.left <= at || node.left >= len {
                return Err(format!("Node {i} has invalid left child: {}", node.left));
            }
            if node.right <= at || node.right >= len || node.right == node.left {
                return Err(format!("Node {i} has invalid right child: {}", node.right));
            }

            let children = self.nodes[node.left as usize].cover + self.nodes[node.right as usize].cover;
            if (children - node.cover).abs() > 1e-6 * node.cover.max(1.0) {
                return Err(format!(
                    "Node {i} cover {} does not equal its children's {children}",
                    node.cover
                ));
            }
        }

        Ok(())
    }
}
