//! Exact path-dependent TreeSHAP (Lundberg et al., Algorithm 2)
//!
//! Computes per-feature Shapley values of a single tree's output in
//! polynomial time, using node covers as the background distribution.
//! For every tree `expected_value() + Σ φ = evaluate(x)` holds exactly
//! (up to float rounding) provided children covers sum to the parent's.

use super::tree::Tree;

/// One element of the unique feature path from the root to the current node
#[derive(Debug, Clone, Copy)]
struct PathElement {
    /// Feature split on, or `None` for the root sentinel
    feature: Option<usize>,
    /// Fraction of "feature unknown" paths flowing through
    zero_fraction: f64,
    /// Fraction of "feature known" paths flowing through (0 or 1)
    one_fraction: f64,
    /// Permutation weight
    weight: f64,
}

fn extend_path(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let denom = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].weight += one_fraction * path[i].weight * (i + 1) as f64 / denom;
        path[i].weight = zero_fraction * path[i].weight * (depth - i) as f64 / denom;
    }
}

/// Undo the extension that introduced `path[index]`.
fn unwind_path(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].weight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].weight;
            path[i].weight = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            next_one_portion = tmp - path[i].weight * zero_fraction * (depth - i) as f64 / denom;
        } else {
            path[i].weight = path[i].weight * denom / (zero_fraction * (depth - i) as f64);
        }
    }

    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.truncate(depth);
}

/// Total permutation weight of the path with `path[index]` removed.
fn unwound_path_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[depth].weight;
    let mut total = 0.0;

    if one_fraction != 0.0 {
        for i in (0..depth).rev() {
            let tmp = next_one_portion / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion = path[i].weight - tmp * zero_fraction * (depth - i) as f64;
        }
    } else {
        for i in (0..depth).rev() {
            total += path[i].weight / (zero_fraction * (depth - i) as f64);
        }
    }

    total * (depth + 1) as f64
}

impl Tree {
    /// Accumulate this tree's Shapley values for `features` into `phi`,
    /// multiplied by the tree weight.
    ///
    /// Contributes nothing when the tree fails [`Tree::validate`] or splits
    /// on a feature beyond `features` or `phi`.
    pub fn accumulate_shap(&self, features: &[f64], phi: &mut [f64]) {
        if self.validate().is_err() {
            return;
        }
        if let Some(max) = self.max_feature_index() {
            if max >= features.len() || max >= phi.len() {
                return;
            }
        }
        let mut scratch = Vec::with_capacity(self.nodes.len());
        self.shap_recurse(features, phi, 0, &mut scratch, 1.0, 1.0, None);
    }

    #[allow(clippy::too_many_arguments)]
    fn shap_recurse(
        &self,
        features: &[f64],
        phi: &mut [f64],
        node_index: usize,
        parent_path: &mut Vec<PathElement>,
        zero_fraction: f64,
        one_fraction: f64,
        feature: Option<usize>,
    ) {
        let mut path = parent_path.clone();
        extend_path(&mut path, zero_fraction, one_fraction, feature);

        let node = &self.nodes[node_index];
        if node.is_leaf() {
            let value = node.leaf.unwrap_or(0.0) * self.weight;
            for i in 1..path.len() {
                let w = unwound_path_sum(&path, i);
                let element = path[i];
                if let Some(f) = element.feature {
                    phi[f] += w * (element.one_fraction - element.zero_fraction) * value;
                }
            }
            return;
        }

        let split = node.feature_idx as usize;
        let hot = node.next(features[split]);
        let cold = if hot == node.left as usize {
            node.right as usize
        } else {
            node.left as usize
        };
        let hot_zero_fraction = self.nodes[hot].cover / node.cover;
        let cold_zero_fraction = self.nodes[cold].cover / node.cover;

        // A feature already on the path is split again: undo its earlier
        // extension and fold its fractions into this split.
        let mut incoming_zero = 1.0;
        let mut incoming_one = 1.0;
        if let Some(k) = path.iter().position(|e| e.feature == Some(split)) {
            incoming_zero = path[k].zero_fraction;
            incoming_one = path[k].one_fraction;
            unwind_path(&mut path, k);
        }

        self.shap_recurse(
            features,
            phi,
            hot,
            &mut path,
            hot_zero_fraction * incoming_zero,
            incoming_one,
            Some(split),
        );
        self.shap_recurse(
            features,
            phi,
            cold,
            &mut path,
            cold_zero_fraction * incoming_zero,
            0.0,
            Some(split),
        );
    }
}
