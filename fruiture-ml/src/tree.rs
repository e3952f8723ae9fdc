//! Decision tree evaluation
//!
//! Trees arrive in the parallel-array layout of the training library's
//! exporter: one entry per node in each of `children_left`, `children_right`,
//! `feature`, `threshold` and `value`. A child index of `-1` marks a leaf.
//!
//! Validation on load guarantees every child index points forward, so
//! evaluation always terminates and never indexes out of bounds.

use crate::{MLError, MLResult, Node};
use serde::{Deserialize, Serialize};

/// Sentinel child index of a leaf
pub const TREE_LEAF: i64 = -1;

/// Exported tree arrays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeArrays {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<Vec<f64>>,
}

/// A validated decision tree
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Build from exported arrays, checking the structure against `n_features`
    pub fn from_arrays(arrays: TreeArrays, n_features: usize) -> MLResult<Self> {
        let n = arrays.children_left.len();
        if n == 0 {
            return Err(MLError::InvalidArtifact("tree has no nodes".into()));
        }
        if [
            arrays.children_right.len(),
            arrays.feature.len(),
            arrays.threshold.len(),
            arrays.value.len(),
        ]
        .iter()
        .any(|&len| len != n)
        {
            return Err(MLError::InvalidArtifact("tree arrays differ in length".into()));
        }

        let mut nodes = Vec::with_capacity(n);
        for (index, value) in arrays.value.into_iter().enumerate() {
            let (left, right) = (arrays.children_left[index], arrays.children_right[index]);
            if left == TREE_LEAF && right == TREE_LEAF {
                if value.is_empty() {
                    return Err(MLError::InvalidArtifact(format!("leaf {index} has no value")));
                }
                nodes.push(Node::leaf(value));
                continue;
            }

            let child = |raw: i64| -> MLResult<usize> {
                usize::try_from(raw)
                    .ok()
                    .filter(|&c| c > index && c < n)
                    .ok_or_else(|| MLError::InvalidArtifact(format!("node {index} has bad child {raw}")))
            };
            let feature = usize::try_from(arrays.feature[index])
                .ok()
                .filter(|&f| f < n_features)
                .ok_or_else(|| {
                    MLError::InvalidArtifact(format!("node {index} splits on feature {}", arrays.feature[index]))
                })?;
            nodes.push(Node::split(feature, arrays.threshold[index], child(left)?, child(right)?));
        }

        Ok(Self { nodes })
    }

    /// Value of the leaf `features` lands in
    pub fn leaf_value(&self, features: &[f64]) -> &[f64] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value } => return value,
                split => match split.next(features) {
                    Some(child) => index = child,
                    None => return &[],
                },
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn leaves(&self) -> impl Iterator<Item = &[f64]> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Leaf { value } => Some(value.as_slice()),
            Node::Split { .. } => None,
        })
    }
}
