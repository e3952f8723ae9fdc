//! Decision tree node
//!
//! Trees are stored flat: children are indices into the owning tree's node
//! array. A split sends a sample left when its feature value is at or below
//! the threshold, matching the training library's convention.

/// Node of a decision tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Internal node with a split condition
    Split {
        /// Feature index to split on
        feature: usize,
        /// Split value; `x <= threshold` goes left
        threshold: f64,
        /// Left child index
        left: usize,
        /// Right child index
        right: usize,
    },
    /// Leaf carrying class counts (classifier) or a single value (regressor)
    Leaf { value: Vec<f64> },
}

impl Node {
    pub fn split(feature: usize, threshold: f64, left: usize, right: usize) -> Self {
        Node::Split {
            feature,
            threshold,
            left,
            right,
        }
    }

    pub fn leaf(value: Vec<f64>) -> Self {
        Node::Leaf { value }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    /// Child to visit next, or `None` at a leaf.
    ///
    /// A missing feature value routes right, as NaN fails `<=`.
    pub fn next(&self, features: &[f64]) -> Option<usize> {
        match *self {
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                let value = features.get(feature).copied().unwrap_or(f64::NAN);
                Some(if value <= threshold { left } else { right })
            }
            Node::Leaf { .. } => None,
        }
    }
}
