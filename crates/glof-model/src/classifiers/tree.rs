//! Second-order regression trees shared by the forest and the booster.
//!
//! A node's value is `-G / (H + lambda)` over the gradient and hessian sums
//! of its rows. With `g = -y`, `h = 1` and `lambda = 0` that is the mean
//! label, which is what the random forest grows; the booster passes log-loss
//! derivatives instead.

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Features tried per split; `None` tries all of them
    pub max_features: Option<usize>,
    pub lambda: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub root: Node,
}

/// Gradient statistics of a set of rows
#[derive(Debug, Clone, Copy, Default)]
struct Stats {
    grad: f64,
    hess: f64,
}

impl Stats {
    fn add(&mut self, g: f64, h: f64) {
        self.grad += g;
        self.hess += h;
    }

    fn score(&self, lambda: f64) -> f64 {
        let den = self.hess + lambda;
        if den > 0.0 {
            self.grad * self.grad / den
        } else {
            0.0
        }
    }

    fn value(&self, lambda: f64) -> f64 {
        let den = self.hess + lambda;
        if den > 0.0 {
            -self.grad / den
        } else {
            0.0
        }
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct Builder<'a> {
    x: &'a Array2<f64>,
    grad: &'a [f64],
    hess: &'a [f64],
    params: TreeParams,
}

impl RegressionTree {
    /// Grow a tree over `rows` (which may repeat, as in a bootstrap sample)
    pub fn fit(
        x: &Array2<f64>,
        grad: &[f64],
        hess: &[f64],
        rows: &[usize],
        params: TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let builder = Builder { x, grad, hess, params };
        let mut rows = rows.to_vec();
        Self { root: builder.grow(&mut rows, 0, rng) }
    }

    pub fn predict(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { value } => return *value,
                Node::Split { feature, threshold, left, right } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn depth_of(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + depth_of(left).max(depth_of(right)),
            }
        }
        depth_of(&self.root)
    }

    /// Largest feature index used by any split
    pub fn max_feature(&self) -> Option<usize> {
        fn walk(node: &Node) -> Option<usize> {
            match node {
                Node::Leaf { .. } => None,
                Node::Split { feature, left, right, .. } => {
                    [Some(*feature), walk(left), walk(right)].into_iter().flatten().max()
                }
            }
        }
        walk(&self.root)
    }
}

impl Builder<'_> {
    fn stats(&self, rows: &[usize]) -> Stats {
        let mut stats = Stats::default();
        for &i in rows {
            stats.add(self.grad[i], self.hess[i]);
        }
        stats
    }

    fn grow(&self, rows: &mut [usize], depth: usize, rng: &mut StdRng) -> Node {
        let total = self.stats(rows);
        let leaf = Node::Leaf { value: total.value(self.params.lambda) };

        if depth >= self.params.max_depth || rows.len() < 2 * self.params.min_samples_leaf.max(1) {
            return leaf;
        }
        let Some(best) = self.best_split(rows, total, rng) else {
            return leaf;
        };

        // Move rows going left to the front
        let mut boundary = 0;
        for k in 0..rows.len() {
            if self.x[[rows[k], best.feature]] <= best.threshold {
                rows.swap(k, boundary);
                boundary += 1;
            }
        }
        let (left_rows, right_rows) = rows.split_at_mut(boundary);
        let left = self.grow(left_rows, depth + 1, rng);
        let right = self.grow(right_rows, depth + 1, rng);

        Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn best_split(&self, rows: &[usize], total: Stats, rng: &mut StdRng) -> Option<SplitCandidate> {
        let n_features = self.x.ncols();
        let features: Vec<usize> = match self.params.max_features {
            Some(k) if k < n_features => sample(rng, n_features, k.max(1)).into_vec(),
            _ => (0..n_features).collect(),
        };

        let lambda = self.params.lambda;
        let min_leaf = self.params.min_samples_leaf.max(1);
        let parent_score = total.score(lambda);
        let mut best: Option<SplitCandidate> = None;

        let mut sorted = rows.to_vec();
        for feature in features {
            sorted.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

            let mut left = Stats::default();
            for k in 0..sorted.len() - 1 {
                let i = sorted[k];
                left.add(self.grad[i], self.hess[i]);

                let here = self.x[[i, feature]];
                let next = self.x[[sorted[k + 1], feature]];
                if here == next || k + 1 < min_leaf || sorted.len() - (k + 1) < min_leaf {
                    continue;
                }

                let right = Stats { grad: total.grad - left.grad, hess: total.hess - left.hess };
                let gain = left.score(lambda) + right.score(lambda) - parent_score;
                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate { feature, threshold: (here + next) / 2.0, gain });
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn params(max_depth: usize) -> TreeParams {
        TreeParams { max_depth, min_samples_leaf: 1, max_features: None, lambda: 0.0 }
    }

    #[test]
    fn test_mean_leaves_on_step_function() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let grad: Vec<f64> = y.iter().map(|v| -v).collect();
        let hess = vec![1.0; y.len()];
        let rows: Vec<usize> = (0..y.len()).collect();

        let tree = RegressionTree::fit(&x, &grad, &hess, &rows, params(3), &mut StdRng::seed_from_u64(1));

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict(array![2.5].view()), 0.0);
        assert_eq!(tree.predict(array![11.5].view()), 1.0);
        let Node::Split { threshold, .. } = &tree.root else {
            panic!("expected a split");
        };
        assert_eq!(*threshold, 6.5);
    }

    #[test]
    fn test_depth_zero_is_a_leaf() {
        let x = array![[1.0], [2.0]];
        let tree = RegressionTree::fit(
            &x,
            &[-1.0, 0.0],
            &[1.0, 1.0],
            &[0, 1],
            params(0),
            &mut StdRng::seed_from_u64(1),
        );
        assert_eq!(tree.root, Node::Leaf { value: 0.5 });
    }

    #[test]
    fn test_newton_leaf_with_lambda() {
        let x = array![[1.0], [1.0]];
        let tree = RegressionTree::fit(
            &x,
            &[0.5, 0.5],
            &[0.25, 0.25],
            &[0, 1],
            TreeParams { lambda: 1.0, ..params(2) },
            &mut StdRng::seed_from_u64(1),
        );
        // Constant feature: no split, value = -1.0 / (0.5 + 1.0)
        assert!((tree.predict(array![1.0].view()) + 2.0 / 3.0).abs() < 1e-12);
    }
}
