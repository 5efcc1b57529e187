//! A single regression tree grown by exact greedy split search.
//!
//! Split gain: `0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - G²/(H+λ)] - γ`.
//! Leaf value: `-G / (H + λ)`, already scaled by the learning rate.
//! Rows whose split feature is NaN always go right.

use serde::{Deserialize, Serialize};

use super::booster::BoosterParams;
use super::matrix::Matrix;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Arena-allocated tree; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct GrowContext<'a> {
    x: &'a Matrix,
    grad: &'a [f64],
    hess: &'a [f64],
    columns: &'a [usize],
    params: &'a BoosterParams,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl RegressionTree {
    /// Grow a tree on the given rows, considering only `columns`.
    pub fn grow(
        x: &Matrix,
        grad: &[f64],
        hess: &[f64],
        rows: &[usize],
        columns: &[usize],
        params: &BoosterParams,
    ) -> Self {
        let ctx = GrowContext {
            x,
            grad,
            hess,
            columns,
            params,
        };
        let mut tree = Self { nodes: Vec::new() };
        tree.build(&ctx, rows.to_vec(), 0);
        tree
    }

    fn build(&mut self, ctx: &GrowContext<'_>, rows: Vec<usize>, depth: usize) -> usize {
        let g: f64 = rows.iter().map(|&i| ctx.grad[i]).sum();
        let h: f64 = rows.iter().map(|&i| ctx.hess[i]).sum();
        let lambda = ctx.params.lambda;
        let value = -g / (h + lambda) * ctx.params.learning_rate;

        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { value });

        if depth >= ctx.params.max_depth || rows.len() < 2 {
            return id;
        }

        let Some(best) = best_split(ctx, &rows, g, h) else {
            return id;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&i| ctx.x.get(i, best.feature) <= best.threshold);
        if left_rows.is_empty() || right_rows.is_empty() {
            return id;
        }

        let left = self.build(ctx, left_rows, depth + 1);
        let right = self.build(ctx, right_rows, depth + 1);
        self.nodes[id] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        id
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    /// Split count per feature index.
    pub fn split_counts(&self, n_features: usize) -> Vec<usize> {
        let mut counts = vec![0; n_features];
        for node in &self.nodes {
            if let Node::Split { feature, .. } = node {
                if *feature < n_features {
                    counts[*feature] += 1;
                }
            }
        }
        counts
    }
}

fn best_split(
    ctx: &GrowContext<'_>,
    rows: &[usize],
    g_total: f64,
    h_total: f64,
) -> Option<SplitCandidate> {
    let lambda = ctx.params.lambda;
    let min_child = ctx.params.min_child_weight;
    let parent_score = g_total * g_total / (h_total + lambda);
    let mut best: Option<SplitCandidate> = None;

    for &feature in ctx.columns {
        let mut sorted: Vec<(f64, usize)> = rows
            .iter()
            .map(|&i| (ctx.x.get(i, feature), i))
            .filter(|(v, _)| !v.is_nan())
            .collect();
        if sorted.len() < 2 {
            continue;
        }
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut g_left = 0.0;
        let mut h_left = 0.0;
        for pos in 0..sorted.len() - 1 {
            let (value, i) = sorted[pos];
            g_left += ctx.grad[i];
            h_left += ctx.hess[i];

            let next = sorted[pos + 1].0;
            if next <= value {
                continue;
            }

            let g_right = g_total - g_left;
            let h_right = h_total - h_left;
            if h_left < min_child || h_right < min_child {
                continue;
            }

            let gain = 0.5
                * (g_left * g_left / (h_left + lambda) + g_right * g_right / (h_right + lambda)
                    - parent_score)
                - ctx.params.gamma;

            if gain > 0.0 && best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: value + (next - value) / 2.0,
                    gain,
                });
            }
        }
    }

    best
}
