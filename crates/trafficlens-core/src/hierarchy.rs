//! Hierarchy builder: folds flat fact rows into one tree level per requested
//! dimension, rolling raw counts up to every ancestor.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use crate::derived::DerivedMetrics;
use crate::dimension::Dimension;
use crate::links::DrillLinks;
use crate::report::{FactRow, RawMetrics, UNKNOWN_LABEL};

#[derive(Debug, Clone, Serialize)]
pub struct AggregateNode {
    /// Unique within one response only.
    pub id: String,
    pub label: String,
    pub level: usize,
    #[serde(flatten)]
    pub metrics: RawMetrics,
    #[serde(flatten)]
    pub rates: DerivedMetrics,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AggregateNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<DrillLinks>,
    #[serde(skip)]
    pub dimension: Dimension,
    /// Concrete values of every ancestor level, root first.
    #[serde(skip)]
    pub ancestors: Vec<(Dimension, String)>,
}

impl AggregateNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Ancestor values followed by this node's own value.
    pub fn path(&self) -> Vec<(Dimension, String)> {
        let mut path = self.ancestors.clone();
        path.push((self.dimension, self.label.clone()));
        path
    }
}

#[derive(Debug, Clone)]
pub struct Hierarchy {
    pub nodes: Vec<AggregateNode>,
    /// Rows that landed on an already-filled leaf. Non-zero means the fetcher
    /// returned duplicate dimension tuples.
    pub leaf_collisions: usize,
}

pub fn label_for(value: Option<&str>) -> String {
    value.unwrap_or(UNKNOWN_LABEL).to_string()
}

pub fn build(rows: &[FactRow], dimensions: &[Dimension]) -> Hierarchy {
    match dimensions {
        [] => {
            tracing::warn!("Hierarchy build requested without dimensions");
            Hierarchy {
                nodes: Vec::new(),
                leaf_collisions: 0,
            }
        }
        [dimension] => Hierarchy {
            nodes: passthrough(rows, *dimension),
            leaf_collisions: 0,
        },
        _ => fold(rows, dimensions),
    }
}

/// One leaf per row: the fetcher already grouped at this granularity.
fn passthrough(rows: &[FactRow], dimension: Dimension) -> Vec<AggregateNode> {
    let mut nodes: Vec<AggregateNode> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| AggregateNode {
            id: format!("row_{}", i + 1),
            label: label_for(row.value(0)),
            level: 0,
            metrics: row.metrics,
            rates: DerivedMetrics::for_leaf(&row.metrics),
            children: Vec::new(),
            links: None,
            dimension,
            ancestors: Vec::new(),
        })
        .collect();
    sort_siblings(&mut nodes);
    nodes
}

struct Draft {
    label: String,
    dimension: Dimension,
    level: usize,
    ancestors: Vec<(Dimension, String)>,
    metrics: RawMetrics,
    filled: bool,
    children: Vec<usize>,
}

fn fold(rows: &[FactRow], dimensions: &[Dimension]) -> Hierarchy {
    let leaf_level = dimensions.len() - 1;
    let mut arena: Vec<Draft> = Vec::new();
    let mut roots: Vec<usize> = Vec::new();
    let mut leaf_collisions = 0;
    {
        // Lives for this pass only.
        let mut index: HashMap<(Option<usize>, String), usize> = HashMap::new();

        for row in rows {
            let mut parent: Option<usize> = None;
            for (level, dimension) in dimensions.iter().enumerate() {
                let label = label_for(row.value(level));
                let idx = match index.get(&(parent, label.clone())) {
                    Some(&idx) => idx,
                    None => {
                        let ancestors = match parent {
                            Some(p) => {
                                let up = &arena[p];
                                let mut ancestors = up.ancestors.clone();
                                ancestors.push((up.dimension, up.label.clone()));
                                ancestors
                            }
                            None => Vec::new(),
                        };
                        let idx = arena.len();
                        arena.push(Draft {
                            label: label.clone(),
                            dimension: *dimension,
                            level,
                            ancestors,
                            metrics: RawMetrics::default(),
                            filled: false,
                            children: Vec::new(),
                        });
                        match parent {
                            Some(p) => arena[p].children.push(idx),
                            None => roots.push(idx),
                        }
                        index.insert((parent, label), idx);
                        idx
                    }
                };

                if level == leaf_level {
                    let leaf = &mut arena[idx];
                    if leaf.filled {
                        leaf_collisions += 1;
                        tracing::warn!(
                            path = ?row.values,
                            "Duplicate fact row for one dimension tuple, last write wins"
                        );
                    }
                    leaf.metrics = row.metrics;
                    leaf.filled = true;
                }
                parent = Some(idx);
            }
        }
    }

    let mut nodes: Vec<AggregateNode> = roots
        .into_iter()
        .map(|idx| assemble(&mut arena, idx))
        .collect();
    sort_siblings(&mut nodes);

    Hierarchy {
        nodes,
        leaf_collisions,
    }
}

/// Moves a draft subtree out of the arena. Intermediate metrics are the sum
/// of their children, which keeps the additive invariant exact.
fn assemble(arena: &mut [Draft], idx: usize) -> AggregateNode {
    let child_ids = std::mem::take(&mut arena[idx].children);
    let mut children: Vec<AggregateNode> = child_ids
        .into_iter()
        .map(|child| assemble(arena, child))
        .collect();
    sort_siblings(&mut children);

    let draft = &mut arena[idx];
    let (metrics, rates) = if children.is_empty() {
        (draft.metrics, DerivedMetrics::for_leaf(&draft.metrics))
    } else {
        let mut total = RawMetrics::default();
        for child in &children {
            total.accumulate(&child.metrics);
        }
        (total, DerivedMetrics::for_group(&total))
    };

    AggregateNode {
        id: format!("node_{}", idx + 1),
        label: std::mem::take(&mut draft.label),
        level: draft.level,
        metrics,
        rates,
        children,
        links: None,
        dimension: draft.dimension,
        ancestors: std::mem::take(&mut draft.ancestors),
    }
}

/// Visitors descending, then label ascending. Stable.
fn sort_siblings(nodes: &mut [AggregateNode]) {
    nodes.sort_by(|a, b| {
        b.metrics
            .visitors
            .cmp(&a.metrics.visitors)
            .then_with(|| a.label.cmp(&b.label))
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("node {id} ({label}): {field} differs from the sum of its children")]
pub struct AdditiveViolation {
    pub id: String,
    pub label: String,
    pub field: &'static str,
}

/// Check that every non-leaf node equals the sum of its direct children.
pub fn verify_additive(nodes: &[AggregateNode]) -> Result<(), AdditiveViolation> {
    for node in nodes {
        if node.is_leaf() {
            continue;
        }
        let mut sum = RawMetrics::default();
        for child in &node.children {
            sum.accumulate(&child.metrics);
        }
        let mismatch = if sum.visitors != node.metrics.visitors {
            Some("visitors")
        } else if sum.engaged != node.metrics.engaged {
            Some("engaged")
        } else if sum.sales != node.metrics.sales {
            Some("sales")
        } else if sum.revenue_cents != node.metrics.revenue_cents {
            Some("revenue")
        } else {
            None
        };
        if let Some(field) = mismatch {
            return Err(AdditiveViolation {
                id: node.id.clone(),
                label: node.label.clone(),
                field,
            });
        }
        verify_additive(&node.children)?;
    }
    Ok(())
}
