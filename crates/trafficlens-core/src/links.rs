//! Drill-down link generator.
//!
//! Every node gets three links into the record listing, each carrying the
//! report's date range and tenant plus the concrete value of every dimension
//! from the root down to the node.

use serde::Serialize;
use url::form_urlencoded;

use crate::dimension::Dimension;
use crate::filter::DateRange;
use crate::hierarchy::AggregateNode;
use crate::report::RecordKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrillLinks {
    pub visitors: String,
    pub engaged: String,
    pub sales: String,
}

/// Request-level values shared by every link of one report.
#[derive(Debug, Clone)]
pub struct LinkContext {
    pub records_path: String,
    pub tenant_id: String,
    pub range: DateRange,
    pub include_bots: bool,
}

/// Dimension values accumulated from the root to the current node.
///
/// Never mutated in place: [`DrillContext::with`] returns an extended copy,
/// so sibling subtrees cannot observe each other's values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrillContext {
    entries: Vec<(Dimension, String)>,
}

impl DrillContext {
    pub fn from_entries(entries: &[(Dimension, String)]) -> Self {
        entries
            .iter()
            .fold(Self::default(), |ctx, (dimension, value)| ctx.with(*dimension, value))
    }

    /// Copy of `self` with `dimension` set to `value`. Blank values leave the
    /// context unchanged; anything else is kept verbatim.
    pub fn with(&self, dimension: Dimension, value: &str) -> Self {
        let mut next = self.clone();
        if value.trim().is_empty() {
            return next;
        }
        match next.entries.iter_mut().find(|(d, _)| *d == dimension) {
            Some(entry) => entry.1 = value.to_string(),
            None => next.entries.push((dimension, value.to_string())),
        }
        next
    }

    pub fn get(&self, dimension: Dimension) -> Option<&str> {
        self.entries
            .iter()
            .find(|(d, _)| *d == dimension)
            .map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> &[(Dimension, String)] {
        &self.entries
    }
}

/// Attach `links` to every node of `tree`, depth first.
pub fn annotate(tree: &mut [AggregateNode], dimensions: &[Dimension], ctx: &LinkContext) {
    for node in tree.iter_mut() {
        let inherited = DrillContext::from_entries(&node.ancestors);
        annotate_node(node, dimensions, ctx, &inherited);
    }
}

fn annotate_node(
    node: &mut AggregateNode,
    dimensions: &[Dimension],
    ctx: &LinkContext,
    parent: &DrillContext,
) {
    let context = parent.with(node.dimension, &node.label);
    node.links = Some(links_for(&context, dimensions, ctx));
    for child in node.children.iter_mut() {
        annotate_node(child, dimensions, ctx, &context);
    }
}

pub fn links_for(context: &DrillContext, dimensions: &[Dimension], ctx: &LinkContext) -> DrillLinks {
    let base = base_query(context, dimensions, ctx);
    let link = |kind: RecordKind| format!("{}?{}&type={}", ctx.records_path, base, kind.name());
    DrillLinks {
        visitors: link(RecordKind::Visitors),
        engaged: link(RecordKind::Engaged),
        sales: link(RecordKind::Sales),
    }
}

fn base_query(context: &DrillContext, dimensions: &[Dimension], ctx: &LinkContext) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("startDate", &ctx.range.start.to_string());
    query.append_pair("endDate", &ctx.range.end.to_string());
    if !ctx.tenant_id.is_empty() {
        query.append_pair("dkey", &ctx.tenant_id);
    }
    query.append_pair("timezone", &ctx.range.timezone.name());
    if ctx.include_bots {
        query.append_pair("includeBots", "true");
    }
    for (dimension, value) in context.entries() {
        query.append_pair(dimension.name(), value);
    }
    // Single-value consumers only read `label`.
    if let Some(first) = dimensions.first().and_then(|d| context.get(*d)) {
        query.append_pair("label", first);
    }
    query.finish()
}
