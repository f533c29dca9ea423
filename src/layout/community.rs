//! Post-settle community geometry and hierarchy.
//!
//! Bounds, padding and opacity drive the translucent community hulls drawn by
//! the renderer. Parent/child lists feed the inspector. The supplied community
//! forest is assumed acyclic; no cycle detection is done here.

use super::theme::ColorScheme;
use super::types::{Bounds, Community, CommunityLayout, Node, Vec3, is_finite};

/// Hull padding: a fixed 6 units plus up to 20 more for large communities.
pub fn padding(member_count: usize) -> f64 {
	6.0 + (0.15 * member_count as f64).min(20.0)
}

/// Hull opacity, growing with size but capped at 0.2.
pub fn opacity(member_count: usize) -> f64 {
	(0.08 + member_count as f64 / 500.0).min(0.2)
}

/// Mean position of a set of points.
pub fn centroid(positions: &[Vec3]) -> Option<Vec3> {
	if positions.is_empty() {
		return None;
	}
	let sum: Vec3 = positions.iter().sum();
	Some(sum / positions.len() as f64)
}

/// Padded axis-aligned bounds: centered on the min/max midpoint, sized to
/// the extent plus `padding` on every axis.
pub fn bounds(positions: &[Vec3], padding: f64) -> Option<Bounds> {
	let first = *positions.first()?;
	let (min, max) = positions
		.iter()
		.fold((first, first), |(lo, hi), p| (lo.inf(p), hi.sup(p)));
	Some(Bounds {
		center: (min + max) * 0.5,
		size: (max - min).add_scalar(padding),
	})
}

/// Current centroid of every community, indexed like `community_index` values.
pub fn centroids(nodes: &[Node], community_index: &[Option<usize>], community_count: usize) -> Vec<Option<Vec3>> {
	let mut sums = vec![(Vec3::zeros(), 0usize); community_count];
	for (node, ci) in nodes.iter().zip(community_index) {
		if let Some(ci) = *ci {
			sums[ci].0 += node.position;
			sums[ci].1 += 1;
		}
	}
	sums.into_iter()
		.map(|(sum, n)| (n > 0).then(|| sum / n as f64))
		.collect()
}

/// Parent ids: communities whose id matches this community's `parent`.
pub fn parents_of(community: &Community, all: &[Community]) -> Vec<String> {
	let Some(parent) = community.parent.as_deref() else {
		return Vec::new();
	};
	all.iter().filter(|c| c.id == parent).map(|c| c.id.clone()).collect()
}

/// Child ids: communities whose `parent` is this community.
pub fn children_of(community: &Community, all: &[Community]) -> Vec<String> {
	all.iter()
		.filter(|c| c.parent.as_deref() == Some(community.id.as_str()))
		.map(|c| c.id.clone())
		.collect()
}

/// Annotate every community with geometry from the settled node positions.
pub fn aggregate(
	nodes: &[Node],
	community_index: &[Option<usize>],
	communities: &[Community],
	scheme: &ColorScheme,
) -> Vec<CommunityLayout> {
	let mut members: Vec<Vec<Vec3>> = vec![Vec::new(); communities.len()];
	for (node, ci) in nodes.iter().zip(community_index) {
		if let Some(ci) = *ci {
			if is_finite(&node.position) {
				members[ci].push(node.position);
			}
		}
	}

	communities
		.iter()
		.zip(members)
		.enumerate()
		.map(|(i, (community, positions))| {
			let count = positions.len();
			let pad = padding(count);
			CommunityLayout {
				community: community.clone(),
				color: scheme.community_color(i, community.level),
				member_count: count,
				centroid: centroid(&positions),
				bounds: bounds(&positions, pad),
				padding: pad,
				opacity: opacity(count),
				parents: parents_of(community, communities),
				children: children_of(community, communities),
			}
		})
		.collect()
}
