//! Turns raw graph data into seeded, render-ready nodes and links.
//!
//! Steps, in order: resolve relationship endpoints (id first, then title),
//! count undirected degrees over the resolved links, assign each entity to a
//! community, seed initial positions and derive render size and color.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::f64::consts::PI;

use log::{debug, warn};
use rand::Rng;

use super::theme::ColorScheme;
use super::types::{Community, Entity, GraphData, Link, Node, Vec3};

/// Angle between successive points on a golden-angle spiral.
pub const GOLDEN_ANGLE: f64 = PI * (3.0 - 2.236_067_977_499_79);

/// Multiplier applied to the clamped degree/frequency size.
pub const NODE_SIZE_SCALE: f64 = 1.2;

/// How initial positions are laid out.
#[derive(Clone, Copy, Debug)]
pub enum Placement {
	/// Fibonacci sphere around the origin.
	Spherical { spread: f64, level_spacing: f64 },
	/// Golden-angle disk around a canvas center.
	Planar {
		center: (f64, f64),
		spread: f64,
		level_spacing: f64,
	},
}

/// Seeded working set for one simulation run.
#[derive(Clone, Debug, Default)]
pub struct Prepared {
	pub nodes: Vec<Node>,
	pub links: Vec<Link>,
	/// Distance of each node's seed from the placement center.
	pub seed_radius: Vec<f64>,
	/// Index into `GraphData::communities` for each node.
	pub community_index: Vec<Option<usize>>,
}

/// Map each entity id to the index of the community that claims it.
/// The last community (in array order) listing an entity wins.
pub fn assign_communities(communities: &[Community]) -> HashMap<&str, usize> {
	let mut membership = HashMap::new();
	for (ci, community) in communities.iter().enumerate() {
		for member in &community.entity_ids {
			if let Some(prev) = membership.insert(member.as_str(), ci) {
				if prev != ci {
					debug!(
						"kg-layout: entity {member} reassigned from community {} to {}",
						communities[prev].id, community.id
					);
				}
			}
		}
	}
	membership
}

/// Endpoint lookup: ids take precedence, titles are a fallback.
pub struct EndpointResolver<'a> {
	by_id: HashMap<&'a str, usize>,
	by_title: HashMap<&'a str, usize>,
}

impl<'a> EndpointResolver<'a> {
	/// On duplicate ids or titles the first entity in input order is kept.
	pub fn new(entities: &'a [Entity]) -> Self {
		let mut by_id = HashMap::with_capacity(entities.len());
		let mut by_title = HashMap::with_capacity(entities.len());
		for (i, entity) in entities.iter().enumerate() {
			by_id.entry(entity.id.as_str()).or_insert(i);
			if entity.title.is_empty() {
				continue;
			}
			match by_title.entry(entity.title.as_str()) {
				Entry::Vacant(slot) => {
					slot.insert(i);
				}
				Entry::Occupied(slot) => {
					warn!(
						"kg-layout: title {:?} is shared by {} and {}; fallback lookups use {}",
						entity.title,
						entities[*slot.get()].id,
						entity.id,
						entities[*slot.get()].id
					);
				}
			}
		}
		Self { by_id, by_title }
	}

	pub fn resolve(&self, key: &str) -> Option<usize> {
		if let Some(&i) = self.by_id.get(key) {
			return Some(i);
		}
		let found = self.by_title.get(key).copied();
		if found.is_some() {
			debug!("kg-layout: endpoint {key:?} resolved by title");
		}
		found
	}
}

/// Resolve every relationship to a link, silently dropping those with an unknown endpoint.
pub fn resolve_links(data: &GraphData) -> Vec<Link> {
	let resolver = EndpointResolver::new(&data.entities);
	data.relationships
		.iter()
		.filter_map(|rel| match (resolver.resolve(&rel.source), resolver.resolve(&rel.target)) {
			(Some(source), Some(target)) => {
				let mut relationship = rel.clone();
				if !relationship.weight.is_finite() {
					relationship.weight = 0.0;
				}
				Some(Link {
					relationship,
					source,
					target,
				})
			}
			_ => {
				debug!(
					"kg-layout: dropping relationship {:?} ({} -> {}): unknown endpoint",
					rel.id, rel.source, rel.target
				);
				None
			}
		})
		.collect()
}

/// Undirected degree per node. A self-loop counts once, so degree always
/// equals the number of links touching the node.
pub fn compute_degrees(node_count: usize, links: &[Link]) -> Vec<u32> {
	let mut degrees = vec![0u32; node_count];
	for link in links {
		degrees[link.source] += 1;
		if link.target != link.source {
			degrees[link.target] += 1;
		}
	}
	degrees
}

/// Degree plus weighted mention frequency.
pub fn abstraction_score(degree: u32, frequency: u32) -> f64 {
	degree as f64 + 0.5 * frequency as f64
}

/// Min-max normalize into [0, 1]. A flat input maps to all zeros.
pub fn normalize(scores: &[f64]) -> Vec<f64> {
	let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
	let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
	let range = max - min;
	if !(range > 0.0) {
		return vec![0.0; scores.len()];
	}
	scores.iter().map(|s| (s - min) / range).collect()
}

/// Seed radius: well-connected entities near the center, peripheral ones at
/// `spread`, pushed outward by community depth.
pub fn seed_radius(normalized: f64, spread: f64, level: u32, level_spacing: f64) -> f64 {
	let min_r = 0.1 * spread;
	spread - normalized * (spread - min_r) + level as f64 * level_spacing
}

/// Point `i` of `n` on a unit Fibonacci sphere.
pub fn fibonacci_sphere(i: usize, n: usize) -> Vec3 {
	let phi = (1.0 - 2.0 * i as f64 / n.max(1) as f64).clamp(-1.0, 1.0).acos();
	let theta = i as f64 * GOLDEN_ANGLE;
	Vec3::new(phi.sin() * theta.cos(), phi.sin() * theta.sin(), phi.cos())
}

/// Clamped render radius from connectivity and mention frequency.
pub fn render_size(degree: u32, frequency: u32) -> f64 {
	(2.0 + 0.4 * degree as f64 + 0.2 * frequency as f64).clamp(1.5, 10.0) * NODE_SIZE_SCALE
}

fn explicit_position(entity: &Entity, placement: &Placement) -> Option<Vec3> {
	let finite = |v: Option<f64>| v.filter(|v| v.is_finite());
	match placement {
		Placement::Spherical { .. } => Some(Vec3::new(
			finite(entity.x)?,
			finite(entity.y)?,
			finite(entity.z)?,
		)),
		Placement::Planar { .. } => Some(Vec3::new(finite(entity.x)?, finite(entity.y)?, 0.0)),
	}
}

/// Build the seeded working set for a run.
pub fn prepare<R: Rng>(data: &GraphData, placement: Placement, scheme: &ColorScheme, rng: &mut R) -> Prepared {
	let n = data.entities.len();
	let links = resolve_links(data);
	let degrees = compute_degrees(n, &links);
	let membership = assign_communities(&data.communities);

	let scores: Vec<f64> = data
		.entities
		.iter()
		.zip(&degrees)
		.map(|(e, &d)| abstraction_score(d, e.frequency))
		.collect();
	let normalized = normalize(&scores);

	let community_colors: Vec<String> = data
		.communities
		.iter()
		.enumerate()
		.map(|(i, c)| scheme.community_color(i, c.level))
		.collect();

	let mut nodes = Vec::with_capacity(n);
	let mut seed_radii = Vec::with_capacity(n);
	let mut community_index = Vec::with_capacity(n);

	for (i, entity) in data.entities.iter().enumerate() {
		let community = membership.get(entity.id.as_str()).copied();
		let level = community.map(|ci| data.communities[ci].level).unwrap_or(0);
		let jitter = rng.gen_range(0.9..=1.1);

		let (position, origin) = match placement {
			Placement::Spherical {
				spread,
				level_spacing,
			} => {
				let r = seed_radius(normalized[i], spread, level, level_spacing);
				let seed = fibonacci_sphere(i, n) * (r * jitter);
				(explicit_position(entity, &placement).unwrap_or(seed), Vec3::zeros())
			}
			Placement::Planar {
				center,
				spread,
				level_spacing,
			} => {
				let r = seed_radius(normalized[i], spread, level, level_spacing) * jitter;
				let angle = i as f64 * GOLDEN_ANGLE;
				let seed = Vec3::new(center.0 + r * angle.cos(), center.1 + r * angle.sin(), 0.0);
				let origin = Vec3::new(center.0, center.1, 0.0);
				(explicit_position(entity, &placement).unwrap_or(seed), origin)
			}
		};
		seed_radii.push((position - origin).norm());
		community_index.push(community);

		let mut entity = entity.clone();
		entity.degree = degrees[i];

		let size = entity
			.size
			.filter(|s| s.is_finite() && *s > 0.0)
			.unwrap_or_else(|| render_size(entity.degree, entity.frequency));
		let color = match community {
			Some(ci) => community_colors[ci].clone(),
			None => scheme.entity_color(entity.color.as_deref(), &entity.entity_type),
		};

		nodes.push(Node {
			entity,
			position,
			velocity: Vec3::zeros(),
			community: community.map(|ci| data.communities[ci].id.clone()),
			community_level: level,
			size,
			color,
		});
	}

	Prepared {
		nodes,
		links,
		seed_radius: seed_radii,
		community_index,
	}
}
