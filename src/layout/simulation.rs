//! Force simulation state and the pull-based tick loop.
//!
//! A [`LayoutRun`] owns every working array for one run. Each call to
//! [`LayoutRun::step`] (or `Iterator::next`) performs exactly one tick:
//!
//! 1. Cool: alpha decays geometrically (3D) or linearly (2D).
//! 2. Accumulate forces into velocities: links, charge, centering, community
//!    cohesion, the optional radial shell constraint, then collision passes.
//! 3. Integrate: apply friction, clamp speed (2D), move, clamp to the
//!    drawing surface (2D).
//!
//! Callers own the loop, so a browser host can run a few ticks per animation
//! frame and a native host can simply drain the iterator. Cancellation is
//! checked at tick boundaries only.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::community;
use super::config::{ForceConfig, PlanarConfig};
use super::error::LayoutError;
use super::preprocess::{self, GOLDEN_ANGLE, Placement};
use super::theme::ColorScheme;
use super::types::{Community, GraphData, GraphLayout, LayoutStats, Link, Node, Vec3, is_finite};

/// Extra repulsion per unit of degree, keeping hubs from crowding their neighbors.
pub const DEGREE_CHARGE: f64 = 5.0;

/// Distances below this are treated as coincident and separated along a fixed direction.
const COINCIDENT_EPSILON: f64 = 1e-9;

/// Shared flag a caller flips to stop an in-flight run at the next tick boundary.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.0.store(true, Ordering::Relaxed);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::Relaxed)
	}
}

/// Which simulation variant a run uses.
#[derive(Clone, Debug)]
pub enum Variant {
	/// 3D: geometric cooling until alpha drops below `alpha_min`, centering on the origin.
	Spherical,
	/// 2D: fixed iteration count, linear cooling, speed and surface clamping.
	Planar(PlanarConfig),
}

/// Progress after one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickReport {
	/// 1-based index of the tick just performed.
	pub tick: usize,
	pub alpha: f64,
	/// Sum of squared node speeds after integration.
	pub kinetic_energy: f64,
}

/// One layout run over a fixed graph snapshot.
pub struct LayoutRun {
	config: ForceConfig,
	variant: Variant,
	scheme: ColorScheme,
	communities: Vec<Community>,
	nodes: Vec<Node>,
	links: Vec<Link>,
	community_index: Vec<Option<usize>>,
	seed_radius: Vec<f64>,
	/// Per-node repulsion strength (negative = repulsive).
	charge: Vec<f64>,
	/// Per-node collision radius.
	collide_radius: Vec<f64>,
	/// Per-link spring stiffness and the share of the correction taken by the target.
	link_strength: Vec<f64>,
	link_bias: Vec<f64>,
	centroids: Vec<Option<Vec3>>,
	alpha: f64,
	tick: usize,
	cancel: Option<CancellationToken>,
}

impl LayoutRun {
	/// A 3D run seeded on a Fibonacci sphere.
	pub fn new(data: &GraphData, config: &ForceConfig) -> Self {
		Self::with_variant(data, config, Variant::Spherical)
	}

	/// A 2D run confined to the given drawing surface.
	pub fn planar(data: &GraphData, config: &ForceConfig, surface: &PlanarConfig) -> Self {
		Self::with_variant(data, config, Variant::Planar(surface.clone()))
	}

	pub fn with_variant(data: &GraphData, config: &ForceConfig, variant: Variant) -> Self {
		Self::with_scheme(data, config, variant, ColorScheme::default())
	}

	/// A run that colors nodes and communities from `scheme` instead of the default palette.
	pub fn with_scheme(data: &GraphData, config: &ForceConfig, variant: Variant, scheme: ColorScheme) -> Self {
		let config = config.sanitized();
		let variant = match variant {
			Variant::Planar(surface) => Variant::Planar(surface.sanitized()),
			spherical => spherical,
		};
		let mut rng = match config.seed {
			Some(seed) => ChaCha8Rng::seed_from_u64(seed),
			None => ChaCha8Rng::from_entropy(),
		};

		let placement = match &variant {
			Variant::Spherical => Placement::Spherical {
				spread: config.spread_3d,
				level_spacing: config.level_spacing,
			},
			Variant::Planar(surface) => Placement::Planar {
				center: surface.center(),
				spread: (surface.width.min(surface.height) / 2.0 - surface.margin).max(1.0),
				level_spacing: config.level_spacing,
			},
		};
		let prepared = preprocess::prepare(data, placement, &scheme, &mut rng);

		let charge = prepared
			.nodes
			.iter()
			.map(|n| config.charge_strength - DEGREE_CHARGE * n.degree() as f64)
			.collect();
		let collide_radius = prepared
			.nodes
			.iter()
			.map(|n| n.size + config.collision_radius)
			.collect();

		let mut link_strength = Vec::with_capacity(prepared.links.len());
		let mut link_bias = Vec::with_capacity(prepared.links.len());
		for link in &prepared.links {
			let ds = prepared.nodes[link.source].degree().max(1) as f64;
			let dt = prepared.nodes[link.target].degree().max(1) as f64;
			let w = link.weight().max(0.0);
			// Split between hub endpoints so busy nodes don't overshoot.
			let s = config.link_strength * (0.3 * w + 0.7) / ds.min(dt);
			link_strength.push(s.clamp(0.0, 1.0));
			link_bias.push(ds / (ds + dt));
		}

		debug!(
			"kg-layout: prepared {} nodes, {} links, {} communities",
			prepared.nodes.len(),
			prepared.links.len(),
			data.communities.len()
		);

		Self {
			variant,
			scheme,
			communities: data.communities.clone(),
			centroids: vec![None; data.communities.len()],
			nodes: prepared.nodes,
			links: prepared.links,
			community_index: prepared.community_index,
			seed_radius: prepared.seed_radius,
			charge,
			collide_radius,
			link_strength,
			link_bias,
			alpha: 1.0,
			tick: 0,
			cancel: None,
			config,
		}
	}

	/// Stop at the next tick boundary once `token` is cancelled.
	pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
		self.cancel = Some(token);
		self
	}

	/// Current (intermediate or settled) nodes.
	pub fn nodes(&self) -> &[Node] {
		&self.nodes
	}

	pub fn links(&self) -> &[Link] {
		&self.links
	}

	pub fn alpha(&self) -> f64 {
		self.alpha
	}

	pub fn ticks(&self) -> usize {
		self.tick
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
	}

	fn tick_limit(&self) -> usize {
		match &self.variant {
			Variant::Spherical => self.config.max_ticks,
			Variant::Planar(surface) => surface.iterations.min(self.config.max_ticks),
		}
	}

	/// Whether cooling has finished on its own (as opposed to hitting the tick cap).
	fn cooled(&self) -> bool {
		match &self.variant {
			Variant::Spherical => self.alpha < self.config.alpha_min,
			Variant::Planar(surface) => self.tick >= surface.iterations,
		}
	}

	/// True once no further ticks will run.
	pub fn is_settled(&self) -> bool {
		self.nodes.is_empty() || self.cooled() || self.tick >= self.tick_limit()
	}

	/// Perform one tick. Returns `None` once settled or cancelled.
	pub fn step(&mut self) -> Option<TickReport> {
		if self.is_cancelled() || self.is_settled() {
			return None;
		}

		self.alpha = match &self.variant {
			Variant::Spherical => self.alpha * (1.0 - self.config.alpha_decay),
			Variant::Planar(surface) => 1.0 - self.tick as f64 / surface.iterations as f64,
		};

		let interval = self.config.community_refresh_interval;
		if interval > 0 && self.tick % interval == 0 {
			self.refresh_centroids();
		}

		self.apply_links();
		self.apply_charge();
		self.apply_centering();
		if interval > 0 {
			self.apply_community_cohesion();
		}
		if self.config.spherical_constraint > 0.0 {
			self.apply_shell_constraint();
		}
		for _ in 0..self.config.collision_iterations {
			self.apply_collision();
		}
		let kinetic_energy = self.integrate();

		self.tick += 1;
		Some(TickReport {
			tick: self.tick,
			alpha: self.alpha,
			kinetic_energy,
		})
	}

	/// Drain the run and aggregate the settled layout.
	pub fn run(mut self) -> Result<GraphLayout, LayoutError> {
		while self.step().is_some() {}
		if self.is_cancelled() {
			return Err(LayoutError::Cancelled { ticks: self.tick });
		}
		Ok(self.finish())
	}

	/// Aggregate the current positions into a snapshot, whether or not the run settled.
	pub fn finish(mut self) -> GraphLayout {
		if let Variant::Planar(surface) = &self.variant {
			let surface = surface.clone();
			for node in &mut self.nodes {
				clamp_to_surface(&mut node.position, &surface);
			}
		}

		let stats = LayoutStats {
			ticks: self.tick,
			final_alpha: self.alpha,
			converged: self.cooled() || self.nodes.is_empty(),
		};
		let communities = community::aggregate(&self.nodes, &self.community_index, &self.communities, &self.scheme);

		info!(
			"kg-layout: layout finished: {} nodes, {} links, {} ticks, alpha {:.4}",
			self.nodes.len(),
			self.links.len(),
			stats.ticks,
			stats.final_alpha
		);

		GraphLayout {
			nodes: self.nodes,
			links: self.links,
			communities,
			stats,
		}
	}

	fn is_planar(&self) -> bool {
		matches!(self.variant, Variant::Planar(_))
	}

	fn origin(&self) -> Vec3 {
		match &self.variant {
			Variant::Spherical => Vec3::zeros(),
			Variant::Planar(surface) => {
				let (cx, cy) = surface.center();
				Vec3::new(cx, cy, 0.0)
			}
		}
	}

	fn refresh_centroids(&mut self) {
		self.centroids = community::centroids(&self.nodes, &self.community_index, self.communities.len());
	}

	/// Springs pulling linked nodes toward a weight-shortened separation.
	fn apply_links(&mut self) {
		let planar = self.is_planar();
		for (li, link) in self.links.iter().enumerate() {
			let (s, t) = (link.source, link.target);
			if s == t {
				continue;
			}
			let target_distance = self.config.link_distance / (1.0 + 0.05 * link.weight().max(0.0));
			let predicted_s = self.nodes[s].position + self.nodes[s].velocity;
			let predicted_t = self.nodes[t].position + self.nodes[t].velocity;
			let (unit, l) = direction(predicted_t - predicted_s, s, t, planar);

			let correction = unit * ((l - target_distance) * self.alpha * self.link_strength[li]);
			let bias = self.link_bias[li];
			self.nodes[t].velocity -= correction * bias;
			self.nodes[s].velocity += correction * (1.0 - bias);
		}
	}

	/// Pairwise inverse-square repulsion. Distances are clamped to at least 1.
	fn apply_charge(&mut self) {
		let planar = self.is_planar();
		let n = self.nodes.len();
		for i in 0..n {
			for j in (i + 1)..n {
				let (unit, l) = direction(self.nodes[j].position - self.nodes[i].position, i, j, planar);
				let l2 = (l * l).max(1.0);
				let on_i = unit * (self.charge[j] * self.alpha / l2);
				let on_j = unit * (self.charge[i] * self.alpha / l2);
				self.nodes[i].velocity += on_i;
				self.nodes[j].velocity -= on_j;
			}
		}
	}

	fn apply_centering(&mut self) {
		let origin = self.origin();
		let k = self.config.center_strength * self.alpha;
		for node in &mut self.nodes {
			let offset = node.position - origin;
			node.velocity -= offset * k;
		}
	}

	/// Pull each member toward its community's most recently computed centroid.
	fn apply_community_cohesion(&mut self) {
		let k = self.config.community_strength * self.alpha;
		if k == 0.0 {
			return;
		}
		for (node, ci) in self.nodes.iter_mut().zip(&self.community_index) {
			if let Some(centroid) = ci.and_then(|ci| self.centroids[ci]) {
				node.velocity += (centroid - node.position) * k;
			}
		}
	}

	/// Pull each node's radius back toward its seeded radius.
	fn apply_shell_constraint(&mut self) {
		let origin = self.origin();
		let k = self.config.spherical_constraint * self.alpha;
		for (node, &target) in self.nodes.iter_mut().zip(&self.seed_radius) {
			let offset = node.position - origin;
			let r = offset.norm();
			if r > COINCIDENT_EPSILON {
				node.velocity += offset * ((target - r) / r * k);
			}
		}
	}

	/// One relaxation pass of the minimum-separation constraint.
	fn apply_collision(&mut self) {
		let planar = self.is_planar();
		let strength = self.config.collision_strength;
		let n = self.nodes.len();
		for i in 0..n {
			for j in (i + 1)..n {
				let (ri, rj) = (self.collide_radius[i], self.collide_radius[j]);
				let r = ri + rj;
				let predicted_i = self.nodes[i].position + self.nodes[i].velocity;
				let predicted_j = self.nodes[j].position + self.nodes[j].velocity;
				let delta = predicted_j - predicted_i;
				if delta.norm_squared() >= r * r {
					continue;
				}
				let (unit, l) = direction(delta, i, j, planar);
				let push = unit * ((r - l) * strength);
				// The smaller node gives way more.
				let share_i = rj * rj / (ri * ri + rj * rj);
				self.nodes[i].velocity -= push * share_i;
				self.nodes[j].velocity += push * (1.0 - share_i);
			}
		}
	}

	/// Apply friction and move. Returns the total squared speed.
	fn integrate(&mut self) -> f64 {
		let friction = 1.0 - self.config.velocity_decay;
		let mut energy = 0.0;
		for node in &mut self.nodes {
			node.velocity *= friction;
			if let Variant::Planar(surface) = &self.variant {
				let speed = node.velocity.norm();
				if speed > surface.max_speed {
					node.velocity *= surface.max_speed / speed;
				}
				node.velocity.z = 0.0;
			}
			node.position += node.velocity;
			if let Variant::Planar(surface) = &self.variant {
				clamp_to_surface(&mut node.position, surface);
			}
			debug_assert!(is_finite(&node.position), "non-finite position for {}", node.id());
			energy += node.velocity.norm_squared();
		}
		energy
	}
}

impl Iterator for LayoutRun {
	type Item = TickReport;

	fn next(&mut self) -> Option<TickReport> {
		self.step()
	}
}

/// Unit vector from `i` toward `j` plus the distance. Coincident pairs get a
/// fixed direction derived from their indices and a distance of zero.
fn direction(delta: Vec3, i: usize, j: usize, planar: bool) -> (Vec3, f64) {
	let l = delta.norm();
	if l > COINCIDENT_EPSILON {
		return (delta / l, l);
	}
	let a = (i + j + 1) as f64 * GOLDEN_ANGLE;
	let unit = if planar {
		Vec3::new(a.cos(), a.sin(), 0.0)
	} else {
		Vec3::new(0.8 * a.cos(), 0.8 * a.sin(), 0.6)
	};
	(unit, 0.0)
}

fn clamp_to_surface(p: &mut Vec3, surface: &PlanarConfig) {
	p.x = p.x.clamp(surface.margin, surface.width - surface.margin);
	p.y = p.y.clamp(surface.margin, surface.height - surface.margin);
	p.z = 0.0;
}

#[cfg(test)]
mod tests {
	use approx::assert_abs_diff_eq;

	use super::*;
	use crate::layout::types::{Entity, Relationship};

	fn graph(ids: &[&str], edges: &[(&str, &str)]) -> GraphData {
		GraphData {
			entities: ids
				.iter()
				.map(|id| Entity {
					id: id.to_string(),
					title: id.to_uppercase(),
					..Entity::default()
				})
				.collect(),
			relationships: edges
				.iter()
				.map(|(s, t)| Relationship {
					id: format!("{s}-{t}"),
					source: s.to_string(),
					target: t.to_string(),
					description: "relates to".into(),
					weight: 1.0,
				})
				.collect(),
			communities: vec![],
		}
	}

	fn seeded() -> ForceConfig {
		ForceConfig {
			seed: Some(42),
			..ForceConfig::default()
		}
	}

	#[test]
	fn coincident_direction_is_unit_length() {
		let (u, l) = direction(Vec3::zeros(), 3, 4, false);
		assert_eq!(l, 0.0);
		assert_abs_diff_eq!(u.norm(), 1.0, epsilon = 1e-12);
		let (u, _) = direction(Vec3::zeros(), 3, 4, true);
		assert_eq!(u.z, 0.0);
		assert_abs_diff_eq!(u.norm(), 1.0, epsilon = 1e-12);
	}

	#[test]
	fn empty_graph_settles_immediately() {
		let mut run = LayoutRun::new(&GraphData::default(), &seeded());
		assert!(run.is_settled());
		assert!(run.step().is_none());
		let layout = run.finish();
		assert!(layout.nodes.is_empty());
		assert_eq!(layout.stats.ticks, 0);
		assert!(layout.stats.converged);
	}

	#[test]
	fn alpha_decays_geometrically() {
		let mut run = LayoutRun::new(&graph(&["a", "b"], &[("a", "b")]), &seeded());
		let first = run.step().unwrap();
		let second = run.step().unwrap();
		let d = ForceConfig::default().alpha_decay;
		assert_abs_diff_eq!(first.alpha, 1.0 - d, epsilon = 1e-12);
		assert_abs_diff_eq!(second.alpha, (1.0 - d) * (1.0 - d), epsilon = 1e-12);
	}

	#[test]
	fn respects_tick_cap() {
		let config = ForceConfig {
			max_ticks: 25,
			..seeded()
		};
		let run = LayoutRun::new(&graph(&["a", "b", "c"], &[("a", "b")]), &config);
		assert_eq!(run.count(), 25);
	}

	#[test]
	fn stops_when_alpha_cools() {
		let config = ForceConfig {
			max_ticks: 10_000,
			..seeded()
		};
		let mut run = LayoutRun::new(&graph(&["a", "b"], &[("a", "b")]), &config);
		while run.step().is_some() {}
		assert!(run.ticks() < 10_000);
		assert!(run.alpha() < config.alpha_min);
		assert!(run.finish().stats.converged);
	}

	#[test]
	fn planar_cooling_is_linear_and_fixed_length() {
		let surface = PlanarConfig {
			iterations: 4,
			..PlanarConfig::default()
		};
		let run = LayoutRun::planar(&graph(&["a", "b"], &[("a", "b")]), &seeded(), &surface);
		let alphas: Vec<f64> = run.map(|r| r.alpha).collect();
		assert_eq!(alphas, vec![1.0, 0.75, 0.5, 0.25]);
	}

	#[test]
	fn cancellation_stops_at_tick_boundary() {
		let token = CancellationToken::new();
		let mut run = LayoutRun::new(&graph(&["a", "b"], &[("a", "b")]), &seeded()).with_cancellation(token.clone());
		assert!(run.step().is_some());
		token.cancel();
		assert!(run.step().is_none());
		assert_eq!(run.ticks(), 1);
		match run.run() {
			Err(LayoutError::Cancelled { ticks }) => assert_eq!(ticks, 1),
			other => panic!("expected cancellation, got {other:?}"),
		}
	}

	#[test]
	fn coincident_nodes_separate_without_nan() {
		let mut data = graph(&["a", "b", "c"], &[("a", "b")]);
		for e in &mut data.entities {
			e.x = Some(0.0);
			e.y = Some(0.0);
			e.z = Some(0.0);
		}
		let layout = LayoutRun::new(&data, &seeded()).run().unwrap();
		for node in &layout.nodes {
			assert!(is_finite(&node.position));
		}
		let d = (layout.nodes[0].position - layout.nodes[2].position).norm();
		assert!(d > 1.0, "nodes still coincident: {d}");
	}

	#[test]
	fn huge_weights_stay_finite() {
		let mut data = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
		data.relationships[0].weight = 1e6;
		data.relationships[1].weight = -50.0;
		let layout = LayoutRun::new(&data, &seeded()).run().unwrap();
		assert!(layout.nodes.iter().all(|n| is_finite(&n.position)));
	}

	#[test]
	fn community_cohesion_pulls_members_together() {
		let mut data = graph(&["a", "b", "c", "d"], &[]);
		data.communities.push(Community {
			id: "c".into(),
			entity_ids: vec!["a".into(), "b".into()],
			..Community::default()
		});
		let spread = |strength: f64| {
			let config = ForceConfig {
				community_strength: strength,
				..seeded()
			};
			let layout = LayoutRun::new(&data, &config).run().unwrap();
			(layout.nodes[0].position - layout.nodes[1].position).norm()
		};
		assert!(spread(0.5) < spread(0.0));
	}

	#[test]
	fn centering_alone_pulls_a_lone_node_inward() {
		let data = graph(&["a"], &[]);
		let settle = |center_strength: f64| {
			let config = ForceConfig {
				center_strength,
				..seeded()
			};
			let run = LayoutRun::new(&data, &config);
			let start = run.nodes()[0].position;
			(start, run.run().unwrap().nodes[0].position)
		};

		let (start, still) = settle(0.0);
		assert_eq!(start, still);

		let (start, pulled) = settle(0.1);
		assert!(pulled.norm() < 0.1 * start.norm(), "{} -> {}", start.norm(), pulled.norm());
	}

	#[test]
	fn planar_centering_targets_canvas_center() {
		let surface = PlanarConfig::default();
		let config = ForceConfig {
			center_strength: 0.5,
			..seeded()
		};
		let layout = LayoutRun::planar(&graph(&["a"], &[]), &config, &surface).run().unwrap();
		let (cx, cy) = surface.center();
		let p = layout.nodes[0].position;
		assert!((p - Vec3::new(cx, cy, 0.0)).norm() < 5.0, "settled at {p:?}");
	}

	#[test]
	fn injected_scheme_colors_nodes_and_communities() {
		use crate::layout::theme::{Color, Palette};

		let mut data = graph(&["a", "b"], &[("a", "b")]);
		data.entities[1].entity_type = "person".into();
		data.communities.push(Community {
			id: "c".into(),
			entity_ids: vec!["a".into()],
			..Community::default()
		});
		let mut scheme = ColorScheme {
			communities: Palette {
				colors: vec![Color::rgb(255, 0, 0)],
			},
			..ColorScheme::default()
		};
		scheme.types.insert("person".into(), Color::rgb(0, 0, 255));

		let layout = LayoutRun::with_scheme(&data, &seeded(), Variant::Spherical, scheme).run().unwrap();
		assert_eq!(layout.nodes[0].color, "#ff0000");
		assert_eq!(layout.nodes[1].color, "#0000ff");
		assert_eq!(layout.communities[0].color, "#ff0000");
	}
}
