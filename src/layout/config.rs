//! Tunable parameters for the force simulation.
//!
//! Every field has a default, so callers (and JSON configs) only need to name
//! the options they want to change. Values that would poison the integrator
//! (NaN, infinities, out-of-range decay rates) are replaced by their defaults
//! in [`ForceConfig::sanitized`] rather than reported as errors.

use log::warn;
use serde::{Deserialize, Serialize};

use super::error::LayoutError;

/// Alpha decay that cools from 1.0 to the default `alpha_min` in 300 ticks.
pub const DEFAULT_ALPHA_DECAY: f64 = 0.022_762_095_998_323_846;

/// Force and convergence parameters shared by the 3D and 2D variants.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForceConfig {
	/// Repulsion base magnitude (negative = repulsive).
	pub charge_strength: f64,
	/// Base target edge length before weight shortening.
	pub link_distance: f64,
	/// Base spring stiffness.
	pub link_strength: f64,
	/// Collision padding added to each node's render size.
	pub collision_radius: f64,
	/// Pull toward the community centroid, in `[0, 1]`.
	pub community_strength: f64,
	/// Pull toward the origin (3D) or canvas center (2D), in `[0, 1]`.
	pub center_strength: f64,
	/// Initial placement radius ceiling.
	#[serde(rename = "spread3D", alias = "spread3d")]
	pub spread_3d: f64,
	/// Extra seed radius per community level.
	pub level_spacing: f64,
	/// Pull back toward each node's seeded radius, in `[0, 1]`. 0 disables it.
	pub spherical_constraint: f64,
	/// Hard cap on ticks per run.
	pub max_ticks: usize,
	/// The 3D run stops once alpha drops below this.
	pub alpha_min: f64,
	/// Fraction of alpha lost each tick.
	pub alpha_decay: f64,
	/// Fraction of velocity lost each tick (friction).
	pub velocity_decay: f64,
	pub collision_iterations: usize,
	pub collision_strength: f64,
	/// Ticks between community centroid refreshes. 0 disables the cohesion force.
	pub community_refresh_interval: usize,
	/// Seed for placement jitter. `None` draws one from the OS.
	pub seed: Option<u64>,
}

impl Default for ForceConfig {
	fn default() -> Self {
		Self {
			charge_strength: -100.0,
			link_distance: 40.0,
			link_strength: 1.0,
			collision_radius: 6.0,
			community_strength: 0.05,
			center_strength: 0.01,
			spread_3d: 200.0,
			level_spacing: 30.0,
			spherical_constraint: 0.0,
			max_ticks: 300,
			alpha_min: 0.001,
			alpha_decay: DEFAULT_ALPHA_DECAY,
			velocity_decay: 0.4,
			collision_iterations: 2,
			collision_strength: 0.7,
			community_refresh_interval: 10,
			seed: None,
		}
	}
}

/// Replace `value` with `fallback` unless it is finite and satisfies `ok`.
fn finite_or(name: &str, value: f64, fallback: f64, ok: impl Fn(f64) -> bool) -> f64 {
	if value.is_finite() && ok(value) {
		value
	} else {
		warn!("kg-layout: {name} = {value} is out of range, using {fallback}");
		fallback
	}
}

impl ForceConfig {
	/// Parse a (possibly partial) JSON object over the defaults.
	pub fn from_json(json: &str) -> Result<Self, LayoutError> {
		serde_json::from_str(json).map_err(LayoutError::MalformedConfig)
	}

	/// A copy with every numeric field finite and in its valid range.
	pub fn sanitized(&self) -> Self {
		let d = Self::default();
		let any = |_: f64| true;
		let non_negative = |v: f64| v >= 0.0;
		let unit_open = |v: f64| v > 0.0 && v < 1.0;
		// Pull coefficients above 1 make the per-tick velocity update overshoot.
		let unit_closed = |v: f64| (0.0..=1.0).contains(&v);

		Self {
			charge_strength: finite_or("chargeStrength", self.charge_strength, d.charge_strength, any),
			link_distance: finite_or("linkDistance", self.link_distance, d.link_distance, non_negative),
			link_strength: finite_or("linkStrength", self.link_strength, d.link_strength, non_negative),
			collision_radius: finite_or(
				"collisionRadius",
				self.collision_radius,
				d.collision_radius,
				non_negative,
			),
			community_strength: finite_or(
				"communityStrength",
				self.community_strength,
				d.community_strength,
				unit_closed,
			),
			center_strength: finite_or("centerStrength", self.center_strength, d.center_strength, unit_closed),
			spread_3d: finite_or("spread3D", self.spread_3d, d.spread_3d, |v| v > 0.0),
			level_spacing: finite_or("levelSpacing", self.level_spacing, d.level_spacing, non_negative),
			spherical_constraint: finite_or(
				"sphericalConstraint",
				self.spherical_constraint,
				d.spherical_constraint,
				unit_closed,
			),
			max_ticks: self.max_ticks,
			alpha_min: finite_or("alphaMin", self.alpha_min, d.alpha_min, unit_open),
			alpha_decay: finite_or("alphaDecay", self.alpha_decay, d.alpha_decay, unit_open),
			velocity_decay: finite_or("velocityDecay", self.velocity_decay, d.velocity_decay, unit_closed),
			collision_iterations: self.collision_iterations,
			collision_strength: finite_or(
				"collisionStrength",
				self.collision_strength,
				d.collision_strength,
				unit_closed,
			),
			community_refresh_interval: self.community_refresh_interval,
			seed: self.seed,
		}
	}
}

/// Drawing surface for the 2D variant.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlanarConfig {
	pub width: f64,
	pub height: f64,
	/// Minimum distance kept between any node and the surface edge.
	pub margin: f64,
	/// Fixed tick count; cooling falls linearly from 1 to 0 over it.
	pub iterations: usize,
	/// Per-tick speed cap.
	pub max_speed: f64,
}

impl Default for PlanarConfig {
	fn default() -> Self {
		Self {
			width: 800.0,
			height: 600.0,
			margin: 40.0,
			iterations: 300,
			max_speed: 10.0,
		}
	}
}

impl PlanarConfig {
	pub fn sanitized(&self) -> Self {
		let d = Self::default();
		let width = finite_or("width", self.width, d.width, |v| v > 0.0);
		let height = finite_or("height", self.height, d.height, |v| v > 0.0);
		// The margin may not swallow the whole surface.
		let max_margin = width.min(height) / 2.0;
		let margin = finite_or("margin", self.margin, d.margin.min(max_margin), |v| {
			v >= 0.0 && v <= max_margin
		});
		Self {
			width,
			height,
			margin,
			iterations: self.iterations,
			max_speed: finite_or("maxSpeed", self.max_speed, d.max_speed, |v| v > 0.0),
		}
	}

	pub fn center(&self) -> (f64, f64) {
		(self.width / 2.0, self.height / 2.0)
	}
}
