//! Force-directed layout engine for community-structured knowledge graphs.
//!
//! Converts a [`GraphData`] snapshot into a settled [`GraphLayout`]:
//! - Preprocessing: degree counting, endpoint resolution, community
//!   assignment, golden-angle seeding and render attributes
//! - Force simulation: charge, springs, collision, centering and community
//!   cohesion, integrated tick by tick until alpha cools
//! - Community aggregation: padded bounds, hull opacity and parent/child
//!   lookups from the settled positions
//!
//! # Example
//!
//! ```
//! use kg_layout::{generate_layout, ForceConfig, GraphData};
//!
//! let data = GraphData::from_json(r#"{
//!     "entities": [{"id": "a", "title": "Rust"}, {"id": "b", "title": "Ownership"}],
//!     "relationships": [{"source": "a", "target": "b", "weight": 0.8}],
//!     "communities": []
//! }"#).unwrap();
//!
//! let layout = generate_layout(&data, &ForceConfig { seed: Some(7), ..ForceConfig::default() });
//! assert_eq!(layout.links.len(), 1);
//! ```

pub mod community;
mod config;
mod error;
pub mod preprocess;
mod simulation;
pub mod theme;
mod types;

pub use config::{ForceConfig, PlanarConfig};
pub use error::LayoutError;
pub use simulation::{CancellationToken, LayoutRun, TickReport, Variant};
pub use types::{
	Bounds, Community, CommunityLayout, Entity, GraphData, GraphLayout, LayoutStats, Link, Node,
	Relationship, Vec3, is_finite,
};

/// Run a 3D layout to completion.
///
/// Each call builds fresh working state, so concurrent calls on different
/// threads never share anything.
pub fn generate_layout(data: &GraphData, config: &ForceConfig) -> GraphLayout {
	let mut run = LayoutRun::new(data, config);
	while run.step().is_some() {}
	run.finish()
}

/// Run a 2D layout confined to `surface` to completion.
pub fn generate_layout_2d(data: &GraphData, config: &ForceConfig, surface: &PlanarConfig) -> GraphLayout {
	let mut run = LayoutRun::planar(data, config, surface);
	while run.step().is_some() {}
	run.finish()
}
