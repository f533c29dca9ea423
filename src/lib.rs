//! kg-layout: force-directed layout for personal knowledge graphs.
//!
//! This crate turns entities, weighted relationships and nested communities
//! into stable 3D (or 2D) coordinates plus community hull geometry, ready for
//! a renderer to draw. Browser builds expose the engine through
//! `wasm-bindgen`; native callers use [`generate_layout`] or drive a
//! [`LayoutRun`] tick by tick.

pub mod layout;

#[cfg(target_arch = "wasm32")]
pub mod bindings;

pub use layout::{
	CancellationToken, Community, CommunityLayout, Entity, ForceConfig, GraphData, GraphLayout,
	LayoutError, LayoutRun, Link, Node, PlanarConfig, Relationship, generate_layout,
	generate_layout_2d,
};
