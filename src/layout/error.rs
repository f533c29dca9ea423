//! Errors surfaced to callers of the layout engine.
//!
//! Dangling relationship references, empty graphs and coincident nodes are
//! handled inside the engine and never show up here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayoutError {
	#[error("malformed graph data: {0}")]
	MalformedGraph(#[source] serde_json::Error),

	#[error("malformed force config: {0}")]
	MalformedConfig(#[source] serde_json::Error),

	#[error("failed to serialize layout: {0}")]
	Serialize(#[source] serde_json::Error),

	#[error("layout cancelled after {ticks} ticks")]
	Cancelled { ticks: usize },
}
