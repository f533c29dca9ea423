//! Browser entry points.
//!
//! The host page fetches graph JSON from the backend, hands it to a
//! [`LayoutSession`] and calls `step` from its `requestAnimationFrame` loop,
//! drawing intermediate positions as they arrive. `finish` returns the
//! settled layout as JSON.

use log::{Level, info};
use wasm_bindgen::prelude::*;

use crate::layout::{CancellationToken, ForceConfig, GraphData, LayoutError, LayoutRun};

/// Initialize logging and panic hooks for the WASM target.
#[wasm_bindgen(start)]
pub fn init_logging() {
	let _ = console_log::init_with_level(Level::Debug);
	console_error_panic_hook::set_once();
	info!("kg-layout: logging initialized");
}

fn to_js(err: LayoutError) -> JsValue {
	JsValue::from_str(&err.to_string())
}

fn parse_config(config_json: Option<String>) -> Result<ForceConfig, LayoutError> {
	match config_json {
		Some(json) if !json.trim().is_empty() => ForceConfig::from_json(&json),
		_ => Ok(ForceConfig::default()),
	}
}

/// Lay out a graph in one call and return the layout as JSON.
#[wasm_bindgen(js_name = generateLayout)]
pub fn generate_layout_json(graph_json: &str, config_json: Option<String>) -> Result<String, JsValue> {
	let data = GraphData::from_json(graph_json).map_err(to_js)?;
	let config = parse_config(config_json).map_err(to_js)?;
	crate::layout::generate_layout(&data, &config)
		.to_json()
		.map_err(to_js)
}

/// An in-flight layout the page advances a few ticks per animation frame.
#[wasm_bindgen]
pub struct LayoutSession {
	run: Option<LayoutRun>,
	token: CancellationToken,
}

#[wasm_bindgen]
impl LayoutSession {
	#[wasm_bindgen(constructor)]
	pub fn new(graph_json: &str, config_json: Option<String>) -> Result<LayoutSession, JsValue> {
		let data = GraphData::from_json(graph_json).map_err(to_js)?;
		let config = parse_config(config_json).map_err(to_js)?;
		let token = CancellationToken::new();
		let run = LayoutRun::new(&data, &config).with_cancellation(token.clone());
		Ok(Self {
			run: Some(run),
			token,
		})
	}

	/// Run up to `ticks` ticks. Returns true while more work remains.
	pub fn step(&mut self, ticks: u32) -> bool {
		let Some(run) = self.run.as_mut() else {
			return false;
		};
		for _ in 0..ticks {
			if run.step().is_none() {
				return false;
			}
		}
		!run.is_settled()
	}

	/// Flat `[x0, y0, z0, x1, ...]` positions in node order.
	pub fn positions(&self) -> Vec<f64> {
		self.run
			.as_ref()
			.map(|run| {
				run.nodes()
					.iter()
					.flat_map(|n| [n.position.x, n.position.y, n.position.z])
					.collect()
			})
			.unwrap_or_default()
	}

	/// Stop at the next tick boundary. `finish` then reports the cancellation.
	pub fn cancel(&self) {
		self.token.cancel();
	}

	/// Aggregate the settled layout and return it as JSON. Consumes the session's run.
	pub fn finish(&mut self) -> Result<String, JsValue> {
		let run = self
			.run
			.take()
			.ok_or_else(|| JsValue::from_str("layout session already finished"))?;
		if run.is_cancelled() {
			return Err(to_js(LayoutError::Cancelled { ticks: run.ticks() }));
		}
		run.finish().to_json().map_err(to_js)
	}
}
