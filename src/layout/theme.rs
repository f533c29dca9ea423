//! Node and community coloring.
//!
//! Communities take a color from a fixed palette by their position in the
//! input. Entities outside any community fall back to an explicit color, then
//! to a per-type color, then to a neutral gray.

use std::collections::HashMap;

/// RGB color representation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
	pub r: u8,
	pub g: u8,
	pub b: u8,
}

impl Color {
	pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
		Self { r, g, b }
	}

	/// Lighten the color by a factor (0.0 = unchanged, 1.0 = white)
	pub fn lighten(self, factor: f64) -> Self {
		let f = factor.clamp(0.0, 1.0);
		Self {
			r: (self.r as f64 + (255.0 - self.r as f64) * f) as u8,
			g: (self.g as f64 + (255.0 - self.g as f64) * f) as u8,
			b: (self.b as f64 + (255.0 - self.b as f64) * f) as u8,
		}
	}

	pub fn to_css_rgb(self) -> String {
		format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
	}
}

/// Neutral color for entities with no community, explicit color or known type.
pub const FALLBACK_COLOR: Color = Color::rgb(158, 158, 158);

/// A cyclic color palette.
#[derive(Clone, Debug)]
pub struct Palette {
	pub colors: Vec<Color>,
}

impl Palette {
	/// Distinct, saturated colors for community groupings.
	pub fn communities() -> Self {
		Self {
			colors: vec![
				Color::rgb(25, 118, 210),  // Blue
				Color::rgb(123, 31, 162),  // Purple
				Color::rgb(230, 81, 0),    // Orange
				Color::rgb(46, 125, 50),   // Green
				Color::rgb(198, 40, 40),   // Red
				Color::rgb(0, 131, 143),   // Cyan
				Color::rgb(249, 168, 37),  // Amber
				Color::rgb(173, 20, 87),   // Pink
				Color::rgb(69, 90, 100),   // Blue gray
				Color::rgb(85, 139, 47),   // Olive
			],
		}
	}

	/// The color at `index`, cycling. `None` for an empty palette.
	pub fn get(&self, index: usize) -> Option<Color> {
		if self.colors.is_empty() {
			return None;
		}
		Some(self.colors[index % self.colors.len()])
	}
}

/// Default entity-type colors for entities outside any community.
pub fn default_type_colors() -> HashMap<String, Color> {
	[
		("concept", Color::rgb(94, 129, 172)),
		("topic", Color::rgb(100, 148, 160)),
		("person", Color::rgb(180, 136, 100)),
		("organization", Color::rgb(130, 120, 150)),
		("event", Color::rgb(180, 120, 100)),
		("location", Color::rgb(100, 145, 135)),
		("technology", Color::rgb(80, 130, 150)),
		("document", Color::rgb(170, 145, 115)),
	]
	.into_iter()
	.map(|(k, v)| (k.to_string(), v))
	.collect()
}

/// Resolves render colors for communities and entities.
#[derive(Clone, Debug)]
pub struct ColorScheme {
	pub communities: Palette,
	pub types: HashMap<String, Color>,
	pub fallback: Color,
}

impl Default for ColorScheme {
	fn default() -> Self {
		Self {
			communities: Palette::communities(),
			types: default_type_colors(),
			fallback: FALLBACK_COLOR,
		}
	}
}

impl ColorScheme {
	/// Community colors repeat after the palette runs out, so nested levels
	/// are lightened to keep siblings and parents apart.
	pub fn community_color(&self, index: usize, level: u32) -> String {
		let lift = (level as f64 * 0.15).min(0.6);
		self.communities
			.get(index)
			.unwrap_or(self.fallback)
			.lighten(lift)
			.to_css_rgb()
	}

	/// Color for an entity with no community: explicit color > type color > fallback.
	pub fn entity_color(&self, explicit: Option<&str>, entity_type: &str) -> String {
		if let Some(c) = explicit.filter(|c| !c.is_empty()) {
			return c.to_string();
		}
		self.types
			.get(&entity_type.to_lowercase())
			.copied()
			.unwrap_or(self.fallback)
			.to_css_rgb()
	}
}
