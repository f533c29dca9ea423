//! Graph data structures: the caller's input snapshot and the settled layout.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::error::LayoutError;

fn default_weight() -> f64 {
	1.0
}

/// A concept or topic in the knowledge graph.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
	/// Unique identifier. Relationships and communities reference entities by this id.
	pub id: String,
	/// Display title. Also used as a fallback key when resolving relationship endpoints.
	#[serde(default)]
	pub title: String,
	/// Type tag (e.g., "concept", "person"), used for palette coloring.
	#[serde(default, rename = "type")]
	pub entity_type: String,
	#[serde(default)]
	pub description: String,
	/// Number of times the entity was mentioned in ingested notes.
	#[serde(default)]
	pub frequency: u32,
	/// Undirected link count. Recomputed by the engine; input values are ignored.
	#[serde(default)]
	pub degree: u32,
	/// Explicit render size, overriding the degree/frequency formula.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub size: Option<f64>,
	/// Explicit CSS color, used when the entity belongs to no community.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub color: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub x: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub y: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub z: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub domain: Option<String>,
}

/// A weighted, typed edge between two entities.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
	#[serde(default)]
	pub id: String,
	/// Source entity id (or title, see fallback resolution).
	pub source: String,
	/// Target entity id (or title, see fallback resolution).
	pub target: String,
	/// Free-text description; doubles as the relationship type label.
	#[serde(default)]
	pub description: String,
	/// Unitless strength, conventionally in 0..1 but not clamped.
	#[serde(default = "default_weight")]
	pub weight: f64,
}

/// A named cluster of entities, possibly nested under a parent community.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Community {
	pub id: String,
	#[serde(default)]
	pub title: String,
	/// Hierarchy depth (0 = top level).
	#[serde(default)]
	pub level: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub parent: Option<String>,
	#[serde(default)]
	pub children: Vec<String>,
	#[serde(default, alias = "entity_ids")]
	pub entity_ids: Vec<String>,
	#[serde(default)]
	pub size: usize,
}

/// Complete input snapshot handed to the engine.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct GraphData {
	#[serde(default)]
	pub entities: Vec<Entity>,
	#[serde(default)]
	pub relationships: Vec<Relationship>,
	#[serde(default)]
	pub communities: Vec<Community>,
}

impl GraphData {
	/// Parse graph data from JSON, failing fast on structurally malformed input.
	pub fn from_json(json: &str) -> Result<Self, LayoutError> {
		serde_json::from_str(json).map_err(LayoutError::MalformedGraph)
	}
}

/// A point (or velocity) in layout space. The 2D variant keeps `z` at zero.
pub type Vec3 = Vector3<f64>;

/// Whether every component of `v` is finite.
pub fn is_finite(v: &Vec3) -> bool {
	v.iter().all(|c| c.is_finite())
}

/// Serializes vectors as `{"x", "y", "z"}` objects, the shape the renderer reads,
/// rather than nalgebra's array form.
mod xyz {
	use serde::ser::{Serialize, SerializeStruct, Serializer};

	use super::Vec3;

	struct Xyz<'a>(&'a Vec3);

	impl Serialize for Xyz<'_> {
		fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
			let mut s = serializer.serialize_struct("Vec3", 3)?;
			s.serialize_field("x", &self.0.x)?;
			s.serialize_field("y", &self.0.y)?;
			s.serialize_field("z", &self.0.z)?;
			s.end()
		}
	}

	pub fn serialize<S: Serializer>(v: &Vec3, serializer: S) -> Result<S::Ok, S::Error> {
		Xyz(v).serialize(serializer)
	}

	pub fn serialize_option<S: Serializer>(v: &Option<Vec3>, serializer: S) -> Result<S::Ok, S::Error> {
		v.as_ref().map(Xyz).serialize(serializer)
	}
}

/// Runtime, position-bearing counterpart of an [`Entity`].
///
/// `entity` is a copy of the caller's record with `degree` recomputed; the
/// caller's own data is never touched.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
	pub entity: Entity,
	#[serde(serialize_with = "xyz::serialize")]
	pub position: Vec3,
	#[serde(serialize_with = "xyz::serialize")]
	pub velocity: Vec3,
	/// Id of the community this entity was assigned to, if any.
	pub community: Option<String>,
	pub community_level: u32,
	/// Render radius.
	pub size: f64,
	/// Render color as a CSS string.
	pub color: String,
}

impl Node {
	pub fn id(&self) -> &str {
		&self.entity.id
	}

	pub fn degree(&self) -> u32 {
		self.entity.degree
	}
}

/// Runtime counterpart of a [`Relationship`] whose endpoints both resolved.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
	pub relationship: Relationship,
	/// Index of the source node in [`GraphLayout::nodes`].
	pub source: usize,
	/// Index of the target node in [`GraphLayout::nodes`].
	pub target: usize,
}

impl Link {
	pub fn weight(&self) -> f64 {
		self.relationship.weight
	}

	pub fn touches(&self, node: usize) -> bool {
		self.source == node || self.target == node
	}
}

/// Padded axis-aligned box around a community's settled members.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Bounds {
	#[serde(serialize_with = "xyz::serialize")]
	pub center: Vec3,
	#[serde(serialize_with = "xyz::serialize")]
	pub size: Vec3,
}

impl Bounds {
	/// Whether `p` lies inside the box (inclusive).
	pub fn contains(&self, p: Vec3) -> bool {
		(0..3).all(|axis| {
			let half = self.size[axis] / 2.0;
			let c = self.center[axis];
			let v = p[axis];
			v >= c - half && v <= c + half
		})
	}
}

/// A community annotated with geometry and hierarchy derived from the settled layout.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityLayout {
	pub community: Community,
	/// Render color shared by all members.
	pub color: String,
	/// Number of nodes assigned to this community in the layout.
	pub member_count: usize,
	/// Mean member position. `None` when the community has no settled members.
	#[serde(serialize_with = "xyz::serialize_option")]
	pub centroid: Option<Vec3>,
	/// `None` when the community has no settled members.
	pub bounds: Option<Bounds>,
	pub padding: f64,
	pub opacity: f64,
	/// Ids of communities named by this community's `parent` field.
	pub parents: Vec<String>,
	/// Ids of communities whose `parent` is this community.
	pub children: Vec<String>,
}

/// How a run ended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutStats {
	pub ticks: usize,
	pub final_alpha: f64,
	/// True when the run stopped because cooling finished rather than hitting the tick cap
	/// or being stopped early.
	pub converged: bool,
}

/// Settled layout snapshot handed to the rendering layer. Never mutated after return.
#[derive(Clone, Debug, Default, Serialize)]
pub struct GraphLayout {
	pub nodes: Vec<Node>,
	pub links: Vec<Link>,
	pub communities: Vec<CommunityLayout>,
	pub stats: LayoutStats,
}

impl GraphLayout {
	pub fn to_json(&self) -> Result<String, LayoutError> {
		serde_json::to_string(self).map_err(LayoutError::Serialize)
	}

	pub fn node(&self, id: &str) -> Option<&Node> {
		self.node_index(id).map(|i| &self.nodes[i])
	}

	pub fn node_index(&self, id: &str) -> Option<usize> {
		self.nodes.iter().position(|n| n.id() == id)
	}

	/// Case-insensitive substring search over node titles, in node order.
	pub fn find_by_title(&self, query: &str) -> Vec<&Node> {
		let query = query.to_lowercase();
		self.nodes
			.iter()
			.filter(|n| n.entity.title.to_lowercase().contains(&query))
			.collect()
	}

	/// Nodes sharing a link with `id`, without duplicates.
	pub fn neighbors(&self, id: &str) -> Vec<&Node> {
		let Some(idx) = self.node_index(id) else {
			return Vec::new();
		};
		let mut seen = Vec::new();
		for link in self.links.iter().filter(|l| l.touches(idx)) {
			let other = if link.source == idx { link.target } else { link.source };
			if other != idx && !seen.contains(&other) {
				seen.push(other);
			}
		}
		seen.into_iter().map(|i| &self.nodes[i]).collect()
	}

	/// Links at or above a weight threshold (for the weight filter control).
	pub fn links_with_min_weight(&self, min: f64) -> impl Iterator<Item = &Link> {
		self.links.iter().filter(move |l| l.weight() >= min)
	}

	pub fn community(&self, id: &str) -> Option<&CommunityLayout> {
		self.communities.iter().find(|c| c.community.id == id)
	}

	/// Nodes assigned to the given community.
	pub fn members_of<'a>(&'a self, community_id: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
		self.nodes
			.iter()
			.filter(move |n| n.community.as_deref() == Some(community_id))
	}
}
