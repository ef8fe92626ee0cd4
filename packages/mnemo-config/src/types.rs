use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub capture: Capture,
	pub retrieval: Retrieval,
	pub importance: Importance,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	/// SQLite database holding records, the keyword mirror, and the
	/// access/feedback tables.
	pub database_path: String,
	/// Vector index blob; the id side-car lives next to it with an `.ids`
	/// extension.
	pub index_path: String,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub generation: GenerationProviderConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub max_tokens: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Capture {
	#[serde(default = "default_require_final_response")]
	pub require_final_response: bool,
	/// Summary similarity at or above this is a duplicate outright.
	#[serde(default = "default_dup_sim_threshold")]
	pub dup_sim_threshold: f64,
	/// Lower bar that applies only when the candidates share a tag.
	#[serde(default = "default_tag_sim_threshold")]
	pub tag_sim_threshold: f64,
}

#[derive(Debug, Deserialize)]
pub struct Retrieval {
	pub hybrid: Hybrid,
	pub cascade: Cascade,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Hybrid {
	#[serde(default = "default_vector_weight")]
	pub vector_weight: f64,
	#[serde(default = "default_keyword_weight")]
	pub keyword_weight: f64,
	#[serde(default = "default_rrf_k")]
	pub rrf_k: u32,
	#[serde(default = "default_hybrid_top_k")]
	pub top_k: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Cascade {
	#[serde(default = "default_cascade_top_k")]
	pub top_k: u32,
	#[serde(default = "default_max_depth")]
	pub max_depth: u32,
	#[serde(default = "default_min_score")]
	pub min_score: f32,
	#[serde(default = "default_max_no_new_results")]
	pub max_no_new_results: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Importance {
	#[serde(default = "default_frequency_weight")]
	pub frequency_weight: f64,
	#[serde(default = "default_recency_weight")]
	pub recency_weight: f64,
	#[serde(default = "default_success_weight")]
	pub success_weight: f64,
	#[serde(default = "default_feedback_weight")]
	pub feedback_weight: f64,
	#[serde(default = "default_entity_weight")]
	pub entity_weight: f64,
	#[serde(default = "default_decay_halflife_days")]
	pub decay_halflife_days: f64,
}

fn default_require_final_response() -> bool {
	true
}

fn default_dup_sim_threshold() -> f64 {
	0.85
}

fn default_tag_sim_threshold() -> f64 {
	0.75
}

fn default_vector_weight() -> f64 {
	0.6
}

fn default_keyword_weight() -> f64 {
	0.4
}

fn default_rrf_k() -> u32 {
	60
}

fn default_hybrid_top_k() -> u32 {
	10
}

fn default_cascade_top_k() -> u32 {
	5
}

fn default_max_depth() -> u32 {
	3
}

fn default_min_score() -> f32 {
	0.35
}

fn default_max_no_new_results() -> u32 {
	2
}

fn default_frequency_weight() -> f64 {
	0.25
}

fn default_recency_weight() -> f64 {
	0.25
}

fn default_success_weight() -> f64 {
	0.20
}

fn default_feedback_weight() -> f64 {
	0.15
}

fn default_entity_weight() -> f64 {
	0.15
}

fn default_decay_halflife_days() -> f64 {
	30.0
}
