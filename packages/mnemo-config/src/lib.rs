mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Capture, Cascade, Config, EmbeddingProviderConfig, GenerationProviderConfig, Hybrid, Importance,
	Providers, Retrieval, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.storage.database_path.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.database_path must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.generation.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.generation.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.generation.max_tokens == 0 {
		return Err(Error::Validation {
			message: "providers.generation.max_tokens must be greater than zero.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.capture.dup_sim_threshold) {
		return Err(Error::Validation {
			message: "capture.dup_sim_threshold must lie in [0, 1].".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.capture.tag_sim_threshold) {
		return Err(Error::Validation {
			message: "capture.tag_sim_threshold must lie in [0, 1].".to_string(),
		});
	}
	if cfg.capture.tag_sim_threshold > cfg.capture.dup_sim_threshold {
		return Err(Error::Validation {
			message: "capture.tag_sim_threshold must not exceed capture.dup_sim_threshold."
				.to_string(),
		});
	}
	if cfg.retrieval.hybrid.top_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.hybrid.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.hybrid.rrf_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.hybrid.rrf_k must be greater than zero.".to_string(),
		});
	}

	for (label, weight) in [
		("retrieval.hybrid.vector_weight", cfg.retrieval.hybrid.vector_weight),
		("retrieval.hybrid.keyword_weight", cfg.retrieval.hybrid.keyword_weight),
	] {
		if !weight.is_finite() || weight < 0.0 {
			return Err(Error::Validation {
				message: format!("{label} must be a finite number of zero or greater."),
			});
		}
	}

	if cfg.retrieval.cascade.top_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.cascade.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.cascade.max_depth == 0 {
		return Err(Error::Validation {
			message: "retrieval.cascade.max_depth must be greater than zero.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.retrieval.cascade.min_score) {
		return Err(Error::Validation {
			message: "retrieval.cascade.min_score must lie in [0, 1].".to_string(),
		});
	}
	if cfg.retrieval.cascade.max_no_new_results == 0 {
		return Err(Error::Validation {
			message: "retrieval.cascade.max_no_new_results must be greater than zero.".to_string(),
		});
	}
	if !cfg.importance.decay_halflife_days.is_finite() || cfg.importance.decay_halflife_days <= 0.0
	{
		return Err(Error::Validation {
			message: "importance.decay_halflife_days must be a positive finite number.".to_string(),
		});
	}

	for (label, weight) in [
		("importance.frequency_weight", cfg.importance.frequency_weight),
		("importance.recency_weight", cfg.importance.recency_weight),
		("importance.success_weight", cfg.importance.success_weight),
		("importance.feedback_weight", cfg.importance.feedback_weight),
		("importance.entity_weight", cfg.importance.entity_weight),
	] {
		if !weight.is_finite() || weight < 0.0 {
			return Err(Error::Validation {
				message: format!("{label} must be a finite number of zero or greater."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	// Providers tolerate either "https://host" or "https://host/".
	for api_base in
		[&mut cfg.providers.embedding.api_base, &mut cfg.providers.generation.api_base]
	{
		while api_base.ends_with('/') {
			api_base.pop();
		}
	}
	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}
}
