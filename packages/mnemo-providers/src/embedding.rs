use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
	data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
	index: Option<usize>,
	embedding: Vec<f32>,
}

/// Embeds every text in one call; the returned vectors are aligned with
/// the input order even when the provider reorders its response items.
pub async fn embed(
	cfg: &mnemo_config::EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"input": texts,
		"dimensions": cfg.dimensions,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let response: EmbeddingResponse = res
		.error_for_status()?
		.json()
		.await
		.map_err(|err| eyre::eyre!("Embedding response does not match the expected shape: {err}."))?;

	align_embeddings(response, texts.len())
}

fn align_embeddings(response: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
	if response.data.len() != expected {
		return Err(eyre::eyre!(
			"Embedding provider returned {} vectors for {expected} inputs.",
			response.data.len()
		));
	}

	let mut indexed: Vec<(usize, Vec<f32>)> = response
		.data
		.into_iter()
		.enumerate()
		.map(|(fallback, item)| (item.index.unwrap_or(fallback), item.embedding))
		.collect();

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn aligns_embeddings_by_index() {
		let response = EmbeddingResponse {
			data: vec![
				EmbeddingItem { index: Some(1), embedding: vec![2.0, 3.0] },
				EmbeddingItem { index: Some(0), embedding: vec![0.5, 1.5] },
			],
		};
		let aligned = align_embeddings(response, 2).expect("alignment failed");

		assert_eq!(aligned[0], vec![0.5, 1.5]);
		assert_eq!(aligned[1], vec![2.0, 3.0]);
	}

	#[test]
	fn rejects_a_short_response() {
		let response =
			EmbeddingResponse { data: vec![EmbeddingItem { index: None, embedding: vec![1.0] }] };

		assert!(align_embeddings(response, 2).is_err());
	}
}
