use std::sync::Arc;

use mnemo_config::GenerationProviderConfig;
use mnemo_domain::{
	pii,
	record::{MemorySourceData, RetentionDecision},
};

use crate::GenerationProvider;

const NO_FAILURES_PLACEHOLDER: &str = "(no failures yet)";

/// Decides whether an experience is worth persisting. First match wins:
/// missing final response, personal information, resolved failure, skip.
pub struct RetentionPolicy {
	generation: Arc<dyn GenerationProvider>,
	generation_cfg: GenerationProviderConfig,
	require_final_response: bool,
}
impl RetentionPolicy {
	pub fn new(
		generation: Arc<dyn GenerationProvider>,
		generation_cfg: GenerationProviderConfig,
		require_final_response: bool,
	) -> Self {
		Self { generation, generation_cfg, require_final_response }
	}

	pub async fn evaluate(&self, source: &MemorySourceData) -> RetentionDecision {
		let has_final_response = source
			.final_response_draft
			.as_deref()
			.map(|draft| !draft.trim().is_empty())
			.unwrap_or(false);

		if self.require_final_response && !has_final_response {
			return RetentionDecision::skip("no final response");
		}

		let gate_text = source.gate_text();

		if pii::matches_pii_pattern(&gate_text) {
			return RetentionDecision::store("contains personal information");
		}
		if pii::matches_profile_keyword(&gate_text)
			&& self.classify_personal_information(&gate_text).await
		{
			return RetentionDecision::store("contains personal information");
		}
		if has_failure_signal(source) && has_final_response {
			return RetentionDecision::store("resolved failure");
		}

		RetentionDecision::skip("no retention signal")
	}

	/// Bounded classification call. Only an exact case-insensitive YES
	/// counts; anything else, including provider failures, reads as no.
	async fn classify_personal_information(&self, gate_text: &str) -> bool {
		let excerpt = pii::classification_excerpt(gate_text);
		let prompt = format!(
			"Does the following text contain personal information about the user, \
such as their name, school major, schedule, or preferences?\n\
Text:\n{excerpt}\n\n\
Answer with exactly one word: YES or NO."
		);

		match self.generation.generate(&self.generation_cfg, &prompt).await {
			Ok(reply) => reply.trim().eq_ignore_ascii_case("yes"),
			Err(err) => {
				tracing::warn!(error = %err, "Personal-information classification failed; treating as no.");

				false
			},
		}
	}
}

fn has_failure_signal(source: &MemorySourceData) -> bool {
	let failure_log = source.failure_log.trim();

	if !failure_log.is_empty() && failure_log != NO_FAILURES_PLACEHOLDER {
		return true;
	}

	source.tool_invocations.iter().any(|invocation| {
		invocation.error_reason.as_deref().map(|reason| !reason.trim().is_empty()).unwrap_or(false)
	})
}

#[cfg(test)]
mod tests {
	use serde_json::Map;

	use super::*;
	use mnemo_domain::record::ToolInvocation;

	fn source() -> MemorySourceData {
		MemorySourceData {
			goal: "organise the week".to_string(),
			user_request: "help me plan".to_string(),
			plan_checklist: String::new(),
			scratchpad_digest: "walked the calendar and grouped events".to_string(),
			tool_invocations: Vec::new(),
			failure_log: String::new(),
			final_response_draft: Some("Here is your plan.".to_string()),
			metadata: Map::new(),
		}
	}

	#[test]
	fn placeholder_failure_log_is_not_a_failure() {
		let mut with_placeholder = source();

		with_placeholder.failure_log = NO_FAILURES_PLACEHOLDER.to_string();

		assert!(!has_failure_signal(&with_placeholder));

		let mut with_failure = source();

		with_failure.failure_log = "calendar timeout".to_string();

		assert!(has_failure_signal(&with_failure));
	}

	#[test]
	fn invocation_error_reason_is_a_failure() {
		let mut src = source();

		src.tool_invocations.push(ToolInvocation {
			tool: "calendar".to_string(),
			description: String::new(),
			outcome: "failed".to_string(),
			data: None,
			error_reason: Some("quota exceeded".to_string()),
		});

		assert!(has_failure_signal(&src));

		src.tool_invocations[0].error_reason = Some("   ".to_string());

		assert!(!has_failure_signal(&src));
	}
}
