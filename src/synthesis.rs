use crate::config::GenerationParams;
use crate::dispatch::{GenerationRequest, GenerationResult, InferenceClient};
use crate::error::InferenceError;

const SYNTHESIS_INSTRUCTIONS: &str = "\
Synthesize ONE best answer to the original request from the candidate answers above.
- Preserve factual correctness and fix any errors a candidate makes.
- Merge the complementary strengths of the candidates.
- Remove repetition and redundancy across candidates.
- Where candidates contradict each other, side with the most complete and coherent content.
- Return a single self-contained answer to the original request. Do not mention the candidates or the synthesis process. Be decisive and clear.";

/// Render the synthesis prompt for the successful candidate texts.
///
/// Candidates are numbered 1..=k in the order given. Pure: identical input
/// always yields identical output. Callers must pass at least one candidate.
pub fn build_synthesis_prompt(original_prompt: &str, candidates: &[String]) -> String {
    let numbered = candidates
        .iter()
        .enumerate()
        .map(|(i, text)| format!("<cand {n}>\n{text}\n</cand {n}>", n = i + 1))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are an expert editor. You are given an original request and {count} candidate \
         answers to it, each delimited by <cand i> tags.\n\n\
         <original_request>\n{original_prompt}\n</original_request>\n\n\
         {numbered}\n\n\
         {SYNTHESIS_INSTRUCTIONS}",
        count = candidates.len(),
    )
}

/// The single synthesis request: same model and token budget as the
/// candidates, its own temperature, no system prompt.
pub fn synthesis_request(prompt: String, params: &GenerationParams) -> GenerationRequest {
    GenerationRequest {
        prompt,
        model_id: params.model_id.clone(),
        max_tokens: params.max_tokens,
        temperature: params.synthesis_temperature,
        system_prompt: None,
    }
}

/// Issue exactly one completion for the synthesis prompt. No retry.
pub async fn synthesize(
    client: &dyn InferenceClient,
    prompt: String,
    params: &GenerationParams,
) -> Result<GenerationResult, InferenceError> {
    let req = synthesis_request(prompt, params);
    client.complete(&req).await
}
