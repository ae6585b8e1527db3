use orp_upstream::ModelInfo;

/// Fixed, hard-coded short list of popular models, used when upstream is
/// unreachable and as the default for UI selectors. Not fetched — this is
/// baked into the binary so it is always available.
pub fn curated_models() -> Vec<ModelInfo> {
    [
        ("openai/gpt-4o", "GPT-4o", 128_000),
        ("openai/gpt-4o-mini", "GPT-4o mini", 128_000),
        ("anthropic/claude-3.5-sonnet", "Claude 3.5 Sonnet", 200_000),
        ("anthropic/claude-3-haiku", "Claude 3 Haiku", 200_000),
        ("google/gemini-pro-1.5", "Gemini 1.5 Pro", 2_000_000),
        ("meta-llama/llama-3.1-70b-instruct", "Llama 3.1 70B Instruct", 131_072),
        ("mistralai/mistral-large", "Mistral Large", 128_000),
    ]
    .into_iter()
    .map(|(id, name, context_length)| ModelInfo {
        id: id.to_string(),
        name: name.to_string(),
        context_length,
        ..Default::default()
    })
    .collect()
}
