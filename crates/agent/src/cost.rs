//! Per-model pricing and context-window metadata.

/// USD per million tokens plus context window for one model family.
struct ModelInfo {
    prefix: &'static str,
    input_per_mtok: f64,
    output_per_mtok: f64,
    context_window: u32,
}

/// Known model families, matched by prefix. Keep roughly sorted by how
/// often the pipeline uses them.
const MODELS: &[ModelInfo] = &[
    ModelInfo {
        prefix: "deepseek",
        input_per_mtok: 0.27,
        output_per_mtok: 1.10,
        context_window: 64_000,
    },
    ModelInfo {
        prefix: "gpt-4o-mini",
        input_per_mtok: 0.15,
        output_per_mtok: 0.60,
        context_window: 128_000,
    },
    ModelInfo {
        prefix: "gpt-4o",
        input_per_mtok: 2.50,
        output_per_mtok: 10.00,
        context_window: 128_000,
    },
    ModelInfo {
        prefix: "gpt-4-turbo",
        input_per_mtok: 10.00,
        output_per_mtok: 30.00,
        context_window: 128_000,
    },
    ModelInfo {
        prefix: "claude-sonnet",
        input_per_mtok: 3.00,
        output_per_mtok: 15.00,
        context_window: 200_000,
    },
    ModelInfo {
        prefix: "claude-haiku",
        input_per_mtok: 0.80,
        output_per_mtok: 4.00,
        context_window: 200_000,
    },
];

/// Conservative upper bound for unknown models (USD per 1M tokens).
const FALLBACK_INPUT: f64 = 3.0;
const FALLBACK_OUTPUT: f64 = 15.0;
const FALLBACK_CONTEXT_WINDOW: u32 = 128_000;

fn lookup(model: &str) -> Option<&'static ModelInfo> {
    // Provider-prefixed names like "openrouter/deepseek-chat" still match.
    let bare = model.rsplit('/').next().unwrap_or(model);
    MODELS
        .iter()
        .find(|m| bare.starts_with(m.prefix) || model.starts_with(m.prefix))
}

/// Estimated USD cost for one call.
#[must_use]
pub fn estimate_cost(model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
    let (input_price, output_price) = match lookup(model) {
        Some(m) => (m.input_per_mtok, m.output_per_mtok),
        None => (FALLBACK_INPUT, FALLBACK_OUTPUT),
    };
    (f64::from(input_tokens) / 1_000_000.0) * input_price
        + (f64::from(output_tokens) / 1_000_000.0) * output_price
}

/// Context window in tokens, with a 128k fallback.
#[must_use]
pub fn context_window(model: &str) -> u32 {
    lookup(model).map_or(FALLBACK_CONTEXT_WINDOW, |m| m.context_window)
}
