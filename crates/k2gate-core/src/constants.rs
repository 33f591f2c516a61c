//! Magic numbers and wire strings, in one place.

/// Reasoning-enabled model variant.
pub const MODEL_ID: &str = "MBZUAI-IFM/K2-Think";
/// Variant with reasoning deltas suppressed.
pub const MODEL_ID_NOTHINK: &str = "MBZUAI-IFM/K2-Think-nothink";
pub const MODEL_OWNER: &str = "MBZUAI";
pub const MODEL_ROOT: &str = "mbzuai-k2-think-2508";

pub const BEARER_PREFIX: &str = "Bearer ";

/// Tags the upstream wraps its output in.
pub const THINK_START: &str = "<think>";
pub const THINK_END: &str = "</think>";
pub const ANSWER_START: &str = "<answer>";
pub const ANSWER_END: &str = "</answer>";

pub const CHAT_COMPLETION_OBJECT: &str = "chat.completion";
pub const CHAT_COMPLETION_CHUNK_OBJECT: &str = "chat.completion.chunk";

pub const STREAM_DONE_MARKER: &str = "data: [DONE]\n\n";

/// Lower bound for the dynamically computed streaming chunk size.
pub const MIN_CHUNK_SIZE: usize = 50;

/// Browser-shaped User-Agent the upstream expects.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/140.0.0.0 Safari/537.36 Edg/140.0.0.0";
