//! Tool-call extraction from model output.
//!
//! K2-Think has no native function calling; the gateway injects a
//! system prompt describing the declared tools and then scans the
//! answer text for an invocation. Three strategies run in priority
//! order: a fenced JSON code block, an inline JSON object, and a
//! natural-language `tool_name {...}` fallback.

#[cfg(test)]
mod tests;

use std::sync::OnceLock;

use k2gate_types::protocol::{FunctionCall, ToolCall, ToolDefinition};
use k2gate_types::GatewayError;
use regex::Regex;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

/// Parsed `tool_choice` policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoicePolicy {
    /// Extract if an invocation is found, otherwise return plain text.
    Auto,
    /// Skip extraction entirely.
    None,
    /// An invocation must be found; failure is surfaced to the caller.
    Required,
    /// Only this tool counts as a match.
    Named(String),
}

impl ToolChoicePolicy {
    /// Parses the raw `tool_choice` request field. Absent defaults to
    /// `auto` when tools are declared, `none` otherwise.
    pub fn parse(tool_choice: Option<&Value>, has_tools: bool) -> Result<Self, GatewayError> {
        let Some(value) = tool_choice else {
            return Ok(if has_tools { Self::Auto } else { Self::None });
        };
        match value {
            Value::String(s) => match s.as_str() {
                "auto" => Ok(Self::Auto),
                "none" => Ok(Self::None),
                "required" => Ok(Self::Required),
                other => Err(GatewayError::InvalidRequest {
                    message: format!("unsupported tool_choice '{other}'"),
                }),
            },
            Value::Object(_) => {
                let name = value
                    .get("function")
                    .and_then(|f| f.get("name"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| GatewayError::InvalidRequest {
                        message: "tool_choice object must carry function.name".to_string(),
                    })?;
                Ok(Self::Named(name.to_string()))
            }
            _ => Err(GatewayError::InvalidRequest {
                message: "tool_choice must be a string or object".to_string(),
            }),
        }
    }
}

/// System prompt injected ahead of the conversation when tools are
/// declared.
pub fn tool_system_prompt(tools: &[ToolDefinition]) -> String {
    let mut prompt = String::from(
        "You have access to the following tools. To call a tool, respond with a \
         JSON code block containing an object with \"name\" and \"arguments\" fields:\n\
         ```json\n{\"name\": \"tool_name\", \"arguments\": {...}}\n```\n\nTools:\n",
    );
    for tool in tools {
        let f = &tool.function;
        prompt.push_str(&format!(
            "- {}: {}\n",
            f.name,
            f.description.as_deref().unwrap_or("")
        ));
        if let Some(params) = &f.parameters {
            prompt.push_str(&format!("  parameters: {params}\n"));
        }
    }
    prompt.push_str("\nOnly call a tool when it is needed to answer the request.");
    prompt
}

/// One candidate invocation found in the text.
#[derive(Debug, Clone, PartialEq)]
struct Candidate {
    name: String,
    arguments: String,
}

/// Scans `answer` for a tool invocation under the given policy.
///
/// Returns `Ok(None)` when extraction is skipped or nothing matched
/// under `auto`. `required` (and a named constraint) with no match is
/// an error.
pub fn extract_tool_calls(
    answer: &str,
    tools: &[ToolDefinition],
    policy: &ToolChoicePolicy,
) -> Result<Option<Vec<ToolCall>>, GatewayError> {
    if *policy == ToolChoicePolicy::None {
        return Ok(None);
    }
    if tools.is_empty() {
        // a mandatory policy with nothing declared can never be satisfied
        return match policy {
            ToolChoicePolicy::Required | ToolChoicePolicy::Named(_) => {
                Err(GatewayError::ToolExtraction {
                    message: "tool_choice demands a call but no tools are declared".to_string(),
                })
            }
            _ => Ok(None),
        };
    }

    let declared: Vec<&str> = tools.iter().map(|t| t.function.name.as_str()).collect();
    let allowed = |name: &str| match policy {
        ToolChoicePolicy::Named(wanted) => name == wanted,
        _ => declared.contains(&name),
    };

    let candidate = fenced_json(answer, &allowed)
        .or_else(|| inline_json(answer, &allowed))
        .or_else(|| natural_language(answer, &declared, &allowed));

    match candidate {
        Some(c) => {
            debug!("🔧 Tool call extracted: {}", c.name);
            Ok(Some(vec![ToolCall {
                id: format!("call_{}", Uuid::new_v4().simple()),
                call_type: "function".to_string(),
                function: FunctionCall { name: c.name, arguments: c.arguments },
            }]))
        }
        None if matches!(policy, ToolChoicePolicy::Required | ToolChoicePolicy::Named(_)) => {
            Err(GatewayError::ToolExtraction {
                message: "tool_choice demands a call but none was found in the output".to_string(),
            })
        }
        None => Ok(None),
    }
}

/// Accepts a parsed JSON value shaped like `{"name": .., "arguments": ..}`.
/// Arguments pass through as found; objects are re-serialized, strings
/// kept verbatim. Schema validation is the caller's business.
fn candidate_from_value(value: &Value, allowed: &dyn Fn(&str) -> bool) -> Option<Candidate> {
    let name = value.get("name")?.as_str()?;
    if !allowed(name) {
        return None;
    }
    let arguments = match value.get("arguments") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "{}".to_string(),
    };
    Some(Candidate { name: name.to_string(), arguments })
}

fn fenced_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fenced block pattern")
    })
}

/// Strategy 1: a fenced code block holding the invocation object.
fn fenced_json(text: &str, allowed: &dyn Fn(&str) -> bool) -> Option<Candidate> {
    for capture in fenced_block_re().captures_iter(text) {
        let Ok(value) = serde_json::from_str::<Value>(&capture[1]) else {
            // malformed JSON degrades to "no match", not an error
            continue;
        };
        if let Some(c) = candidate_from_value(&value, allowed) {
            return Some(c);
        }
    }
    None
}

/// Strategy 2: a bare JSON object anywhere in the text, found with a
/// string-aware brace scanner.
fn inline_json(text: &str, allowed: &dyn Fn(&str) -> bool) -> Option<Candidate> {
    for (_, object) in scan_json_objects(text) {
        let Ok(value) = serde_json::from_str::<Value>(object) else {
            continue;
        };
        if let Some(c) = candidate_from_value(&value, allowed) {
            return Some(c);
        }
    }
    None
}

/// How far after a tool name an argument object may start and still be
/// treated as belonging to it.
const NATURAL_ARG_WINDOW: usize = 50;

/// Strategy 3: a declared tool name followed shortly by an argument
/// object ("call search_web with {...}"). A bare name mention without
/// argument-like text is not an invocation.
fn natural_language(
    text: &str,
    declared: &[&str],
    allowed: &dyn Fn(&str) -> bool,
) -> Option<Candidate> {
    for &name in declared {
        if !allowed(name) {
            continue;
        }
        let Some(pos) = text.find(name) else { continue };
        let rest = &text[pos + name.len()..];
        let arguments = scan_json_objects(rest).into_iter().find_map(|(offset, obj)| {
            if offset > NATURAL_ARG_WINDOW {
                return None;
            }
            serde_json::from_str::<Value>(obj).is_ok().then(|| obj.to_string())
        })?;
        return Some(Candidate { name: name.to_string(), arguments });
    }
    None
}

/// Returns every balanced top-level `{...}` span in `text` with its
/// byte offset, tolerant of braces inside JSON string literals.
fn scan_json_objects(text: &str) -> Vec<(usize, &str)> {
    let mut spans = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'{' {
            i += 1;
            continue;
        }
        let start = i;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        let mut end = None;
        for (offset, &b) in bytes[start..].iter().enumerate() {
            if escaped {
                escaped = false;
                continue;
            }
            match b {
                b'\\' if in_string => escaped = true,
                b'"' => in_string = !in_string,
                b'{' if !in_string => depth += 1,
                b'}' if !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(start + offset + 1);
                        break;
                    }
                }
                _ => {}
            }
        }
        match end {
            Some(end) => {
                spans.push((start, &text[start..end]));
                i = end;
            }
            None => break,
        }
    }
    spans
}
