use k2gate_types::protocol::{FunctionDefinition, ToolDefinition};
use serde_json::json;

use super::*;

fn tool(name: &str) -> ToolDefinition {
    ToolDefinition {
        tool_type: "function".to_string(),
        function: FunctionDefinition {
            name: name.to_string(),
            description: Some(format!("The {name} tool")),
            parameters: Some(json!({"type": "object"})),
        },
    }
}

#[test]
fn test_policy_parsing() {
    assert_eq!(ToolChoicePolicy::parse(None, true).unwrap(), ToolChoicePolicy::Auto);
    assert_eq!(ToolChoicePolicy::parse(None, false).unwrap(), ToolChoicePolicy::None);
    assert_eq!(
        ToolChoicePolicy::parse(Some(&json!("required")), true).unwrap(),
        ToolChoicePolicy::Required
    );
    assert_eq!(
        ToolChoicePolicy::parse(
            Some(&json!({"type": "function", "function": {"name": "search"}})),
            true
        )
        .unwrap(),
        ToolChoicePolicy::Named("search".to_string())
    );
    assert!(ToolChoicePolicy::parse(Some(&json!("bogus")), true).is_err());
    assert!(ToolChoicePolicy::parse(Some(&json!(42)), true).is_err());
}

#[test]
fn test_fenced_block_has_priority() {
    let tools = [tool("search"), tool("calc")];
    let answer = concat!(
        "I'll use calc {\"name\": \"calc\", \"arguments\": {}} wait, actually:\n",
        "```json\n{\"name\": \"search\", \"arguments\": {\"q\": \"rust\"}}\n```"
    );

    let calls = extract_tool_calls(answer, &tools, &ToolChoicePolicy::Auto)
        .unwrap()
        .unwrap();
    assert_eq!(calls[0].function.name, "search");
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&calls[0].function.arguments).unwrap(),
        json!({"q": "rust"})
    );
    assert!(calls[0].id.starts_with("call_"));
}

#[test]
fn test_fenced_block_without_language_hint() {
    let tools = [tool("search")];
    let answer = "```\n{\"name\": \"search\", \"arguments\": {\"q\": \"x\"}}\n```";

    let calls = extract_tool_calls(answer, &tools, &ToolChoicePolicy::Auto)
        .unwrap()
        .unwrap();
    assert_eq!(calls[0].function.name, "search");
}

#[test]
fn test_inline_json_fallback() {
    let tools = [tool("get_weather")];
    let answer = r#"Sure: {"name": "get_weather", "arguments": {"city": "Abu Dhabi"}} coming up."#;

    let calls = extract_tool_calls(answer, &tools, &ToolChoicePolicy::Auto)
        .unwrap()
        .unwrap();
    assert_eq!(calls[0].function.name, "get_weather");
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&calls[0].function.arguments).unwrap(),
        json!({"city": "Abu Dhabi"})
    );
}

#[test]
fn test_inline_json_with_braces_inside_strings() {
    let tools = [tool("run")];
    let answer = r#"{"name": "run", "arguments": {"code": "fn main() { println!(\"{}\"); }"}}"#;

    let calls = extract_tool_calls(answer, &tools, &ToolChoicePolicy::Auto)
        .unwrap()
        .unwrap();
    assert_eq!(calls[0].function.name, "run");
}

#[test]
fn test_natural_language_fallback() {
    let tools = [tool("search_web")];
    let answer = r#"I will call search_web with {"query": "k2 think"} to find out."#;

    let calls = extract_tool_calls(answer, &tools, &ToolChoicePolicy::Auto)
        .unwrap()
        .unwrap();
    assert_eq!(calls[0].function.name, "search_web");
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&calls[0].function.arguments).unwrap(),
        json!({"query": "k2 think"})
    );
}

#[test]
fn test_bare_name_mention_is_not_an_invocation() {
    let tools = [tool("refresh_cache")];
    let answer = "You could use refresh_cache for that, but I won't.";

    assert!(extract_tool_calls(answer, &tools, &ToolChoicePolicy::Auto)
        .unwrap()
        .is_none());
}

#[test]
fn test_distant_json_object_does_not_bind_to_name() {
    let tools = [tool("search")];
    let filler = "x".repeat(100);
    let answer = format!("search is one option. {filler} Unrelated: {{\"a\": 1}}");

    assert!(extract_tool_calls(&answer, &tools, &ToolChoicePolicy::Auto)
        .unwrap()
        .is_none());
}

#[test]
fn test_undeclared_tool_is_ignored() {
    let tools = [tool("search")];
    let answer = r#"{"name": "delete_everything", "arguments": {}}"#;

    assert!(extract_tool_calls(answer, &tools, &ToolChoicePolicy::Auto)
        .unwrap()
        .is_none());
}

#[test]
fn test_malformed_json_degrades_to_no_match() {
    let tools = [tool("search")];
    let answer = "```json\n{\"name\": \"search\", \"arguments\": {broken\n```";

    assert!(extract_tool_calls(answer, &tools, &ToolChoicePolicy::Auto)
        .unwrap()
        .is_none());
}

#[test]
fn test_none_policy_skips_extraction() {
    let tools = [tool("search")];
    let answer = r#"{"name": "search", "arguments": {}}"#;

    assert!(extract_tool_calls(answer, &tools, &ToolChoicePolicy::None)
        .unwrap()
        .is_none());
}

#[test]
fn test_required_with_no_declared_tools_is_an_error() {
    let err = extract_tool_calls("no tools here", &[], &ToolChoicePolicy::Required).unwrap_err();
    assert!(matches!(err, k2gate_types::GatewayError::ToolExtraction { .. }));

    let err = extract_tool_calls("text", &[], &ToolChoicePolicy::Named("search".to_string()))
        .unwrap_err();
    assert!(matches!(err, k2gate_types::GatewayError::ToolExtraction { .. }));

    // auto with no tools stays plain text
    assert!(extract_tool_calls("text", &[], &ToolChoicePolicy::Auto)
        .unwrap()
        .is_none());
}

#[test]
fn test_required_without_match_is_an_error() {
    let tools = [tool("search")];
    let err = extract_tool_calls("no tools here", &tools, &ToolChoicePolicy::Required).unwrap_err();

    assert!(matches!(err, k2gate_types::GatewayError::ToolExtraction { .. }));
}

#[test]
fn test_named_policy_filters_other_tools() {
    let tools = [tool("search"), tool("calc")];
    let answer = r#"{"name": "search", "arguments": {"q": "x"}}"#;

    let err = extract_tool_calls(answer, &tools, &ToolChoicePolicy::Named("calc".to_string()))
        .unwrap_err();
    assert!(matches!(err, k2gate_types::GatewayError::ToolExtraction { .. }));

    let calls = extract_tool_calls(answer, &tools, &ToolChoicePolicy::Named("search".to_string()))
        .unwrap()
        .unwrap();
    assert_eq!(calls[0].function.name, "search");
}

#[test]
fn test_string_arguments_pass_through_verbatim() {
    let tools = [tool("echo")];
    let answer = r#"{"name": "echo", "arguments": "{\"raw\": true}"}"#;

    let calls = extract_tool_calls(answer, &tools, &ToolChoicePolicy::Auto)
        .unwrap()
        .unwrap();
    assert_eq!(calls[0].function.arguments, r#"{"raw": true}"#);
}

#[test]
fn test_system_prompt_lists_declared_tools() {
    let prompt = tool_system_prompt(&[tool("search"), tool("calc")]);

    assert!(prompt.contains("- search: The search tool"));
    assert!(prompt.contains("- calc: The calc tool"));
    assert!(prompt.contains("\"name\""));
    assert!(prompt.contains("\"arguments\""));
}
