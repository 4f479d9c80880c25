//! Response parser.
//!
//! Models answer in one of two shapes: inline pseudo-XML tags embedded in
//! the text, or a structured function-call list. Both reduce to the same
//! ordered list of [`ToolCall`]s. A malformed call is dropped with a
//! diagnostic and never takes the rest of the batch down with it; the model
//! routinely emits several calls per turn and one bad apple must not block
//! the others.

use crate::client::{ChatResponse, StructuredCall};
use crate::tools::{self, ToolName};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

lazy_static! {
    /// Opening (or self-closing) tag with quoted attributes.
    static ref OPEN_TAG: Regex = Regex::new(
        r#"<([A-Za-z_][A-Za-z0-9_]*)((?:\s+[A-Za-z_][A-Za-z0-9_]*\s*=\s*(?:"[^"]*"|'[^']*'))*)\s*(/?)>"#
    )
    .unwrap();
    /// A single quoted attribute.
    static ref ATTR: Regex =
        Regex::new(r#"([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap();
    /// Fallback old/new pair inside an edit tag body.
    static ref EDIT_BODY: Regex =
        Regex::new(r"(?s)oldString:\s*(.*?)\s*newString:\s*(.*)").unwrap();
}

/// Attribute values converted to integers when they parse cleanly.
const NUMERIC_KEYS: &[&str] = &["offset", "limit", "max_results", "timeout_secs"];

/// Attribute values converted to booleans when they parse cleanly.
const BOOL_KEYS: &[&str] = &["replace_all", "ignore_case"];

/// A normalized tool invocation, ready for the executor.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub name: ToolName,
    pub params: Map<String, Value>,
}

/// Parsed calls in source order, plus diagnostics for everything dropped.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub calls: Vec<ToolCall>,
    pub diagnostics: Vec<String>,
}

/// Parse a model response regardless of which shape it came in.
pub fn parse_response(response: &ChatResponse) -> ParseOutcome {
    if response.tool_calls.is_empty() {
        parse_inline_tags(&response.content)
    } else {
        parse_structured_calls(&response.tool_calls)
    }
}

/// Parse inline pseudo-XML tool tags out of free text.
pub fn parse_inline_tags(text: &str) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();
    let mut pos = 0;

    while let Some(caps) = OPEN_TAG.captures(&text[pos..]) {
        let whole = caps.get(0).unwrap();
        let tag_name = caps.get(1).unwrap().as_str();
        let attrs = caps.get(2).unwrap().as_str();
        let self_closing = !caps.get(3).unwrap().as_str().is_empty();
        let after_open = pos + whole.end();

        let Some(tool) = ToolName::from_tag(tag_name) else {
            // Only flag tags that carry attributes; bare markup like <p>
            // shows up in ordinary prose and is not a tool call.
            if !attrs.trim().is_empty() {
                outcome
                    .diagnostics
                    .push(format!("skipping unknown tool tag <{}>", tag_name));
            }
            pos = after_open;
            continue;
        };

        // Grab the body up to the matching close tag, treating it as opaque
        // so content inside a write body can never spawn phantom calls.
        let body;
        if self_closing {
            body = "";
            pos = after_open;
        } else {
            let close = format!("</{}>", tag_name);
            match text[after_open..].find(&close) {
                Some(rel) => {
                    body = text[after_open..after_open + rel].trim();
                    pos = after_open + rel + close.len();
                }
                None => {
                    body = "";
                    pos = after_open;
                }
            }
        }

        let params = build_params(tool, attrs, body);
        match tools::validate(tool, &params) {
            Ok(()) => outcome.calls.push(ToolCall { name: tool, params }),
            Err(e) => outcome
                .diagnostics
                .push(format!("dropping <{}> call: {}", tag_name, e)),
        }
    }

    outcome
}

/// Parse a structured function-call list.
pub fn parse_structured_calls(calls: &[StructuredCall]) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();

    for call in calls {
        let Some(tool) = ToolName::resolve(&call.name) else {
            outcome
                .diagnostics
                .push(format!("skipping unknown function call '{}'", call.name));
            continue;
        };

        let params = match serde_json::from_str::<Value>(&call.arguments) {
            Ok(Value::Object(map)) => {
                // Null stands in for "undefined"; strip it before dispatch.
                map.into_iter().filter(|(_, v)| !v.is_null()).collect()
            }
            Ok(_) => {
                outcome.diagnostics.push(format!(
                    "skipping '{}' call: arguments are not a JSON object",
                    call.name
                ));
                continue;
            }
            Err(e) => {
                outcome.diagnostics.push(format!(
                    "skipping '{}' call: invalid JSON arguments ({})",
                    call.name, e
                ));
                continue;
            }
        };

        match tools::validate(tool, &params) {
            Ok(()) => outcome.calls.push(ToolCall { name: tool, params }),
            Err(e) => outcome
                .diagnostics
                .push(format!("dropping '{}' call: {}", call.name, e)),
        }
    }

    outcome
}

/// Remove tool tags from a response so only prose remains.
pub fn strip_tool_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;

    while let Some(caps) = OPEN_TAG.captures(&text[pos..]) {
        let whole = caps.get(0).unwrap();
        let tag_name = caps.get(1).unwrap().as_str();
        let self_closing = !caps.get(3).unwrap().as_str().is_empty();
        let tag_start = pos + whole.start();
        let after_open = pos + whole.end();

        if ToolName::from_tag(tag_name).is_none() {
            out.push_str(&text[pos..after_open]);
            pos = after_open;
            continue;
        }

        out.push_str(&text[pos..tag_start]);
        if self_closing {
            pos = after_open;
        } else {
            let close = format!("</{}>", tag_name);
            pos = match text[after_open..].find(&close) {
                Some(rel) => after_open + rel + close.len(),
                None => after_open,
            };
        }
    }

    out.push_str(&text[pos..]);
    out.trim().to_string()
}

fn build_params(tool: ToolName, attrs: &str, body: &str) -> Map<String, Value> {
    let mut params = Map::new();

    for caps in ATTR.captures_iter(attrs) {
        let key = canonical_key(caps.get(1).unwrap().as_str());
        let raw = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or_default();
        params.insert(key.to_string(), convert_value(key, raw));
    }

    // The write body is the file content; an edit body may carry the
    // old/new pair when the attributes are absent.
    if tool == ToolName::Write && !body.is_empty() && !params.contains_key("content") {
        params.insert("content".to_string(), Value::String(body.to_string()));
    }

    if tool == ToolName::Edit
        && !body.is_empty()
        && (!params.contains_key("old_string") || !params.contains_key("new_string"))
        && let Some(caps) = EDIT_BODY.captures(body)
    {
        params.insert(
            "old_string".to_string(),
            Value::String(caps.get(1).unwrap().as_str().to_string()),
        );
        params.insert(
            "new_string".to_string(),
            Value::String(caps.get(2).unwrap().as_str().to_string()),
        );
    }

    params
}

/// Map camelCase attribute spellings onto the canonical parameter names.
fn canonical_key(key: &str) -> &str {
    match key {
        "filePath" => "file_path",
        "oldString" => "old_string",
        "newString" => "new_string",
        "baseDir" => "base_dir",
        "workingDir" => "working_dir",
        "ignoreCase" => "ignore_case",
        "maxResults" => "max_results",
        "timeoutSecs" => "timeout_secs",
        "replaceAll" => "replace_all",
        other => other,
    }
}

/// Convert known numeric/boolean attributes, silently keeping the string
/// when the value does not parse.
fn convert_value(key: &str, raw: &str) -> Value {
    if NUMERIC_KEYS.contains(&key)
        && let Ok(n) = raw.parse::<i64>()
    {
        return Value::Number(n.into());
    }
    if BOOL_KEYS.contains(&key)
        && let Ok(b) = raw.parse::<bool>()
    {
        return Value::Bool(b);
    }
    Value::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structured(name: &str, arguments: &str) -> StructuredCall {
        StructuredCall {
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[test]
    fn parses_valid_tags_in_source_order() {
        let text = r#"First I'll look around.
<ls path="/project"></ls>
<read file_path="/project/main.rs" offset="1" limit="40"></read>
<bash command="cargo check"></bash>"#;

        let outcome = parse_inline_tags(text);

        assert!(outcome.diagnostics.is_empty());
        let names: Vec<ToolName> = outcome.calls.iter().map(|c| c.name).collect();
        assert_eq!(names, vec![ToolName::Ls, ToolName::Read, ToolName::Bash]);
    }

    #[test]
    fn aliases_and_converts_attributes() {
        let outcome =
            parse_inline_tags(r#"<read filePath="/a.txt" offset="5" limit="bogus"></read>"#);

        assert_eq!(outcome.calls.len(), 1);
        let params = &outcome.calls[0].params;
        assert_eq!(params["file_path"], Value::String("/a.txt".to_string()));
        assert_eq!(params["offset"], Value::Number(5.into()));
        // Unparsable numbers stay as strings.
        assert_eq!(params["limit"], Value::String("bogus".to_string()));
    }

    #[test]
    fn write_body_becomes_content() {
        let outcome =
            parse_inline_tags("<write file_path=\"/tmp/out.txt\">line one\nline two</write>");

        assert_eq!(outcome.calls.len(), 1);
        let params = &outcome.calls[0].params;
        assert_eq!(
            params["content"],
            Value::String("line one\nline two".to_string())
        );
    }

    #[test]
    fn write_body_cannot_spawn_phantom_calls() {
        let outcome = parse_inline_tags(
            "<write file_path=\"/tmp/doc.md\">instructions: use <read file_path=\"x\"></read> tags</write>",
        );

        assert_eq!(outcome.calls.len(), 1);
        assert_eq!(outcome.calls[0].name, ToolName::Write);
    }

    #[test]
    fn edit_body_fallback_supplies_old_and_new() {
        let outcome = parse_inline_tags(
            "<edit file_path=\"/a.rs\">oldString: let x = 1; newString: let x = 2;</edit>",
        );

        assert_eq!(outcome.calls.len(), 1);
        let params = &outcome.calls[0].params;
        assert_eq!(params["old_string"], Value::String("let x = 1;".to_string()));
        assert_eq!(params["new_string"], Value::String("let x = 2;".to_string()));
    }

    #[test]
    fn unknown_tag_is_skipped_with_diagnostic() {
        let outcome = parse_inline_tags(
            r#"<teleport destination="moon"></teleport> <ls path="/x"></ls>"#,
        );

        assert_eq!(outcome.calls.len(), 1);
        assert_eq!(outcome.calls[0].name, ToolName::Ls);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert!(outcome.diagnostics[0].contains("teleport"));
    }

    #[test]
    fn missing_required_parameter_drops_the_call() {
        let outcome = parse_inline_tags(r#"<read offset="3"></read> <ls path="/x"></ls>"#);

        assert_eq!(outcome.calls.len(), 1);
        assert_eq!(outcome.calls[0].name, ToolName::Ls);
        assert!(outcome.diagnostics[0].contains("file_path"));
    }

    #[test]
    fn identical_edit_strings_drop_the_call() {
        let inline = parse_inline_tags(
            r#"<edit file_path="/a.rs" old_string="x" new_string="x"></edit>"#,
        );
        assert!(inline.calls.is_empty());
        assert_eq!(inline.diagnostics.len(), 1);

        let structured_outcome = parse_structured_calls(&[structured(
            "edit_file",
            r#"{"file_path": "/a.rs", "old_string": "x", "new_string": "x"}"#,
        )]);
        assert!(structured_outcome.calls.is_empty());
        assert_eq!(structured_outcome.diagnostics.len(), 1);
    }

    #[test]
    fn self_closing_tags_parse() {
        let outcome = parse_inline_tags(r#"<ls path="/project"/>"#);
        assert_eq!(outcome.calls.len(), 1);
        assert_eq!(outcome.calls[0].name, ToolName::Ls);
    }

    #[test]
    fn structured_names_map_through_the_dictionary() {
        let calls = [
            structured("read_file", r#"{"file_path": "/a"}"#),
            structured("write_file", r#"{"file_path": "/b", "content": "x"}"#),
            structured("execute_bash", r#"{"command": "ls"}"#),
            structured("list_directory", r#"{"path": "/c"}"#),
            structured("search_files", r#"{"pattern": "*.rs"}"#),
            structured("search_content", r#"{"pattern": "fn main"}"#),
        ];

        let outcome = parse_structured_calls(&calls);

        assert!(outcome.diagnostics.is_empty());
        let names: Vec<ToolName> = outcome.calls.iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            vec![
                ToolName::Read,
                ToolName::Write,
                ToolName::Bash,
                ToolName::Ls,
                ToolName::Glob,
                ToolName::Grep,
            ]
        );
    }

    #[test]
    fn invalid_json_skips_only_that_call() {
        let calls = [
            structured("read_file", r#"{"file_path": "/a"}"#),
            structured("execute_bash", "{not json"),
            structured("list_directory", r#"{"path": "/c"}"#),
        ];

        let outcome = parse_structured_calls(&calls);

        assert_eq!(outcome.calls.len(), 2);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert!(outcome.diagnostics[0].contains("invalid JSON"));
    }

    #[test]
    fn null_arguments_are_stripped() {
        let outcome = parse_structured_calls(&[structured(
            "read_file",
            r#"{"file_path": "/a", "offset": null}"#,
        )]);

        assert_eq!(outcome.calls.len(), 1);
        assert!(!outcome.calls[0].params.contains_key("offset"));
    }

    #[test]
    fn unknown_function_name_is_skipped() {
        let outcome = parse_structured_calls(&[
            structured("summon_demon", "{}"),
            structured("read_file", r#"{"file_path": "/a"}"#),
        ]);

        assert_eq!(outcome.calls.len(), 1);
        assert!(outcome.diagnostics[0].contains("summon_demon"));
    }

    #[test]
    fn parse_response_prefers_structured_calls() {
        let response = ChatResponse {
            content: r#"<ls path="/ignored"></ls>"#.to_string(),
            tool_calls: vec![structured("read_file", r#"{"file_path": "/a"}"#)],
        };

        let outcome = parse_response(&response);

        assert_eq!(outcome.calls.len(), 1);
        assert_eq!(outcome.calls[0].name, ToolName::Read);
    }

    #[test]
    fn strip_tool_tags_leaves_prose() {
        let text = "Reading the file now.\n<read file_path=\"/a.txt\"></read>\nDone.";
        assert_eq!(strip_tool_tags(text), "Reading the file now.\n\nDone.");

        let unknown = "Some <em>emphasis</em> kept.";
        assert_eq!(strip_tool_tags(unknown), unknown);
    }
}
