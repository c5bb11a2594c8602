//! JSON extraction from free-form LLM output.
//!
//! Models are asked to emit bare JSON but routinely wrap it in prose or
//! markdown fences, so extraction scans for candidate spans and lets the
//! parser decide.

use serde_json::Value;

/// Extract a single JSON object from `content`.
pub fn extract_object(content: &str) -> Option<Value> {
    let bytes = content.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let Some(start) = content[i..].find('{').map(|p| i + p) else {
            return None;
        };

        // Greedy: try to the end first, then back off to the last brace.
        if let Ok(Value::Object(obj)) = serde_json::from_str(&content[start..]) {
            return Some(Value::Object(obj));
        }
        if let Some(end) = content.rfind('}') {
            if end > start {
                if let Ok(Value::Object(obj)) = serde_json::from_str(&content[start..=end]) {
                    return Some(Value::Object(obj));
                }
            }
        }
        // Balanced-brace scan handles a well-formed object followed by
        // trailing prose containing another brace.
        if let Some(end) = balanced_end(content, start, b'{', b'}') {
            if let Ok(Value::Object(obj)) = serde_json::from_str(&content[start..=end]) {
                return Some(Value::Object(obj));
            }
        }
        i = start + 1;
    }
    None
}

/// Extract a list of JSON objects: a JSON array is returned as-is, a
/// single object is wrapped in a one-element list.
pub fn extract_objects(content: &str) -> Option<Vec<Value>> {
    // Arrays first: the analyzer is asked for an array even with a
    // single finding.
    let bytes = content.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let Some(start) = content[i..].find('[').map(|p| i + p) else {
            break;
        };

        for candidate in [
            Some(content.len() - 1),
            content.rfind(']'),
            balanced_end(content, start, b'[', b']'),
        ]
        .into_iter()
        .flatten()
        {
            if candidate < start {
                continue;
            }
            if let Ok(Value::Array(items)) = serde_json::from_str(&content[start..=candidate]) {
                if !items.is_empty() && items.iter().all(Value::is_object) {
                    return Some(items);
                }
            }
        }
        i = start + 1;
    }

    extract_object(content).map(|obj| vec![obj])
}

/// Index of the byte closing the bracket opened at `start`, ignoring
/// brackets inside string literals.
fn balanced_end(content: &str, start: usize, open: u8, close: u8) -> Option<usize> {
    let bytes = content.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            _ if b == open => depth += 1,
            _ if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_bare_object() {
        let content = r#"{"label": "other", "confidence": 0.9}"#;
        assert_eq!(
            extract_object(content).unwrap()["label"],
            json!("other")
        );
    }

    #[test]
    fn extracts_object_from_prose() {
        let content = "Based on the diff, my answer:\n\
                       {\"label\": \"security_bugfix\", \"confidence\": 0.95, \"reasoning\": \"bounds check\"}\n\
                       Let me know if you need more.";
        let obj = extract_object(content).unwrap();
        assert_eq!(obj["label"], json!("security_bugfix"));
    }

    #[test]
    fn extracts_nested_object() {
        let content = r#"result: {"a": {"b": 1}, "c": [2, 3]} done"#;
        let obj = extract_object(content).unwrap();
        assert_eq!(obj["a"]["b"], json!(1));
    }

    #[test]
    fn array_of_objects_is_returned_as_list() {
        let content = r#"Here are both issues:
            [{"vuln_type": "use_after_free"}, {"vuln_type": "dos"}]"#;
        let items = extract_objects(content).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["vuln_type"], json!("dos"));
    }

    #[test]
    fn single_object_is_wrapped() {
        let content = r#"{"vuln_type": "dos", "severity": "medium"}"#;
        let items = extract_objects(content).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn empty_array_is_not_a_result() {
        assert!(extract_objects("[] nothing found {\"x\": 1}").is_some());
        assert!(extract_objects("[]").is_none());
    }

    #[test]
    fn no_json_yields_none() {
        assert!(extract_object("no json here").is_none());
        assert!(extract_objects("still nothing").is_none());
    }

    #[test]
    fn ignores_braces_inside_strings() {
        let content = r#"{"summary": "if (x[i] > 0) { y(); }", "ok": true}"#;
        let obj = extract_object(content).unwrap();
        assert_eq!(obj["ok"], json!(true));
    }
}
