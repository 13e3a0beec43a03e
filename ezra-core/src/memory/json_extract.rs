//! Pull one JSON document out of model prose.
//!
//! Judge models are told to answer with bare JSON but still wrap it in
//! markdown fences or add a sentence around it. [`extract_json`] strips an
//! outer fence, takes the first balanced object or array and parses exactly
//! that. Anything that does not parse is rejected.

use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonShape {
    Object,
    Array,
}

impl JsonShape {
    fn delimiters(self) -> (char, char) {
        match self {
            JsonShape::Object => ('{', '}'),
            JsonShape::Array => ('[', ']'),
        }
    }
}

#[derive(Debug, Error)]
pub enum JsonExtractError {
    #[error("no JSON {0:?} found in model response")]
    NotFound(JsonShape),

    #[error("model response is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

pub fn extract_json<T: DeserializeOwned>(text: &str, shape: JsonShape) -> Result<T, JsonExtractError> {
    let body = strip_fences(text);
    let span = balanced_span(body, shape).ok_or(JsonExtractError::NotFound(shape))?;
    Ok(serde_json::from_str(span)?)
}

/// Contents of the outermost ``` fence, or the trimmed text when unfenced
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line
    let body = match after_open.find('\n') {
        Some(newline) => &after_open[newline + 1..],
        None => after_open,
    };
    match body.rfind("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

/// First balanced `{...}` / `[...]`, ignoring delimiters inside strings
fn balanced_span(text: &str, shape: JsonShape) -> Option<&str> {
    let (open, close) = shape.delimiters();
    let start = text.find(open)?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
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
    use serde_json::Value;

    #[test]
    fn fenced_object_is_unwrapped() -> Result<(), JsonExtractError> {
        let text = "```json\n{\"should_save\": true, \"topics\": [\"Food\"]}\n```";
        let value: Value = extract_json(text, JsonShape::Object)?;
        assert_eq!(value["should_save"], true);
        Ok(())
    }

    #[test]
    fn prose_around_json_is_ignored() -> Result<(), JsonExtractError> {
        let text = "Sure! Here is the result: [{\"id\": \"f1\", \"reason\": \"mentions ] and }\"}] hope it helps";
        let value: Value = extract_json(text, JsonShape::Array)?;
        assert_eq!(value[0]["id"], "f1");
        Ok(())
    }

    #[test]
    fn first_balanced_object_wins_over_trailing_braces() -> Result<(), JsonExtractError> {
        let text = "{\"a\": {\"b\": 1}} and then {\"c\": 2}";
        let value: Value = extract_json(text, JsonShape::Object)?;
        assert_eq!(value["a"]["b"], 1);
        assert!(value.get("c").is_none());
        Ok(())
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            extract_json::<Value>("no json here", JsonShape::Object),
            Err(JsonExtractError::NotFound(JsonShape::Object))
        ));
        assert!(matches!(
            extract_json::<Value>("{\"a\": tru}", JsonShape::Object),
            Err(JsonExtractError::Parse(_))
        ));
        assert!(extract_json::<Value>("{\"unterminated\": 1", JsonShape::Object).is_err());
    }
}
