use serde_json::Value;
use vidgen_core::NewGeneration;

pub const MAX_PROMPT_CHARS: usize = 1000;
pub const MAX_STYLE_CHARS: usize = 64;
pub const ASPECT_RATIOS: [&str; 3] = ["16:9", "9:16", "1:1"];
pub const DEFAULT_ASPECT_RATIO: &str = "16:9";

/// First failing field of a creation request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

fn optional_string<'a>(
    body: &'a serde_json::Map<String, Value>,
    field: &str,
) -> Result<Option<&'a str>, ValidationError> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(ValidationError::new(field, "Expected string")),
    }
}

/// Validates a `POST /generations` body. Checks `prompt`, then `style`, then
/// `aspectRatio`; unknown and server-managed keys are ignored.
pub fn parse_create(body: &Value) -> Result<NewGeneration, ValidationError> {
    let Value::Object(body) = body else {
        return Err(ValidationError::new("", "Expected object"));
    };

    let prompt = match body.get("prompt") {
        None | Some(Value::Null) => return Err(ValidationError::new("prompt", "Required")),
        Some(Value::String(s)) => s.trim(),
        Some(_) => return Err(ValidationError::new("prompt", "Expected string")),
    };
    if prompt.is_empty() {
        return Err(ValidationError::new("prompt", "Prompt is required"));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(ValidationError::new(
            "prompt",
            format!("Prompt must be at most {MAX_PROMPT_CHARS} characters"),
        ));
    }

    let style = optional_string(body, "style")?
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if style.is_some_and(|s| s.chars().count() > MAX_STYLE_CHARS) {
        return Err(ValidationError::new(
            "style",
            format!("Style must be at most {MAX_STYLE_CHARS} characters"),
        ));
    }

    let aspect_ratio = match body.get("aspectRatio") {
        None | Some(Value::Null) => DEFAULT_ASPECT_RATIO,
        Some(Value::String(s)) if ASPECT_RATIOS.contains(&s.as_str()) => s.as_str(),
        Some(_) => {
            let expected = ASPECT_RATIOS
                .iter()
                .map(|r| format!("'{r}'"))
                .collect::<Vec<_>>()
                .join(" | ");
            return Err(ValidationError::new(
                "aspectRatio",
                format!("Invalid enum value. Expected {expected}"),
            ));
        }
    };

    Ok(NewGeneration {
        prompt: prompt.to_string(),
        style: style.map(str::to_string),
        aspect_ratio: aspect_ratio.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field_of(body: Value) -> String {
        parse_create(&body).unwrap_err().field
    }

    #[test]
    fn minimal_body_gets_defaults() {
        let g = parse_create(&json!({ "prompt": "  ocean waves  " })).unwrap();
        assert_eq!(g.prompt, "ocean waves");
        assert_eq!(g.style, None);
        assert_eq!(g.aspect_ratio, "16:9");
    }

    #[test]
    fn missing_prompt_names_the_field() {
        let err = parse_create(&json!({ "style": "anime" })).unwrap_err();
        assert_eq!(err.field, "prompt");
        assert_eq!(err.message, "Required");
    }

    #[test]
    fn prompt_type_and_length_are_checked() {
        assert_eq!(field_of(json!({ "prompt": 12 })), "prompt");
        assert_eq!(field_of(json!({ "prompt": "   " })), "prompt");
        let long = "x".repeat(MAX_PROMPT_CHARS + 1);
        let err = parse_create(&json!({ "prompt": long })).unwrap_err();
        assert!(err.message.contains("at most 1000"));
    }

    #[test]
    fn first_failure_wins() {
        let err = parse_create(&json!({ "style": 3, "aspectRatio": "4:3" })).unwrap_err();
        assert_eq!(err.field, "prompt");

        let err = parse_create(&json!({ "prompt": "p", "style": 3, "aspectRatio": "4:3" }))
            .unwrap_err();
        assert_eq!(err.field, "style");
    }

    #[test]
    fn aspect_ratio_must_be_known() {
        let err = parse_create(&json!({ "prompt": "p", "aspectRatio": "4:3" })).unwrap_err();
        assert_eq!(err.field, "aspectRatio");
        assert_eq!(
            err.message,
            "Invalid enum value. Expected '16:9' | '9:16' | '1:1'"
        );
        let err = parse_create(&json!({ "prompt": "p", "aspectRatio": 3 })).unwrap_err();
        assert_eq!(err.field, "aspectRatio");
        assert!(err.message.starts_with("Invalid enum value"));

        let ok = parse_create(&json!({ "prompt": "p", "aspectRatio": "1:1" })).unwrap();
        assert_eq!(ok.aspect_ratio, "1:1");
    }

    #[test]
    fn blank_style_is_absent_and_server_fields_ignored() {
        let g = parse_create(&json!({
            "prompt": "p",
            "style": " ",
            "status": "completed",
            "progress": 100,
        }))
        .unwrap();
        assert_eq!(g.style, None);
    }

    #[test]
    fn non_object_body_is_rejected() {
        let err = parse_create(&json!(["prompt"])).unwrap_err();
        assert_eq!(err.field, "");
    }
}
