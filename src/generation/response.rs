use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Confidence assumed when the model omits it
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Confidence of any command recovered by the fallback parser
pub const FALLBACK_CONFIDENCE: f64 = 0.3;

pub const FALLBACK_COMMAND: &str = "echo 'Could not parse command from AI response'";
pub const FALLBACK_EXPLANATION: &str =
    "AI response was not in expected format, extracted command using fallback method";
pub const FALLBACK_WARNING: &str = "Please verify this command before executing";

/// A generated shell command with its explanation and risk signals
///
/// An empty `command` means the model declined to answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub command: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub explanation: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub warning: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
}

impl CommandResponse {
    /// Append a warning on its own line, keeping earlier warnings
    pub fn append_warning(&mut self, warning: &str) {
        if self.warning.is_empty() {
            self.warning = warning.to_string();
        } else {
            self.warning.push('\n');
            self.warning.push_str(warning);
        }
    }

    #[must_use]
    pub fn is_declined(&self) -> bool {
        self.command.is_empty()
    }
}

/// Which parser produced a response
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// Decoded from the JSON object embedded in the reply
    Structured(CommandResponse),
    /// Recovered heuristically from free text, with reduced confidence
    Fallback(CommandResponse),
}

impl ParseOutcome {
    #[must_use]
    pub fn into_response(self) -> CommandResponse {
        match self {
            Self::Structured(r) | Self::Fallback(r) => r,
        }
    }

    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Interpret a raw model reply. Never fails.
#[must_use]
pub fn interpret(raw: &str) -> CommandResponse {
    parse(raw).into_response()
}

/// Parse a raw model reply, reporting which path succeeded
#[must_use]
pub fn parse(raw: &str) -> ParseOutcome {
    let text = raw.trim();

    if let Some(response) = parse_structured(text) {
        return ParseOutcome::Structured(response);
    }

    tracing::warn!("Model reply was not usable JSON, using fallback parser");
    ParseOutcome::Fallback(parse_fallback(text))
}

/// Decode the span between the first `{` and the last `}`
fn parse_structured(text: &str) -> Option<CommandResponse> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }

    let object = match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(object)) => object,
        Ok(_) => return None,
        Err(e) => {
            tracing::debug!("Failed to decode JSON span: {e}");
            return None;
        }
    };

    let field = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let response = CommandResponse {
        command: field("command").trim().to_string(),
        explanation: field("explanation"),
        warning: field("warning"),
        confidence: object
            .get("confidence")
            .and_then(Value::as_f64)
            .map_or(DEFAULT_CONFIDENCE, |c| c.clamp(0.0, 1.0)),
        alternatives: object
            .get("alternatives")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    };

    if response.command.is_empty() && response.warning.is_empty() {
        return None;
    }

    Some(response)
}

/// Recover a command from free text, first matching line wins
fn parse_fallback(text: &str) -> CommandResponse {
    let command = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .find_map(extract_command)
        .unwrap_or_else(|| FALLBACK_COMMAND.to_string());

    CommandResponse {
        command,
        explanation: FALLBACK_EXPLANATION.to_string(),
        warning: FALLBACK_WARNING.to_string(),
        confidence: FALLBACK_CONFIDENCE,
        alternatives: Vec::new(),
    }
}

/// Shell prompt, then inline code, then a lone token
fn extract_command(line: &str) -> Option<String> {
    if let Some(idx) = line.find('$') {
        let rest = line[idx + 1..].trim();
        return (!rest.is_empty()).then(|| rest.to_string());
    }

    if let (Some(start), Some(end)) = (line.find('`'), line.rfind('`')) {
        if start == end {
            return None;
        }
        let inner = line[start + 1..end].trim_matches('`').trim();
        return (!inner.is_empty()).then(|| inner.to_string());
    }

    if !line.contains(char::is_whitespace) {
        return Some(line.to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_reply() {
        let outcome = parse(r#"{"command":"ls -la","explanation":"x","confidence":0.9}"#);
        assert!(!outcome.is_fallback());

        let response = outcome.into_response();
        assert_eq!(response.command, "ls -la");
        assert_eq!(response.explanation, "x");
        assert!((response.confidence - 0.9).abs() < f64::EPSILON);
        assert!(response.warning.is_empty());
        assert!(response.alternatives.is_empty());
    }

    #[test]
    fn test_structured_with_surrounding_text() {
        let raw = "Here you go:\n{\"command\": \"  find . -name '*.py'  \", \"alternatives\": [\"fd -e py\", 3, null]}\nEnjoy!";
        let response = interpret(raw);
        assert_eq!(response.command, "find . -name '*.py'");
        assert_eq!(response.alternatives, vec!["fd -e py"]);
        assert!((response.confidence - DEFAULT_CONFIDENCE).abs() < f64::EPSILON);
    }

    #[test]
    fn test_confidence_wrong_type_defaults() {
        let response = interpret(r#"{"command":"pwd","confidence":"high"}"#);
        assert!((response.confidence - DEFAULT_CONFIDENCE).abs() < f64::EPSILON);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let response = interpret(r#"{"command":"pwd","confidence":7}"#);
        assert!((response.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_decline_with_warning_stays_structured() {
        let outcome = parse(r#"{"command":"","warning":"That is not a shell task","confidence":0}"#);
        assert!(!outcome.is_fallback());
        let response = outcome.into_response();
        assert!(response.is_declined());
        assert_eq!(response.warning, "That is not a shell task");
    }

    #[test]
    fn test_empty_object_falls_back() {
        let outcome = parse(r#"{"explanation":"nothing useful"}"#);
        assert!(outcome.is_fallback());
        assert_eq!(outcome.into_response().command, FALLBACK_COMMAND);
    }

    #[test]
    fn test_shell_prompt_fallback() {
        let outcome = parse("Sure! Try this:\n\n$ du -sh .\n");
        assert!(outcome.is_fallback());

        let response = outcome.into_response();
        assert_eq!(response.command, "du -sh .");
        assert!((response.confidence - FALLBACK_CONFIDENCE).abs() < f64::EPSILON);
        assert_eq!(response.warning, FALLBACK_WARNING);
        assert_eq!(response.explanation, FALLBACK_EXPLANATION);
    }

    #[test]
    fn test_inline_code_fallback() {
        let response = interpret("You can use `git status --short` for that.");
        assert_eq!(response.command, "git status --short");
    }

    #[test]
    fn test_single_token_fallback() {
        let response = interpret("# comment line\nThe answer is:\nuptime\n");
        assert_eq!(response.command, "uptime");
    }

    #[test]
    fn test_first_matching_line_wins() {
        let response = interpret("`whoami`\n$ id -un\n");
        assert_eq!(response.command, "whoami");
    }

    #[test]
    fn test_bare_prompt_marker_is_skipped() {
        let response = interpret("$\nhostname");
        assert_eq!(response.command, "hostname");
    }

    #[test]
    fn test_malformed_json_falls_back() {
        let response = interpret("{\"command\": \"ls -la\", oops}\n$ ls -la");
        assert_eq!(response.command, "ls -la");
        assert!((response.confidence - FALLBACK_CONFIDENCE).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unparseable_reply_uses_placeholder() {
        let response = interpret("I am not sure what you mean by that.");
        assert_eq!(response.command, FALLBACK_COMMAND);
        assert!(!response.warning.is_empty());

        assert_eq!(interpret("").command, FALLBACK_COMMAND);
    }

    #[test]
    fn test_append_warning() {
        let mut response = CommandResponse::default();
        response.append_warning("first");
        response.append_warning("second");
        assert_eq!(response.warning, "first\nsecond");
    }
}
