//! Post-validation of reasoning answers.
//!
//! After the model settles on an answer the checkpoint normalizes it and
//! checks it against the step's declared [`OutputFormat`].

use serde::{Deserialize, Serialize};
use url::Url;

/// Shape a reasoning step's answer must have.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Any non-empty text.
    #[default]
    Text,
    /// A single absolute http(s) URL.
    Url,
}

impl OutputFormat {
    /// Strip formatting the model tends to add around an answer.
    pub fn normalize(&self, raw: &str) -> String {
        let text = strip_wrappers(raw);
        match self {
            OutputFormat::Text => text,
            OutputFormat::Url => find_url(&text).unwrap_or(text),
        }
    }

    /// Check a normalized answer; the error is a reason fit for a re-prompt.
    pub fn validate(&self, answer: &str) -> Result<(), String> {
        if answer.is_empty() {
            return Err("the answer is empty".to_string());
        }

        if *self == OutputFormat::Url {
            let url = Url::parse(answer).map_err(|e| format!("not a valid URL ({})", e))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(format!("URL scheme '{}' is not http or https", url.scheme()));
            }
            if url.host_str().is_none_or(str::is_empty) {
                return Err("URL has no host".to_string());
            }
        }
        Ok(())
    }

    /// Normalize then validate.
    pub fn checkpoint(&self, raw: &str) -> Result<String, String> {
        let answer = self.normalize(raw);
        self.validate(&answer)?;
        Ok(answer)
    }

    /// Instruction sent when the first answer fails validation.
    pub fn corrective_prompt(&self, reason: &str) -> String {
        match self {
            OutputFormat::Text => format!(
                "Your previous answer could not be used: {reason}. \
                 Reply with the answer only. If you are unsure, give your best educated guess."
            ),
            OutputFormat::Url => format!(
                "Your previous answer could not be used: {reason}. \
                 Reply with just the URL, no extra words or formatting. \
                 If you cannot find it, give your best educated guess."
            ),
        }
    }
}

/// Trim whitespace, code fences, backticks, angle brackets and surrounding quotes.
fn strip_wrappers(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(inner) = text.strip_prefix("```") {
        // drop an optional language tag on the fence line
        let inner = match inner.find('\n') {
            Some(pos) if !inner[..pos].trim().contains(' ') => &inner[pos + 1..],
            _ => inner,
        };
        text = inner.strip_suffix("```").unwrap_or(inner).trim();
    }

    loop {
        let stripped = text
            .strip_prefix('`')
            .and_then(|t| t.strip_suffix('`'))
            .or_else(|| text.strip_prefix('<').and_then(|t| t.strip_suffix('>')))
            .or_else(|| text.strip_prefix('"').and_then(|t| t.strip_suffix('"')))
            .or_else(|| text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')));
        match stripped {
            Some(inner) => text = inner.trim(),
            None => break,
        }
    }

    text.to_string()
}

/// First http(s) URL embedded in the text.
fn find_url(text: &str) -> Option<String> {
    let start = ["https://", "http://"]
        .iter()
        .filter_map(|scheme| text.find(scheme))
        .min()?;

    let rest = &text[start..];
    let end = rest
        .find(|c: char| c.is_whitespace() || matches!(c, ')' | '>' | ']' | '"' | '\'' | '`'))
        .unwrap_or(rest.len());

    let url = rest[..end].trim_end_matches(['.', ',', ';', ':', '!', '?']);
    Some(url.to_string())
}
