use hunch_core::NextQuestion;

use crate::{Error, Result};

/// Reflector output when chain of thought is enabled.
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct ReasonedCritique {
    /// Step-by-step review of the questions before judging them
    #[serde(default)]
    pub reasoning: Option<String>,
    /// The critique addressed to the questioner, plain text
    pub critique: String,
}

/// Parse raw generator output into a `NextQuestion`.
///
/// Surrounding prose and code fences are tolerated, braces in the prose
/// included. The object itself is not: `guess_made` must be a JSON boolean
/// and `question` non-empty.
pub fn parse_next_question(raw: &str) -> Result<NextQuestion> {
    let json_str = extract_json_object(raw).ok_or_else(|| malformed("no JSON object found", raw))?;

    // Try the outermost span first, then each balanced object on its own
    let mut parsed: NextQuestion = match serde_json::from_str(json_str) {
        Ok(q) => q,
        Err(e) => object_candidates(raw)
            .find_map(|obj| serde_json::from_str(obj).ok())
            .ok_or_else(|| malformed(&e.to_string(), raw))?,
    };

    parsed.question = parsed.question.trim().to_string();
    if parsed.question.is_empty() {
        return Err(malformed("empty question", raw));
    }
    parsed.reasoning = parsed
        .reasoning
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    Ok(parsed)
}

/// Extract the critique text. Plain-text reflectors return the text as is;
/// reasoned ones return the `critique` field, or the raw text when no
/// object can be read.
pub fn parse_critique(raw: &str, chain_of_thought: bool) -> String {
    if chain_of_thought {
        let reasoned = extract_json_object(raw)
            .into_iter()
            .chain(object_candidates(raw))
            .find_map(|s| serde_json::from_str::<ReasonedCritique>(s).ok());
        if let Some(c) = reasoned {
            if let Some(reasoning) = &c.reasoning {
                tracing::debug!(%reasoning, "reflector reasoning");
            }
            return c.critique.trim().to_string();
        }
        tracing::debug!("reflector output was not a JSON object, using raw text");
    }
    raw.trim().to_string()
}

fn malformed(reason: &str, raw: &str) -> Error {
    Error::Malformed {
        reason: reason.to_string(),
        raw: raw.to_string(),
    }
}

/// Extract the JSON object substring from raw LLM output.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Every brace-balanced span opening at a `{`, in order of the opening brace.
fn object_candidates(s: &str) -> impl Iterator<Item = &str> {
    s.char_indices()
        .filter(|&(_, ch)| ch == '{')
        .filter_map(move |(i, _)| balanced_from(&s[i..]))
}

/// The balanced object at the start of `s`, skipping braces inside strings.
fn balanced_from(s: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in s.char_indices() {
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
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }

    None
}
