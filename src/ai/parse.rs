// parse.rs — Turns the classifier's text content into a ClassificationResult.
//
// Models are asked for `{"answer": "yes"|"no", "justification": "..."}` but
// do not always comply. Strategies are tried in order; the first one that
// succeeds wins, and if none does the answer is Unknown.

use serde::Deserialize;

use super::{Answer, ClassificationResult};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("not a JSON object: {0}")]
    NotJson(String),
    #[error("JSON object has no `answer` field")]
    MissingAnswer,
    #[error("no yes/no keyword in text")]
    NoKeyword,
}

pub trait ParseStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn parse(&self, content: &str) -> Result<ClassificationResult, ParseError>;
}

/// `{"answer": ..., "justification": ...}`, optionally inside a ```json fence
/// or surrounded by prose.
pub struct StructuredJson;

#[derive(Deserialize)]
struct StructuredAnswer {
    answer: Option<String>,
    justification: Option<String>,
}

impl ParseStrategy for StructuredJson {
    fn name(&self) -> &'static str {
        "structured-json"
    }

    fn parse(&self, content: &str) -> Result<ClassificationResult, ParseError> {
        let parsed: StructuredAnswer = serde_json::from_str(json_candidate(content))
            .map_err(|e| ParseError::NotJson(e.to_string()))?;
        let label = parsed.answer.ok_or(ParseError::MissingAnswer)?;
        // Only the label is scanned, never the justification.
        let answer = Answer::from_label(&label)
            .or_else(|| first_keyword(&label))
            .unwrap_or(Answer::Unknown);
        Ok(ClassificationResult::new(answer, parsed.justification))
    }
}

/// Case-insensitive substring search; whichever of `yes` / `no` comes first wins.
pub struct KeywordScan;

impl ParseStrategy for KeywordScan {
    fn name(&self) -> &'static str {
        "keyword-scan"
    }

    fn parse(&self, content: &str) -> Result<ClassificationResult, ParseError> {
        let answer = first_keyword(content).ok_or(ParseError::NoKeyword)?;
        Ok(ClassificationResult::new(answer, Some(content.trim().to_string())))
    }
}

fn first_keyword(text: &str) -> Option<Answer> {
    let lowered = text.to_lowercase();
    match (lowered.find("yes"), lowered.find("no")) {
        (Some(yes), Some(no)) if no < yes => Some(Answer::No),
        (Some(_), _) => Some(Answer::Yes),
        (None, Some(_)) => Some(Answer::No),
        (None, None) => None,
    }
}

/// The JSON object to hand to serde: the fenced block if present, else the
/// span from the first `{` to the last `}`.
fn json_candidate(content: &str) -> &str {
    let stripped = strip_code_fence(content);
    match (stripped.find('{'), stripped.rfind('}')) {
        (Some(start), Some(end)) if start < end => &stripped[start..=end],
        _ => stripped,
    }
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// The default strategy order.
pub fn default_strategies() -> Vec<Box<dyn ParseStrategy>> {
    vec![Box::new(StructuredJson), Box::new(KeywordScan)]
}

/// Run `strategies` in order over `content`.
pub fn parse_with(strategies: &[Box<dyn ParseStrategy>], content: &str) -> ClassificationResult {
    for strategy in strategies {
        match strategy.parse(content) {
            Ok(result) => {
                log::debug!("Classifier content parsed by {}", strategy.name());
                return result;
            }
            Err(e) => log::debug!("Parse strategy {} failed: {}", strategy.name(), e),
        }
    }
    log::warn!("Classifier content matched no strategy, treating as unknown");
    ClassificationResult::unknown()
}

/// Parse classifier text content with the default strategies.
pub fn parse_classification(content: &str) -> ClassificationResult {
    parse_with(&default_strategies(), content)
}
