use serde::{
    Deserialize,
    Serialize,
};

/// Aggregated result of one verification pass.
///
/// The only way to build a verdict is from the ordered list of findings, so
/// `valid` and `error_count` can never disagree with `messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "VerdictRepr")]
pub struct Verdict {
    valid: bool,
    error_count: usize,
    messages: Vec<String>,
}

impl Verdict {
    /// Builds a verdict from findings in check order.
    pub fn from_messages(messages: Vec<String>) -> Self {
        Self {
            valid: messages.is_empty(),
            error_count: messages.len(),
            messages,
        }
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerdictRepr {
    valid: bool,
    error_count: usize,
    messages: Vec<String>,
}

impl TryFrom<VerdictRepr> for Verdict {
    type Error = String;

    fn try_from(repr: VerdictRepr) -> Result<Self, Self::Error> {
        if repr.error_count != repr.messages.len() {
            return Err(format!(
                "errorCount {} does not match {} messages",
                repr.error_count,
                repr.messages.len()
            ));
        }
        if repr.valid != repr.messages.is_empty() {
            return Err("valid must be true exactly when there are no messages".to_string());
        }
        Ok(Self::from_messages(repr.messages))
    }
}
