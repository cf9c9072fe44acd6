use serde_json::Value;

/// One unit of work handed to the batch executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// 1-based position in the caller's original list
    pub index: usize,
    /// Normalized login for uploads, listing id for removals
    pub payload: String,
}

impl WorkItem {
    pub fn new(index: usize, payload: impl Into<String>) -> Self {
        Self {
            index,
            payload: payload.into(),
        }
    }

    /// Number a caller-supplied list starting at 1
    pub fn numbered<I, S>(values: I) -> Vec<WorkItem>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        values
            .into_iter()
            .enumerate()
            .map(|(i, value)| WorkItem::new(i + 1, value))
            .collect()
    }
}

/// Body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseData {
    Json(Value),
    /// The remote answered 2xx without a parseable body
    Empty,
}

impl ResponseData {
    pub fn from_body(body: &str) -> Self {
        serde_json::from_str::<Value>(body)
            .map(ResponseData::Json)
            .unwrap_or(ResponseData::Empty)
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseData::Json(value) => Some(value),
            ResponseData::Empty => None,
        }
    }
}

/// Final outcome of one work item.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        response_data: ResponseData,
    },
    Failure {
        error_message: String,
        detailed_body: Option<String>,
    },
    /// The remote side already holds an equivalent listing
    Skipped {
        reason: String,
    },
}

impl Outcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Outcome::Failure {
            error_message: message.into(),
            detailed_body: None,
        }
    }

    pub fn cancelled() -> Self {
        Outcome::failure("cancelled")
    }
}

/// Per-item record returned by the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResult {
    pub index: usize,
    /// Set for uploads only
    pub login: Option<String>,
    pub outcome: Outcome,
}

impl OperationResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failure { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, Outcome::Skipped { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Failure { error_message, .. } => Some(error_message),
            _ => None,
        }
    }
}

/// What a single attempt produced, before retry classification.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success(ResponseData),
    /// HTTP 429
    RateLimited { body: String },
    Timeout,
    Transport(String),
    /// The item cannot be sent at all; no request was made
    Invalid(String),
    /// Any other status; `message` is the normalized error text
    Rejected {
        status: u16,
        message: String,
        body: String,
    },
}
