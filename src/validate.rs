//! Validation of gateway output.
//!
//! Gateway text is untrusted. Synergy analysis is passed through as markdown
//! once it is known to be non-empty. Priority scoring output must be a JSON
//! array of `{task_id, priority}` objects; anything else rejects the whole
//! batch. A well-formed batch is then screened entry by entry against the
//! project snapshot it was produced from, and every entry that cannot be
//! applied is reported with a reason.

use crate::context::ScoringContext;
use crate::error::BoardError;
use crate::types::{PriorityUpdate, TaskId, priority_in_range};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};
use std::collections::HashSet;

/// Reasons the whole response is discarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResponseError {
    #[error("gateway returned an empty response")]
    Empty,

    #[error("response is not valid JSON: {0}")]
    Malformed(String),

    #[error("response does not match the expected schema: {0}")]
    Schema(String),
}

impl From<ResponseError> for BoardError {
    fn from(err: ResponseError) -> Self {
        BoardError::response_invalid(err.to_string())
    }
}

/// One parsed `{task_id, priority}` object, before range and ownership checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawScore {
    pub task_id: i64,
    #[serde(deserialize_with = "integral_priority")]
    pub priority: i64,
}

/// Whole-number value of a JSON number, saturated to `i64`.
///
/// `95`, `95.0` and `1e30` are whole numbers; `95.5` is not.
fn whole_number(n: &Number) -> Option<i64> {
    if let Some(v) = n.as_i64() {
        return Some(v);
    }
    if n.as_u64().is_some() {
        return Some(i64::MAX);
    }
    let f = n.as_f64()?;
    if !f.is_finite() || f.fract() != 0.0 {
        return None;
    }
    Some(if f >= i64::MAX as f64 {
        i64::MAX
    } else if f <= i64::MIN as f64 {
        i64::MIN
    } else {
        f as i64
    })
}

/// Huge priorities become out-of-range scores rather than schema errors.
fn integral_priority<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let n = Number::deserialize(deserializer)?;
    whole_number(&n).ok_or_else(|| D::Error::custom(format!("priority {} is not an integer", n)))
}

/// Why a single score was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The id is not a task of the scored project.
    UnknownTask,
    /// The task is `Done`.
    InactiveTask,
    /// The task is active but was left out of the scoring snapshot.
    NotScored,
    /// Priority outside 1..=100.
    OutOfRange,
    /// A previous entry in the same batch already scored this task.
    Duplicate,
}

/// A score that was screened out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RejectedScore {
    pub task_id: i64,
    pub priority: i64,
    pub reason: RejectReason,
}

/// A validated batch split into applicable updates and rejections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreenedBatch {
    pub accepted: Vec<PriorityUpdate>,
    pub rejected: Vec<RejectedScore>,
}

/// Synergy mode: require non-blank text and pass it through unchanged.
pub fn validate_synergy(raw: &str) -> Result<String, ResponseError> {
    if raw.trim().is_empty() {
        return Err(ResponseError::Empty);
    }
    Ok(raw.to_string())
}

/// Remove a surrounding markdown code fence (with optional language tag).
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Priority mode: parse the raw gateway text into scores.
///
/// Every element must be an object with integer `task_id` and `priority`.
/// Extra keys are ignored. A single bad element fails the whole response.
pub fn parse_priority_batch(raw: &str) -> Result<Vec<RawScore>, ResponseError> {
    let text = strip_code_fences(raw);
    if text.is_empty() {
        return Err(ResponseError::Empty);
    }

    let value: Value =
        serde_json::from_str(text).map_err(|e| ResponseError::Malformed(e.to_string()))?;
    let Value::Array(items) = value else {
        return Err(ResponseError::Schema("expected a JSON array".to_string()));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            if !item.is_object() {
                return Err(ResponseError::Schema(format!(
                    "element {} is not an object",
                    index
                )));
            }
            serde_json::from_value::<RawScore>(item)
                .map_err(|e| ResponseError::Schema(format!("element {}: {}", index, e)))
        })
        .collect()
}

/// Screen parsed scores against the snapshot that was sent for scoring.
pub fn screen_batch(scores: &[RawScore], ctx: &ScoringContext) -> ScreenedBatch {
    let scored: HashSet<TaskId> = ctx.task_ids();
    let mut seen = HashSet::new();
    let mut batch = ScreenedBatch::default();

    for score in scores {
        let reason = if ctx.done.contains(&score.task_id) {
            Some(RejectReason::InactiveTask)
        } else if ctx.unscored.contains(&score.task_id) {
            Some(RejectReason::NotScored)
        } else if !scored.contains(&score.task_id) {
            Some(RejectReason::UnknownTask)
        } else if !priority_in_range(score.priority) {
            Some(RejectReason::OutOfRange)
        } else if !seen.insert(score.task_id) {
            Some(RejectReason::Duplicate)
        } else {
            None
        };

        match reason {
            Some(reason) => batch.rejected.push(RejectedScore {
                task_id: score.task_id,
                priority: score.priority,
                reason,
            }),
            None => batch.accepted.push(PriorityUpdate {
                task_id: score.task_id,
                priority: score.priority as i32,
            }),
        }
    }

    batch
}

/// Parse and screen a priority response in one step.
pub fn validate_priority_response(
    raw: &str,
    ctx: &ScoringContext,
) -> Result<ScreenedBatch, ResponseError> {
    let scores = parse_priority_batch(raw)?;
    Ok(screen_batch(&scores, ctx))
}
