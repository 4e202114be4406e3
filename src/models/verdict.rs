//! Verdict domain types and model-payload parsing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest score the court hands out.
pub const MAX_SCORE: u8 = 10;

/// Classification of a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerdictType {
    /// Acquitted: exemplary alignment.
    #[serde(rename = "vrijspraak")]
    Acquittal,
    /// Let off with a warning.
    #[serde(rename = "waarschuwing")]
    Warning,
    /// Convicted of crooked furniture.
    #[serde(rename = "schuldig")]
    Guilty,
}

impl VerdictType {
    pub const ALL: [VerdictType; 3] = [
        VerdictType::Acquittal,
        VerdictType::Warning,
        VerdictType::Guilty,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictType::Acquittal => "vrijspraak",
            VerdictType::Warning => "waarschuwing",
            VerdictType::Guilty => "schuldig",
        }
    }
}

impl std::fmt::Display for VerdictType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The structured judgement produced by one successful analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictDetails {
    /// What the judge observed in the photo.
    pub observation: String,
    pub admissible: bool,
    /// 0..=10; always 0 when not admissible.
    pub score: u8,
    /// The furniture offense.
    pub crime: String,
    /// Legal justification.
    pub reasoning: String,
    /// The punishment (or acquittal).
    pub sentence: String,
    pub verdict_type: VerdictType,
}

/// Full verdict as handed to the HTTP boundary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictResponse {
    pub admissible: bool,
    pub score: u8,
    pub verdict: VerdictDetails,
    pub request_id: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
    /// Payload exactly as returned by the model. Kept for archiving.
    #[serde(skip)]
    pub raw_json: String,
}

/// Information about an uploaded photo, as declared by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoMetadata {
    pub filename: String,
    pub content_type: String,
    /// Declared size in bytes. Advisory only.
    pub size: u64,
}

/// Ways a model payload can violate the verdict contract.
#[derive(Debug, Error)]
pub enum VerdictParseError {
    #[error("empty payload")]
    Empty,

    #[error("malformed verdict payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("score {0} outside 0..={MAX_SCORE}")]
    ScoreOutOfRange(i64),
}

/// Wire shape of the model's JSON answer. Every field is required.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerdictPayload {
    observation: String,
    admissible: bool,
    score: i64,
    crime: String,
    reasoning: String,
    sentence: String,
    verdict_type: VerdictType,
}

/// Parse a model payload into [`VerdictDetails`].
///
/// A missing field is an error, never a default. When the photo is not
/// admissible the score is forced to 0 whatever the model reported.
pub fn parse_verdict(payload: &str) -> Result<VerdictDetails, VerdictParseError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(VerdictParseError::Empty);
    }

    let raw: VerdictPayload = serde_json::from_str(payload)?;

    let score = if raw.admissible {
        u8::try_from(raw.score)
            .ok()
            .filter(|s| *s <= MAX_SCORE)
            .ok_or(VerdictParseError::ScoreOutOfRange(raw.score))?
    } else {
        0
    };

    Ok(VerdictDetails {
        observation: raw.observation,
        admissible: raw.admissible,
        score,
        crime: raw.crime,
        reasoning: raw.reasoning,
        sentence: raw.sentence,
        verdict_type: raw.verdict_type,
    })
}
