use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Seven 1–10 sub-scores reported alongside the overall score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubScores {
    pub clarity: u8,
    pub confidence: u8,
    pub technical_depth: u8,
    pub communication: u8,
    pub structure: u8,
    pub engagement: u8,
    pub completeness: u8,
}

impl SubScores {
    pub fn uniform(value: u8) -> Self {
        Self {
            clarity: value,
            confidence: value,
            technical_depth: value,
            communication: value,
            structure: value,
            engagement: value,
            completeness: value,
        }
    }

    pub fn mean(&self) -> f64 {
        let sum: u32 = [
            self.clarity,
            self.confidence,
            self.technical_depth,
            self.communication,
            self.structure,
            self.engagement,
            self.completeness,
        ]
        .iter()
        .map(|&v| u32::from(v))
        .sum();
        f64::from(sum) / 7.0
    }
}

/// The scoring object attached to a response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evaluation {
    /// 0–100
    pub score: u8,
    pub feedback: String,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub timeline_analysis: SubScores,
    /// True when this is placeholder content rather than a model judgement.
    #[serde(default)]
    pub fallback: bool,
}

/// One answered question. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    pub id: Uuid,
    pub session_id: Uuid,
    pub question_id: Uuid,
    pub question_text: String,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub text_response: Option<String>,
    pub transcription: Option<String>,
    pub evaluation: Evaluation,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_scores_mean() {
        let scores = SubScores {
            clarity: 10,
            confidence: 4,
            technical_depth: 7,
            communication: 7,
            structure: 7,
            engagement: 7,
            completeness: 7,
        };
        assert!((scores.mean() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_evaluation_fallback_defaults_false() {
        let json = serde_json::json!({
            "score": 82,
            "feedback": "Solid STAR structure.",
            "strengths": ["clear situation"],
            "improvements": ["quantify the result"],
            "timeline_analysis": {
                "clarity": 8, "confidence": 7, "technical_depth": 6,
                "communication": 8, "structure": 9, "engagement": 7, "completeness": 8
            }
        });
        let evaluation: Evaluation = serde_json::from_value(json).unwrap();
        assert!(!evaluation.fallback);
        assert_eq!(evaluation.timeline_analysis.structure, 9);
    }
}
