use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A practice run of N questions. Only the progress counters and
/// `completed_at` change after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PracticeSession {
    pub id: Uuid,
    pub title: String,
    pub subject: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_questions: u32,
    pub completed_questions: u32,
    pub resume: Option<String>,
    pub job_description: Option<String>,
    pub candidate_analysis: Option<String>,
    #[serde(default)]
    pub question_ids: Vec<Uuid>,
}

impl PracticeSession {
    /// Counts one more answered question, stamping `completed_at` the first
    /// time the run reaches its total.
    pub fn record_answer(&mut self, at: DateTime<Utc>) {
        self.completed_questions = self.completed_questions.saturating_add(1);
        if self.completed_at.is_none()
            && self.total_questions > 0
            && self.completed_questions >= self.total_questions
        {
            self.completed_at = Some(at);
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(total: u32) -> PracticeSession {
        PracticeSession {
            id: Uuid::new_v4(),
            title: "Mock".into(),
            subject: "Rust".into(),
            created_at: Utc::now(),
            completed_at: None,
            total_questions: total,
            completed_questions: 0,
            resume: None,
            job_description: None,
            candidate_analysis: None,
            question_ids: vec![],
        }
    }

    #[test]
    fn test_record_answer_completes_at_total() {
        let mut s = session(2);
        s.record_answer(Utc::now());
        assert!(!s.is_complete());
        s.record_answer(Utc::now());
        assert!(s.is_complete());
        assert_eq!(s.completed_questions, 2);
    }

    #[test]
    fn test_completed_at_is_stamped_once() {
        let mut s = session(1);
        let first = Utc::now();
        s.record_answer(first);
        s.record_answer(first + chrono::Duration::minutes(5));
        assert_eq!(s.completed_at, Some(first));
        assert_eq!(s.completed_questions, 2);
    }

    #[test]
    fn test_open_ended_session_never_completes() {
        let mut s = session(0);
        s.record_answer(Utc::now());
        assert!(!s.is_complete());
    }
}
