//! Session and generation-request data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::Step;

/// Word limit for sessions that never set one.
pub const DEFAULT_WORD_LIMIT: u32 = 600;

/// Placeholders substituted for missing answers.
pub mod placeholders {
    pub const NAME: &str = "Student";
    pub const PROGRAM: &str = "your program";
    pub const EXPERIENCE: &str = "your experience";
    pub const STRENGTH: &str = "your strength";
    pub const GOALS: &str = "your goals";
}

/// Per-sender conversation record.
///
/// Stored in the `sessions` table keyed by `sender_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub sender_id: String,
    pub step: Step,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_program: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_experience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_strength: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals: Option<String>,
    pub word_limit: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// A fresh session at the welcome step.
    pub fn new(sender_id: impl Into<String>, word_limit: u32) -> Self {
        let now = Utc::now();
        Self {
            sender_id: sender_id.into(),
            step: Step::Welcome,
            name: None,
            target_program: None,
            signature_experience: None,
            key_strength: None,
            goals: None,
            word_limit,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge the set fields of `patch` into this session.
    pub fn apply(&mut self, patch: &SessionPatch) {
        if let Some(step) = patch.step {
            self.step = step;
        }
        if let Some(ref name) = patch.name {
            self.name = Some(name.clone());
        }
        if let Some(ref program) = patch.target_program {
            self.target_program = Some(program.clone());
        }
        if let Some(ref experience) = patch.signature_experience {
            self.signature_experience = Some(experience.clone());
        }
        if let Some(ref strength) = patch.key_strength {
            self.key_strength = Some(strength.clone());
        }
        if let Some(ref goals) = patch.goals {
            self.goals = Some(goals.clone());
        }
        if let Some(limit) = patch.word_limit {
            self.word_limit = limit;
        }
        self.updated_at = Utc::now();
    }

    /// The target program, or its placeholder when unanswered.
    pub fn program_or_placeholder(&self) -> &str {
        non_empty(self.target_program.as_deref()).unwrap_or(placeholders::PROGRAM)
    }
}

/// Partial session update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_program: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_experience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_strength: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_limit: Option<u32>,
}

impl SessionPatch {
    /// A patch that only moves the step.
    pub fn step(step: Step) -> Self {
        Self {
            step: Some(step),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_target_program(mut self, program: impl Into<String>) -> Self {
        self.target_program = Some(program.into());
        self
    }

    pub fn with_signature_experience(mut self, experience: impl Into<String>) -> Self {
        self.signature_experience = Some(experience.into());
        self
    }

    pub fn with_key_strength(mut self, strength: impl Into<String>) -> Self {
        self.key_strength = Some(strength.into());
        self
    }

    pub fn with_goals(mut self, goals: impl Into<String>) -> Self {
        self.goals = Some(goals.into());
        self
    }
}

/// Snapshot of a session's answers at the moment generation is triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub name: Option<String>,
    pub program: Option<String>,
    pub experience: Option<String>,
    pub strength: Option<String>,
    pub goals: Option<String>,
    pub word_limit: u32,
}

impl GenerationRequest {
    pub fn from_session(session: &Session) -> Self {
        Self {
            name: session.name.clone(),
            program: session.target_program.clone(),
            experience: session.signature_experience.clone(),
            strength: session.key_strength.clone(),
            goals: session.goals.clone(),
            word_limit: session.word_limit,
        }
    }

    pub fn name(&self) -> &str {
        non_empty(self.name.as_deref()).unwrap_or(placeholders::NAME)
    }

    pub fn program(&self) -> &str {
        non_empty(self.program.as_deref()).unwrap_or(placeholders::PROGRAM)
    }

    pub fn experience(&self) -> &str {
        non_empty(self.experience.as_deref()).unwrap_or(placeholders::EXPERIENCE)
    }

    pub fn strength(&self) -> &str {
        non_empty(self.strength.as_deref()).unwrap_or(placeholders::STRENGTH)
    }

    pub fn goals(&self) -> &str {
        non_empty(self.goals.as_deref()).unwrap_or(placeholders::GOALS)
    }

    /// The word limit, never zero.
    pub fn word_limit(&self) -> u32 {
        if self.word_limit == 0 {
            DEFAULT_WORD_LIMIT
        } else {
            self.word_limit
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
