//! Conversation step machine — tracks where a sender is in the essay flow.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The steps of the essay conversation.
///
/// Progresses linearly: Welcome → Q1Name → Q2Program → Q3Experience →
/// Q4Strength → Q5Goals → ConfirmGenerate → Generating → Delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Welcome,
    Q1Name,
    Q2Program,
    Q3Experience,
    Q4Strength,
    Q5Goals,
    ConfirmGenerate,
    Generating,
    Delivered,
}

impl Step {
    /// Every step in flow order.
    pub const ALL: [Step; 9] = [
        Step::Welcome,
        Step::Q1Name,
        Step::Q2Program,
        Step::Q3Experience,
        Step::Q4Strength,
        Step::Q5Goals,
        Step::ConfirmGenerate,
        Step::Generating,
        Step::Delivered,
    ];

    /// Check if a transition from `self` to `target` is valid in the ordinary
    /// flow. The escape hatch bypasses this check on purpose.
    pub fn can_transition_to(&self, target: Step) -> bool {
        use Step::*;
        matches!(
            (self, target),
            (Welcome, Q1Name)
                | (Q1Name, Q2Program)
                | (Q2Program, Q3Experience)
                | (Q3Experience, Q4Strength)
                | (Q4Strength, Q5Goals)
                | (Q5Goals, ConfirmGenerate)
                | (ConfirmGenerate, Generating)
                | (Generating, Delivered)
        )
    }

    /// Whether this step is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// Whether this step is one of the five questions.
    pub fn is_question(&self) -> bool {
        matches!(
            self,
            Self::Q1Name | Self::Q2Program | Self::Q3Experience | Self::Q4Strength | Self::Q5Goals
        )
    }

    /// Get the next step in the linear progression, if any.
    pub fn next(&self) -> Option<Step> {
        use Step::*;
        match self {
            Welcome => Some(Q1Name),
            Q1Name => Some(Q2Program),
            Q2Program => Some(Q3Experience),
            Q3Experience => Some(Q4Strength),
            Q4Strength => Some(Q5Goals),
            Q5Goals => Some(ConfirmGenerate),
            ConfirmGenerate => Some(Generating),
            Generating => Some(Delivered),
            Delivered => None,
        }
    }

    /// The snake_case name used in storage and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::Q1Name => "q1_name",
            Self::Q2Program => "q2_program",
            Self::Q3Experience => "q3_experience",
            Self::Q4Strength => "q4_strength",
            Self::Q5Goals => "q5_goals",
            Self::ConfirmGenerate => "confirm_generate",
            Self::Generating => "generating",
            Self::Delivered => "delivered",
        }
    }
}

impl Default for Step {
    fn default() -> Self {
        Self::Welcome
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Step::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| format!("unknown step '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        for pair in Step::ALL.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            assert!(from.can_transition_to(to), "{from} should transition to {to}");
        }
    }

    #[test]
    fn invalid_transitions() {
        use Step::*;
        // Skip steps
        assert!(!Welcome.can_transition_to(Q2Program));
        assert!(!Q1Name.can_transition_to(ConfirmGenerate));
        assert!(!Q5Goals.can_transition_to(Delivered));
        // Go backward
        assert!(!Q3Experience.can_transition_to(Q2Program));
        // Terminal
        assert!(!Delivered.can_transition_to(Welcome));
        // Self-transition
        assert!(!ConfirmGenerate.can_transition_to(ConfirmGenerate));
    }

    #[test]
    fn is_terminal() {
        assert!(Step::Delivered.is_terminal());
        assert!(!Step::Welcome.is_terminal());
        assert!(!Step::Generating.is_terminal());
    }

    #[test]
    fn questions_are_the_five_middle_steps() {
        let questions: Vec<Step> = Step::ALL.into_iter().filter(Step::is_question).collect();
        assert_eq!(
            questions,
            vec![
                Step::Q1Name,
                Step::Q2Program,
                Step::Q3Experience,
                Step::Q4Strength,
                Step::Q5Goals
            ]
        );
    }

    #[test]
    fn next_walks_all_steps() {
        let mut current = Step::Welcome;
        for expected in &Step::ALL[1..] {
            let next = current.next().unwrap();
            assert_eq!(next, *expected);
            current = next;
        }
        assert!(current.next().is_none());
    }

    #[test]
    fn display_matches_serde() {
        for step in Step::ALL {
            let json = serde_json::to_string(&step).unwrap();
            assert_eq!(format!("\"{step}\""), json, "Display and serde should match for {step:?}");
        }
    }

    #[test]
    fn from_str_roundtrips_and_rejects_unknown() {
        for step in Step::ALL {
            assert_eq!(step.to_string().parse::<Step>().unwrap(), step);
        }
        assert!("q6_hobbies".parse::<Step>().is_err());
        assert!("Welcome".parse::<Step>().is_err());
    }

    #[test]
    fn default_is_welcome() {
        assert_eq!(Step::default(), Step::Welcome);
    }
}
