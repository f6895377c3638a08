//! Generation prompt for the essay draft.

use super::model::GenerationRequest;

/// System instruction sent with every draft request.
pub const DRAFT_SYSTEM_PROMPT: &str = "You are EVA, an admissions-essay assistant.";

/// Build the user prompt for a draft.
///
/// Pure and deterministic. Missing answers are replaced by placeholders so the
/// backend never sees an empty slot.
pub fn build_prompt(request: &GenerationRequest) -> String {
    format!(
        "\
You are an expert admissions essay writer.

Generate a professional but warm draft of a short personal statement for {name}, applying to {program}.

Here are the inputs:
- Meaningful experience: {experience}
- Personal strength or value: {strength}
- Academic or career goals: {goals}

Structure the essay in this order:
1. An opening hook that draws the reader in.
2. The meaningful experience, told concretely.
3. A reflection on what the experience taught and how it shows the strength.
4. The academic or career goals and why {program} fits them.
5. A short closing that ties back to the opening.

Guidelines:
- Use a clear, confident, and personal tone.
- Be concise and engaging.
- Avoid generic phrases and clichés; prefer specific details over broad claims.
- Stay under {limit} words.
- Use the input details effectively.

After the draft, add a section titled \"Feedback\" with exactly two strengths of the draft \
and exactly two concrete suggestions for improvement.

Start the essay now.",
        name = request.name(),
        program = request.program(),
        experience = request.experience(),
        strength = request.strength(),
        goals = request.goals(),
        limit = request.word_limit(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::model::placeholders;

    fn full_request() -> GenerationRequest {
        GenerationRequest {
            name: Some("Dana".into()),
            program: Some("Technion Computer Science".into()),
            experience: Some("I built a water sensor for my village.".into()),
            strength: Some("Persistence".into()),
            goals: Some("Work on climate tech".into()),
            word_limit: 500,
        }
    }

    #[test]
    fn prompt_is_deterministic() {
        let req = full_request();
        assert_eq!(build_prompt(&req), build_prompt(&req));
    }

    #[test]
    fn prompt_embeds_every_answer_verbatim() {
        let prompt = build_prompt(&full_request());
        assert!(prompt.contains("Dana"));
        assert!(prompt.contains("Technion Computer Science"));
        assert!(prompt.contains("I built a water sensor for my village."));
        assert!(prompt.contains("Persistence"));
        assert!(prompt.contains("Work on climate tech"));
        assert!(prompt.contains("Stay under 500 words"));
    }

    #[test]
    fn prompt_uses_placeholders_for_missing_fields() {
        let req = GenerationRequest {
            name: None,
            program: Some(String::new()),
            experience: None,
            strength: None,
            goals: None,
            word_limit: 600,
        };
        let prompt = build_prompt(&req);
        for placeholder in [
            placeholders::NAME,
            placeholders::PROGRAM,
            placeholders::EXPERIENCE,
            placeholders::STRENGTH,
            placeholders::GOALS,
        ] {
            assert!(prompt.contains(placeholder), "missing placeholder {placeholder}");
        }
        assert!(!prompt.contains(": \n"), "no slot should be left blank");
        assert!(!prompt.contains("for ,"));
    }

    #[test]
    fn prompt_encodes_structure_and_feedback_instructions() {
        let prompt = build_prompt(&full_request());
        assert!(prompt.contains("opening hook"));
        assert!(prompt.contains("reflection"));
        assert!(prompt.contains("closing"));
        assert!(prompt.contains("two strengths"));
        assert!(prompt.contains("two concrete suggestions"));
        assert!(prompt.contains("clichés"));
    }
}
