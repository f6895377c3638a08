//! Reply texts and affirmative tokens per locale.
//!
//! The active locale is explicit configuration; it is never guessed from the
//! content of inbound messages.

use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Supported conversation locales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "he")]
    Hebrew,
}

impl Default for Locale {
    fn default() -> Self {
        Self::English
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::English => write!(f, "en"),
            Self::Hebrew => write!(f, "he"),
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Self::English),
            "he" | "hebrew" => Ok(Self::Hebrew),
            other => Err(format!("unsupported locale '{other}' (expected 'en' or 'he')")),
        }
    }
}

impl Locale {
    /// Literal tokens accepted as "yes" at the confirmation step.
    pub fn affirmative_tokens(&self) -> &'static [&'static str] {
        match self {
            Self::English => &["yes", "y"],
            Self::Hebrew => &["כן", "yes", "y"],
        }
    }

    /// Reply texts for this locale.
    pub fn replies(&self) -> &'static Replies {
        match self {
            Self::English => &ENGLISH,
            Self::Hebrew => &HEBREW,
        }
    }
}

/// Case-insensitive, whole-message matcher for affirmative answers.
#[derive(Debug, Clone)]
pub struct AffirmativeMatcher {
    pattern: Regex,
}

impl AffirmativeMatcher {
    pub fn new(locale: Locale) -> Self {
        let alternatives = locale
            .affirmative_tokens()
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!("(?i)^(?:{alternatives})$"))
            .expect("escaped literal tokens always form a valid pattern");
        Self { pattern }
    }

    pub fn is_affirmative(&self, text: &str) -> bool {
        self.pattern.is_match(text.trim())
    }
}

/// Every text the bot sends, for one locale.
#[derive(Debug)]
pub struct Replies {
    pub greeting: &'static str,
    /// Interpolated with the user's name.
    pub ask_program: &'static str,
    pub ask_experience: &'static str,
    pub ask_strength: &'static str,
    pub ask_goals: &'static str,
    pub confirm_generate: &'static str,
    pub reconfirm: &'static str,
    pub generating: &'static str,
    pub continue_ack: &'static str,
    /// Interpolated with the program and the site URL.
    pub call_to_action: &'static str,
}

impl Replies {
    pub fn ask_program(&self, name: &str) -> String {
        self.ask_program.replace("{name}", name)
    }

    pub fn call_to_action(&self, program: &str, url: &str) -> String {
        // URL first: the program is user text and must not be re-scanned.
        self.call_to_action
            .replace("{url}", url)
            .replace("{program}", program)
    }
}

static ENGLISH: Replies = Replies {
    greeting: "Hi! I'm EVA.\nLet's write a short admissions essay together. \
               I'll ask you five quick questions and then draft it for you.\n\
               First, what's your name?",
    ask_program: "Nice to meet you, {name}! What university or program is this essay for?",
    ask_experience: "Tell me about one meaningful experience you'd like to include (1-2 sentences).",
    ask_strength: "What's a personal strength or value that best describes you?",
    ask_goals: "What are your academic or career goals for the next 3-5 years?",
    confirm_generate: "Want me to generate a draft based on your answers? Type \"yes\" to confirm.",
    reconfirm: "Please confirm by typing \"yes\" so I can start drafting.",
    generating: "Creating your draft... this takes around 30 seconds.",
    continue_ack: "Let's pick up where we left off.",
    call_to_action: "Want professional feedback or polishing for {program}? Visit: {url}",
};

static HEBREW: Replies = Replies {
    greeting: "היי! אני EVA.\nבואו נכתוב יחד חיבור קבלה קצר. \
               אשאל חמש שאלות קצרות ואז אכין עבורך טיוטה.\n\
               קודם כל, איך קוראים לך?",
    ask_program: "נעים להכיר, {name}! לאיזו אוניברסיטה או תוכנית מיועד החיבור?",
    ask_experience: "ספר/י על חוויה משמעותית אחת שתרצה/י לכלול (משפט או שניים).",
    ask_strength: "מהי החוזקה או הערך האישי שהכי מתארים אותך?",
    ask_goals: "מהן המטרות האקדמיות או המקצועיות שלך ל-3-5 השנים הקרובות?",
    confirm_generate: "להכין טיוטה על סמך התשובות שלך? כתוב/י \"כן\" לאישור.",
    reconfirm: "כדי שאתחיל לכתוב, יש לאשר בהקלדת \"כן\".",
    generating: "מכינה את הטיוטה שלך... זה לוקח כ-30 שניות.",
    continue_ack: "בואו נמשיך מאיפה שעצרנו.",
    call_to_action: "רוצה משוב מקצועי או ליטוש עבור {program}? בקר/י בכתובת: {url}",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_affirmatives_are_case_insensitive() {
        let m = AffirmativeMatcher::new(Locale::English);
        for text in ["yes", "YES", "Yes", "y", "Y", "  yes  "] {
            assert!(m.is_affirmative(text), "{text:?} should be affirmative");
        }
    }

    #[test]
    fn english_rejects_non_affirmatives() {
        let m = AffirmativeMatcher::new(Locale::English);
        for text in ["no", "yess", "yes please", "sure", "", "כן"] {
            assert!(!m.is_affirmative(text), "{text:?} should not be affirmative");
        }
    }

    #[test]
    fn hebrew_accepts_localized_and_english_tokens() {
        let m = AffirmativeMatcher::new(Locale::Hebrew);
        assert!(m.is_affirmative("כן"));
        assert!(m.is_affirmative("Yes"));
        assert!(m.is_affirmative("y"));
        assert!(!m.is_affirmative("לא"));
    }

    #[test]
    fn locale_parses_and_displays() {
        assert_eq!("en".parse::<Locale>().unwrap(), Locale::English);
        assert_eq!("HE".parse::<Locale>().unwrap(), Locale::Hebrew);
        assert!("fr".parse::<Locale>().is_err());
        assert_eq!(Locale::Hebrew.to_string(), "he");
        assert_eq!(serde_json::to_string(&Locale::English).unwrap(), "\"en\"");
    }

    #[test]
    fn ask_program_interpolates_name() {
        let text = Locale::English.replies().ask_program("Dana");
        assert!(text.starts_with("Nice to meet you, Dana!"));
        assert!(Locale::Hebrew.replies().ask_program("Dana").contains("Dana"));
    }

    #[test]
    fn call_to_action_interpolates_program_and_url() {
        let cta = Locale::English
            .replies()
            .call_to_action("MIT", "https://example.com?utm_source=wa");
        assert_eq!(
            cta,
            "Want professional feedback or polishing for MIT? Visit: https://example.com?utm_source=wa"
        );
    }

    #[test]
    fn interpolated_text_is_treated_as_opaque() {
        // Braces inside user input must survive untouched.
        let text = Locale::English.replies().ask_program("{program} <b>");
        assert!(text.contains("{program} <b>"));
    }
}
