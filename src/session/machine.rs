//! ConversationMachine — maps each inbound message to a session step,
//! persists the transition, and replies or runs the draft pipeline.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::channels::ChunkedDispatcher;
use crate::draft::DraftGenerator;
use crate::store::{Direction, MessageLog, SessionRepository};

use super::locale::{AffirmativeMatcher, Locale, Replies};
use super::model::{GenerationRequest, Session, SessionPatch, placeholders};
use super::prompts::build_prompt;
use super::state::Step;

/// Phrase that jumps straight to generation from any step.
pub const DEFAULT_TRIGGER_PHRASE: &str = "prompt now";

/// Behavior knobs for the conversation.
#[derive(Debug, Clone)]
pub struct MachineSettings {
    pub locale: Locale,
    /// Escape-hatch phrase, matched case-insensitively after trimming.
    /// Empty disables the escape hatch.
    pub trigger_phrase: String,
    /// Fully-formed URL placed in the call-to-action.
    pub cta_url: String,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            trigger_phrase: DEFAULT_TRIGGER_PHRASE.to_string(),
            cta_url: String::new(),
        }
    }
}

/// What a message at the current step leads to.
#[derive(Debug, Clone, PartialEq)]
enum Action {
    /// Persist `patch` (if any), then send `text`.
    Reply {
        patch: Option<SessionPatch>,
        text: String,
    },
    /// Run the draft pipeline.
    Generate,
}

/// Drives the essay conversation for every sender.
///
/// Holds no per-sender state: every message re-reads the session from the
/// repository, so any number of messages may be handled concurrently.
pub struct ConversationMachine {
    sessions: Arc<dyn SessionRepository>,
    log: Option<Arc<dyn MessageLog>>,
    generator: Arc<DraftGenerator>,
    dispatcher: ChunkedDispatcher,
    replies: &'static Replies,
    affirmative: AffirmativeMatcher,
    trigger_phrase: String,
    cta_url: String,
}

impl ConversationMachine {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        generator: Arc<DraftGenerator>,
        dispatcher: ChunkedDispatcher,
        settings: MachineSettings,
    ) -> Self {
        Self {
            sessions,
            log: None,
            generator,
            dispatcher,
            replies: settings.locale.replies(),
            affirmative: AffirmativeMatcher::new(settings.locale),
            trigger_phrase: settings.trigger_phrase.trim().to_lowercase(),
            cta_url: settings.cta_url,
        }
    }

    /// Record inbound and outbound text in `log`.
    pub fn with_message_log(mut self, log: Arc<dyn MessageLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Handle one inbound text message. Failures are logged, never returned.
    pub async fn handle_message(&self, sender_id: &str, text: &str) {
        self.record(sender_id, Direction::Inbound, text, None).await;

        let session = match self.sessions.get_or_create(sender_id).await {
            Ok(s) => s,
            Err(e) => {
                warn!(sender = sender_id, error = %e, "Failed to load session");
                return;
            }
        };

        debug!(sender = sender_id, step = %session.step, "Handling message");

        match self.plan(&session, text) {
            Action::Generate => self.generate_and_deliver(&session).await,
            Action::Reply { patch, text: reply } => {
                if let Some(patch) = patch {
                    if let Err(e) = self.sessions.update(sender_id, &patch).await {
                        warn!(sender = sender_id, error = %e, "Failed to update session");
                        return;
                    }
                    if let Some(step) = patch.step {
                        debug!(sender = sender_id, from = %session.step, to = %step, "Step advanced");
                    }
                }
                self.reply(sender_id, &reply, session.step).await;
            }
        }
    }

    /// Whether `text` is the escape-hatch phrase.
    pub fn is_trigger(&self, text: &str) -> bool {
        !self.trigger_phrase.is_empty() && text.trim().to_lowercase() == self.trigger_phrase
    }

    /// Decide what `text` does at the session's current step.
    fn plan(&self, session: &Session, text: &str) -> Action {
        if self.is_trigger(text) {
            return Action::Generate;
        }

        let r = self.replies;
        let advance = |patch: SessionPatch, reply: String| {
            let next = session.step.next().unwrap_or(session.step);
            debug_assert!(session.step.can_transition_to(next));
            Action::Reply {
                patch: Some(SessionPatch {
                    step: Some(next),
                    ..patch
                }),
                text: reply,
            }
        };

        match session.step {
            Step::Welcome => advance(SessionPatch::default(), r.greeting.to_string()),
            Step::Q1Name => {
                let name = if text.trim().is_empty() {
                    placeholders::NAME
                } else {
                    text
                };
                advance(
                    SessionPatch::default().with_name(name),
                    r.ask_program(name),
                )
            }
            Step::Q2Program => advance(
                SessionPatch::default().with_target_program(text),
                r.ask_experience.to_string(),
            ),
            Step::Q3Experience => advance(
                SessionPatch::default().with_signature_experience(text),
                r.ask_strength.to_string(),
            ),
            Step::Q4Strength => advance(
                SessionPatch::default().with_key_strength(text),
                r.ask_goals.to_string(),
            ),
            Step::Q5Goals => advance(
                SessionPatch::default().with_goals(text),
                r.confirm_generate.to_string(),
            ),
            Step::ConfirmGenerate if self.affirmative.is_affirmative(text) => Action::Generate,
            Step::ConfirmGenerate => Action::Reply {
                patch: None,
                text: r.reconfirm.to_string(),
            },
            Step::Generating | Step::Delivered => Action::Reply {
                patch: None,
                text: r.continue_ack.to_string(),
            },
        }
    }

    /// The generation path shared by confirmation and the escape hatch.
    async fn generate_and_deliver(&self, session: &Session) {
        let sender_id = session.sender_id.as_str();

        if let Err(e) = self
            .sessions
            .update(sender_id, &SessionPatch::step(Step::Generating))
            .await
        {
            warn!(sender = sender_id, error = %e, "Failed to mark session as generating");
            return;
        }
        info!(sender = sender_id, from = %session.step, "Generating draft");

        self.reply(sender_id, self.replies.generating, Step::Generating)
            .await;

        let request = GenerationRequest::from_session(session);
        let prompt = build_prompt(&request);
        let draft = self.generator.generate(&prompt).await;

        let cta = self
            .replies
            .call_to_action(session.program_or_placeholder(), &self.cta_url);
        let report = self.dispatcher.send_long(sender_id, &draft, &cta).await;
        for text in &report.delivered {
            self.record(
                sender_id,
                Direction::Outbound,
                text,
                Some(&json!({ "step": Step::Generating })),
            )
            .await;
        }

        if let Err(e) = self
            .sessions
            .update(sender_id, &SessionPatch::step(Step::Delivered))
            .await
        {
            warn!(sender = sender_id, error = %e, "Failed to mark session as delivered");
            return;
        }

        info!(
            sender = sender_id,
            sent = report.sent,
            failed = report.failed,
            "Draft delivered"
        );
    }

    async fn reply(&self, sender_id: &str, text: &str, step: Step) {
        if self.dispatcher.send(sender_id, text).await {
            self.record(sender_id, Direction::Outbound, text, Some(&json!({ "step": step })))
                .await;
        }
    }

    async fn record(
        &self,
        sender_id: &str,
        direction: Direction,
        text: &str,
        meta: Option<&serde_json::Value>,
    ) {
        let Some(log) = &self.log else {
            return;
        };
        if let Err(e) = log.append_log(sender_id, direction, text, meta).await {
            warn!(sender = sender_id, error = %e, "Failed to append message log");
        }
    }
}
