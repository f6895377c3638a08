//! Essay conversation: a fixed five-question flow per sender.
//!
//! Each sender's session sits at one `Step`. Inbound messages advance the
//! step, collect answers, and finally turn the answers into a prompt for the
//! draft generator. The escape-hatch phrase jumps to generation from any step.

pub mod locale;
pub mod machine;
pub mod model;
pub mod prompts;
pub mod routes;
pub mod state;

pub use locale::{AffirmativeMatcher, Locale};
pub use machine::{ConversationMachine, DEFAULT_TRIGGER_PHRASE, MachineSettings};
pub use model::{GenerationRequest, Session, SessionPatch};
pub use prompts::build_prompt;
pub use routes::{SessionRouteState, session_routes};
pub use state::Step;
