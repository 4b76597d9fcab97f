//! Per-call relay session
//!
//! Implements the Elm Architecture pattern: inbound relay messages become
//! [`Event`]s, a pure [`transition`] maps `(state, event)` to a new state plus
//! [`Effect`]s, and [`RelaySession`] executes the effects against the
//! conversation store and the LLM.

mod effect;
pub mod event;
pub mod messages;
mod reply;
mod session;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;
#[cfg(test)]
pub(crate) mod testing;

pub use effect::Effect;
pub use event::Event;
#[allow(unused_imports)] // Public API re-exports
pub use messages::{DecodeError, InboundMessage, OutboundMessage};
pub use reply::{stream_reply, ReplyOutcome};
pub use session::{RelaySession, DEFAULT_FRAGMENT_TIMEOUT};
#[allow(unused_imports)]
pub use state::{InterruptPolicy, PartialReplyPolicy, ReplyState, SessionContext, SessionState};
#[allow(unused_imports)]
pub use transition::{transition, TransitionError, TransitionResult};
