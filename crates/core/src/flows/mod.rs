pub mod engine;
pub mod states;

pub use engine::{FlowTransitionError, LeadLifecycle};
pub use states::{LeadAction, LeadStatus, TransitionOutcome, UnknownLeadStatus};
