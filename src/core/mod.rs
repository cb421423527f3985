//! Core types and functionality for Tryon.
//!
//! This module contains the workflow orchestrator: the step state machine,
//! the entitlement gate, the session driver, and the configuration and image
//! types they share.

mod config;
mod entitlement;
mod image;
mod observer;
mod session;
mod workflow;

pub use config::{Config, EntitlementConfig, GenerationConfig, MessagesConfig};
pub use entitlement::{EntitlementGate, EntitlementSnapshot, FREE_LIMIT};
pub use image::{ImageData, ImageError, ImageFingerprint, DEFAULT_MIME_TYPE};
pub use observer::{ChannelObserver, NoopObserver, WorkflowEvent, WorkflowObserver};
pub use session::{Intent, Session, SessionError, SessionHandle};
pub use workflow::{
    AttemptTicket, CompletionOutcome, SubmitOutcome, WorkflowError, WorkflowMachine,
    WorkflowSnapshot, WorkflowState, WorkflowStep,
};
