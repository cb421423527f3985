//! # Tryon
//!
//! Virtual try-on workflow orchestrator.
//!
//! A user uploads a photo of themselves, uploads a photo of a garment, and
//! receives a composited image from an external generation service. This
//! crate owns the control flow of that journey:
//!
//! - **Workflow machine**: the step state machine and its recovery policy
//! - **Entitlement gate**: free quota and premium status, checked before
//!   any attempt is dispatched
//! - **Generation client**: the single async call to the image service
//! - **Session**: an event-driven driver that serialises intents and
//!   completions on one task
//!
//! Rendering, image pickers and theming belong to the UI shell, which talks
//! to a [`SessionHandle`] and listens to a [`WorkflowObserver`].
//!
//! ## Quick Start
//!
//! ```bash
//! export GEMINI_API_KEY=...
//! tryon run --subject me.jpg --garment jacket.png --output result.png
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::missing_panics_doc)]

pub mod core;
pub mod generation;

// Re-export commonly used types
pub use crate::core::{
    ChannelObserver, Config, EntitlementGate, ImageData, Intent, Session, SessionHandle,
    WorkflowEvent, WorkflowMachine, WorkflowObserver, WorkflowState, WorkflowStep,
};
pub use generation::{GenerationClient, GenerationError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "tryon";
