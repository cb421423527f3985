//! Try-on workflow state machine.
//!
//! Sequences the user's intents (upload subject, advance, upload garment,
//! submit, reset) and the outcome of the single in-flight generation call.
//! The quota check runs strictly before an attempt is dispatched, and a
//! completion is only applied if it belongs to the attempt still in flight.
//!
//! Transitions:
//!
//! | From                 | Event              | To                   |
//! |----------------------|--------------------|----------------------|
//! | any                  | subject provided   | unchanged            |
//! | AwaitingSubjectImage | advance (subject)  | AwaitingGarmentImage |
//! | AwaitingGarmentImage | garment provided   | AwaitingGarmentImage |
//! | AwaitingGarmentImage | submit (allowed)   | Generating           |
//! | AwaitingGarmentImage | submit (quota)     | AwaitingGarmentImage |
//! | Generating           | succeeded          | ShowingResult        |
//! | Generating           | failed             | AwaitingGarmentImage |
//! | Generating           | outcome, new pair  | AwaitingGarmentImage |
//! | any                  | reset              | AwaitingSubjectImage |

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::{Config, MessagesConfig};
use super::entitlement::{EntitlementGate, EntitlementSnapshot};
use super::image::{ImageData, ImageFingerprint};
use super::observer::{NoopObserver, WorkflowEvent, WorkflowObserver};
use crate::generation::GenerationError;

/// Current step of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WorkflowStep {
    /// Waiting for the user's own photo
    #[default]
    AwaitingSubjectImage,
    /// Waiting for the garment photo (also the recovery step after a failure)
    AwaitingGarmentImage,
    /// A generation call is in flight
    Generating,
    /// The composited result is available
    ShowingResult,
}

impl WorkflowStep {
    /// One-based position, for step indicators.
    pub fn number(self) -> u8 {
        match self {
            Self::AwaitingSubjectImage => 1,
            Self::AwaitingGarmentImage => 2,
            Self::Generating => 3,
            Self::ShowingResult => 4,
        }
    }
}

/// The workflow record owned by the machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowState {
    pub step: WorkflowStep,
    pub subject_image: Option<ImageData>,
    pub garment_image: Option<ImageData>,
    pub result_image: Option<ImageData>,
    pub last_error: Option<String>,
}

impl WorkflowState {
    /// Check that the stored step agrees with which fields are present.
    ///
    /// - a result exists exactly when showing it
    /// - an error only exists on the garment step
    /// - a garment only exists once past the subject step
    /// - every step past the first has a subject
    /// - generating and showing a result need both inputs
    pub fn is_consistent(&self) -> bool {
        let has_subject = self.subject_image.is_some();
        let has_garment = self.garment_image.is_some();
        let has_result = self.result_image.is_some();
        let has_error = self.last_error.is_some();

        match self.step {
            WorkflowStep::AwaitingSubjectImage => !has_garment && !has_result && !has_error,
            WorkflowStep::AwaitingGarmentImage => has_subject && !has_result,
            WorkflowStep::Generating => has_subject && has_garment && !has_result && !has_error,
            WorkflowStep::ShowingResult => has_subject && has_garment && has_result && !has_error,
        }
    }

    pub fn has_both_inputs(&self) -> bool {
        self.subject_image.is_some() && self.garment_image.is_some()
    }
}

/// Everything the presentation layer needs to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSnapshot {
    pub state: WorkflowState,
    pub entitlement: EntitlementSnapshot,
    /// Whether the premium offer prompt should be shown
    pub offer_visible: bool,
}

/// Identifies one dispatched generation attempt and the image pair it used.
#[derive(Debug, Clone)]
pub struct AttemptTicket {
    id: Uuid,
    subject: ImageData,
    garment: ImageData,
    subject_fingerprint: ImageFingerprint,
    garment_fingerprint: ImageFingerprint,
}

impl AttemptTicket {
    fn new(subject: ImageData, garment: ImageData) -> Self {
        let subject_fingerprint = subject.fingerprint();
        let garment_fingerprint = garment.fingerprint();
        Self { id: Uuid::new_v4(), subject, garment, subject_fingerprint, garment_fingerprint }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Subject image to send to the generation client.
    pub fn subject(&self) -> &ImageData {
        &self.subject
    }

    /// Garment image to send to the generation client.
    pub fn garment(&self) -> &ImageData {
        &self.garment
    }

    fn is_for_pair(&self, subject: &ImageData, garment: &ImageData) -> bool {
        self.subject_fingerprint == subject.fingerprint()
            && self.garment_fingerprint == garment.fingerprint()
    }
}

impl PartialEq for AttemptTicket {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.subject_fingerprint == other.subject_fingerprint
            && self.garment_fingerprint == other.garment_fingerprint
    }
}

impl Eq for AttemptTicket {}

/// Result of a submission that was not refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A new attempt was started; dispatch exactly one generation call for it
    Started(AttemptTicket),
    /// An attempt is already in flight; nothing was dispatched
    AlreadyInFlight,
    /// The workflow is not on the garment step; nothing was dispatched
    Ignored(WorkflowStep),
}

/// What happened to a reported generation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The outcome was applied to the workflow
    Applied,
    /// The attempt was abandoned (reset, or superseded); nothing changed
    Stale,
}

/// Refused submissions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    /// One or both images are missing
    #[error("{message}")]
    IncompleteInput { message: String },

    /// The free quota is used up; the premium offer should be shown
    #[error("Free attempts exhausted ({} of {} used)", .entitlement.free_attempts_used, .entitlement.free_limit)]
    QuotaExceeded { entitlement: EntitlementSnapshot },
}

/// Owns the workflow state and the entitlement gate.
pub struct WorkflowMachine {
    state: WorkflowState,
    gate: EntitlementGate,
    messages: MessagesConfig,
    in_flight: Option<AttemptTicket>,
    offer_visible: bool,
    observer: Box<dyn WorkflowObserver>,
}

impl WorkflowMachine {
    /// Create a machine with default quota and messages.
    pub fn new(observer: impl WorkflowObserver + 'static) -> Self {
        Self {
            state: WorkflowState::default(),
            gate: EntitlementGate::new(),
            messages: MessagesConfig::default(),
            in_flight: None,
            offer_visible: false,
            observer: Box::new(observer),
        }
    }

    /// Create a machine from configuration.
    pub fn from_config(config: &Config, observer: impl WorkflowObserver + 'static) -> Self {
        Self::new(observer)
            .with_entitlement(EntitlementGate::with_free_limit(config.entitlement.free_limit))
            .with_messages(config.messages.clone())
    }

    /// Create a machine that notifies nobody.
    pub fn detached() -> Self {
        Self::new(NoopObserver)
    }

    /// Use a specific entitlement gate.
    pub fn with_entitlement(mut self, gate: EntitlementGate) -> Self {
        self.gate = gate;
        self
    }

    /// Use specific user-facing messages.
    pub fn with_messages(mut self, messages: MessagesConfig) -> Self {
        self.messages = messages;
        self
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn step(&self) -> WorkflowStep {
        self.state.step
    }

    pub fn entitlement(&self) -> &EntitlementGate {
        &self.gate
    }

    pub fn offer_visible(&self) -> bool {
        self.offer_visible
    }

    /// The attempt currently in flight, if any.
    pub fn in_flight(&self) -> Option<&AttemptTicket> {
        self.in_flight.as_ref()
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            state: self.state.clone(),
            entitlement: self.gate.snapshot(),
            offer_visible: self.offer_visible,
        }
    }

    /// Store the user's own photo, replacing any previous one.
    ///
    /// Accepted in every step and never moves the step. Replacing it while
    /// generating makes the attempt in flight stale.
    pub fn provide_subject_image(&mut self, image: ImageData) {
        tracing::debug!(len = image.len(), step = ?self.state.step, "Subject image stored");
        self.state.subject_image = Some(image);
        self.publish();
    }

    /// Move to the garment step. A no-op unless a subject image is present.
    pub fn advance_to_garment_step(&mut self) {
        if self.state.step != WorkflowStep::AwaitingSubjectImage {
            tracing::debug!(step = ?self.state.step, "Advance ignored");
            return;
        }
        if self.state.subject_image.is_none() {
            tracing::debug!("Advance ignored, no subject image");
            return;
        }

        self.transition(WorkflowStep::AwaitingGarmentImage);
        self.publish();
    }

    /// Store the garment photo. Only meaningful on the garment step.
    pub fn provide_garment_image(&mut self, image: ImageData) {
        if self.state.step != WorkflowStep::AwaitingGarmentImage {
            tracing::debug!(step = ?self.state.step, "Garment image ignored");
            return;
        }

        tracing::debug!(len = image.len(), "Garment image stored");
        self.state.garment_image = Some(image);
        self.publish();
    }

    /// Start a generation attempt.
    ///
    /// On `Ok(SubmitOutcome::Started(ticket))` the caller dispatches exactly
    /// one generation call and reports its outcome with
    /// [`complete_generation`](Self::complete_generation).
    pub fn submit_generation(&mut self) -> Result<SubmitOutcome, WorkflowError> {
        match self.state.step {
            WorkflowStep::Generating => {
                tracing::debug!("Submission ignored, attempt already in flight");
                return Ok(SubmitOutcome::AlreadyInFlight);
            }
            WorkflowStep::ShowingResult => {
                tracing::debug!("Submission ignored while showing result");
                return Ok(SubmitOutcome::Ignored(WorkflowStep::ShowingResult));
            }
            WorkflowStep::AwaitingSubjectImage | WorkflowStep::AwaitingGarmentImage => {}
        }

        let (subject, garment) = match (&self.state.subject_image, &self.state.garment_image) {
            (Some(subject), Some(garment)) => (subject.clone(), garment.clone()),
            _ => {
                tracing::debug!(step = ?self.state.step, "Submission refused, missing image");
                return Err(WorkflowError::IncompleteInput {
                    message: self.messages.incomplete_input.clone(),
                });
            }
        };

        if !self.gate.can_attempt() {
            let entitlement = self.gate.snapshot();
            tracing::warn!(
                used = entitlement.free_attempts_used,
                limit = entitlement.free_limit,
                "Submission refused, free quota exhausted"
            );
            self.offer_visible = true;
            self.observer.on_event(WorkflowEvent::QuotaExceeded(entitlement));
            self.publish();
            return Err(WorkflowError::QuotaExceeded { entitlement });
        }

        let ticket = AttemptTicket::new(subject, garment);
        tracing::info!(attempt = %ticket.id, "Generation attempt started");

        self.state.last_error = None;
        self.state.result_image = None;
        self.in_flight = Some(ticket.clone());
        self.transition(WorkflowStep::Generating);
        self.publish();

        Ok(SubmitOutcome::Started(ticket))
    }

    /// Apply a generation client result, mapping any failure to the generic
    /// user-facing message.
    pub fn complete_generation(
        &mut self,
        ticket: &AttemptTicket,
        result: Result<ImageData, GenerationError>,
    ) -> CompletionOutcome {
        match result {
            Ok(image) => self.generation_succeeded(ticket, image),
            Err(err) => {
                tracing::warn!(attempt = %ticket.id, reason = err.reason(), "Generation failed");
                let message = self.messages.generation_failed.clone();
                self.generation_failed(ticket, message)
            }
        }
    }

    /// Show the result and count the attempt against the free quota.
    pub fn generation_succeeded(&mut self, ticket: &AttemptTicket, image: ImageData) -> CompletionOutcome {
        if !self.is_current(ticket) {
            return CompletionOutcome::Stale;
        }

        tracing::info!(attempt = %ticket.id, len = image.len(), "Generation succeeded");
        self.in_flight = None;
        self.state.result_image = Some(image);
        self.gate.record_attempt();
        self.transition(WorkflowStep::ShowingResult);
        self.publish();

        CompletionOutcome::Applied
    }

    /// Return to the garment step with both images kept and `message` shown.
    pub fn generation_failed(
        &mut self,
        ticket: &AttemptTicket,
        message: impl Into<String>,
    ) -> CompletionOutcome {
        if !self.is_current(ticket) {
            return CompletionOutcome::Stale;
        }

        self.in_flight = None;
        self.state.last_error = Some(message.into());
        self.transition(WorkflowStep::AwaitingGarmentImage);
        self.publish();

        CompletionOutcome::Applied
    }

    /// Back to the first step with all images and the error cleared.
    ///
    /// An attempt in flight is abandoned; its outcome will be reported stale.
    pub fn reset(&mut self) {
        if let Some(ticket) = self.in_flight.take() {
            tracing::debug!(attempt = %ticket.id, "Abandoning in-flight attempt");
        }

        self.state = WorkflowState::default();
        tracing::debug!("Workflow reset");
        self.publish();
    }

    /// The user accepted the subscription offer.
    pub fn grant_premium(&mut self) {
        self.gate.grant_premium();
        self.offer_visible = false;
        self.publish();
    }

    /// The user closed the subscription offer without subscribing.
    pub fn dismiss_offer(&mut self) {
        if self.offer_visible {
            self.offer_visible = false;
            self.publish();
        }
    }

    /// Whether an outcome for `ticket` may be applied.
    ///
    /// The in-flight attempt whose image pair changed underneath is released
    /// without applying its outcome: back to the garment step, nothing
    /// counted, no error shown.
    fn is_current(&mut self, ticket: &AttemptTicket) -> bool {
        if self.state.step != WorkflowStep::Generating {
            tracing::debug!(attempt = %ticket.id, step = ?self.state.step, "Discarding stale completion");
            return false;
        }

        if self.in_flight.as_ref() != Some(ticket) {
            tracing::debug!(attempt = %ticket.id, "Discarding completion for another attempt");
            return false;
        }

        let same_pair = match (&self.state.subject_image, &self.state.garment_image) {
            (Some(subject), Some(garment)) => ticket.is_for_pair(subject, garment),
            _ => false,
        };

        if !same_pair {
            tracing::debug!(attempt = %ticket.id, "Discarding completion, image pair changed");
            self.in_flight = None;
            self.transition(WorkflowStep::AwaitingGarmentImage);
            self.publish();
            return false;
        }

        true
    }

    fn transition(&mut self, to: WorkflowStep) {
        tracing::debug!(from = ?self.state.step, to = ?to, "Workflow transition");
        self.state.step = to;
        debug_assert!(self.state.is_consistent(), "inconsistent workflow state: {:?}", self.state);
    }

    fn publish(&mut self) {
        let snapshot = self.snapshot();
        self.observer.on_event(WorkflowEvent::StateChanged(snapshot));
    }
}

impl std::fmt::Debug for WorkflowMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowMachine")
            .field("state", &self.state)
            .field("gate", &self.gate)
            .field("in_flight", &self.in_flight.as_ref().map(AttemptTicket::id))
            .field("offer_visible", &self.offer_visible)
            .finish()
    }
}
