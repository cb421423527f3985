//! Event-driven session driver.
//!
//! A [`Session`] owns a [`WorkflowMachine`] on a single tokio task. Intents
//! from the presentation layer arrive over a channel and are applied strictly
//! in arrival order. A started attempt is dispatched to the generation client
//! on its own task, and its outcome is queued on the same channel behind any
//! intent that arrived first, so all state changes happen on one logical
//! thread and no locking is needed.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::image::ImageData;
use super::workflow::{AttemptTicket, SubmitOutcome, WorkflowError, WorkflowMachine, WorkflowSnapshot};
use crate::generation::{GenerationClient, GenerationError};

/// A discrete request from the presentation layer.
#[derive(Debug, Clone)]
pub enum Intent {
    ProvideSubjectImage(ImageData),
    AdvanceToGarmentStep,
    ProvideGarmentImage(ImageData),
    SubmitGeneration,
    Reset,
    /// The user accepted the subscription offer
    GrantPremium,
    /// The user closed the subscription offer
    DismissOffer,
}

/// Session errors seen by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Session has shut down")]
    Closed,

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

type SubmitReply = oneshot::Sender<Result<SubmitOutcome, WorkflowError>>;

enum Request {
    Intent(Intent, Option<SubmitReply>),
    Snapshot(oneshot::Sender<WorkflowSnapshot>),
    Completion(Completion),
}

struct Completion {
    ticket: AttemptTicket,
    result: Result<ImageData, GenerationError>,
}

/// Owns the machine and the generation client for one user session.
pub struct Session {
    machine: WorkflowMachine,
    client: Arc<dyn GenerationClient>,
    requests: UnboundedReceiver<Request>,
    // Weak so that an attempt in flight does not keep the session alive.
    completions: WeakUnboundedSender<Request>,
}

/// Presentation-side sender for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    sender: UnboundedSender<Request>,
}

impl Session {
    /// Create a session and the handle used to drive it.
    pub fn new(machine: WorkflowMachine, client: Arc<dyn GenerationClient>) -> (Self, SessionHandle) {
        let (sender, requests) = mpsc::unbounded_channel();
        let completions = sender.downgrade();

        let session = Self { machine, client, requests, completions };
        (session, SessionHandle { sender })
    }

    /// Run the session on its own task.
    pub fn spawn(self) -> JoinHandle<WorkflowMachine> {
        tokio::spawn(self.run())
    }

    /// Process intents and completions, in arrival order, until every handle
    /// is dropped.
    ///
    /// Returns the machine so callers can inspect the final state. An attempt
    /// still in flight at shutdown is abandoned.
    pub async fn run(mut self) -> WorkflowMachine {
        tracing::debug!(provider = self.client.name(), "Session started");

        while let Some(request) = self.requests.recv().await {
            self.handle(request);
        }

        if let Some(ticket) = self.machine.in_flight() {
            tracing::debug!(attempt = %ticket.id(), "Session closed with attempt in flight");
        }
        tracing::debug!("Session stopped");
        self.machine
    }

    fn handle(&mut self, request: Request) {
        match request {
            Request::Intent(intent, reply) => self.apply(intent, reply),
            Request::Snapshot(reply) => {
                let _ = reply.send(self.machine.snapshot());
            }
            Request::Completion(completion) => {
                self.machine.complete_generation(&completion.ticket, completion.result);
            }
        }
    }

    fn apply(&mut self, intent: Intent, reply: Option<SubmitReply>) {
        match intent {
            Intent::ProvideSubjectImage(image) => self.machine.provide_subject_image(image),
            Intent::AdvanceToGarmentStep => self.machine.advance_to_garment_step(),
            Intent::ProvideGarmentImage(image) => self.machine.provide_garment_image(image),
            Intent::SubmitGeneration => {
                let outcome = self.machine.submit_generation();
                if let Ok(SubmitOutcome::Started(ticket)) = &outcome {
                    self.dispatch(ticket.clone());
                }
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }
            Intent::Reset => self.machine.reset(),
            Intent::GrantPremium => self.machine.grant_premium(),
            Intent::DismissOffer => self.machine.dismiss_offer(),
        }
    }

    fn dispatch(&self, ticket: AttemptTicket) {
        let client = Arc::clone(&self.client);
        let completions = self.completions.clone();

        tokio::spawn(async move {
            let result = client.generate(ticket.subject(), ticket.garment()).await;
            // The session may already be gone; the outcome is then moot.
            match completions.upgrade() {
                Some(sender) => {
                    let _ = sender.send(Request::Completion(Completion { ticket, result }));
                }
                None => tracing::debug!(attempt = %ticket.id(), "Session closed, outcome dropped"),
            }
        });
    }
}

impl SessionHandle {
    /// Send an intent without waiting for its effect.
    pub fn send(&self, intent: Intent) -> Result<(), SessionError> {
        self.sender.send(Request::Intent(intent, None)).map_err(|_| SessionError::Closed)
    }

    pub fn provide_subject_image(&self, image: ImageData) -> Result<(), SessionError> {
        self.send(Intent::ProvideSubjectImage(image))
    }

    pub fn advance_to_garment_step(&self) -> Result<(), SessionError> {
        self.send(Intent::AdvanceToGarmentStep)
    }

    pub fn provide_garment_image(&self, image: ImageData) -> Result<(), SessionError> {
        self.send(Intent::ProvideGarmentImage(image))
    }

    pub fn reset(&self) -> Result<(), SessionError> {
        self.send(Intent::Reset)
    }

    pub fn grant_premium(&self) -> Result<(), SessionError> {
        self.send(Intent::GrantPremium)
    }

    pub fn dismiss_offer(&self) -> Result<(), SessionError> {
        self.send(Intent::DismissOffer)
    }

    /// Submit and wait for the machine's decision (not for the generation).
    pub async fn submit_generation(&self) -> Result<SubmitOutcome, SessionError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Request::Intent(Intent::SubmitGeneration, Some(reply)))
            .map_err(|_| SessionError::Closed)?;

        Ok(response.await.map_err(|_| SessionError::Closed)??)
    }

    /// Current state, after every previously sent intent has been applied.
    pub async fn snapshot(&self) -> Result<WorkflowSnapshot, SessionError> {
        let (reply, response) = oneshot::channel();
        self.sender.send(Request::Snapshot(reply)).map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)
    }
}
