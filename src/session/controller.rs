//! Owns the session state and runs the effects the state machine asks for.
//!
//! Background work never touches the state directly: it reports back as
//! [`SessionEvent`]s on the channel returned by [`SessionController::new`],
//! and the control surface feeds them to [`SessionController::handle`].

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::state::{transition, Effect, SessionEvent, SessionState, Transition};
use super::SessionContext;
use crate::common::{ProgressObserver, ProgressSnapshot};
use crate::receive::{self, SessionOutcome};
use crate::transfer::{TransferClient, TransferCode};
use crate::utils::shell::run_open_command;

pub struct SessionController {
    context: SessionContext,
    client: Arc<dyn TransferClient>,
    state: SessionState,
    outcome: Option<SessionOutcome>,
    events: UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

impl SessionController {
    pub fn new(
        context: SessionContext,
        client: Arc<dyn TransferClient>,
    ) -> (Self, UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let (state, outcome) = SessionState::initial(&context.code);
        tracing::debug!(?state, "session created");

        let controller = Self {
            context,
            client,
            state,
            outcome,
            events,
            cancel: CancellationToken::new(),
            tasks: JoinSet::new(),
        };
        (controller, rx)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// How the session ends, once that has been decided.
    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_exit()
    }

    /// Feed one event through the state machine. Once the session has
    /// exited every event is dropped, so late results cannot resurrect it.
    pub fn handle(&mut self, event: SessionEvent) {
        if self.is_finished() {
            tracing::debug!(?event, "discarding event after exit");
            return;
        }

        let current = std::mem::replace(&mut self.state, SessionState::Exit);
        let Transition {
            next,
            effects,
            outcome,
        } = transition(current, event, &self.context.open);

        if let Some(outcome) = outcome {
            // first decision wins
            if self.outcome.is_none() {
                self.outcome = Some(outcome);
            }
        }
        if self.state != next {
            tracing::debug!(state = ?next, "session state");
        }
        self.state = next;

        for effect in effects {
            self.apply(effect);
        }
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::StartTransfer { code } => self.start_transfer(code),
            Effect::CancelTransfer => {
                tracing::info!("cancelling transfer");
                self.cancel.cancel();
            }
            Effect::RunOpen { command } => {
                let shell = self.context.open.shell.clone();
                let events = self.events.clone();
                self.tasks.spawn(async move {
                    let result = run_open_command(&shell, &command).await;
                    let _ = events.send(SessionEvent::OpenFinished(result));
                });
            }
        }
    }

    fn start_transfer(&mut self, code: TransferCode) {
        let client = Arc::clone(&self.client);
        let options = self.context.options.clone();
        let events = self.events.clone();
        let cancel = self.cancel.clone();

        self.tasks.spawn(async move {
            tracing::info!(%code, "waiting for offer");
            let offered = tokio::select! {
                offered = client.receive(&code) => offered,
                _ = cancel.cancelled() => return,
            };

            let outcome = match offered {
                Ok(handle) => {
                    let _ = events.send(SessionEvent::Offered {
                        kind: handle.kind(),
                        name: handle.name().to_string(),
                        declared_size: handle.declared_size(),
                    });
                    let observer = EventObserver {
                        events: events.clone(),
                    };
                    receive::receive(&options, handle, &observer, &cancel).await
                }
                Err(e) => {
                    tracing::error!(error = %e, "receive failed");
                    SessionOutcome::Error(e)
                }
            };
            let _ = events.send(SessionEvent::Finished(outcome));
        });
    }

    /// Stop background work, wait for it, and return how the session ended.
    pub async fn shutdown(mut self) -> SessionOutcome {
        self.cancel.cancel();
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "session task ended abnormally");
            }
        }
        self.outcome.unwrap_or(SessionOutcome::NotAttempted)
    }
}

/// Forwards progress frames to the control surface.
struct EventObserver {
    events: UnboundedSender<SessionEvent>,
}

impl ProgressObserver for EventObserver {
    fn on_progress(&self, snapshot: ProgressSnapshot) {
        let _ = self.events.send(SessionEvent::Progress(snapshot));
    }
}
