//! Session state machine.
//!
//! Every state change goes through [`transition`], keyed by the current
//! state and one incoming event. Side effects are returned as data and
//! carried out by the controller.

use std::path::PathBuf;

use super::OpenPolicy;
use crate::common::{ProgressSnapshot, ReceiveError};
use crate::receive::{Received, SessionOutcome};
use crate::transfer::{TransferCode, TransferKind};
use crate::utils::shell::build_open_command;

/// Something the user can trigger; buttons map to these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Confirm,
    Cancel,
    OpenYes,
    OpenNo,
    Acknowledge,
    Quit,
}

#[derive(Debug)]
pub enum SessionEvent {
    User(UserAction),
    Offered {
        kind: TransferKind,
        name: String,
        declared_size: u64,
    },
    Progress(ProgressSnapshot),
    Finished(SessionOutcome),
    OpenFinished(Result<(), ReceiveError>),
}

/// Where a notice leads once acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AfterNotice {
    Exit,
    SavedAs(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Confirm {
        code: TransferCode,
    },
    Connecting,
    Transferring {
        kind: TransferKind,
        name: String,
        progress: Option<ProgressSnapshot>,
    },
    AskOpen {
        path: PathBuf,
    },
    Opening {
        path: PathBuf,
    },
    Notice {
        message: String,
        button: &'static str,
        then: AfterNotice,
    },
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartTransfer { code: TransferCode },
    CancelTransfer,
    RunOpen { command: String },
}

#[derive(Debug)]
pub struct Transition {
    pub next: SessionState,
    pub effects: Vec<Effect>,
    /// Set when this step decides how the session ends.
    pub outcome: Option<SessionOutcome>,
}

impl Transition {
    fn to(next: SessionState) -> Self {
        Self {
            next,
            effects: Vec::new(),
            outcome: None,
        }
    }

    fn effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    fn outcome(mut self, outcome: SessionOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }
}

impl SessionState {
    /// First state for a raw code. An unusable code ends the session
    /// before any transfer is attempted.
    pub fn initial(raw_code: &str) -> (SessionState, Option<SessionOutcome>) {
        match TransferCode::parse(raw_code) {
            Ok(code) => (SessionState::Confirm { code }, None),
            Err(e) => (quit_notice(e.to_string()), Some(SessionOutcome::NotAttempted)),
        }
    }

    /// Dialog text for this state.
    pub fn prompt(&self) -> String {
        match self {
            SessionState::Confirm { code } => format!("{code}. Proceed?"),
            SessionState::Connecting => "Waiting for sender...".to_string(),
            SessionState::Transferring {
                kind: TransferKind::Text,
                ..
            } => "Transferring message...".to_string(),
            SessionState::Transferring { kind, name, .. } => format!("Transferring {kind} {name}..."),
            SessionState::AskOpen { path } => format!("Open {}?", path.display()),
            SessionState::Opening { path } => format!("Opening {}...", path.display()),
            SessionState::Notice { message, .. } => message.clone(),
            SessionState::Exit => String::new(),
        }
    }

    pub fn buttons(&self) -> Vec<(&'static str, UserAction)> {
        match self {
            SessionState::Confirm { .. } => vec![("Ok", UserAction::Confirm), ("Cancel", UserAction::Cancel)],
            SessionState::Connecting | SessionState::Transferring { .. } => {
                vec![("Cancel", UserAction::Cancel)]
            }
            SessionState::AskOpen { .. } => vec![("Yes", UserAction::OpenYes), ("No", UserAction::OpenNo)],
            SessionState::Notice { button, .. } => vec![(*button, UserAction::Acknowledge)],
            SessionState::Opening { .. } | SessionState::Exit => Vec::new(),
        }
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, SessionState::Exit)
    }
}

fn quit_notice(message: String) -> SessionState {
    SessionState::Notice {
        message,
        button: "Quit",
        then: AfterNotice::Exit,
    }
}

fn saved_as(path: PathBuf) -> SessionState {
    SessionState::Notice {
        message: format!("Saved as {}", path.display()),
        button: "Ok",
        then: AfterNotice::Exit,
    }
}

fn open_file(path: PathBuf, template: &str) -> Transition {
    let command = build_open_command(template, &path);
    Transition::to(SessionState::Opening { path }).effect(Effect::RunOpen { command })
}

/// Where a finished transfer leads.
fn finish(outcome: SessionOutcome, open: &OpenPolicy) -> Transition {
    let next = match &outcome {
        SessionOutcome::Success(Received::File(path)) => match open.command.as_deref() {
            None => saved_as(path.clone()),
            Some(template) if open.no_ask => {
                return open_file(path.clone(), template).outcome(outcome);
            }
            Some(_) => SessionState::AskOpen { path: path.clone() },
        },
        SessionOutcome::Success(Received::Directory(path)) => saved_as(path.clone()),
        SessionOutcome::Success(Received::Text(text)) => quit_notice(text.clone()),
        SessionOutcome::Rejected(e) | SessionOutcome::Error(e) => quit_notice(e.to_string()),
        SessionOutcome::NotAttempted => SessionState::Exit,
    };
    Transition::to(next).outcome(outcome)
}

/// One step of the machine. Events a state has no entry for leave it
/// unchanged.
pub fn transition(state: SessionState, event: SessionEvent, open: &OpenPolicy) -> Transition {
    use SessionEvent as E;
    use SessionState as S;
    use UserAction as A;

    match (state, event) {
        (S::Exit, _) => Transition::to(S::Exit),

        (S::Confirm { code }, E::User(A::Confirm)) => {
            Transition::to(S::Connecting).effect(Effect::StartTransfer { code })
        }
        (S::Confirm { .. }, E::User(A::Cancel | A::Quit)) => {
            Transition::to(S::Exit).outcome(SessionOutcome::NotAttempted)
        }

        (S::Connecting, E::Offered { kind, name, .. }) => Transition::to(S::Transferring {
            kind,
            name,
            progress: None,
        }),
        (S::Transferring { kind, name, .. }, E::Progress(snapshot)) => Transition::to(S::Transferring {
            kind,
            name,
            progress: Some(snapshot),
        }),
        (S::Connecting | S::Transferring { .. }, E::Finished(outcome)) => finish(outcome, open),
        (S::Connecting | S::Transferring { .. }, E::User(A::Cancel | A::Quit)) => Transition::to(S::Exit)
            .effect(Effect::CancelTransfer)
            .outcome(SessionOutcome::Error(ReceiveError::Cancelled)),

        (S::AskOpen { path }, E::User(A::OpenYes)) => match open.command.as_deref() {
            Some(template) => open_file(path, template),
            None => Transition::to(saved_as(path)),
        },
        (S::AskOpen { path }, E::User(A::OpenNo)) => Transition::to(saved_as(path)),

        (S::Opening { path }, E::OpenFinished(Ok(()))) => Transition::to(saved_as(path)),
        (S::Opening { path }, E::OpenFinished(Err(e))) => Transition::to(S::Notice {
            message: e.to_string(),
            button: "Continue",
            then: AfterNotice::SavedAs(path),
        }),

        (S::Notice { then, .. }, E::User(A::Acknowledge)) => match then {
            AfterNotice::Exit => Transition::to(S::Exit),
            AfterNotice::SavedAs(path) => Transition::to(saved_as(path)),
        },

        (_, E::User(A::Quit)) => Transition::to(S::Exit),

        (state, event) => {
            tracing::trace!(?state, ?event, "event ignored");
            Transition::to(state)
        }
    }
}
