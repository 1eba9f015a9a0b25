//! Line-oriented observer for `--no-tui` runs.
//!
//! Confirms the code without asking, never offers to open the saved file,
//! and prints every notice. A received text message goes to stdout on its
//! own so it can be piped.

use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::receive::{Received, SessionOutcome};
use crate::session::{AfterNotice, SessionController, SessionEvent, SessionState, UserAction};
use crate::transfer::TransferKind;

const BAR_TEMPLATE: &str = "{spinner:.cyan} {msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({eta})";

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn byte_bar(msg: &str, total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// The answer this observer gives a state that waits on the user.
pub(crate) fn auto_answer(state: &SessionState) -> Option<UserAction> {
    match state {
        SessionState::Confirm { .. } => Some(UserAction::Confirm),
        SessionState::AskOpen { .. } => Some(UserAction::OpenNo),
        SessionState::Notice { .. } => Some(UserAction::Acknowledge),
        _ => None,
    }
}

#[derive(Default)]
struct Status {
    bar: Option<ProgressBar>,
    gauge: bool,
}

impl Status {
    fn show(&mut self, state: &SessionState) {
        match state {
            SessionState::Transferring {
                kind: TransferKind::File | TransferKind::Directory,
                progress,
                ..
            } => {
                let snapshot = progress.unwrap_or_default();
                if !self.gauge {
                    self.clear();
                    self.bar = Some(byte_bar(&state.prompt(), snapshot.total));
                    self.gauge = true;
                }
                if let Some(bar) = &self.bar {
                    bar.set_length(snapshot.total);
                    bar.set_position(snapshot.read);
                }
            }
            SessionState::Connecting | SessionState::Transferring { .. } | SessionState::Opening { .. } => {
                match &self.bar {
                    Some(bar) if !self.gauge => bar.set_message(state.prompt()),
                    _ => {
                        self.clear();
                        self.bar = Some(spinner(&state.prompt()));
                    }
                }
            }
            _ => {}
        }
    }

    fn notice(&mut self, message: &str, ok: bool) {
        let mark = if ok {
            style("✓").green().bold()
        } else {
            style("✗").red().bold()
        };
        match self.bar.take() {
            Some(bar) if !self.gauge => bar.finish_with_message(format!("{mark} {message}")),
            Some(bar) => {
                bar.finish();
                eprintln!("{mark} {message}");
            }
            None => eprintln!("{mark} {message}"),
        }
        self.gauge = false;
    }

    fn clear(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        self.gauge = false;
    }
}

/// Drive one session without a terminal UI.
pub async fn run_headless(
    mut controller: SessionController,
    mut events: UnboundedReceiver<SessionEvent>,
) -> SessionOutcome {
    let mut status = Status::default();

    while !controller.is_finished() {
        status.show(controller.state());

        if let SessionState::Notice { message, then, .. } = controller.state() {
            match controller.outcome() {
                Some(SessionOutcome::Success(Received::Text(text))) => {
                    status.clear();
                    println!("{text}");
                }
                outcome => {
                    // a failed open still saved the file, but its notice is an error
                    let ok = outcome.is_some_and(SessionOutcome::is_success)
                        && *then == AfterNotice::Exit;
                    status.notice(message, ok);
                }
            }
        }

        if let Some(action) = auto_answer(controller.state()) {
            controller.handle(SessionEvent::User(action));
            continue;
        }

        tokio::select! {
            event = events.recv() => match event {
                Some(event) => controller.handle(event),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                controller.handle(SessionEvent::User(UserAction::Quit));
            }
        }
    }

    status.clear();
    controller.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn answers_only_waiting_states() {
        assert_eq!(
            auto_answer(&SessionState::AskOpen {
                path: PathBuf::from("/tmp/a")
            }),
            Some(UserAction::OpenNo)
        );
        assert_eq!(auto_answer(&SessionState::Connecting), None);
        assert_eq!(auto_answer(&SessionState::Exit), None);
    }
}
