mod common;

use std::sync::Arc;

use common::{fast_options, setup_temp_dir};
use tokio::sync::mpsc::UnboundedReceiver;
use wormsave::common::ReceiveError;
use wormsave::receive::{Received, SessionOutcome};
use wormsave::session::{
    OpenPolicy, SessionContext, SessionController, SessionEvent, SessionState, UserAction,
};
use wormsave::transfer::{MemoryClient, MemoryOffer};

fn context(code: &str, dir: &std::path::Path, open: OpenPolicy) -> SessionContext {
    SessionContext {
        code: code.to_string(),
        open,
        options: fast_options(dir),
    }
}

fn open_with(command: String, no_ask: bool) -> OpenPolicy {
    OpenPolicy {
        command: Some(command),
        no_ask,
        shell: "/bin/sh".to_string(),
    }
}

/// Feed background events until the session waits on the user again.
async fn settle(controller: &mut SessionController, rx: &mut UnboundedReceiver<SessionEvent>) {
    loop {
        match controller.state() {
            SessionState::Confirm { .. }
            | SessionState::AskOpen { .. }
            | SessionState::Notice { .. }
            | SessionState::Exit => return,
            _ => {}
        }
        match rx.recv().await {
            Some(event) => controller.handle(event),
            None => return,
        }
    }
}

fn press(controller: &mut SessionController, action: UserAction) {
    controller.handle(SessionEvent::User(action));
}

#[tokio::test]
async fn test_empty_code_never_contacts_transfer_layer() {
    let temp_dir = setup_temp_dir();
    let client = Arc::new(MemoryClient::new());
    let (mut controller, _rx) =
        SessionController::new(context("  ", temp_dir.path(), OpenPolicy::never()), client.clone());

    assert_eq!(controller.state().prompt(), "No wormhole code found!");
    assert_eq!(controller.state().buttons(), vec![("Quit", UserAction::Acknowledge)]);

    press(&mut controller, UserAction::Acknowledge);
    assert!(controller.is_finished());
    assert!(matches!(controller.shutdown().await, SessionOutcome::NotAttempted));
    assert_eq!(client.receive_calls(), 0);
}

#[tokio::test]
async fn test_cancel_at_confirm_attempts_nothing() {
    let temp_dir = setup_temp_dir();
    let client = Arc::new(MemoryClient::new().with_offer("3-x-y", MemoryOffer::text("unused")));
    let (mut controller, _rx) =
        SessionController::new(context("3-x-y", temp_dir.path(), OpenPolicy::never()), client.clone());

    assert_eq!(controller.state().prompt(), "3-x-y. Proceed?");
    press(&mut controller, UserAction::Cancel);

    assert!(matches!(controller.shutdown().await, SessionOutcome::NotAttempted));
    assert_eq!(client.receive_calls(), 0);
}

#[tokio::test]
async fn test_file_without_opener_ends_at_saved_as() {
    let temp_dir = setup_temp_dir();
    let client = Arc::new(
        MemoryClient::new().with_offer("4-a-b", MemoryOffer::file("report.pdf", vec![1u8; 64 * 1024])),
    );
    let (mut controller, mut rx) =
        SessionController::new(context("4-a-b", temp_dir.path(), OpenPolicy::never()), client);

    press(&mut controller, UserAction::Confirm);
    settle(&mut controller, &mut rx).await;

    let saved = temp_dir.path().join("report.pdf");
    assert_eq!(controller.state().prompt(), format!("Saved as {}", saved.display()));
    assert_eq!(controller.state().buttons(), vec![("Ok", UserAction::Acknowledge)]);

    press(&mut controller, UserAction::Acknowledge);
    match controller.shutdown().await {
        SessionOutcome::Success(Received::File(path)) => assert_eq!(path, saved),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_file_is_opened_after_asking() {
    let temp_dir = setup_temp_dir();
    let save_dir = temp_dir.path().join("save");
    std::fs::create_dir(&save_dir).unwrap();
    let copy = temp_dir.path().join("opened-copy");

    let client = Arc::new(
        MemoryClient::new().with_offer("5-c-d", MemoryOffer::file("notes.txt", b"open me".to_vec())),
    );
    let open = open_with(format!("cp %s {}", copy.display()), false);
    let (mut controller, mut rx) = SessionController::new(context("5-c-d", &save_dir, open), client);

    press(&mut controller, UserAction::Confirm);
    settle(&mut controller, &mut rx).await;

    let saved = save_dir.join("notes.txt");
    assert_eq!(controller.state().prompt(), format!("Open {}?", saved.display()));

    press(&mut controller, UserAction::OpenYes);
    assert!(matches!(controller.state(), SessionState::Opening { .. }));
    settle(&mut controller, &mut rx).await;

    assert_eq!(controller.state().prompt(), format!("Saved as {}", saved.display()));
    assert_eq!(std::fs::read(&copy).unwrap(), b"open me");

    press(&mut controller, UserAction::Acknowledge);
    assert!(controller.shutdown().await.is_success());
}

#[tokio::test]
async fn test_failed_open_still_reports_saved_file() {
    let temp_dir = setup_temp_dir();
    let client = Arc::new(
        MemoryClient::new().with_offer("6-e-f", MemoryOffer::file("a.txt", b"a".to_vec())),
    );
    let open = open_with("exit 3 #".to_string(), true);
    let (mut controller, mut rx) = SessionController::new(context("6-e-f", temp_dir.path(), open), client);

    press(&mut controller, UserAction::Confirm);
    settle(&mut controller, &mut rx).await;

    assert!(controller.state().prompt().starts_with("Error opening: "));
    assert_eq!(controller.state().buttons(), vec![("Continue", UserAction::Acknowledge)]);

    press(&mut controller, UserAction::Acknowledge);
    let saved = temp_dir.path().join("a.txt");
    assert_eq!(controller.state().prompt(), format!("Saved as {}", saved.display()));

    press(&mut controller, UserAction::Acknowledge);
    match controller.shutdown().await {
        SessionOutcome::Success(Received::File(path)) => assert_eq!(path, saved),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_directory_ends_at_saved_as_without_open() {
    let temp_dir = setup_temp_dir();
    let archive = common::zip_bytes(&[common::Entry::File("inner.txt", b"inside")]);
    let client = Arc::new(MemoryClient::new().with_offer("7-g-h", MemoryOffer::directory("bundle", archive)));
    // an opener is configured, but directories are never opened
    let open = open_with("false".to_string(), true);
    let (mut controller, mut rx) = SessionController::new(context("7-g-h", temp_dir.path(), open), client);

    press(&mut controller, UserAction::Confirm);
    settle(&mut controller, &mut rx).await;

    let dest = temp_dir.path().join("bundle");
    assert_eq!(controller.state().prompt(), format!("Saved as {}", dest.display()));
    assert_eq!(std::fs::read(dest.join("inner.txt")).unwrap(), b"inside");
}

#[tokio::test]
async fn test_refusal_shows_quit_notice() {
    let temp_dir = setup_temp_dir();
    std::fs::write(temp_dir.path().join("report.pdf"), b"old").unwrap();
    let client = Arc::new(
        MemoryClient::new().with_offer("8-i-j", MemoryOffer::file("report.pdf", b"new".to_vec())),
    );
    let (mut controller, mut rx) =
        SessionController::new(context("8-i-j", temp_dir.path(), OpenPolicy::never()), client);

    press(&mut controller, UserAction::Confirm);
    settle(&mut controller, &mut rx).await;

    assert!(controller.state().prompt().ends_with("exists. Will not overwrite."));
    assert_eq!(controller.state().buttons(), vec![("Quit", UserAction::Acknowledge)]);

    press(&mut controller, UserAction::Acknowledge);
    assert!(matches!(
        controller.shutdown().await,
        SessionOutcome::Rejected(ReceiveError::OverwriteRefused { .. })
    ));
}

#[tokio::test]
async fn test_quit_while_waiting_for_sender_cancels() {
    let temp_dir = setup_temp_dir();
    let offer = MemoryOffer::file("slow.bin", vec![0u8; 8192]).chunk(16).stall_at(32);
    let client = Arc::new(MemoryClient::new().with_offer("9-k-l", offer));
    let (mut controller, _rx) =
        SessionController::new(context("9-k-l", temp_dir.path(), OpenPolicy::never()), client);

    press(&mut controller, UserAction::Confirm);
    assert_eq!(controller.state(), &SessionState::Connecting);
    press(&mut controller, UserAction::Quit);

    assert!(controller.is_finished());
    assert!(matches!(
        controller.shutdown().await,
        SessionOutcome::Error(ReceiveError::Cancelled)
    ));
}
