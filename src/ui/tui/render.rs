//! TUI runtime loop: feeds session events and key presses to the
//! controller and redraws at a fixed tick.

use std::io::{self, Stdout};
use std::mem::{discriminant, Discriminant};
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    prelude::{CrosstermBackend, Terminal},
    style::Style,
    widgets::Paragraph,
    Frame,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tui_big_text::{BigText, PixelSize};

use super::dialog::{render_dialog, DialogView};
use super::styles::{muted_style, ACCENT};
use crate::receive::SessionOutcome;
use crate::session::{SessionController, SessionEvent, SessionState, UserAction};

/// Render and poll interval
const RENDER_INTERVAL: Duration = Duration::from_millis(50);
const LOGO_PIXEL_SIZE: PixelSize = PixelSize::Sextant;
const KEY_HINT: &str = "←/→ select • enter press • esc quit";

/// Map one key press onto the focused dialog. Moves `focus` for
/// navigation keys and returns the action for activating ones.
pub(super) fn action_for_key(
    key: KeyEvent,
    buttons: &[(&'static str, UserAction)],
    focus: &mut usize,
) -> Option<UserAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    let count = buttons.len();

    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => Some(UserAction::Quit),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(UserAction::Quit),
        KeyCode::Left | KeyCode::BackTab if count > 0 => {
            *focus = (*focus + count - 1) % count;
            None
        }
        KeyCode::Right | KeyCode::Tab if count > 0 => {
            *focus = (*focus + 1) % count;
            None
        }
        KeyCode::Enter | KeyCode::Char(' ') => buttons.get(*focus).map(|(_, action)| *action),
        _ => None,
    }
}

/// Owns the terminal for the lifetime of one session.
pub struct SessionUI {
    controller: SessionController,
    events: UnboundedReceiver<SessionEvent>,
    focus: usize,
    tick: usize,
    shown: Option<Discriminant<SessionState>>,
}

impl SessionUI {
    pub fn new(controller: SessionController, events: UnboundedReceiver<SessionEvent>) -> Self {
        Self {
            controller,
            events,
            focus: 0,
            tick: 0,
            shown: None,
        }
    }

    /// Run until the session exits, restore the terminal, then wait for
    /// background work and return the outcome.
    pub async fn run(mut self) -> io::Result<SessionOutcome> {
        install_panic_hook();

        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let looped = self.event_loop(&mut terminal).await;
        cleanup_terminal(&mut terminal)?;
        looped?;

        Ok(self.controller.shutdown().await)
    }

    async fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
        terminal.draw(|f| self.render(f))?;

        while !self.controller.is_finished() {
            tokio::select! {
                Some(event) = self.events.recv() => {
                    self.controller.handle(event);
                }

                // Input polling and render tick
                _ = tokio::time::sleep(RENDER_INTERVAL) => {
                    self.tick = self.tick.wrapping_add(1);
                    if let Some(action) = self.handle_input()? {
                        tracing::debug!(?action, "key action");
                        self.controller.handle(SessionEvent::User(action));
                    }
                }
            }

            self.sync_focus();
            terminal.draw(|f| self.render(f))?;
        }
        Ok(())
    }

    /// Focus goes back to the first button whenever a new dialog opens.
    fn sync_focus(&mut self) {
        let current = discriminant(self.controller.state());
        if self.shown != Some(current) {
            self.shown = Some(current);
            self.focus = 0;
        }
    }

    /// Non-blocking; at most one key per tick
    fn handle_input(&mut self) -> io::Result<Option<UserAction>> {
        if !event::poll(Duration::from_millis(0))? {
            return Ok(None);
        }
        if let Event::Key(key) = event::read()? {
            let buttons = self.controller.state().buttons();
            return Ok(action_for_key(key, &buttons, &mut self.focus));
        }
        Ok(None)
    }

    fn render_logo(&self, frame: &mut Frame, area: Rect) {
        let logo = BigText::builder()
            .pixel_size(LOGO_PIXEL_SIZE)
            .lines(vec!["WORMSAVE".into()])
            .style(Style::default().fg(ACCENT))
            .alignment(Alignment::Center)
            .build();
        frame.render_widget(logo, area);
    }

    fn render(&self, frame: &mut Frame) {
        let areas = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(6),
                Constraint::Min(6),
                Constraint::Length(1),
            ])
            .split(frame.area());

        self.render_logo(frame, areas[1]);

        let view = DialogView::from_state(self.controller.state());
        render_dialog(frame, areas[2], &view, self.focus, self.tick);

        let hint = Paragraph::new(KEY_HINT)
            .style(muted_style())
            .alignment(Alignment::Center);
        frame.render_widget(hint, areas[3]);
    }
}

/// Install a panic hook that restores the terminal before printing the panic
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));
}

fn cleanup_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
