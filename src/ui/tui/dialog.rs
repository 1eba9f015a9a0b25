//! The centred dialog that shows the current session state.

use indicatif::HumanBytes;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Gauge, Paragraph, Wrap},
    Frame,
};

use super::styles::{button_style, ACCENT};
use crate::common::ProgressSnapshot;
use crate::session::{SessionState, UserAction};
use crate::transfer::TransferKind;

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const MIN_DIALOG_WIDTH: u16 = 32;
// border + padding on each side
const DIALOG_CHROME: u16 = 4;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum DialogBody {
    Plain,
    Spinner,
    Gauge(ProgressSnapshot),
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct DialogView {
    pub prompt: String,
    pub body: DialogBody,
    pub buttons: Vec<(&'static str, UserAction)>,
}

impl DialogView {
    pub fn from_state(state: &SessionState) -> Self {
        let body = match state {
            SessionState::Connecting | SessionState::Opening { .. } => DialogBody::Spinner,
            SessionState::Transferring {
                kind: TransferKind::Text,
                ..
            } => DialogBody::Spinner,
            SessionState::Transferring { progress, .. } => {
                DialogBody::Gauge(progress.unwrap_or_default())
            }
            _ => DialogBody::Plain,
        };
        Self {
            prompt: state.prompt(),
            body,
            buttons: state.buttons(),
        }
    }

    fn body_height(&self) -> u16 {
        match self.body {
            DialogBody::Plain => 0,
            DialogBody::Spinner | DialogBody::Gauge(_) => 2,
        }
    }
}

/// Prompt width plus some air, never narrower than the minimum and never
/// wider than the screen.
pub(super) fn dialog_width(prompt: &str, available: u16) -> u16 {
    let wanted = char_count(prompt).saturating_add(10);
    wanted.max(MIN_DIALOG_WIDTH).min(available)
}

/// Character count, saturating at `u16::MAX`.
fn char_count(text: &str) -> u16 {
    u16::try_from(text.chars().count()).unwrap_or(u16::MAX)
}

/// Rows the prompt needs once wrapped; saturates for huge messages.
fn wrapped_lines(prompt: &str, inner_width: u16) -> u16 {
    if inner_width == 0 {
        return 1;
    }
    prompt
        .lines()
        .map(|line| char_count(line).div_ceil(inner_width).max(1))
        .fold(0u16, u16::saturating_add)
        .max(1)
}

pub(super) fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

pub(super) fn button_line(buttons: &[(&'static str, UserAction)], focus: usize) -> Line<'static> {
    let mut spans = Vec::with_capacity(buttons.len() * 2);
    for (idx, (label, _)) in buttons.iter().enumerate() {
        if idx > 0 {
            spans.push(Span::raw("  "));
        }
        spans.push(Span::styled(format!("[ {label} ]"), button_style(idx == focus)));
    }
    Line::from(spans)
}

pub(super) fn gauge_label(snapshot: &ProgressSnapshot) -> String {
    format!(
        "{} / {} ({}%)",
        HumanBytes(snapshot.read),
        HumanBytes(snapshot.total),
        snapshot.percent()
    )
}

pub(super) fn render_dialog(frame: &mut Frame, area: Rect, view: &DialogView, focus: usize, tick: usize) {
    let width = dialog_width(&view.prompt, area.width);
    let text_lines = wrapped_lines(&view.prompt, width.saturating_sub(DIALOG_CHROME));
    let button_rows = if view.buttons.is_empty() { 0 } else { 2 };
    let height = text_lines
        .saturating_add(view.body_height())
        .saturating_add(button_rows)
        .saturating_add(2);

    let dialog_area = centered_rect(width, height, area);
    frame.render_widget(Clear, dialog_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(ACCENT));
    let inner = block.inner(dialog_area);
    frame.render_widget(block, dialog_area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(1)
        .constraints([
            Constraint::Length(text_lines),
            Constraint::Length(view.body_height()),
            Constraint::Length(button_rows),
        ])
        .split(inner);

    let prompt = Paragraph::new(view.prompt.as_str())
        .wrap(Wrap { trim: false })
        .alignment(Alignment::Center);
    frame.render_widget(prompt, rows[0]);

    if let Some(body_area) = rows[1].height.checked_sub(1).map(|h| Rect {
        y: rows[1].y + 1,
        height: h,
        ..rows[1]
    }) {
        match &view.body {
            DialogBody::Plain => {}
            DialogBody::Spinner => {
                let spinner = SPINNER_FRAMES[(tick / 2) % SPINNER_FRAMES.len()];
                let widget = Paragraph::new(spinner)
                    .style(Style::default().fg(ACCENT))
                    .alignment(Alignment::Center);
                frame.render_widget(widget, body_area);
            }
            DialogBody::Gauge(snapshot) => {
                let gauge = Gauge::default()
                    .gauge_style(Style::default().fg(Color::Green))
                    .percent(snapshot.percent().min(100))
                    .label(gauge_label(snapshot));
                frame.render_widget(gauge, body_area);
            }
        }
    }

    if button_rows > 0 {
        let buttons_area = Rect {
            y: rows[2].y + 1,
            height: rows[2].height.saturating_sub(1),
            ..rows[2]
        };
        let buttons = Paragraph::new(button_line(&view.buttons, focus)).alignment(Alignment::Center);
        frame.render_widget(buttons, buttons_area);
    }
}
