//! Rendering for the terminal UI.

use chrono::Local;
use parley_core::chat::types::{Conversation, Sender};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Wrap};
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

use crate::app::{short_id, App, Mode};
use crate::markdown;

const SIDEBAR_WIDTH: u16 = 32;

/// Draw one frame of the UI.
pub fn draw(frame: &mut Frame, app: &App) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(1)])
        .split(frame.area());

    let main = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)])
        .split(outer[0]);

    draw_sidebar(frame, app, main[0]);

    match app.mode {
        Mode::Connect => draw_connect_form(frame, app, main[1]),
        Mode::Chat | Mode::Rename => draw_conversation(frame, app, main[1]),
    }

    draw_status_line(frame, app, outer[1]);
}

fn draw_sidebar(frame: &mut Frame, app: &App, area: Rect) {
    let active_id = app.router.store().active_id();

    let items: Vec<ListItem> = app
        .router
        .store()
        .conversations()
        .iter()
        .map(|conversation| {
            let connected = app.router.is_connected(&conversation.peer_id);
            let marker = if connected { "\u{25cf} " } else { "\u{25cb} " };
            let marker_style = if connected {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::DarkGray)
            };

            let mut title_style = Style::default();
            if Some(&conversation.id) == active_id {
                title_style = title_style.add_modifier(Modifier::BOLD).fg(Color::Cyan);
            }

            ListItem::new(Line::from(vec![
                Span::styled(marker, marker_style),
                Span::styled(sidebar_title(conversation), title_style),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", short_id(app.router.local_id())));
    frame.render_widget(List::new(items).block(block), area);
}

fn sidebar_title(conversation: &Conversation) -> String {
    if conversation.title.is_empty() {
        format!("({})", short_id(&conversation.peer_id))
    } else {
        conversation.title.clone()
    }
}

fn draw_connect_form(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" Connect ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = vec![
        Line::from(Span::styled(
            "Your peer id (share it to be reached):",
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(app.router.local_id().to_string()),
        Line::default(),
        Line::from(Span::styled(
            "Peer id to connect to:",
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(vec![
            Span::raw("> "),
            Span::styled(
                app.connect_input.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ]),
    ];

    if let Some(target) = &app.dialing {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            format!("connecting to {}...", short_id(target)),
            Style::default().fg(Color::Yellow),
        )));
    }

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);

    // Cursor at the end of the target input.
    if inner.height > 4 {
        let x = inner.x + 2 + app.connect_input.width() as u16;
        frame.set_cursor_position((x.min(inner.right().saturating_sub(1)), inner.y + 4));
    }
}

fn draw_conversation(frame: &mut Frame, app: &App, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(area);

    draw_messages(frame, app, rows[0]);
    draw_input(frame, app, rows[1]);
}

fn draw_messages(frame: &mut Frame, app: &App, area: Rect) {
    let Some(conversation) = app.router.active_conversation() else {
        return;
    };

    let connected = app.router.is_connected(&conversation.peer_id);
    let title = if connected {
        format!(" {} ", sidebar_title(conversation))
    } else {
        format!(" {} (disconnected) ", sidebar_title(conversation))
    };
    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines: Vec<Line> = Vec::new();
    for message in &conversation.messages {
        let (label, color) = match message.sender {
            Sender::You => (Sender::You.as_str(), Color::Cyan),
            Sender::Remote => (Sender::Remote.as_str(), Color::Green),
        };
        let stamp = message
            .sent_at
            .with_timezone(&Local)
            .format("%H:%M")
            .to_string();
        lines.push(Line::from(vec![
            Span::styled(
                label,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("  {}", stamp), Style::default().fg(Color::DarkGray)),
        ]));
        lines.extend(markdown::render_lines(&message.content));
        lines.push(Line::default());
    }

    // Pin the view to the newest message.
    let scroll = (lines.len() as u16).saturating_sub(inner.height);
    frame.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0)),
        inner,
    );
}

fn draw_input(frame: &mut Frame, app: &App, area: Rect) {
    let (title, buffer) = match app.mode {
        Mode::Rename => (" Rename ", &app.rename_input),
        _ => (" Message (Markdown) ", &app.compose_input),
    };

    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Show the tail when the buffer is wider than the box.
    let width = inner.width.saturating_sub(1) as usize;
    let visible: String = if buffer.width() > width {
        let mut s = buffer.clone();
        while s.width() > width {
            s.remove(0);
        }
        s
    } else {
        buffer.clone()
    };

    frame.render_widget(Paragraph::new(visible.clone()), inner);
    frame.set_cursor_position((inner.x + visible.width() as u16, inner.y));
}

fn draw_status_line(frame: &mut Frame, app: &App, area: Rect) {
    let line = match &app.notice {
        Some((text, _)) => Line::from(Span::styled(
            format!(" {} ", text),
            Style::default().fg(Color::White).bg(Color::Red),
        )),
        None => Line::from(Span::styled(
            " Tab: switch  Ctrl+N: new  Ctrl+R: rename  Ctrl+D: delete  Ctrl+C: quit ",
            Style::default().fg(Color::DarkGray),
        )),
    };
    frame.render_widget(Paragraph::new(line), area);
}
