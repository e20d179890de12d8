use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use crate::app::{App, InputMode};
use crate::language::Language;
use crate::message::{MessageKind, Sender};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    // Collapsible side panel on the left of the chat column
    if app.show_side_panel {
        let [panel_area, chat_column] = Layout::horizontal([
            Constraint::Length(30),
            Constraint::Min(0),
        ])
        .areas(body_area);
        render_side_panel(app, frame, panel_area);
        render_chat_column(app, frame, chat_column);
    } else {
        render_chat_column(app, frame, body_area);
    }

    render_footer(app, frame, footer_area);

    // Popups (in order of priority)
    if app.notification.is_some() {
        render_notification(app, frame, area);
    } else if app.show_language_picker {
        render_language_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let voice_indicator = if app.is_listening {
        Span::styled(" ● listening ", Style::default().fg(Color::Red).bold())
    } else if !app.speech_available() {
        Span::styled(" mic off ", Style::default().fg(Color::DarkGray))
    } else if app.has_sent {
        Span::styled(" mic ", Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(" mic ", Style::default().fg(Color::White))
    };

    let title = Line::from(vec![
        Span::styled(" Chatbot ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("[{}]", app.language.as_str()),
            Style::default().fg(Color::Gray),
        ),
        Span::raw(" "),
        voice_indicator,
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " INSERT ",
    };

    let hints = match app.input_mode {
        InputMode::Editing => " Enter send | Ctrl+R voice | Ctrl+T language | Ctrl+L clear | Ctrl+B panel | Esc normal",
        InputMode::Normal => " i insert | Tab buttons | Enter press button | v voice | l language | c clear | b panel | q quit",
    };

    let footer = Line::from(vec![
        Span::styled(mode_text, mode_style),
        Span::styled(hints, Style::default().fg(Color::DarkGray)),
    ]);

    frame.render_widget(Paragraph::new(footer), area);
}

fn render_chat_column(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    render_conversation(app, frame, chat_area);
    render_input(app, frame, input_area);
}

fn render_conversation(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store area for mouse hit-testing and scroll calculations
    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Conversation ");

    if app.messages.is_empty() {
        let placeholder = Paragraph::new("Say something to the assistant...")
            .style(Style::default().fg(Color::DarkGray))
            .block(chat_block);
        frame.render_widget(placeholder, area);
        return;
    }

    // The newest reply with buttons is the keyboard-reachable one
    let active_idx = app.messages.iter().rposition(|m| !m.buttons.is_empty());

    let mut lines: Vec<Line> = Vec::new();
    for (idx, msg) in app.messages.iter().enumerate() {
        match msg.sender {
            Sender::User => {
                lines.push(Line::from(Span::styled(
                    "You:",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
            }
            Sender::Bot => {
                lines.push(Line::from(Span::styled(
                    "Bot:",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )));
            }
        }

        if msg.is_typing {
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Typing{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
            lines.push(Line::default());
            continue;
        }

        match msg.kind {
            MessageKind::Text => {
                for line in msg.text.lines() {
                    lines.push(Line::from(line.to_string()));
                }
            }
            MessageKind::StepList => {
                if !msg.title.is_empty() {
                    lines.push(Line::from(Span::styled(
                        msg.title.clone(),
                        Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
                    )));
                }
                for (step_no, step) in msg.steps.iter().enumerate() {
                    lines.push(Line::from(format!("  {}. {}", step_no + 1, step)));
                }
            }
        }

        if !msg.buttons.is_empty() {
            lines.push(button_row(app, idx, active_idx));
        }

        lines.push(Line::default());
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn button_row(app: &App, msg_idx: usize, active_idx: Option<usize>) -> Line<'static> {
    let mut spans: Vec<Span> = Vec::new();

    for (btn_idx, button) in app.messages[msg_idx].buttons.iter().enumerate() {
        let focused = active_idx == Some(msg_idx) && app.focused_button == Some(btn_idx);
        let style = if focused {
            Style::default()
                .bg(Color::Magenta)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Magenta)
        };
        spans.push(Span::styled(format!("[ {} ]", button.title), style));
        spans.push(Span::raw(" "));
    }

    Line::from(spans)
}

fn render_input(app: &mut App, frame: &mut Frame, area: Rect) {
    app.input_area = Some(area);

    let input_border_color = if app.input_mode == InputMode::Editing {
        Color::Yellow
    } else {
        Color::DarkGray
    };

    let title = if app.is_listening {
        " Message (listening...) "
    } else {
        " Message "
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    // Get the visible slice of the input
    let visible_text: String = app.input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    // Show cursor when editing
    if app.input_mode == InputMode::Editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((
            area.x + cursor_x + 1,
            area.y + 1,
        ));
    }
}

fn render_side_panel(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Assistant ");

    let speech_line = if app.speech_available() {
        Line::from(vec![
            Span::raw("Voice input: "),
            Span::styled("available", Style::default().fg(Color::Green)),
        ])
    } else {
        Line::from(vec![
            Span::raw("Voice input: "),
            Span::styled("not available", Style::default().fg(Color::Red)),
        ])
    };

    let lines = vec![
        Line::from(Span::styled("Endpoint", Style::default().fg(Color::Yellow).bold())),
        Line::from(app.client.webhook_url().to_string()),
        Line::default(),
        Line::from(Span::styled("Language", Style::default().fg(Color::Yellow).bold())),
        Line::from(app.language.display_name()),
        Line::default(),
        speech_line,
        Line::default(),
        Line::from(Span::styled("Messages", Style::default().fg(Color::Yellow).bold())),
        Line::from(format!("{} in conversation", app.messages.len())),
    ];

    let panel = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: true });

    frame.render_widget(panel, area);
}

fn render_language_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let languages = Language::all();

    // Calculate popup size and position (centered)
    let popup_width = 30.min(area.width.saturating_sub(4));
    let popup_height = (languages.len() as u16 + 2).min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    let items: Vec<ListItem> = languages
        .iter()
        .map(|l| ListItem::new(format!(" {} ", l.display_name())))
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Language "),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Cyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_widget(Clear, popup_area);
    frame.render_stateful_widget(list, popup_area, &mut app.language_picker_state);
}

fn render_notification(app: &App, frame: &mut Frame, area: Rect) {
    let Some(text) = app.notification.as_deref() else {
        return;
    };

    let popup_width = 50.min(area.width.saturating_sub(4));
    // Rough wrap estimate plus borders and the dismiss hint
    let text_lines = (text.chars().count() as u16 / popup_width.saturating_sub(2).max(1)) + 1;
    let popup_height = (text_lines + 4).min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    let body = Text::from(vec![
        Line::from(text.to_string()),
        Line::default(),
        Line::from(Span::styled(
            "Press Esc to dismiss",
            Style::default().fg(Color::DarkGray),
        )),
    ]);

    let popup = Paragraph::new(body)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red))
                .title(" Notice "),
        )
        .wrap(Wrap { trim: true });

    frame.render_widget(Clear, popup_area);
    frame.render_widget(popup, popup_area);
}
