use anyhow::{Result, anyhow};
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;

use crate::bot::BotClient;
use crate::language::Language;
use crate::message::{
    normalize_replies, ChatMessage, MessageButton, RawReply, CONNECT_ERROR_TEXT,
};
use crate::speech::{transcript, SpeechEngine, SpeechEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Conversation state
    pub messages: Vec<ChatMessage>,
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations

    // Outgoing message state
    pub input: String,
    pub input_cursor: usize, // cursor position in input, in chars

    // In-flight webhook calls; overlapping sends are allowed, each owns
    // exactly one typing placeholder
    pub pending_sends: Vec<JoinHandle<Result<Vec<RawReply>>>>,

    // Voice input state
    pub is_listening: bool,
    pub has_sent: bool,
    speech: Option<Box<dyn SpeechEngine>>,
    pub language: Language,

    // Transient notification popup (speech errors, capability absence)
    pub notification: Option<String>,

    // Side panel and pickers
    pub show_side_panel: bool,
    pub show_language_picker: bool,
    pub language_picker_state: ListState,

    // Button focus on the most recent reply that carries buttons
    pub focused_button: Option<usize>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Panel areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
    pub input_area: Option<Rect>,

    // Backend
    pub client: BotClient,
}

impl App {
    pub fn new(
        client: BotClient,
        speech: Option<Box<dyn SpeechEngine>>,
        language: Language,
    ) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            messages: Vec::new(),
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            input: String::new(),
            input_cursor: 0,

            pending_sends: Vec::new(),

            is_listening: false,
            has_sent: false,
            speech,
            language,

            notification: None,

            show_side_panel: false,
            show_language_picker: false,
            language_picker_state: ListState::default(),

            focused_button: None,

            animation_frame: 0,

            chat_area: None,
            input_area: None,

            client,
        }
    }

    // --- Send pathway ---

    /// Step one of an exchange: validate the outgoing text, append the user
    /// message and one typing placeholder, clear the input. Returns the text
    /// to put on the wire, or None when the send was rejected.
    pub fn begin_send(&mut self) -> Option<String> {
        if self.input.trim().is_empty() {
            return None;
        }

        let outgoing = std::mem::take(&mut self.input);
        self.input_cursor = 0;

        self.messages.push(ChatMessage::user(outgoing.clone()));
        self.messages.push(ChatMessage::typing());
        self.has_sent = true;
        self.focused_button = None;
        self.scroll_chat_to_bottom();

        Some(outgoing)
    }

    /// Validate and dispatch the outgoing text on a background task
    pub fn dispatch_send(&mut self) {
        if let Some(outgoing) = self.begin_send() {
            self.spawn_send(outgoing);
        }
    }

    fn spawn_send(&mut self, outgoing: String) {
        let client = self.client.clone();
        self.pending_sends.push(tokio::spawn(async move {
            client.send_message(&outgoing).await
        }));
    }

    /// Completion of one exchange: drop that exchange's typing placeholder,
    /// then append either the normalized reply batch or the fixed error entry
    pub fn finish_send(&mut self, result: Result<Vec<RawReply>>) {
        if let Some(pos) = self.messages.iter().position(|m| m.is_typing) {
            self.messages.remove(pos);
        }

        match result {
            Ok(replies) => self.messages.extend(normalize_replies(&replies)),
            Err(_) => self.messages.push(ChatMessage::bot_text(CONNECT_ERROR_TEXT)),
        }

        self.focused_button = None;
        self.scroll_chat_to_bottom();
    }

    /// Reap finished webhook tasks and fold their results into the conversation
    pub async fn poll_pending_sends(&mut self) {
        let mut i = 0;
        while i < self.pending_sends.len() {
            if self.pending_sends[i].is_finished() {
                let handle = self.pending_sends.remove(i);
                let result = match handle.await {
                    Ok(result) => result,
                    Err(join_err) => Err(anyhow!("send task failed: {}", join_err)),
                };
                self.finish_send(result);
            } else {
                i += 1;
            }
        }
    }

    /// A button re-enters the send pathway with its payload as the outgoing
    /// text; it is the same mutation sequence as typing and submitting
    pub fn press_button(&mut self, payload: &str) -> Option<String> {
        self.input = payload.to_string();
        self.input_cursor = self.input.chars().count();
        self.begin_send()
    }

    pub fn dispatch_button(&mut self, payload: &str) {
        if let Some(outgoing) = self.press_button(payload) {
            self.spawn_send(outgoing);
        }
    }

    pub fn clear_messages(&mut self) {
        // has_sent stays set: the voice indicator keeps its post-first-send
        // look even after a clear
        self.messages.clear();
        self.chat_scroll = 0;
        self.focused_button = None;
    }

    pub fn awaiting_response(&self) -> bool {
        self.messages.iter().any(|m| m.is_typing)
    }

    // --- Voice input controller ---

    pub fn speech_available(&self) -> bool {
        self.speech.is_some()
    }

    /// idle -> listening -> idle, driven by the user's toggle
    pub fn toggle_voice(&mut self) {
        let Some(engine) = self.speech.as_mut() else {
            self.notification = Some(
                "Speech recognition is not available. Set speech_command in the config file."
                    .to_string(),
            );
            return;
        };

        if self.is_listening {
            engine.stop();
            self.is_listening = false;
        } else {
            match engine.start(self.language.bcp47_tag()) {
                Ok(()) => self.is_listening = true,
                Err(err) => {
                    self.notification = Some(format!("Speech recognition error: {}", err));
                }
            }
        }
    }

    pub fn on_speech_event(&mut self, event: SpeechEvent) {
        match event {
            SpeechEvent::Result { segments } => {
                // Each event overwrites the whole field with the best
                // hypothesis so far; it never appends across events
                self.input = transcript(&segments);
                self.input_cursor = self.input.chars().count();
            }
            SpeechEvent::End => {
                self.is_listening = false;
            }
            SpeechEvent::Error { code } => {
                self.is_listening = false;
                self.notification = Some(format!("Speech recognition error: {}", code));
            }
        }
    }

    pub fn dismiss_notification(&mut self) {
        self.notification = None;
    }

    // --- Language selection ---

    pub fn language_picker_nav_down(&mut self) {
        let len = Language::all().len();
        if len > 0 {
            let i = self.language_picker_state.selected().unwrap_or(0);
            self.language_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn language_picker_nav_up(&mut self) {
        let i = self.language_picker_state.selected().unwrap_or(0);
        self.language_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn open_language_picker(&mut self) {
        let current_idx = Language::all()
            .iter()
            .position(|l| *l == self.language)
            .unwrap_or(0);
        self.language_picker_state.select(Some(current_idx));
        self.show_language_picker = true;
    }

    pub fn select_language(&mut self) {
        if let Some(i) = self.language_picker_state.selected() {
            if let Some(&language) = Language::all().get(i) {
                self.language = language;
                self.show_language_picker = false;
                // Save to config
                let _ = crate::config::Config::save_language(language.as_str());
            }
        }
    }

    // --- Button focus ---

    /// Buttons of the most recent reply that carries any; older buttons are
    /// still rendered but only the newest set is keyboard-reachable
    pub fn active_buttons(&self) -> Option<&[MessageButton]> {
        self.messages
            .iter()
            .rev()
            .find(|m| !m.buttons.is_empty())
            .map(|m| m.buttons.as_slice())
    }

    pub fn focus_next_button(&mut self) {
        if let Some(buttons) = self.active_buttons() {
            let len = buttons.len();
            self.focused_button = Some(match self.focused_button {
                Some(i) => (i + 1) % len,
                None => 0,
            });
        }
    }

    pub fn focus_prev_button(&mut self) {
        if let Some(buttons) = self.active_buttons() {
            let len = buttons.len();
            self.focused_button = Some(match self.focused_button {
                Some(i) => (i + len - 1) % len,
                None => len - 1,
            });
        }
    }

    pub fn focused_payload(&self) -> Option<String> {
        let buttons = self.active_buttons()?;
        let i = self.focused_button?;
        buttons.get(i).map(|b| b.payload.clone())
    }

    // --- Scrolling ---

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    /// Keep the newest entry visible; called on every conversation mutation
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in &self.messages {
            total_lines += 1; // Sender label line ("You:" or "Bot:")

            if msg.is_typing {
                total_lines += 1; // Animated ellipsis line
            } else {
                if !msg.title.is_empty() {
                    total_lines += 1;
                }
                for line in msg.text.lines() {
                    // Use character count, not byte length, for proper UTF-8 handling
                    let char_count = line.chars().count();
                    if char_count == 0 {
                        total_lines += 1; // Empty line still takes one line
                    } else {
                        total_lines += ((char_count / wrap_width) + 1) as u16;
                    }
                }
                total_lines += msg.steps.len() as u16;
                if !msg.buttons.is_empty() {
                    total_lines += 1; // Button row
                }
            }
            total_lines += 1; // Blank line after message
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        } else {
            self.chat_scroll = 0;
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.awaiting_response() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageKind, Sender};
    use crate::speech::fake::FakeEngine;
    use serde_json::json;

    fn test_app() -> App {
        App::new(
            BotClient::new("http://localhost:5005/webhooks/rest/webhook"),
            None,
            Language::English,
        )
    }

    fn test_app_with_speech() -> App {
        App::new(
            BotClient::new("http://localhost:5005/webhooks/rest/webhook"),
            Some(Box::new(FakeEngine::new())),
            Language::Spanish,
        )
    }

    #[test]
    fn test_begin_send_appends_user_then_placeholder() {
        let mut app = test_app();
        app.input = "hello".to_string();

        let outgoing = app.begin_send();

        assert_eq!(outgoing.as_deref(), Some("hello"));
        assert_eq!(app.messages.len(), 2);
        assert_eq!(app.messages[0].sender, Sender::User);
        assert_eq!(app.messages[0].text, "hello");
        assert!(!app.messages[0].is_typing);
        assert!(app.messages[1].is_typing);
        assert_eq!(app.input, "");
        assert!(app.has_sent);
    }

    #[test]
    fn test_whitespace_send_is_a_no_op() {
        let mut app = test_app();
        for text in ["", "   ", "\t\n"] {
            app.input = text.to_string();
            assert!(app.begin_send().is_none());
            assert!(app.messages.is_empty());
        }
        assert!(!app.has_sent);
    }

    #[test]
    fn test_finish_send_success_removes_placeholder_once() {
        let mut app = test_app();
        app.input = "hi".to_string();
        app.begin_send();

        app.finish_send(Ok(vec![
            RawReply(json!({"text": "hey"})),
            RawReply(json!({"text": "what can I do?"})),
        ]));

        assert_eq!(app.messages.len(), 3);
        assert!(app.messages.iter().all(|m| !m.is_typing));
        assert_eq!(app.messages[1].text, "hey");
        assert_eq!(app.messages[2].text, "what can I do?");
    }

    #[test]
    fn test_finish_send_failure_appends_fixed_error() {
        let mut app = test_app();
        app.input = "hi".to_string();
        app.begin_send();

        app.finish_send(Err(anyhow!("connection refused")));

        assert_eq!(app.messages.len(), 2);
        assert!(!app.awaiting_response());
        assert_eq!(app.messages[1].sender, Sender::Bot);
        assert_eq!(app.messages[1].text, CONNECT_ERROR_TEXT);
    }

    #[test]
    fn test_empty_reply_batch_leaves_only_user_message() {
        let mut app = test_app();
        app.input = "hi".to_string();
        app.begin_send();

        app.finish_send(Ok(vec![]));

        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.messages[0].sender, Sender::User);
    }

    #[test]
    fn test_overlapping_sends_balance_placeholders() {
        let mut app = test_app();
        app.input = "first".to_string();
        app.begin_send();
        app.input = "second".to_string();
        app.begin_send();

        assert_eq!(app.messages.iter().filter(|m| m.is_typing).count(), 2);

        app.finish_send(Ok(vec![RawReply(json!({"text": "one"}))]));
        assert_eq!(app.messages.iter().filter(|m| m.is_typing).count(), 1);

        app.finish_send(Ok(vec![RawReply(json!({"text": "two"}))]));
        assert_eq!(app.messages.iter().filter(|m| m.is_typing).count(), 0);
    }

    #[test]
    fn test_button_press_equals_typed_submission() {
        let mut typed = test_app();
        typed.input = "/affirm".to_string();
        typed.begin_send();

        let mut pressed = test_app();
        pressed.press_button("/affirm");

        assert_eq!(typed.messages, pressed.messages);
        assert_eq!(pressed.input, "");
    }

    #[test]
    fn test_clear_messages_empties_conversation_but_keeps_has_sent() {
        let mut app = test_app();
        app.input = "hi".to_string();
        app.begin_send();
        app.finish_send(Ok(vec![RawReply(json!({"text": "hey"}))]));

        app.clear_messages();

        assert!(app.messages.is_empty());
        assert!(app.has_sent);
    }

    #[test]
    fn test_voice_toggle_without_engine_notifies_and_stays_idle() {
        let mut app = test_app();
        app.toggle_voice();
        assert!(!app.is_listening);
        assert!(app.notification.is_some());
    }

    #[test]
    fn test_voice_toggle_starts_with_selected_language_tag() {
        let engine = FakeEngine::new();
        let calls = engine.call_log();
        let mut app = App::new(
            BotClient::new("http://localhost:5005/webhooks/rest/webhook"),
            Some(Box::new(engine)),
            Language::Spanish,
        );

        app.toggle_voice();
        assert!(app.is_listening);

        app.toggle_voice();
        assert!(!app.is_listening);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.as_slice(), ["start es-ES", "stop"]);
    }

    #[test]
    fn test_speech_result_overwrites_input() {
        let mut app = test_app_with_speech();
        app.input = "typed before".to_string();
        app.toggle_voice();

        app.on_speech_event(SpeechEvent::Result {
            segments: vec![vec!["hel".to_string(), "hello".to_string()]],
        });
        assert_eq!(app.input, "hel");

        app.on_speech_event(SpeechEvent::Result {
            segments: vec![vec!["hello world".to_string()]],
        });
        assert_eq!(app.input, "hello world");
        assert_eq!(app.input_cursor, "hello world".chars().count());
    }

    #[test]
    fn test_speech_end_resets_listening() {
        let mut app = test_app_with_speech();
        app.toggle_voice();
        assert!(app.is_listening);

        app.on_speech_event(SpeechEvent::End);
        assert!(!app.is_listening);
        assert!(app.notification.is_none());
    }

    #[test]
    fn test_speech_error_notifies_with_verbatim_code() {
        let mut app = test_app_with_speech();
        app.toggle_voice();

        app.on_speech_event(SpeechEvent::Error {
            code: "no-speech".to_string(),
        });
        assert!(!app.is_listening);
        assert_eq!(
            app.notification.as_deref(),
            Some("Speech recognition error: no-speech")
        );

        app.dismiss_notification();
        assert!(app.notification.is_none());
    }

    #[test]
    fn test_failed_engine_start_stays_idle_with_notification() {
        let mut engine = FakeEngine::new();
        engine.fail_start = true;
        let mut app = App::new(
            BotClient::new("http://localhost:5005/webhooks/rest/webhook"),
            Some(Box::new(engine)),
            Language::English,
        );

        app.toggle_voice();
        assert!(!app.is_listening);
        assert!(app.notification.unwrap().contains("no capture device"));
    }

    #[test]
    fn test_button_focus_cycles_latest_buttons() {
        let mut app = test_app();
        app.input = "hi".to_string();
        app.begin_send();
        app.finish_send(Ok(vec![RawReply(json!({
            "text": "Pick",
            "buttons": [
                {"title": "Yes", "payload": "/affirm"},
                {"title": "No", "payload": "/deny"},
            ],
        }))]));

        app.focus_next_button();
        assert_eq!(app.focused_payload().as_deref(), Some("/affirm"));
        app.focus_next_button();
        assert_eq!(app.focused_payload().as_deref(), Some("/deny"));
        app.focus_next_button();
        assert_eq!(app.focused_payload().as_deref(), Some("/affirm"));
        app.focus_prev_button();
        assert_eq!(app.focused_payload().as_deref(), Some("/deny"));
    }

    #[test]
    fn test_step_list_reply_normalizes_through_send_pathway() {
        let mut app = test_app();
        app.input = "how do I reset?".to_string();
        app.begin_send();
        app.finish_send(Ok(vec![RawReply(json!({
            "custom": {"type": "step_list", "title": " Reset steps ", "steps": ["a", "b"]},
        }))]));

        let reply = &app.messages[1];
        assert_eq!(reply.kind, MessageKind::StepList);
        assert_eq!(reply.title, "Reset steps");
        assert_eq!(reply.steps.len(), 2);
    }
}
