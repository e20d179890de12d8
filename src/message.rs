//! Conversation data model and bot-reply normalization
//!
//! The agent returns a loosely-shaped JSON array; nothing about it is
//! guaranteed. Normalization maps every item onto a closed set of renderable
//! message variants and never fails, so a malformed reply degrades to its
//! serialized form instead of being dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shown in place of a bot reply when the webhook call fails
pub const CONNECT_ERROR_TEXT: &str = "Error: Could not connect to the chatbot.";

/// Who authored a conversation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    User,
    Bot,
}

/// Renderable variants a bot reply can normalize into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Text,
    StepList,
}

/// A clickable reply option; activating it re-submits `payload` as if typed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageButton {
    pub title: String,
    pub payload: String,
}

/// One conversation entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub kind: MessageKind,
    pub text: String,
    /// Step-list heading; empty for plain text messages
    pub title: String,
    /// Ordered instructions; empty unless `kind == StepList`
    pub steps: Vec<String>,
    pub buttons: Vec<MessageButton>,
    /// True only on the transient placeholder shown while a request is in flight
    pub is_typing: bool,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            kind: MessageKind::Text,
            text: text.into(),
            title: String::new(),
            steps: Vec::new(),
            buttons: Vec::new(),
            is_typing: false,
        }
    }

    pub fn bot_text(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            kind: MessageKind::Text,
            text: text.into(),
            title: String::new(),
            steps: Vec::new(),
            buttons: Vec::new(),
            is_typing: false,
        }
    }

    /// The transient entry shown between a user message and the bot's reply
    pub fn typing() -> Self {
        Self {
            is_typing: true,
            ..Self::bot_text("")
        }
    }
}

/// An unvalidated reply item exactly as the agent sent it
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct RawReply(pub Value);

/// A reply after shape classification, before rendering
#[derive(Debug, Clone, PartialEq)]
enum ReplyShape {
    PlainText {
        text: String,
        buttons: Vec<MessageButton>,
    },
    StepList {
        title: String,
        steps: Vec<String>,
        buttons: Vec<MessageButton>,
    },
    ButtonsOnly {
        text: String,
        buttons: Vec<MessageButton>,
    },
    Unrecognized {
        payload: Value,
        buttons: Vec<MessageButton>,
    },
}

/// Map one HTTP response body onto conversation entries, preserving order.
/// Total: every input item yields exactly one non-typing bot message.
pub fn normalize_replies(replies: &[RawReply]) -> Vec<ChatMessage> {
    replies.iter().map(|r| classify(&r.0).into_message()).collect()
}

/// Classification precedence: unwrap `custom`, then text, step list,
/// buttons-only, and finally the serialized fallback. First match wins.
/// A non-string `type` is treated the same as a missing one.
fn classify(item: &Value) -> ReplyShape {
    let payload = match item.get("custom") {
        Some(custom) if !custom.is_null() => custom,
        _ => item,
    };

    let kind = payload.get("type").and_then(Value::as_str);
    let text = payload.get("text").and_then(Value::as_str);
    let buttons = parse_buttons(payload);

    match kind {
        Some("text") => ReplyShape::PlainText {
            text: text.unwrap_or_default().to_string(),
            buttons,
        },
        Some("step_list") => ReplyShape::StepList {
            title: string_field(payload, "title").trim().to_string(),
            steps: parse_steps(payload),
            buttons,
        },
        // An untyped reply only counts as plain text when it carries text
        None if text.is_some() => ReplyShape::PlainText {
            text: text.unwrap_or_default().to_string(),
            buttons,
        },
        _ => {
            if buttons.is_empty() {
                ReplyShape::Unrecognized {
                    payload: payload.clone(),
                    buttons,
                }
            } else {
                ReplyShape::ButtonsOnly {
                    text: text.unwrap_or_default().to_string(),
                    buttons,
                }
            }
        }
    }
}

impl ReplyShape {
    fn into_message(self) -> ChatMessage {
        match self {
            ReplyShape::PlainText { text, buttons } | ReplyShape::ButtonsOnly { text, buttons } => {
                ChatMessage {
                    buttons,
                    ..ChatMessage::bot_text(text)
                }
            }
            ReplyShape::StepList {
                title,
                steps,
                buttons,
            } => ChatMessage {
                sender: Sender::Bot,
                kind: MessageKind::StepList,
                text: String::new(),
                title,
                steps,
                buttons,
                is_typing: false,
            },
            ReplyShape::Unrecognized { payload, buttons } => ChatMessage {
                buttons,
                ..ChatMessage::bot_text(payload.to_string())
            },
        }
    }
}

fn string_field(payload: &Value, key: &str) -> String {
    payload
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn parse_buttons(payload: &Value) -> Vec<MessageButton> {
    let Some(entries) = payload.get("buttons").and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            entry.as_object().map(|obj| MessageButton {
                title: obj.get("title").and_then(Value::as_str).unwrap_or_default().to_string(),
                payload: obj.get("payload").and_then(Value::as_str).unwrap_or_default().to_string(),
            })
        })
        .collect()
}

fn parse_steps(payload: &Value) -> Vec<String> {
    let Some(entries) = payload.get("steps").and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .map(|step| match step.as_str() {
            Some(s) => s.to_string(),
            None => step.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalize_one(value: Value) -> ChatMessage {
        let out = normalize_replies(&[RawReply(value)]);
        assert_eq!(out.len(), 1);
        out.into_iter().next().unwrap()
    }

    #[test]
    fn test_plain_text_reply() {
        let msg = normalize_one(json!({"text": "hi", "buttons": []}));
        assert_eq!(msg.sender, Sender::Bot);
        assert_eq!(msg.kind, MessageKind::Text);
        assert_eq!(msg.text, "hi");
        assert!(msg.buttons.is_empty());
        assert!(!msg.is_typing);
    }

    #[test]
    fn test_text_with_explicit_type_and_buttons() {
        let msg = normalize_one(json!({
            "type": "text",
            "text": "Pick one",
            "buttons": [
                {"title": "Yes", "payload": "yes"},
                {"title": "No", "payload": "no"},
            ],
        }));
        assert_eq!(msg.kind, MessageKind::Text);
        assert_eq!(msg.text, "Pick one");
        assert_eq!(msg.buttons.len(), 2);
        assert_eq!(msg.buttons[0].title, "Yes");
        assert_eq!(msg.buttons[1].payload, "no");
    }

    #[test]
    fn test_custom_wrapped_step_list() {
        let msg = normalize_one(json!({
            "custom": {"type": "step_list", "title": " Steps ", "steps": ["a", "b"]},
        }));
        assert_eq!(msg.sender, Sender::Bot);
        assert_eq!(msg.kind, MessageKind::StepList);
        assert_eq!(msg.title, "Steps");
        assert_eq!(msg.steps, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(msg.text, "");
        assert!(!msg.is_typing);
    }

    #[test]
    fn test_step_list_missing_title_and_steps() {
        let msg = normalize_one(json!({"type": "step_list"}));
        assert_eq!(msg.kind, MessageKind::StepList);
        assert_eq!(msg.title, "");
        assert!(msg.steps.is_empty());
    }

    #[test]
    fn test_buttons_only_fallback() {
        let msg = normalize_one(json!({"buttons": [{"title": "Yes", "payload": "yes"}]}));
        assert_eq!(msg.kind, MessageKind::Text);
        assert_eq!(msg.text, "");
        assert_eq!(msg.buttons.len(), 1);
        assert_eq!(msg.buttons[0].title, "Yes");
        assert_eq!(msg.buttons[0].payload, "yes");
    }

    #[test]
    fn test_unknown_type_with_buttons_keeps_buttons() {
        let msg = normalize_one(json!({
            "type": "carousel",
            "buttons": [{"title": "More", "payload": "/more"}],
        }));
        assert_eq!(msg.kind, MessageKind::Text);
        assert_eq!(msg.buttons.len(), 1);
    }

    #[test]
    fn test_unrecognized_reply_serializes_payload() {
        let msg = normalize_one(json!({"foo": 1}));
        assert_eq!(msg.kind, MessageKind::Text);
        assert_eq!(msg.text, r#"{"foo":1}"#);
        assert!(msg.buttons.is_empty());
        assert!(!msg.is_typing);
    }

    #[test]
    fn test_non_object_reply_never_panics() {
        for value in [json!(null), json!(42), json!("loose string"), json!([1, 2])] {
            let msg = normalize_one(value.clone());
            assert_eq!(msg.sender, Sender::Bot);
            assert_eq!(msg.kind, MessageKind::Text);
            assert_eq!(msg.text, value.to_string());
        }
    }

    #[test]
    fn test_null_custom_falls_back_to_item() {
        let msg = normalize_one(json!({"custom": null, "text": "outer"}));
        assert_eq!(msg.text, "outer");
    }

    #[test]
    fn test_custom_wins_over_outer_fields() {
        let msg = normalize_one(json!({
            "text": "outer",
            "custom": {"text": "inner"},
        }));
        assert_eq!(msg.text, "inner");
    }

    #[test]
    fn test_malformed_button_entries_are_skipped() {
        let msg = normalize_one(json!({
            "text": "hi",
            "buttons": [{"title": "Ok", "payload": "ok"}, 5, "nope"],
        }));
        assert_eq!(msg.buttons.len(), 1);
        assert_eq!(msg.buttons[0].title, "Ok");
    }

    #[test]
    fn test_batch_preserves_order() {
        let out = normalize_replies(&[
            RawReply(json!({"text": "first"})),
            RawReply(json!({"type": "step_list", "title": "t", "steps": ["s"]})),
            RawReply(json!({"text": "last"})),
        ]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].text, "first");
        assert_eq!(out[1].kind, MessageKind::StepList);
        assert_eq!(out[2].text, "last");
    }
}
