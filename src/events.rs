// src/events.rs
// Event Stream Bridge: converts the internal agent Event union into the
// canonical outbound wire frames. Grounded on mira-chat/src/server.rs's
// `ChatEvent` enum (externally-tagged, one rename per variant) but
// constrained to exactly the four frame shapes spec.md §6 defines for
// `/chat/stream` — `tool_result` and individual `text` deltas are not
// wire frames; they only feed the accumulated buffer a `complete` frame
// carries.

use serde::Serialize;
use serde_json::Value;

use crate::agents::runtime::Event;

const MAX_ARGS_SHOWN: usize = 3;
const MAX_ARG_REPR_CHARS: usize = 30;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ChatEvent {
    #[serde(rename = "status")]
    Status { message: String },
    #[serde(rename = "tool_call")]
    ToolCall {
        message: String,
        tool_name: String,
        args: Value,
    },
    #[serde(rename = "error")]
    Error { message: String },
    #[serde(rename = "complete")]
    Complete {
        response: String,
        user_id: String,
        session_id: String,
    },
}

impl ChatEvent {
    pub fn complete(response: String, user_id: String, session_id: String) -> Self {
        ChatEvent::Complete {
            response,
            user_id,
            session_id,
        }
    }
}

/// Formats a tool call as `🔧 Calling: name(arg1=repr1, arg2=repr2, ...)`,
/// showing at most 3 arguments, each value representation truncated to 30
/// characters.
pub fn format_tool_call(name: &str, args: &Value) -> String {
    let mut parts = Vec::new();
    if let Value::Object(map) = args {
        for (key, value) in map.iter().take(MAX_ARGS_SHOWN) {
            let repr = truncate(&compact_repr(value), MAX_ARG_REPR_CHARS);
            parts.push(format!("{key}={repr}"));
        }
    }
    format!("🔧 Calling: {name}({})", parts.join(", "))
}

fn compact_repr(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{head}...")
    }
}

/// Bridges one internal `Event` to zero-or-one outbound `ChatEvent`s.
/// `Text` deltas and `ToolResult` payloads are folded into `accumulated`
/// rather than forwarded — per spec.md §6 the only frame types on the
/// wire are `status`, `tool_call`, `error`, `complete`. The caller builds
/// the `complete` frame itself once the stream ends, since only it knows
/// the request's `user_id`/`session_id`.
pub fn bridge(event: Event, accumulated: &mut String) -> Option<ChatEvent> {
    match event {
        Event::Status(message) => Some(ChatEvent::Status { message }),
        Event::ToolCall { name, args } => {
            let message = format_tool_call(&name, &args);
            Some(ChatEvent::ToolCall {
                message,
                tool_name: name,
                args,
            })
        }
        Event::ToolResult { .. } => None,
        Event::Text(delta) => {
            accumulated.push_str(&delta);
            None
        }
        Event::Error(message) => Some(ChatEvent::Error { message }),
        Event::Final { text } => {
            *accumulated = text;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_call_format_caps_args_and_truncates_reprs() {
        let args = serde_json::json!({
            "a": "x".repeat(40),
            "b": 2,
            "c": "three",
            "d": "dropped because only three are shown",
        });
        let rendered = format_tool_call("jenkins::build", &args);
        assert!(rendered.starts_with("🔧 Calling: jenkins::build("));
        assert_eq!(rendered.matches('=').count(), 3);
        assert!(rendered.contains("..."));
    }

    #[test]
    fn tool_call_event_carries_both_message_and_raw_fields() {
        let mut accumulated = String::new();
        let args = serde_json::json!({"job": "nightly-build"});
        let chat_event = bridge(
            Event::ToolCall {
                name: "jenkins::build".to_string(),
                args: args.clone(),
            },
            &mut accumulated,
        )
        .unwrap();
        match chat_event {
            ChatEvent::ToolCall { message, tool_name, args: carried } => {
                assert!(message.contains("jenkins::build"));
                assert_eq!(tool_name, "jenkins::build");
                assert_eq!(carried, args);
            }
            other => panic!("expected ToolCall, got {other:?}"),
        }
    }

    #[test]
    fn final_event_is_not_forwarded_but_overwrites_accumulated() {
        let mut accumulated = "partial".to_string();
        let frame = bridge(Event::Final { text: "done".to_string() }, &mut accumulated);
        assert!(frame.is_none());
        assert_eq!(accumulated, "done");
    }

    #[test]
    fn text_event_accumulates_without_forwarding() {
        let mut accumulated = String::new();
        assert!(bridge(Event::Text("hel".to_string()), &mut accumulated).is_none());
        assert!(bridge(Event::Text("lo".to_string()), &mut accumulated).is_none());
        assert_eq!(accumulated, "hello");
    }

    #[test]
    fn tool_result_is_not_forwarded() {
        let mut accumulated = String::new();
        let frame = bridge(
            Event::ToolResult {
                name: "jenkins::build".to_string(),
                output: "queued".to_string(),
            },
            &mut accumulated,
        );
        assert!(frame.is_none());
    }
}
