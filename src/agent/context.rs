//! Message context builder for the tool loop.

use crate::types::*;
use tracing::debug;

/// Most recent client messages kept per request.
pub const HISTORY_WINDOW: usize = 20;

/// Build the full message list for the first inference call of a request.
pub fn build_messages(system_prompt: &str, conversation: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(conversation.len().min(HISTORY_WINDOW) + 1);
    messages.push(ChatMessage::system(system_prompt));

    let mut start = conversation.len().saturating_sub(HISTORY_WINDOW);
    // Never open the window on an assistant reply.
    while start < conversation.len() && conversation[start].role != ChatRole::User {
        start += 1;
    }
    if start == conversation.len() {
        start = conversation.len().saturating_sub(HISTORY_WINDOW);
    }
    messages.extend(conversation[start..].iter().cloned());

    debug!(
        "Context: {} of {} client messages",
        conversation.len() - start,
        conversation.len()
    );
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_comes_first() {
        let msgs = build_messages("sys", &[ChatMessage::user("hi")]);
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, ChatRole::System);
        assert_eq!(msgs[0].content, "sys");
        assert_eq!(msgs[1].content, "hi");
    }

    #[test]
    fn long_history_is_windowed_at_a_user_turn() {
        let conversation: Vec<ChatMessage> = (0..25)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user(format!("q{}", i))
                } else {
                    ChatMessage::assistant(format!("a{}", i))
                }
            })
            .collect();
        let msgs = build_messages("sys", &conversation);
        // Window starts at index 5 (assistant), moves to 6 (user).
        assert_eq!(msgs[1].content, "q6");
        assert_eq!(msgs.last().unwrap().content, "q24");
        assert_eq!(msgs.len(), 1 + 19);
    }
}
