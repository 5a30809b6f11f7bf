//! Prompt templates with `{identity}`, `{query}` and `{context}` placeholders.

use crate::types::ChatMessage;

const RAG_SYSTEM: &str = "{identity}

Give a comprehensive answer to the question using, but not limited to, the information in the context.
Respond only to the question asked, response should be concise and relevant to the question.
If the answer cannot be deduced from the context, say that the local database doesn't have relevant information, and provide an answer to the question using your own knowledge.";

const RAG_USER: &str = "Context:
{context}
---
Now here is the question you need to answer.

Question: {query}";

const PLAIN_SYSTEM: &str = "{identity}

Give a comprehensive answer to the question.
Respond only to the question asked, response should be concise and relevant to the question.";

const PLAIN_USER: &str = "Question: {query}";

/// A chat prompt: a system message and a user message, both templated.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    system: String,
    user: String,
}

impl PromptTemplate {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Template that grounds the answer in retrieved context.
    pub fn rag() -> Self {
        Self::new(RAG_SYSTEM, RAG_USER)
    }

    /// Identity-only template used when RAG is disabled.
    pub fn plain() -> Self {
        Self::new(PLAIN_SYSTEM, PLAIN_USER)
    }

    /// Fill the placeholders. `history` is inserted between the system and
    /// user messages, oldest first.
    pub fn render(&self, identity: &str, query: &str, context: &str, history: &[ChatMessage]) -> Vec<ChatMessage> {
        let fill = |template: &str| {
            template
                .replace("{identity}", identity)
                .replace("{context}", context)
                .replace("{query}", query)
        };

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::new("system", fill(&self.system)));
        messages.extend(history.iter().cloned());
        messages.push(ChatMessage::new("user", fill(&self.user)));
        messages
    }
}

/// Keep the last `lines` entries of a conversation.
pub fn recent_history(history: &[ChatMessage], lines: usize) -> &[ChatMessage] {
    &history[history.len().saturating_sub(lines)..]
}
