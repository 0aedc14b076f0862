//! NPC chat awareness and the external response generator interface.

use std::collections::VecDeque;

use async_trait::async_trait;
use nocturne_protocol::types::CompanionId;
use nocturne_store::Companion;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// How far back an NPC remembers conversation.
pub const NPC_CONTEXT_WINDOW_MS: i64 = 300_000;
/// And how many messages at most.
pub const NPC_CONTEXT_MAX_MESSAGES: usize = 20;

/// One remembered line of nearby conversation.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatMemory {
    pub from: String,
    pub message: String,
    pub at: i64,
}

/// The LLM-backed response generator lives outside this repository; zone
/// servers only see this interface.
#[async_trait]
pub trait NpcResponder: Send + Sync + 'static {
    /// Produce a spoken reply for `companion`, or `None` to stay quiet.
    async fn respond(&self, companion: &Companion, heard: &[ChatMemory]) -> Option<String>;
}

/// The default responder: NPCs listen but never speak.
pub struct SilentResponder;

#[async_trait]
impl NpcResponder for SilentResponder {
    async fn respond(&self, _companion: &Companion, _heard: &[ChatMemory]) -> Option<String> {
        None
    }
}

/// Tracks per-companion chat context and consults the responder.
pub struct NpcController {
    responder: Arc<dyn NpcResponder>,
    contexts: FxHashMap<CompanionId, VecDeque<ChatMemory>>,
}

impl NpcController {
    pub fn new(responder: Arc<dyn NpcResponder>) -> Self {
        Self {
            responder,
            contexts: FxHashMap::default(),
        }
    }

    /// Records a line of chat a companion overheard.
    pub fn observe(
        &mut self,
        companion_id: &CompanionId,
        from: impl Into<String>,
        message: impl Into<String>,
        now: i64,
    ) {
        let context = self.contexts.entry(companion_id.clone()).or_default();

        context.push_back(ChatMemory {
            from: from.into(),
            message: message.into(),
            at: now,
        });

        while context.len() > NPC_CONTEXT_MAX_MESSAGES {
            context.pop_front();
        }

        while context
            .front()
            .is_some_and(|memory| now - memory.at > NPC_CONTEXT_WINDOW_MS)
        {
            context.pop_front();
        }
    }

    /// The companion's current context window, oldest first.
    pub fn context(&self, companion_id: &CompanionId, now: i64) -> Vec<ChatMemory> {
        self.contexts
            .get(companion_id)
            .map(|context| {
                context
                    .iter()
                    .filter(|memory| now - memory.at <= NPC_CONTEXT_WINDOW_MS)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Asks the responder for a reply given everything the companion has
    /// heard recently.
    pub async fn respond(&self, companion: &Companion, now: i64) -> Option<String> {
        let heard = self.context(&companion.id, now);

        if heard.is_empty() {
            return None;
        }

        self.responder.respond(companion, &heard).await
    }

    pub fn forget(&mut self, companion_id: &CompanionId) {
        self.contexts.remove(companion_id);
    }
}
