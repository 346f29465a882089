//! Per-conversation tool catalog shared by the bundled advisors.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ChatRequest, DEFAULT_CONVERSATION_PREFIX};
use crate::tools::search::{IdleSweep, SearchEngine};
use crate::tools::{ToolCallback, ToolResolver, ToolSelection};

type CallbackCache = HashMap<String, Arc<dyn ToolCallback>>;

struct OpenConversation {
    callbacks: CallbackCache,
    last_used: Instant,
}

impl OpenConversation {
    fn is_idle(&self, max_idle: Duration) -> bool {
        self.last_used.elapsed() >= max_idle
    }
}

/// Indexes the host's tools per conversation and maps search hits back to
/// exposable tools.
///
/// The search session id is the conversation id. Conversations that never
/// reach their end hook can be reclaimed with [`sweep_idle`](Self::sweep_idle).
pub struct ConversationCatalog {
    engine: Arc<dyn SearchEngine>,
    resolver: Arc<dyn ToolResolver>,
    conversations: DashMap<String, OpenConversation>,
}

impl ConversationCatalog {
    pub fn new(engine: Arc<dyn SearchEngine>, resolver: Arc<dyn ToolResolver>) -> Self {
        Self {
            engine,
            resolver,
            conversations: DashMap::new(),
        }
    }

    pub fn engine(&self) -> &Arc<dyn SearchEngine> {
        &self.engine
    }

    /// Index every tool of `request.tools` under the conversation id, minting
    /// one if the request has none. Returns the conversation id.
    ///
    /// Any index left under the same id by an earlier conversation is cleared
    /// first.
    pub fn open(&self, request: &mut ChatRequest) -> crate::Result<String> {
        let conversation_id = request
            .conversation_id
            .get_or_insert_with(|| format!("{DEFAULT_CONVERSATION_PREFIX}{}", Uuid::new_v4()))
            .clone();

        self.engine.clear_index(&conversation_id)?;

        let definitions = self.resolver.resolve_definitions(&request.tools);
        let indexed = definitions.iter().try_for_each(|definition| {
            self.engine
                .index_tool(&conversation_id, &definition.to_reference())
        });
        if let Err(e) = indexed {
            // a minted id never reaches the end hooks
            if let Err(cleanup) = self.engine.clear_index(&conversation_id) {
                warn!(conversation_id = %conversation_id, error = %cleanup, "Dropping partial index failed");
            }
            return Err(e);
        }

        let callbacks: CallbackCache = request
            .tools
            .callbacks()
            .iter()
            .map(|c| (c.name().to_string(), Arc::clone(c)))
            .collect();
        self.conversations.insert(
            conversation_id.clone(),
            OpenConversation {
                callbacks,
                last_used: Instant::now(),
            },
        );

        info!(
            conversation_id = %conversation_id,
            engine = %self.engine.search_type(),
            indexed = definitions.len(),
            "Indexed tool catalog for conversation"
        );
        Ok(conversation_id)
    }

    /// Add each name to `selection`, as the cached callable when the host
    /// supplied one and as a bare name otherwise. Marks the conversation as
    /// used.
    pub fn select<I, S>(&self, conversation_id: &str, names: I, selection: &mut ToolSelection)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut open = self.conversations.get_mut(conversation_id);
        if let Some(conversation) = open.as_mut() {
            conversation.last_used = Instant::now();
        }
        for name in names {
            let name = name.as_ref();
            match open.as_ref().and_then(|c| c.callbacks.get(name)) {
                Some(callback) => {
                    selection.add_callback(Arc::clone(callback));
                }
                None => {
                    selection.add_name(name);
                }
            }
        }
    }

    /// Drop the conversation's index and callback cache. Idempotent.
    pub fn close(&self, conversation_id: &str) -> crate::Result<()> {
        self.conversations.remove(conversation_id);
        self.engine.clear_index(conversation_id)?;
        debug!(conversation_id, "Released conversation tool catalog");
        Ok(())
    }

    pub fn is_open(&self, conversation_id: &str) -> bool {
        self.conversations.contains_key(conversation_id)
    }

    pub fn open_conversations(&self) -> usize {
        self.conversations.len()
    }

    /// Close every conversation not opened or selected from within
    /// `max_idle`, dropping both its callback cache and its index.
    pub fn sweep_idle(&self, max_idle: Duration) -> crate::Result<usize> {
        let idle: Vec<String> = self
            .conversations
            .iter()
            .filter(|entry| entry.value().is_idle(max_idle))
            .map(|entry| entry.key().clone())
            .collect();

        let mut swept = 0;
        for conversation_id in idle {
            // re-checked under the entry lock; a select may have touched it
            if self
                .conversations
                .remove_if(&conversation_id, |_, open| open.is_idle(max_idle))
                .is_some()
            {
                self.engine.clear_index(&conversation_id)?;
                swept += 1;
            }
        }
        if swept > 0 {
            info!(swept, engine = %self.engine.search_type(), "Closed idle conversations");
        }
        Ok(swept)
    }
}

impl IdleSweep for ConversationCatalog {
    fn sweep(&self, max_idle: Duration) -> crate::Result<usize> {
        self.sweep_idle(max_idle)
    }
}
