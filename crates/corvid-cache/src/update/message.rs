use corvid_core::events::{MessageCreate, MessageDelete, MessageDeleteBulk, MessageUpdate};

use super::UpdateCache;
use crate::cache::InMemoryCache;
use crate::config::ResourceType;

impl UpdateCache for MessageCreate {
    fn update(&mut self, cache: &InMemoryCache) {
        let mut state = cache.write();
        if cache.wants(ResourceType::MESSAGE) {
            state.push_message(self.message.clone(), cache.config().max_messages_per_channel);
        } else if let Some(channel) = state.channel_mut(self.message.channel_id) {
            channel.last_message_id = Some(self.message.id);
        }
    }
}

impl UpdateCache for MessageUpdate {
    /// Uncached messages stay uncached; the event goes out with no `before`
    fn update(&mut self, cache: &InMemoryCache) {
        if !cache.wants(ResourceType::MESSAGE) {
            return;
        }
        self.before = cache
            .write()
            .messages
            .get_mut(&self.update.channel_id)
            .and_then(|ring| ring.update(&self.update));
    }
}

impl UpdateCache for MessageDelete {
    fn update(&mut self, cache: &InMemoryCache) {
        self.before = cache
            .write()
            .messages
            .get_mut(&self.channel_id)
            .and_then(|ring| ring.remove(self.id));
    }
}

impl UpdateCache for MessageDeleteBulk {
    fn update(&mut self, cache: &InMemoryCache) {
        let mut state = cache.write();
        let Some(ring) = state.messages.get_mut(&self.channel_id) else {
            return;
        };
        self.before = self.ids.iter().filter_map(|id| ring.remove(*id)).collect();
    }
}
