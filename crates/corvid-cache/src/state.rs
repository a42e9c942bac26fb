//! Cache storage
//!
//! Entities are stored by ID. Members keep only their user's ID; the user
//! itself lives once in `users` and is shared by every guild membership.

use corvid_core::{
    Channel, Emoji, Guild, Member, Message, Presence, Role, Snowflake, User, VoiceState,
};
use std::collections::{HashMap, HashSet};

use crate::ring::MessageRing;

/// One guild and everything it owns
#[derive(Debug, Clone)]
pub(crate) struct CachedGuild {
    /// Scalar fields; the collections on this value are always empty
    pub guild: Guild,
    pub channels: HashMap<Snowflake, Channel>,
    pub threads: HashMap<Snowflake, Channel>,
    pub roles: HashMap<Snowflake, Role>,
    pub emojis: Vec<Emoji>,
    /// Keyed by user ID, `user` stripped
    pub members: HashMap<Snowflake, Member>,
    pub voice_states: HashMap<Snowflake, VoiceState>,
    pub presences: HashMap<Snowflake, Presence>,
}

impl CachedGuild {
    pub fn new(mut guild: Guild) -> Self {
        guild.channels.clear();
        guild.threads.clear();
        guild.roles.clear();
        guild.emojis.clear();
        guild.members.clear();
        guild.voice_states.clear();
        guild.presences.clear();
        Self {
            guild,
            channels: HashMap::new(),
            threads: HashMap::new(),
            roles: HashMap::new(),
            emojis: Vec::new(),
            members: HashMap::new(),
            voice_states: HashMap::new(),
            presences: HashMap::new(),
        }
    }

    /// Placeholder for a guild known only from READY or an outage
    pub fn unavailable(id: Snowflake) -> Self {
        let mut guild = Guild::new(id, String::new(), Snowflake::default());
        guild.unavailable = true;
        Self::new(guild)
    }
}

#[derive(Debug, Default)]
pub(crate) struct CacheState {
    pub current_user: Option<User>,
    pub guilds: HashMap<Snowflake, CachedGuild>,
    /// Guild channel or thread ID to owning guild
    pub channel_guild: HashMap<Snowflake, Snowflake>,
    /// DM and group DM channels
    pub private_channels: HashMap<Snowflake, Channel>,
    pub messages: HashMap<Snowflake, MessageRing>,
    pub users: HashMap<Snowflake, User>,
    /// Guilds each cached user is a member of
    pub user_guilds: HashMap<Snowflake, HashSet<Snowflake>>,
    /// Shard that delivered each guild
    pub guild_shards: HashMap<Snowflake, u32>,
}

impl CacheState {
    /// Insert or replace a member; members without a user are dropped
    pub fn upsert_member(&mut self, guild_id: Snowflake, mut member: Member) -> Option<Member> {
        let user = member.user.take()?;
        let user_id = user.id;
        let guild = self.guilds.get_mut(&guild_id)?;

        let previous = guild.members.insert(user_id, member);
        self.users.insert(user_id, user);
        self.user_guilds.entry(user_id).or_default().insert(guild_id);

        previous.map(|m| self.hydrate(user_id, m))
    }

    pub fn remove_member(&mut self, guild_id: Snowflake, user_id: Snowflake) -> Option<Member> {
        let member = self.guilds.get_mut(&guild_id)?.members.remove(&user_id)?;
        let member = self.hydrate(user_id, member);
        self.release_user(user_id, guild_id);
        Some(member)
    }

    /// Attach the shared user to a stored member
    pub fn hydrate(&self, user_id: Snowflake, mut member: Member) -> Member {
        member.user = self.users.get(&user_id).cloned();
        member
    }

    /// Drop the membership link and forget the user once no guild references it
    fn release_user(&mut self, user_id: Snowflake, guild_id: Snowflake) {
        let Some(guilds) = self.user_guilds.get_mut(&user_id) else {
            return;
        };
        guilds.remove(&guild_id);
        if guilds.is_empty() {
            self.user_guilds.remove(&user_id);
            let is_current = self.current_user.as_ref().is_some_and(|u| u.id == user_id);
            if !is_current {
                self.users.remove(&user_id);
            }
        }
    }

    /// Insert or replace a guild channel or thread
    pub fn upsert_channel(&mut self, guild_id: Snowflake, mut channel: Channel) -> Option<Channel> {
        channel.guild_id = Some(guild_id);
        let guild = self.guilds.get_mut(&guild_id)?;
        self.channel_guild.insert(channel.id, guild_id);
        if channel.is_thread() {
            guild.threads.insert(channel.id, channel)
        } else {
            guild.channels.insert(channel.id, channel)
        }
    }

    /// Remove a guild or private channel with its message ring
    pub fn remove_channel(&mut self, channel_id: Snowflake) -> Option<Channel> {
        self.messages.remove(&channel_id);
        if let Some(channel) = self.private_channels.remove(&channel_id) {
            return Some(channel);
        }
        let guild_id = self.channel_guild.remove(&channel_id)?;
        let guild = self.guilds.get_mut(&guild_id)?;
        guild
            .channels
            .remove(&channel_id)
            .or_else(|| guild.threads.remove(&channel_id))
    }

    pub fn channel(&self, channel_id: Snowflake) -> Option<&Channel> {
        if let Some(channel) = self.private_channels.get(&channel_id) {
            return Some(channel);
        }
        let guild = self.guilds.get(self.channel_guild.get(&channel_id)?)?;
        guild
            .channels
            .get(&channel_id)
            .or_else(|| guild.threads.get(&channel_id))
    }

    pub fn channel_mut(&mut self, channel_id: Snowflake) -> Option<&mut Channel> {
        if self.private_channels.contains_key(&channel_id) {
            return self.private_channels.get_mut(&channel_id);
        }
        let guild_id = *self.channel_guild.get(&channel_id)?;
        let guild = self.guilds.get_mut(&guild_id)?;
        if guild.channels.contains_key(&channel_id) {
            guild.channels.get_mut(&channel_id)
        } else {
            guild.threads.get_mut(&channel_id)
        }
    }

    /// Remove a guild and everything it owns
    pub fn remove_guild(&mut self, guild_id: Snowflake) -> Option<CachedGuild> {
        let guild = self.guilds.remove(&guild_id)?;
        for channel_id in guild.channels.keys().chain(guild.threads.keys()) {
            self.channel_guild.remove(channel_id);
            self.messages.remove(channel_id);
        }
        for user_id in guild.members.keys() {
            self.release_user(*user_id, guild_id);
        }
        self.guild_shards.remove(&guild_id);
        Some(guild)
    }

    /// Drop every collection of a guild, keeping its scalars
    pub fn clear_guild_collections(&mut self, guild_id: Snowflake) {
        let Some(previous) = self.guilds.get(&guild_id) else {
            return;
        };
        let channel_ids: Vec<Snowflake> = previous
            .channels
            .keys()
            .chain(previous.threads.keys())
            .copied()
            .collect();
        let user_ids: Vec<Snowflake> = previous.members.keys().copied().collect();

        for channel_id in channel_ids {
            self.channel_guild.remove(&channel_id);
            self.messages.remove(&channel_id);
        }
        for user_id in user_ids {
            self.release_user(user_id, guild_id);
        }
        if let Some(guild) = self.guilds.get_mut(&guild_id) {
            let scalars = guild.guild.clone();
            *guild = CachedGuild::new(scalars);
        }
    }

    pub fn push_message(&mut self, message: Message, capacity: usize) {
        if let Some(channel) = self.channel_mut(message.channel_id) {
            channel.last_message_id = Some(message.id);
        }
        self.messages
            .entry(message.channel_id)
            .or_insert_with(|| MessageRing::new(capacity))
            .push(message);
    }
}
