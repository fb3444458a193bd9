//! Guild subscription table.
//!
//! Each guild forwards to at most one channel. Subscribing from another
//! channel of the same guild moves the entry there and keeps its flags.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;

use crate::message::{FlagSet, SourceFlag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub channel_id: u64,
    pub flags: FlagSet,
}

/// Result of a subscription change, shown to the user as the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Subscribed,
    AlreadySubscribed,
    Unsubscribed,
    NotSubscribed,
}

impl Outcome {
    pub fn reply(&self) -> &'static str {
        match self {
            Self::Subscribed => "subscribed",
            Self::AlreadySubscribed => "already subscribed",
            Self::Unsubscribed => "unsubscribed",
            Self::NotSubscribed => "not subscribed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reply())
    }
}

#[derive(Debug, Default)]
pub struct SubscriptionTable {
    entries: RwLock<HashMap<u64, Subscription>>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, guild_id: u64) -> Option<Subscription> {
        self.entries.read().get(&guild_id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn subscribe(&self, guild_id: u64, channel_id: u64, flag: SourceFlag) -> Outcome {
        let mut entries = self.entries.write();
        let entry = entries.entry(guild_id).or_insert(Subscription {
            channel_id,
            flags: FlagSet::empty(),
        });
        if entry.channel_id == channel_id && entry.flags.contains(flag) {
            return Outcome::AlreadySubscribed;
        }
        entry.channel_id = channel_id;
        entry.flags.insert(flag);
        Outcome::Subscribed
    }

    pub fn unsubscribe(&self, guild_id: u64, channel_id: u64, flag: SourceFlag) -> Outcome {
        let mut entries = self.entries.write();
        let Some(entry) = entries.get_mut(&guild_id) else {
            return Outcome::NotSubscribed;
        };
        if entry.channel_id != channel_id || !entry.flags.contains(flag) {
            return Outcome::NotSubscribed;
        }
        entry.flags.remove(flag);
        if entry.flags.is_empty() {
            entries.remove(&guild_id);
        }
        Outcome::Unsubscribed
    }

    pub fn subscribe_all(&self, guild_id: u64, channel_id: u64) -> Outcome {
        let all = FlagSet::all();
        let mut entries = self.entries.write();
        match entries.insert(guild_id, Subscription { channel_id, flags: all }) {
            Some(previous) if previous.channel_id == channel_id && previous.flags == all => {
                Outcome::AlreadySubscribed
            }
            _ => Outcome::Subscribed,
        }
    }

    pub fn unsubscribe_all(&self, guild_id: u64) -> Outcome {
        match self.entries.write().remove(&guild_id) {
            Some(_) => Outcome::Unsubscribed,
            None => Outcome::NotSubscribed,
        }
    }

    /// `(guild, channel)` pairs subscribed to `flag`, sorted by guild.
    pub fn targets(&self, flag: SourceFlag) -> Vec<(u64, u64)> {
        let mut targets: Vec<_> = self
            .entries
            .read()
            .iter()
            .filter(|(_, sub)| sub.flags.contains(flag))
            .map(|(guild, sub)| (*guild, sub.channel_id))
            .collect();
        targets.sort_unstable();
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_subscribe_sequence() {
        let table = SubscriptionTable::new();
        assert_eq!(
            table.subscribe(1, 10, SourceFlag::BiliLive),
            Outcome::Subscribed
        );
        assert_eq!(
            table.subscribe(1, 10, SourceFlag::BiliLive),
            Outcome::AlreadySubscribed
        );
        assert_eq!(
            table.unsubscribe(1, 10, SourceFlag::BiliLive),
            Outcome::Unsubscribed
        );
        assert_eq!(
            table.unsubscribe(1, 10, SourceFlag::BiliLive),
            Outcome::NotSubscribed
        );
        assert!(table.is_empty());
    }

    #[test]
    fn test_flags_accumulate() {
        let table = SubscriptionTable::new();
        table.subscribe(1, 10, SourceFlag::BiliLive);
        table.subscribe(1, 10, SourceFlag::DouyinLive);

        let sub = table.get(1).unwrap();
        assert!(sub.flags.contains(SourceFlag::BiliLive));
        assert!(sub.flags.contains(SourceFlag::DouyinLive));
        assert!(!sub.flags.contains(SourceFlag::BiliDynamic));

        assert_eq!(
            table.unsubscribe(1, 10, SourceFlag::BiliLive),
            Outcome::Unsubscribed
        );
        assert_eq!(table.len(), 1);
        let sub = table.get(1).unwrap();
        assert!(!sub.flags.contains(SourceFlag::BiliLive));
        assert!(sub.flags.contains(SourceFlag::DouyinLive));
        assert_eq!(sub.channel_id, 10);
        assert_eq!(table.targets(SourceFlag::BiliLive), Vec::new());
        assert_eq!(table.targets(SourceFlag::DouyinLive), vec![(1, 10)]);
    }

    #[test]
    fn test_subscribe_from_other_channel_moves_entry() {
        let table = SubscriptionTable::new();
        table.subscribe(1, 10, SourceFlag::BiliLive);
        assert_eq!(
            table.subscribe(1, 20, SourceFlag::BiliLive),
            Outcome::Subscribed
        );
        let sub = table.get(1).unwrap();
        assert_eq!(sub.channel_id, 20);
        assert!(sub.flags.contains(SourceFlag::BiliLive));

        // the old channel no longer owns the entry
        assert_eq!(
            table.unsubscribe(1, 10, SourceFlag::BiliLive),
            Outcome::NotSubscribed
        );
    }

    #[test]
    fn test_subscribe_all_and_unsubscribe_all() {
        let table = SubscriptionTable::new();
        table.subscribe(1, 10, SourceFlag::BiliDynamic);
        assert_eq!(table.subscribe_all(1, 10), Outcome::Subscribed);
        assert_eq!(table.subscribe_all(1, 10), Outcome::AlreadySubscribed);
        assert_eq!(table.get(1).unwrap().flags, FlagSet::all());

        assert_eq!(table.unsubscribe_all(1), Outcome::Unsubscribed);
        assert_eq!(table.unsubscribe_all(1), Outcome::NotSubscribed);
        assert_eq!(table.get(1), None);
    }

    #[test]
    fn test_targets() {
        let table = SubscriptionTable::new();
        table.subscribe(2, 20, SourceFlag::BiliLive);
        table.subscribe(1, 10, SourceFlag::BiliLive);
        table.subscribe(3, 30, SourceFlag::DouyinLive);

        assert_eq!(
            table.targets(SourceFlag::BiliLive),
            vec![(1, 10), (2, 20)]
        );
        assert_eq!(table.targets(SourceFlag::DouyinLive), vec![(3, 30)]);
        assert!(table.targets(SourceFlag::BiliDynamic).is_empty());
    }

    #[test]
    fn test_concurrent_updates() {
        let table = Arc::new(SubscriptionTable::new());
        let handles: Vec<_> = (0..8u64)
            .map(|guild| {
                let table = table.clone();
                std::thread::spawn(move || {
                    for flag in SourceFlag::ALL {
                        table.subscribe(guild, guild * 10, flag);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(table.len(), 8);
        assert_eq!(table.targets(SourceFlag::BiliDynamic).len(), 8);
    }

    #[test]
    fn test_outcome_reply() {
        assert_eq!(Outcome::Subscribed.to_string(), "subscribed");
        assert_eq!(Outcome::NotSubscribed.reply(), "not subscribed");
    }
}
