//! Static Discord channel id ⇄ IRC channel name mapping.

use std::collections::{BTreeMap, HashMap};

use ircord_types::BridgeError;

/// One-to-one map between Discord channel ids and IRC channel names.
///
/// Built once from configuration and never mutated. IRC names are
/// matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct ChannelMap {
    to_irc: BTreeMap<String, String>,
    /// Keyed by lowercased IRC name.
    to_discord: HashMap<String, String>,
}

impl ChannelMap {
    /// Build the map, rejecting an IRC channel mapped from two Discord
    /// channels.
    pub fn new(channels: &BTreeMap<String, String>) -> Result<Self, BridgeError> {
        let mut to_discord = HashMap::with_capacity(channels.len());
        for (discord_id, irc_name) in channels {
            if let Some(previous) = to_discord.insert(irc_name.to_lowercase(), discord_id.clone())
            {
                return Err(BridgeError::ConfigInvalid {
                    reason: format!(
                        "IRC channel {irc_name:?} is mapped from both {previous} and {discord_id}"
                    ),
                });
            }
        }
        Ok(Self {
            to_irc: channels.clone(),
            to_discord,
        })
    }

    /// IRC channel bridged with a Discord channel.
    pub fn irc_for(&self, discord_id: &str) -> Option<&str> {
        self.to_irc.get(discord_id).map(String::as_str)
    }

    /// Discord channel bridged with an IRC channel.
    pub fn discord_for(&self, irc_name: &str) -> Option<&str> {
        self.to_discord
            .get(&irc_name.to_lowercase())
            .map(String::as_str)
    }

    /// All IRC channel names, ordered by Discord id.
    pub fn irc_channels(&self) -> impl Iterator<Item = &str> {
        self.to_irc.values().map(String::as_str)
    }

    /// All Discord channel ids, in ascending order.
    pub fn discord_channels(&self) -> impl Iterator<Item = &str> {
        self.to_irc.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.to_irc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_irc.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(d, i)| (d.to_string(), i.to_string()))
            .collect()
    }

    #[test]
    fn lookups_in_both_directions() {
        let map = ChannelMap::new(&channels(&[("1", "#a"), ("2", "#B")])).unwrap();
        assert_eq!(map.irc_for("1"), Some("#a"));
        assert_eq!(map.discord_for("#a"), Some("1"));
        assert_eq!(map.discord_for("#b"), Some("2"));
        assert_eq!(map.discord_for("#B"), Some("2"));
        assert_eq!(map.irc_for("3"), None);
        assert_eq!(map.discord_for("#c"), None);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn duplicate_irc_names_are_rejected() {
        let err = ChannelMap::new(&channels(&[("1", "#a"), ("2", "#A")])).unwrap_err();
        assert!(err.to_string().contains("#A") || err.to_string().contains("#a"));
    }

    #[test]
    fn iteration_order_is_stable() {
        let map = ChannelMap::new(&channels(&[("2", "#b"), ("1", "#a")])).unwrap();
        assert_eq!(map.irc_channels().collect::<Vec<_>>(), vec!["#a", "#b"]);
        assert_eq!(map.discord_channels().collect::<Vec<_>>(), vec!["1", "2"]);
    }
}
