//! Room aliases ↔ backend addresses.
//!
//! The table is fixed at construction. Reverse lookups go through a second
//! map built from the same entries; when two aliases name the same address,
//! the first one in iteration order keeps the reverse slot. Tables loaded
//! from config iterate in lexicographic alias order, so the tie-break is
//! deterministic.

use sigrelay_types::address::{Address, Target};
use sigrelay_types::config::AdapterConfig;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Bidirectional room alias table.
#[derive(Debug, Clone, Default)]
pub struct AddressBook {
    forward: BTreeMap<String, Address>,
    reverse: HashMap<Address, String>,
}

impl AddressBook {
    /// Build from `(alias, address)` pairs.
    pub fn new<I, K, V>(rooms: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut forward = BTreeMap::new();
        let mut reverse: HashMap<Address, String> = HashMap::new();

        for (alias, raw) in rooms {
            let alias = alias.into();
            let address = Address::parse(raw.as_ref());
            match reverse.get(&address) {
                Some(existing) if *existing != alias => {
                    warn!(
                        address = %address,
                        kept = %existing,
                        ignored = %alias,
                        "Two room aliases map to the same address, keeping the first for reverse lookup"
                    );
                }
                Some(_) => {}
                None => {
                    reverse.insert(address.clone(), alias.clone());
                }
            }
            forward.insert(alias, address);
        }

        Self { forward, reverse }
    }

    /// Build from the `rooms` table of the adapter config.
    pub fn from_config(config: &AdapterConfig) -> Self {
        Self::new(config.rooms.iter().map(|(k, v)| (k.clone(), v.as_str())))
    }

    /// Canonical group address for a raw group identifier.
    pub fn encode_group(raw: &[u8]) -> Address {
        Address::from_raw_group(raw)
    }

    /// Alias → address. Unknown aliases are reinterpreted as raw addresses.
    pub fn resolve_alias(&self, alias: &str) -> Address {
        self.forward
            .get(alias)
            .cloned()
            .unwrap_or_else(|| Address::parse(alias))
    }

    /// Address → alias when one is configured, else the address itself.
    pub fn resolve_target(&self, address: &Address) -> Target {
        match self.reverse.get(address) {
            Some(alias) => Target::Alias(alias.clone()),
            None => Target::Address(address.clone()),
        }
    }

    /// Backend address to deliver an outbound event to, or `None` when the
    /// target resolves to nothing.
    pub fn recipient(&self, target: &Target) -> Option<Address> {
        let address = match target {
            Target::Alias(alias) => self.resolve_alias(alias),
            Target::Address(address) => self.resolve_alias(address.as_str()),
        };
        if address.is_empty() {
            None
        } else {
            Some(address)
        }
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> AddressBook {
        AddressBook::new([
            ("alice", "+15550001"),
            ("room", "group.ZzE="),
        ])
    }

    #[test]
    fn test_alias_round_trip() {
        let book = book();
        let alice = book.resolve_alias("alice");
        assert_eq!(alice, Address::PhoneNumber("+15550001".into()));
        assert_eq!(book.resolve_target(&alice), Target::Alias("alice".into()));

        let room = book.resolve_alias("room");
        assert_eq!(room, AddressBook::encode_group(b"g1"));
        assert_eq!(book.resolve_target(&room), Target::Alias("room".into()));
    }

    #[test]
    fn test_unknown_values_pass_through() {
        let book = book();
        assert_eq!(
            book.resolve_alias("+19990000"),
            Address::PhoneNumber("+19990000".into())
        );
        let stranger = Address::parse("+19990000");
        assert_eq!(
            book.resolve_target(&stranger),
            Target::Address(stranger.clone())
        );
    }

    #[test]
    fn test_duplicate_address_first_alias_wins() {
        let book = AddressBook::new([("first", "+1"), ("second", "+1")]);
        assert_eq!(
            book.resolve_target(&Address::parse("+1")),
            Target::Alias("first".into())
        );
        // Forward lookups stay intact for both aliases.
        assert_eq!(book.resolve_alias("second"), Address::parse("+1"));
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn test_config_tie_break_is_lexicographic() {
        let mut config = AdapterConfig::new("http://localhost:8080", "+1");
        config.rooms.insert("zeta".into(), "+2".into());
        config.rooms.insert("alpha".into(), "+2".into());
        let book = AddressBook::from_config(&config);
        assert_eq!(
            book.resolve_target(&Address::parse("+2")),
            Target::Alias("alpha".into())
        );
    }

    #[test]
    fn test_recipient_for_outbound() {
        let book = book();
        assert_eq!(
            book.recipient(&Target::Alias("room".into())),
            Some(AddressBook::encode_group(b"g1"))
        );
        assert_eq!(
            book.recipient(&Target::Address(Address::parse("+1"))),
            Some(Address::parse("+1"))
        );
        assert_eq!(book.recipient(&Target::Alias(String::new())), None);
    }
}
