//! Sender allow-list for inbound packets.

use crate::address_book::AddressBook;
use sigrelay_types::address::Address;
use std::collections::HashSet;

/// Optional allow-list of sender addresses. Empty means disabled.
#[derive(Debug, Clone, Default)]
pub struct AccessFilter {
    allowed: HashSet<Address>,
}

impl AccessFilter {
    /// Build from aliases or raw addresses, resolving aliases through `book`.
    pub fn new<I, S>(entries: I, book: &AddressBook) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = entries
            .into_iter()
            .map(|entry| book.resolve_alias(entry.as_ref()))
            .collect();
        Self { allowed }
    }

    /// A filter that admits every sender.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        !self.allowed.is_empty()
    }

    /// True when the filter is disabled or `sender` is on the list.
    pub fn is_allowed(&self, sender: &Address) -> bool {
        self.allowed.is_empty() || self.allowed.contains(sender)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_admits_everyone() {
        let filter = AccessFilter::allow_all();
        assert!(!filter.is_enabled());
        assert!(filter.is_allowed(&Address::parse("+1")));
        assert!(filter.is_allowed(&Address::parse("group.ZzE=")));
    }

    #[test]
    fn test_members_only() {
        let book = AddressBook::new([("alice", "+15550001")]);
        let filter = AccessFilter::new(["alice", "+15550002"], &book);
        assert!(filter.is_enabled());
        assert!(filter.is_allowed(&Address::parse("+15550001")));
        assert!(filter.is_allowed(&Address::parse("+15550002")));
        assert!(!filter.is_allowed(&Address::parse("+15550003")));
        // Aliases are resolved at construction, never matched verbatim.
        assert!(!filter.is_allowed(&Address::parse("alice")));
    }
}
