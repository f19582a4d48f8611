//! Backend addresses and resolved event targets.

use base64::Engine;
use std::fmt;

/// Literal prefix the bridge uses for encoded group identifiers.
pub const GROUP_PREFIX: &str = "group.";

/// An address as understood by the bridge: a phone number or a group id.
///
/// Equality is value equality on the textual form, so two group addresses
/// encoded from the same raw id compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Address {
    /// An individual account, usually an E.164 phone number.
    PhoneNumber(String),
    /// An encoded group identifier (`group.<base64>`).
    GroupId(String),
}

impl Address {
    /// Encode a raw group identifier into its canonical `group.<base64>` form.
    pub fn from_raw_group(raw: &[u8]) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
        Address::GroupId(format!("{GROUP_PREFIX}{encoded}"))
    }

    /// Reinterpret a raw string as an address.
    ///
    /// Strings carrying the group prefix become `GroupId`, anything else is
    /// treated as a phone number. Never fails.
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with(GROUP_PREFIX) {
            Address::GroupId(raw.to_string())
        } else {
            Address::PhoneNumber(raw.to_string())
        }
    }

    /// The textual form sent to the bridge.
    pub fn as_str(&self) -> &str {
        match self {
            Address::PhoneNumber(s) | Address::GroupId(s) => s,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Address::GroupId(_))
    }

    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Address {
    fn from(raw: &str) -> Self {
        Address::parse(raw)
    }
}

/// Where an event is directed: a configured room alias, or a raw address
/// when no alias is known.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// A user-configured room alias.
    Alias(String),
    /// A backend address with no alias.
    Address(Address),
}

impl Target {
    pub fn as_str(&self) -> &str {
        match self {
            Target::Alias(alias) => alias,
            Target::Address(address) => address.as_str(),
        }
    }

    pub fn is_alias(&self) -> bool {
        matches!(self, Target::Alias(_))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Address> for Target {
    fn from(address: Address) -> Self {
        Target::Address(address)
    }
}

impl PartialEq<str> for Target {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Target {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}
