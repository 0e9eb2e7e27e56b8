//! Protocol capabilities.
//!
//! Capabilities travel as a space-separated list, either after the NUL on
//! the first advertised ref or after the object id on the first want line.
//! Some carry a value (`agent=ferry/0.1.0`, `symref=HEAD:refs/heads/main`).

use std::fmt;

/// Capabilities this server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `multi_ack`: acknowledge every common commit with `continue`.
    MultiAck,
    /// `multi_ack_detailed`: distinguish `common` and `ready` acknowledgements.
    MultiAckDetailed,
    /// `side-band`: multiplexed output in packets of up to 1000 bytes.
    SideBand,
    /// `side-band-64k`: multiplexed output in packets of up to 65520 bytes.
    SideBand64k,
    /// `no-progress`: the client does not want progress output.
    NoProgress,
    /// `shallow`: shallow clones and deepening.
    Shallow,
    /// `thin-pack`
    ThinPack,
    /// `ofs-delta`
    OfsDelta,
    /// `include-tag`
    IncludeTag,
    /// `agent=<name>`
    Agent,
    /// `symref=<name>:<target>`
    Symref,
}

impl Capability {
    /// All known capabilities.
    pub const ALL: [Capability; 11] = [
        Self::MultiAck,
        Self::MultiAckDetailed,
        Self::SideBand,
        Self::SideBand64k,
        Self::NoProgress,
        Self::Shallow,
        Self::ThinPack,
        Self::OfsDelta,
        Self::IncludeTag,
        Self::Agent,
        Self::Symref,
    ];

    /// Wire name of the capability.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultiAck => "multi_ack",
            Self::MultiAckDetailed => "multi_ack_detailed",
            Self::SideBand => "side-band",
            Self::SideBand64k => "side-band-64k",
            Self::NoProgress => "no-progress",
            Self::Shallow => "shallow",
            Self::ThinPack => "thin-pack",
            Self::OfsDelta => "ofs-delta",
            Self::IncludeTag => "include-tag",
            Self::Agent => "agent",
            Self::Symref => "symref",
        }
    }

    /// Looks a capability up by its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cap| cap.as_str() == name)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered list of capabilities, as declared on the wire.
///
/// Unknown capabilities are kept so they can be logged, but never change
/// server behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityList {
    entries: Vec<(String, Option<String>)>,
}

impl CapabilityList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a space-separated capability list.
    pub fn parse(s: &str) -> Self {
        let mut list = Self::new();
        for token in s.split_ascii_whitespace() {
            match token.split_once('=') {
                Some((name, value)) => list.push(name, Some(value.to_string())),
                None => list.push(token, None),
            }
        }
        list
    }

    fn push(&mut self, name: &str, value: Option<String>) {
        self.entries.push((name.to_string(), value));
    }

    /// Adds a capability without a value.
    pub fn add(&mut self, cap: Capability) {
        self.push(cap.as_str(), None);
    }

    /// Adds a capability with a value.
    pub fn add_value(&mut self, cap: Capability, value: impl Into<String>) {
        self.push(cap.as_str(), Some(value.into()));
    }

    /// Returns true if the capability was declared.
    pub fn supports(&self, cap: Capability) -> bool {
        self.entries.iter().any(|(name, _)| name == cap.as_str())
    }

    /// Returns the first value declared for a capability.
    pub fn value(&self, cap: Capability) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == cap.as_str())
            .and_then(|(_, value)| value.as_deref())
    }

    /// Names of declared capabilities this server does not know.
    pub fn unknown(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .map(|(name, _)| name.as_str())
            .filter(|name| Capability::from_name(name).is_none())
    }

    /// Number of declared capabilities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for CapabilityList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(name)?;
            if let Some(value) = value {
                write!(f, "={}", value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_and_query() {
        let caps = CapabilityList::parse("multi_ack_detailed side-band-64k thin-pack agent=git/2.43.0 frobnicate");

        assert!(caps.supports(Capability::MultiAckDetailed));
        assert!(caps.supports(Capability::SideBand64k));
        assert!(!caps.supports(Capability::MultiAck));
        assert!(!caps.supports(Capability::NoProgress));
        assert_eq!(caps.value(Capability::Agent), Some("git/2.43.0"));
        assert_eq!(caps.unknown().collect::<Vec<_>>(), vec!["frobnicate"]);
        assert_eq!(caps.len(), 5);
    }

    #[test]
    fn test_display_preserves_order_and_values() {
        let mut caps = CapabilityList::new();
        caps.add(Capability::MultiAck);
        caps.add(Capability::SideBand64k);
        caps.add_value(Capability::Symref, "HEAD:refs/heads/main");
        caps.add_value(Capability::Agent, "ferry/0.1.0");

        let encoded = caps.to_string();
        assert_eq!(
            encoded,
            "multi_ack side-band-64k symref=HEAD:refs/heads/main agent=ferry/0.1.0"
        );
        assert_eq!(CapabilityList::parse(&encoded), caps);
    }

    #[test]
    fn test_side_band_is_not_side_band_64k() {
        let caps = CapabilityList::parse("side-band");
        assert!(caps.supports(Capability::SideBand));
        assert!(!caps.supports(Capability::SideBand64k));
    }

    #[test]
    fn test_empty() {
        let caps = CapabilityList::parse("   ");
        assert!(caps.is_empty());
        assert_eq!(caps.to_string(), "");
    }

    #[test]
    fn test_from_name_roundtrip() {
        for cap in Capability::ALL {
            assert_eq!(Capability::from_name(cap.as_str()), Some(cap));
        }
        assert_eq!(Capability::from_name("report-status"), None);
    }
}
