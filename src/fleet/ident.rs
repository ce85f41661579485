use std::fmt;

use thiserror::Error;

/// Operator-supplied logical identity of one worker node. Unique among
/// active instances at creation time, otherwise opaque to the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("node id must be a plain unsigned integer, got `{0}`")]
pub struct InvalidNodeId(pub String);

impl NodeId {
    /// Parse a node id from operator input. Only `^[0-9]+$` is accepted;
    /// empty, signed, or otherwise decorated input is rejected.
    pub fn parse(input: &str) -> Result<NodeId, InvalidNodeId> {
        let trimmed = input.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidNodeId(trimmed.to_string()));
        }
        trimmed
            .parse::<u64>()
            .map(NodeId)
            .map_err(|_| InvalidNodeId(trimmed.to_string()))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_only_is_accepted() {
        assert_eq!(NodeId::parse("101").unwrap().value(), 101);
        assert_eq!(NodeId::parse("0").unwrap().value(), 0);
        assert_eq!(NodeId::parse(" 42\n").unwrap().value(), 42);
    }

    #[test]
    fn empty_is_rejected() {
        assert!(NodeId::parse("").is_err());
        assert!(NodeId::parse("   ").is_err());
    }

    #[test]
    fn signed_input_is_rejected() {
        assert!(NodeId::parse("-3").is_err());
        assert!(NodeId::parse("+3").is_err());
    }

    #[test]
    fn non_numeric_is_rejected() {
        assert!(NodeId::parse("12a").is_err());
        assert!(NodeId::parse("1 2").is_err());
        assert!(NodeId::parse("0x10").is_err());
    }

    #[test]
    fn overflow_is_rejected_not_wrapped() {
        let too_big = "9".repeat(40);
        assert!(NodeId::parse(&too_big).is_err());
    }
}
