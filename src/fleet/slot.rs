//! Slot allocation and the container naming convention.
//!
//! Containers are named `<prefix>-<slot>`. Slots are always recomputed
//! from the live runtime state; there is no cached counter, so instances
//! removed by other tools are picked up on the next allocation.

/// Smallest slot greater than every existing one, or `1` when the fleet
/// is empty. Freed gaps in the middle are deliberately not refilled:
/// `max+1` avoids reusing a name whose container may still be tearing down.
pub fn allocate_next_slot(existing: &[u32]) -> u32 {
    existing.iter().copied().max().map_or(1, |max| max + 1)
}

/// Container name for a slot.
pub fn container_name(prefix: &str, slot: u32) -> String {
    format!("{prefix}-{slot}")
}

/// Recover the slot from a container name, if the name follows the
/// convention for `prefix`. Foreign containers yield `None`.
pub fn parse_slot(prefix: &str, name: &str) -> Option<u32> {
    let rest = name.strip_prefix(prefix)?.strip_prefix('-')?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fleet_starts_at_one() {
        assert_eq!(allocate_next_slot(&[]), 1);
    }

    #[test]
    fn allocates_one_past_the_max() {
        assert_eq!(allocate_next_slot(&[1, 2, 3]), 4);
    }

    #[test]
    fn gaps_are_not_refilled() {
        // Slot 2 was removed out-of-band; the live max is still 3.
        assert_eq!(allocate_next_slot(&[1, 3]), 4);
    }

    #[test]
    fn order_does_not_matter() {
        assert_eq!(allocate_next_slot(&[7, 2, 5]), 8);
    }

    #[test]
    fn name_round_trips_through_parse() {
        let name = container_name("fleet-node", 12);
        assert_eq!(name, "fleet-node-12");
        assert_eq!(parse_slot("fleet-node", &name), Some(12));
    }

    #[test]
    fn parse_rejects_foreign_names() {
        assert_eq!(parse_slot("fleet-node", "postgres"), None);
        assert_eq!(parse_slot("fleet-node", "fleet-node"), None);
        assert_eq!(parse_slot("fleet-node", "fleet-node-"), None);
        assert_eq!(parse_slot("fleet-node", "fleet-node-abc"), None);
        assert_eq!(parse_slot("fleet-node", "fleet-node-1-old"), None);
    }
}
