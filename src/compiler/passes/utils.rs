//! Helpers shared by the control-flow passes.

use std::{
    collections::{HashMap, HashSet},
    hash::Hash,
};

/// Follows a chain of forwarding mappings to its final, unmapped target.
///
/// Given a map where every key forwards to a value, and values may be keys themselves,
/// this walks the chain until it reaches a value that forwards nowhere.
///
/// # Returns
///
/// The final target, or `None` if the chain starting at `start` runs into a cycle (for
/// example two trampolines jumping at each other). `start` itself is returned when it is
/// not a key.
#[must_use]
pub fn resolve_chain<K>(map: &HashMap<K, K>, start: K) -> Option<K>
where
    K: Copy + Hash + Eq,
{
    let mut current = start;
    let mut visited = HashSet::new();

    while let Some(&next) = map.get(&current) {
        if !visited.insert(current) {
            return None;
        }
        current = next;
    }

    Some(current)
}
