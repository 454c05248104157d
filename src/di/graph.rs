//! Registration-time dependency walk.
//!
//! A provider is only accepted if none of its parameters lead back to the key
//! it provides. The walk follows the dependency lists of providers that are
//! already bound; unbound keys end a path (they are reported when resolved).

use super::Key;
use std::collections::HashSet;

/// Search for a path from `dependencies` back to `target`.
///
/// `lookup` returns the dependency keys of a bound provider. On success the
/// returned chain starts and ends with `target`.
pub(crate) fn find_cycle<L>(target: &Key, dependencies: &[Key], lookup: L) -> Option<Vec<Key>>
where
    L: Fn(&Key) -> Option<Vec<Key>>,
{
    let mut visited = HashSet::new();
    let mut chain = vec![target.clone()];

    for dependency in dependencies {
        if visit(target, dependency, &lookup, &mut visited, &mut chain) {
            return Some(chain);
        }
    }

    None
}

fn visit<L>(
    target: &Key,
    current: &Key,
    lookup: &L,
    visited: &mut HashSet<Key>,
    chain: &mut Vec<Key>,
) -> bool
where
    L: Fn(&Key) -> Option<Vec<Key>>,
{
    chain.push(current.clone());

    if current == target {
        return true;
    }

    if visited.insert(current.clone()) {
        if let Some(next) = lookup(current) {
            for dependency in &next {
                if visit(target, dependency, lookup, visited, chain) {
                    return true;
                }
            }
        }
    }

    chain.pop();
    false
}

/// Render a chain as `A -> B -> A`.
pub(crate) fn render_chain(chain: &[Key]) -> String {
    chain
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
