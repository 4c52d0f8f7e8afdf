use compact_str::CompactString;
use decorum::N64;
use itertools::Itertools as _;

use crate::api::{
    HostInspector,
    NodeInspector,
};

/// Up to `count` hosts worth batching, richest first.
///
/// A host qualifies when it is rooted, holds money, and needs less than half
/// the player's hacking level.
pub fn best_targets<G>(
    game: &G,
    count: usize,
) -> Vec<CompactString>
where
    G: NodeInspector + HostInspector,
{
    let level = game.player_level();

    game.list_hosts()
        .into_iter()
        .filter(|h| h.has_admin_access && !h.is_player_owned)
        .filter(|h| game.required_level(&h.name) < level / 2)
        .map(|h| {
            let value = game.max_value(&h.name);
            (h.name, value)
        })
        .filter(|(_, value)| 0. < *value)
        .sorted_by_key(|(_, value)| core::cmp::Reverse(N64::from_inner(*value)))
        .take(count)
        .map(|(name, _)| name)
        .collect()
}

/// Targets for one batching session: the `all` best ones, the named one, or
/// the single best one.
pub fn pick_targets<G>(
    game: &G,
    named: Option<&str>,
    all: Option<usize>,
) -> Vec<CompactString>
where
    G: NodeInspector + HostInspector,
{
    match (all, named) {
        (Some(count), _) => best_targets(game, count),
        (None, Some(name)) => vec![name.into()],
        (None, None) => best_targets(game, 1),
    }
}
