use rand::Rng;

use crate::allocator::ScopedAllocator;
use crate::config::SkipList;
use crate::tree::{Node, Scalar, Sequence};

/// Field names rewritten by [`rewrite_fields`]. Matching is exact.
pub const NAME_FIELDS: [&str; 2] = ["Name", "name"];

/// Field rewritten in each palette entry.
pub const PALETTE_NAME_FIELD: &str = "Name";

/// Name fields seen and replaced while walking a text document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FieldStats {
    pub modified: usize,
    pub total: usize,
}

/// Replaces every `Name`/`name` value in the tree with a fresh id, except
/// values on the skip-list. The value is overwritten whatever its type;
/// the children of other keys are searched recursively in document order.
pub fn rewrite_fields<R: Rng>(
    node: &mut Node,
    alloc: &mut ScopedAllocator<'_, R>,
    skip: &SkipList,
) -> FieldStats {
    let mut stats = FieldStats::default();
    walk_fields(node, alloc, skip, &mut stats);
    stats
}

fn walk_fields<R: Rng>(
    node: &mut Node,
    alloc: &mut ScopedAllocator<'_, R>,
    skip: &SkipList,
    stats: &mut FieldStats,
) {
    match node {
        Node::Container(container) => {
            for (key, child) in container.iter_mut() {
                if !NAME_FIELDS.contains(&key) {
                    walk_fields(child, alloc, skip, stats);
                    continue;
                }

                stats.total += 1;
                if let Some(current) = child.as_str() {
                    if skip.contains(current) {
                        log::debug!("keeping protected {key} {current}");
                        continue;
                    }
                }

                let new_id = alloc.next_id();
                match child.as_str() {
                    Some(old) => log::debug!("{key}: {old} -> {new_id}"),
                    None => log::debug!("{key}: <{}> -> {new_id}", child.type_name()),
                }
                *child = Node::string(new_id);
                stats.modified += 1;
            }
        }
        Node::Sequence(seq) => {
            for item in seq.items.iter_mut() {
                walk_fields(item, alloc, skip, stats);
            }
        }
        Node::Scalar(_) => {}
    }
}

/// Why a palette entry was left alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntrySkip {
    NotContainer { index: usize, found: &'static str },
    MissingName { index: usize },
    Protected { index: usize, value: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaletteReport {
    pub modified: usize,
    pub total: usize,
    /// Entries whose `Name` was not a string and was replaced by one.
    pub coerced: usize,
    pub skipped: Vec<EntrySkip>,
}

/// Gives every eligible palette entry a new `Name`. Bad entries are logged
/// and skipped one by one; they never stop the rest of the palette.
pub fn rewrite_palette<R: Rng>(
    palette: &mut Sequence,
    alloc: &mut ScopedAllocator<'_, R>,
    skip: &SkipList,
    source: &str,
) -> PaletteReport {
    let mut report = PaletteReport {
        total: palette.items.len(),
        ..PaletteReport::default()
    };

    for (index, entry) in palette.items.iter_mut().enumerate() {
        let Node::Container(state) = entry else {
            log::warn!(
                "palette entry {index} in {source} is a {}, not a block state",
                entry.type_name()
            );
            report.skipped.push(EntrySkip::NotContainer {
                index,
                found: entry.type_name(),
            });
            continue;
        };

        let Some(name) = state.get_mut(PALETTE_NAME_FIELD) else {
            log::debug!("palette entry {index} in {source} has no Name, skipping");
            report.skipped.push(EntrySkip::MissingName { index });
            continue;
        };

        if let Some(current) = name.as_str() {
            if skip.contains(current) {
                log::debug!("palette entry {index} in {source} keeps protected {current}");
                report.skipped.push(EntrySkip::Protected {
                    index,
                    value: current.to_string(),
                });
                continue;
            }
        }

        let new_id = alloc.next_id();
        match name {
            Node::Scalar(Scalar::String(old)) => {
                log::debug!("{source}[{index}]: {old} -> {new_id}");
                *old = new_id;
            }
            other => {
                log::warn!(
                    "palette entry {index} in {source} had a {} Name, storing a string",
                    other.type_name()
                );
                *other = Node::string(new_id);
                report.coerced += 1;
            }
        }
        report.modified += 1;
    }

    log::info!(
        "rewrote {}/{} palette entries in {source}",
        report.modified,
        report.total
    );
    report
}
