use std::fmt;

use crate::config::OpaqueBranches;
use crate::tree::{Node, Sequence};

pub const PALETTE_KEY: &str = "palette";

#[derive(Clone, Debug, PartialEq, Eq)]
enum PathStep {
    Key(String),
    Index(usize),
}

/// Where a palette was found, from the document root down to the list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PalettePath {
    steps: Vec<PathStep>,
}

impl PalettePath {
    /// Follows the recorded steps into `root`. Returns `None` if the tree
    /// no longer has a list at that position.
    pub fn resolve_mut<'a>(&self, root: &'a mut Node) -> Option<&'a mut Sequence> {
        let mut node = root;
        for step in &self.steps {
            node = match (step, node) {
                (PathStep::Key(key), Node::Container(c)) => c.get_mut(key)?,
                (PathStep::Index(i), Node::Sequence(s)) => s.items.get_mut(*i)?,
                _ => return None,
            };
        }
        match node {
            Node::Sequence(seq) => Some(seq),
            _ => None,
        }
    }
}

impl fmt::Display for PalettePath {
    /// Keys render as `/key` and indices as `[n]`; `/`, `[`, `]` and `\`
    /// inside keys are backslash-escaped.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            match step {
                PathStep::Key(key) => {
                    f.write_str("/")?;
                    for c in key.chars() {
                        if matches!(c, '/' | '[' | ']' | '\\') {
                            f.write_str("\\")?;
                        }
                        write!(f, "{c}")?;
                    }
                }
                PathStep::Index(i) => write!(f, "[{i}]")?,
            }
        }
        Ok(())
    }
}

/// Depth-first, pre-order search for the first list stored under
/// `palette`. A container's own `palette` child wins over anything found
/// by descending into its other children; keys in `opaque` are never
/// entered.
pub fn locate(root: &Node, opaque: &OpaqueBranches) -> Option<PalettePath> {
    let mut steps = Vec::new();
    if search(root, opaque, &mut steps) {
        Some(PalettePath { steps })
    } else {
        None
    }
}

/// Like [`locate`], but hands back the palette itself for rewriting.
pub fn locate_mut<'a>(
    root: &'a mut Node,
    opaque: &OpaqueBranches,
) -> Option<(&'a mut Sequence, PalettePath)> {
    let path = locate(root, opaque)?;
    let palette = path.resolve_mut(root)?;
    Some((palette, path))
}

fn search(node: &Node, opaque: &OpaqueBranches, steps: &mut Vec<PathStep>) -> bool {
    match node {
        Node::Container(container) => {
            if let Some(Node::Sequence(_)) = container.get(PALETTE_KEY) {
                steps.push(PathStep::Key(PALETTE_KEY.to_string()));
                return true;
            }
            for (key, child) in container.iter() {
                if opaque.contains(key) {
                    continue;
                }
                steps.push(PathStep::Key(key.to_string()));
                if search(child, opaque, steps) {
                    return true;
                }
                steps.pop();
            }
            false
        }
        Node::Sequence(seq) => {
            for (i, item) in seq.items.iter().enumerate() {
                steps.push(PathStep::Index(i));
                if search(item, opaque, steps) {
                    return true;
                }
                steps.pop();
            }
            false
        }
        Node::Scalar(_) => false,
    }
}
