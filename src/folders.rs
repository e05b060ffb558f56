// Folder resolution: walk the remote folder tree once per run and project
// it into flat display paths for the selection menu.

use anyhow::Result;
use std::collections::VecDeque;
use tracing::warn;

/// One remote folder as returned by a child listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRef {
    pub id: String,
    pub name: String,
}

/// A folder and everything beneath it. Built once, never mutated after.
#[derive(Debug, Clone)]
pub struct FolderNode {
    pub id: String,
    pub name: String,
    pub children: Vec<FolderNode>,
}

/// Flat projection of the tree: slash-joined ancestor names plus the
/// opaque folder id. Lives only until the user picks one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatFolderEntry {
    pub display_path: String,
    pub id: String,
}

/// Anything that can enumerate the folders directly under a parent.
/// Implemented by the drive client; tests substitute an in-memory map.
pub trait FolderSource {
    fn list_child_folders(&self, parent_id: &str) -> Result<Vec<FolderRef>>;
}

/// Build the full tree under `root_id`. Folder containment is acyclic, so
/// the recursion terminates. A listing failure anywhere degrades that
/// branch to an empty child set instead of failing the whole walk.
pub fn fetch_tree<S: FolderSource>(source: &S, root_id: &str, root_label: &str) -> FolderNode {
    FolderNode {
        id: root_id.to_string(),
        name: root_label.to_string(),
        children: fetch_children(source, root_id),
    }
}

fn fetch_children<S: FolderSource>(source: &S, parent_id: &str) -> Vec<FolderNode> {
    let refs = match source.list_child_folders(parent_id) {
        Ok(refs) => refs,
        Err(err) => {
            warn!(parent_id, error = %err, "folder listing failed, treating branch as empty");
            return Vec::new();
        }
    };
    refs.into_iter()
        .map(|child| {
            let children = fetch_children(source, &child.id);
            FolderNode {
                id: child.id,
                name: child.name,
                children,
            }
        })
        .collect()
}

/// Flatten the tree into (display path, id) entries, root first, then each
/// level in sibling order before descending further.
pub fn flatten(root: &FolderNode) -> Vec<FlatFolderEntry> {
    let mut entries = Vec::new();
    let mut queue: VecDeque<(String, &FolderNode)> = VecDeque::new();
    queue.push_back((root.name.clone(), root));
    while let Some((path, node)) = queue.pop_front() {
        entries.push(FlatFolderEntry {
            display_path: path.clone(),
            id: node.id.clone(),
        });
        for child in &node.children {
            queue.push_back((format!("{}/{}", path, child.name), child));
        }
    }
    entries
}
