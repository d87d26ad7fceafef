//! Directory tree index keyed by normalized DN paths.
//!
//! Only data-bearing records carry a payload; intermediate path levels are
//! pass-through nodes. Records inserted as branches can own descendants. The
//! first traversal finalizes the tree: every payload node is attached to its
//! nearest enclosing branch, and further inserts are rejected.
use crate::dn::path_key;
use crate::error::{InventoryError, Result};
use std::collections::HashMap;

type NodeId = usize;

const ROOT: NodeId = 0;

#[derive(Debug)]
struct Entry<T> {
    dn: String,
    payload: T,
}

#[derive(Debug)]
struct TreeNode<T> {
    parent: Option<NodeId>,
    children: HashMap<String, NodeId>,
    entry: Option<Entry<T>>,
    /// `Some` marks a branch node.
    descendants: Option<Vec<NodeId>>,
}

impl<T> TreeNode<T> {
    fn new(parent: Option<NodeId>) -> Self {
        Self {
            parent,
            children: HashMap::new(),
            entry: None,
            descendants: None,
        }
    }
}

#[derive(Debug)]
pub struct DirectoryTree<T> {
    nodes: Vec<TreeNode<T>>,
    branches: Vec<NodeId>,
    finalized: bool,
}

impl<T> Default for DirectoryTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DirectoryTree<T> {
    pub fn new() -> Self {
        Self {
            nodes: vec![TreeNode::new(None)],
            branches: Vec::new(),
            finalized: false,
        }
    }

    /// Store `payload` at the node for `dn`, creating pass-through levels on the way.
    pub fn insert(&mut self, dn: &str, payload: T, is_branch: bool) -> Result<()> {
        if self.finalized {
            return Err(InventoryError::IndexFinalized { dn: dn.to_string() });
        }
        let key = path_key(dn)?;
        if key.is_root() {
            return Err(InventoryError::MalformedDn {
                dn: dn.to_string(),
                reason: "empty DN cannot hold a record".to_string(),
            });
        }

        let mut node = ROOT;
        for segment in key.segments() {
            node = match self.nodes[node].children.get(segment) {
                Some(&child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(TreeNode::new(Some(node)));
                    self.nodes[node].children.insert(segment.clone(), child);
                    child
                }
            };
        }

        let target = &mut self.nodes[node];
        if let Some(existing) = &target.entry {
            return Err(InventoryError::DuplicatePath {
                dn: dn.to_string(),
                existing: existing.dn.clone(),
            });
        }
        target.entry = Some(Entry {
            dn: dn.to_string(),
            payload,
        });
        if is_branch {
            target.descendants = Some(Vec::new());
            self.branches.push(node);
        }
        Ok(())
    }

    /// Attach every payload node to its nearest enclosing branch. Runs once.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;

        let mut attachments = Vec::new();
        for (id, node) in self.nodes.iter().enumerate() {
            if node.entry.is_none() {
                continue;
            }
            let mut ancestor = node.parent;
            while let Some(candidate) = ancestor {
                if candidate == ROOT {
                    break;
                }
                let parent = &self.nodes[candidate];
                if parent.entry.is_some() && parent.descendants.is_some() {
                    attachments.push((candidate, id));
                    break;
                }
                ancestor = parent.parent;
            }
        }

        for (branch, member) in attachments {
            if let Some(descendants) = self.nodes[branch].descendants.as_mut() {
                descendants.push(member);
            }
        }
    }

    /// Branch records in insertion order. Finalizes the tree first.
    pub fn branches(&mut self) -> impl Iterator<Item = Branch<'_, T>> + '_ {
        self.finalize();
        let tree: &Self = self;
        tree.branches.iter().filter_map(move |&id| {
            let node = &tree.nodes[id];
            Some(Branch {
                tree,
                entry: node.entry.as_ref()?,
                members: node.descendants.as_deref()?,
            })
        })
    }

    fn entry(&self, id: NodeId) -> Option<&Entry<T>> {
        self.nodes[id].entry.as_ref()
    }
}

/// A finalized branch node and its direct (nearest-branch) descendants.
pub struct Branch<'a, T> {
    tree: &'a DirectoryTree<T>,
    entry: &'a Entry<T>,
    members: &'a [NodeId],
}

impl<'a, T> Branch<'a, T> {
    pub fn dn(&self) -> &'a str {
        &self.entry.dn
    }

    pub fn payload(&self) -> &'a T {
        &self.entry.payload
    }

    pub fn descendants(&self) -> impl Iterator<Item = &'a T> + 'a {
        let tree = self.tree;
        self.members
            .iter()
            .filter_map(move |&child| tree.entry(child).map(|entry| &entry.payload))
    }
}

#[cfg(test)]
#[path = "tree_tests.rs"]
mod tests;
