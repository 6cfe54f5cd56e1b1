// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Symbol tree built from prover status updates
//!
//! Root → File → Theory → Declaration/Formula, with Error/Warning/Message
//! leaves attached to the nearest File or Theory.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Node classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Root,
    File,
    Theory,
    Declaration,
    Formula,
    Error,
    Warning,
    Message,
}

impl SymbolKind {
    /// Nesting rank: Root < File < Theory < leaves
    pub fn rank(&self) -> u8 {
        match self {
            SymbolKind::Root => 0,
            SymbolKind::File => 1,
            SymbolKind::Theory => 2,
            SymbolKind::Declaration
            | SymbolKind::Formula
            | SymbolKind::Error
            | SymbolKind::Warning
            | SymbolKind::Message => 3,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.rank() == 3
    }

    /// Error, Warning and Message nodes
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, SymbolKind::Error | SymbolKind::Warning | SymbolKind::Message)
    }

    /// File and Theory nodes are merged by name instead of duplicated
    fn is_container(&self) -> bool {
        matches!(self, SymbolKind::File | SymbolKind::Theory)
    }

    /// Whether `child` may be attached directly below a node of this kind
    pub fn accepts(&self, child: SymbolKind) -> bool {
        match (self, child) {
            (SymbolKind::Root, SymbolKind::File) => true,
            (SymbolKind::File, SymbolKind::Theory) => true,
            (SymbolKind::Theory, SymbolKind::Declaration | SymbolKind::Formula) => true,
            (SymbolKind::File | SymbolKind::Theory, k) => k.is_diagnostic(),
            _ => false,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SymbolKind::Root => "Root",
            SymbolKind::File => "File",
            SymbolKind::Theory => "Theory",
            SymbolKind::Declaration => "Declaration",
            SymbolKind::Formula => "Formula",
            SymbolKind::Error => "Error",
            SymbolKind::Warning => "Warning",
            SymbolKind::Message => "Message",
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SymbolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Root" => Ok(SymbolKind::Root),
            "File" => Ok(SymbolKind::File),
            "Theory" => Ok(SymbolKind::Theory),
            "Declaration" => Ok(SymbolKind::Declaration),
            "Formula" => Ok(SymbolKind::Formula),
            "Error" => Ok(SymbolKind::Error),
            "Warning" => Ok(SymbolKind::Warning),
            "Message" => Ok(SymbolKind::Message),
            _ => Err(format!("unknown symbol kind: {}", s)),
        }
    }
}

/// Node as reported by the prover, before it is placed in the tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescription {
    pub kind: SymbolKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl NodeDescription {
    pub fn new(kind: SymbolKind, name: impl Into<String>) -> Self {
        NodeDescription {
            kind,
            name: name.into(),
            location: None,
        }
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// A node of the symbol tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolNode {
    pub name: String,
    pub kind: SymbolKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SymbolNode>,
}

impl SymbolNode {
    pub fn new(kind: SymbolKind, name: impl Into<String>) -> Self {
        SymbolNode {
            name: name.into(),
            kind,
            location: None,
            children: vec![],
        }
    }

    pub fn root() -> Self {
        SymbolNode::new(SymbolKind::Root, SymbolKind::Root.label())
    }

    /// First direct child with the given name
    pub fn child(&self, name: &str) -> Option<&SymbolNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Follow a path of child names from this node
    pub fn find_path(&self, path: &[&str]) -> Option<&SymbolNode> {
        path.iter().try_fold(self, |node, name| node.child(name))
    }

    /// Number of nodes in this subtree, including this one
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(SymbolNode::count).sum::<usize>()
    }
}

impl From<NodeDescription> for SymbolNode {
    fn from(desc: NodeDescription) -> Self {
        SymbolNode {
            name: desc.name,
            kind: desc.kind,
            location: desc.location,
            children: vec![],
        }
    }
}

/// Outcome of inserting a node description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Attached; `depth` is the new node's distance from the root
    Attached { depth: usize },
    /// No legal ancestor on the stack; the node was not added
    Orphaned,
}

/// Stack-based incremental tree builder
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    root: SymbolNode,
    /// Current ancestor path as (child index, kind), root excluded
    stack: Vec<(usize, SymbolKind)>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        TreeBuilder {
            root: SymbolNode::root(),
            stack: vec![],
        }
    }

    pub fn root(&self) -> &SymbolNode {
        &self.root
    }

    pub fn snapshot(&self) -> Arc<SymbolNode> {
        Arc::new(self.root.clone())
    }

    /// Kind of the node new children would currently be compared against
    pub fn current_kind(&self) -> SymbolKind {
        self.stack.last().map_or(SymbolKind::Root, |(_, kind)| *kind)
    }

    /// Insert a node below the nearest ancestor of strictly lower rank
    pub fn insert(&mut self, desc: NodeDescription) -> Placement {
        let rank = desc.kind.rank();

        let mut depth = self.stack.len();
        while depth > 0 && self.stack[depth - 1].1.rank() >= rank {
            depth -= 1;
        }

        let parent_kind = if depth == 0 {
            SymbolKind::Root
        } else {
            self.stack[depth - 1].1
        };

        if !parent_kind.accepts(desc.kind) {
            warn!(
                "no {} ancestor can hold {} `{}`; dropping it from the tree",
                parent_kind, desc.kind, desc.name
            );
            return Placement::Orphaned;
        }

        self.stack.truncate(depth);
        let kind = desc.kind;
        let parent = descend(&mut self.root, &self.stack);

        let existing = if kind.is_container() {
            parent
                .children
                .iter()
                .position(|c| c.kind == kind && c.name == desc.name)
        } else {
            None
        };

        let index = match existing {
            Some(index) => {
                if desc.location.is_some() {
                    parent.children[index].location = desc.location;
                }
                index
            }
            None => {
                parent.children.push(SymbolNode::from(desc));
                parent.children.len() - 1
            }
        };

        self.stack.push((index, kind));
        Placement::Attached {
            depth: self.stack.len(),
        }
    }

    /// Prepare a fresh typecheck of `name`
    ///
    /// Returns the discarded contents, or `None` if the file was not in the
    /// tree yet. Hand them to [`TreeBuilder::restore_file`] if the typecheck
    /// never happens.
    pub fn begin_file(&mut self, name: &str) -> Option<Vec<SymbolNode>> {
        let (index, previous) = match self.file_index(name) {
            Some(index) => {
                let previous = std::mem::take(&mut self.root.children[index].children);
                (index, Some(previous))
            }
            None => {
                self.root.children.push(SymbolNode::new(SymbolKind::File, name));
                (self.root.children.len() - 1, None)
            }
        };
        debug!("rebuilding symbols of {}", name);
        self.stack = vec![(index, SymbolKind::File)];
        previous
    }

    /// Undo a [`TreeBuilder::begin_file`] whose typecheck was never sent
    pub fn restore_file(&mut self, name: &str, previous: Option<Vec<SymbolNode>>) {
        match previous {
            Some(children) => {
                if let Some(index) = self.file_index(name) {
                    self.root.children[index].children = children;
                }
            }
            None => {
                self.close_file(name);
            }
        }
        debug!("restored symbols of {}", name);
        self.stack.clear();
    }

    /// A response is complete; later diagnostics no longer belong to it
    pub fn end_response(&mut self) {
        self.stack.clear();
    }

    /// Remove a file and everything below it; returns whether it existed
    pub fn close_file(&mut self, name: &str) -> bool {
        let before = self.root.children.len();
        self.root
            .children
            .retain(|c| !(c.kind == SymbolKind::File && c.name == name));
        let removed = self.root.children.len() != before;
        if removed {
            self.stack.clear();
        }
        removed
    }

    fn file_index(&self, name: &str) -> Option<usize> {
        self.root
            .children
            .iter()
            .position(|c| c.kind == SymbolKind::File && c.name == name)
    }

    pub fn reset(&mut self) {
        self.root = SymbolNode::root();
        self.stack.clear();
    }
}

fn descend<'a>(root: &'a mut SymbolNode, path: &[(usize, SymbolKind)]) -> &'a mut SymbolNode {
    let mut node = root;
    for &(index, _) in path {
        node = &mut node.children[index];
    }
    node
}
