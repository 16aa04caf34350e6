//! Named, change-tracked node trees.
//!
//! A [`Tree`] is an arena of nodes addressed by [`NodeId`] handles. Each node
//! has a name that is unique among its siblings, an ordered list of children,
//! and two layers of named values:
//!
//! - **properties**: the committed values, as last loaded or saved.
//! - **fields**: the live values an editor works on.
//!
//! Properties are mirrored into fields when set ("visible" properties).
//! [`Tree::is_changed`] and [`Tree::changes`] compare the two layers,
//! [`Tree::commit`] promotes fields to properties and [`Tree::revert`] goes the
//! other way.
//!
//! Every node owns a [`Broadcaster`]. Events sent on a node are delivered to
//! its listeners first and then to the listeners of every ancestor, so a
//! listener on the root observes the whole tree.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use webact::model::Tree;
//!
//! let tree: Tree = Tree::new();
//! let root = tree.create_node("/");
//! let page = tree.add_node(root, "/docs/intro").unwrap();
//!
//! assert_eq!(tree.path(page), "/docs/intro");
//! tree.set_property(page, "title", json!("Intro")).unwrap();
//! tree.set_field(page, "title", json!("Introduction")).unwrap();
//! assert!(tree.is_changed(page));
//! ```

use parking_lot::RwLock;
use serde_json::Value;
use slotmap::{SlotMap, new_key_type};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use webact_core::{Broadcaster, Event, ListenerId};

use super::error::{TreeError, TreeResult};
use crate::paths;

new_key_type! {
    /// A handle to a node in a [`Tree`].
    ///
    /// Handles stay valid while the node is moved around the tree and become
    /// invalid once the node is destroyed.
    pub struct NodeId;
}

/// Notification sent by tree nodes.
///
/// `source` is the node that sent the event; ancestors receive the same
/// event unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeEvent {
    /// `child` was inserted into `source` at `index`.
    Added {
        source: NodeId,
        index: usize,
        child: NodeId,
    },
    /// `child` was detached from `parent` (the source) at `index`.
    Removed {
        source: NodeId,
        index: usize,
        child: NodeId,
        parent: NodeId,
    },
    /// Property `name` of `source` changed from `prior` to `value`.
    Changed {
        source: NodeId,
        index: Option<usize>,
        name: String,
        value: Value,
        prior: Option<Value>,
    },
}

impl TreeEvent {
    /// The node that sent the event.
    pub fn source(&self) -> NodeId {
        match self {
            Self::Added { source, .. } | Self::Removed { source, .. } | Self::Changed { source, .. } => {
                *source
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeEventKind {
    Added,
    Removed,
    Changed,
}

impl Event for TreeEvent {
    type Kind = TreeEventKind;

    fn kind(&self) -> TreeEventKind {
        match self {
            Self::Added { .. } => TreeEventKind::Added,
            Self::Removed { .. } => TreeEventKind::Removed,
            Self::Changed { .. } => TreeEventKind::Changed,
        }
    }
}

/// Internal data stored in the arena for each node.
struct NodeData<D> {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    child_map: HashMap<String, NodeId>,
    /// Position in the parent's children.
    index: Option<usize>,
    properties: BTreeMap<String, Value>,
    fields: BTreeMap<String, Value>,
    /// Names whose properties are mirrored into fields.
    visible: BTreeSet<String>,
    base_path: Option<String>,
    data: D,
    events: Arc<Broadcaster<TreeEvent>>,
}

impl<D> NodeData<D> {
    fn new(name: String, data: D) -> Self {
        Self {
            name,
            parent: None,
            children: Vec::new(),
            child_map: HashMap::new(),
            index: None,
            properties: BTreeMap::new(),
            fields: BTreeMap::new(),
            visible: BTreeSet::new(),
            base_path: None,
            data,
            events: Arc::new(Broadcaster::new()),
        }
    }

    fn reset<I, K>(&mut self, properties: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        for name in std::mem::take(&mut self.visible) {
            self.fields.remove(&name);
        }
        self.properties.clear();
        for (name, value) in properties {
            let name = name.into();
            if !self.fields.contains_key(&name) {
                self.visible.insert(name.clone());
                self.fields.insert(name.clone(), value.clone());
            }
            self.properties.insert(name, value);
        }
    }

    fn revert(&mut self) {
        for name in &self.visible {
            if let Some(value) = self.properties.get(name) {
                self.fields.insert(name.clone(), value.clone());
            }
        }
    }

    fn changed_names(&self) -> impl Iterator<Item = &String> {
        self.visible
            .iter()
            .filter(|name| self.properties.get(*name) != self.fields.get(*name))
    }
}

type Nodes<D> = SlotMap<NodeId, NodeData<D>>;

/// Check if `potential_ancestor` is `id` or one of its ancestors.
fn is_ancestor_of<D>(nodes: &Nodes<D>, potential_ancestor: NodeId, id: NodeId) -> bool {
    let mut current = Some(id);
    while let Some(current_id) = current {
        if current_id == potential_ancestor {
            return true;
        }
        current = nodes.get(current_id).and_then(|data| data.parent);
    }
    false
}

/// Refresh the cached `index` of every child of `parent`.
fn reindex<D>(nodes: &mut Nodes<D>, parent: NodeId) {
    let Some(children) = nodes.get(parent).map(|data| data.children.clone()) else {
        return;
    };
    for (index, child) in children.into_iter().enumerate() {
        if let Some(data) = nodes.get_mut(child) {
            data.index = Some(index);
        }
    }
}

fn preorder<D>(nodes: &Nodes<D>, start: NodeId, result: &mut Vec<NodeId>) {
    let Some(data) = nodes.get(start) else {
        return;
    };
    result.push(start);
    for &child in &data.children {
        preorder(nodes, child, result);
    }
}

/// An arena of named, change-tracked nodes.
///
/// `D` is a per-node payload, defaulting to `()`. Every operation takes the
/// handle of the node it applies to. Locks are never held while listeners
/// run, so listeners may freely read and modify the tree.
pub struct Tree<D = ()> {
    nodes: RwLock<Nodes<D>>,
}

impl<D: Send + Sync + 'static> Default for Tree<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Send + Sync + 'static> Tree<D> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(SlotMap::with_key()),
        }
    }

    /// Create a detached node with the given properties and payload.
    pub fn create_node_with<I, K>(&self, name: impl Into<String>, properties: I, data: D) -> NodeId
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut node = NodeData::new(name.into(), data);
        node.reset(properties);
        let id = self.nodes.write().insert(node);
        tracing::trace!(target: "webact::tree", ?id, "created node");
        id
    }

    /// Number of live nodes, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Whether the tree holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Whether `node` refers to a live node.
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.read().contains_key(node)
    }

    fn read<R>(&self, node: NodeId, f: impl FnOnce(&NodeData<D>) -> R) -> TreeResult<R> {
        self.nodes.read().get(node).map(f).ok_or(TreeError::InvalidNode)
    }

    fn write<R>(&self, node: NodeId, f: impl FnOnce(&mut NodeData<D>) -> R) -> TreeResult<R> {
        self.nodes.write().get_mut(node).map(f).ok_or(TreeError::InvalidNode)
    }

    /// Deliver `event` to `source` and then to each of its ancestors.
    fn dispatch(&self, source: NodeId, event: TreeEvent) {
        let chain: Vec<Arc<Broadcaster<TreeEvent>>> = {
            let nodes = self.nodes.read();
            let mut chain = Vec::new();
            let mut current = Some(source);
            while let Some(id) = current {
                let Some(data) = nodes.get(id) else { break };
                chain.push(data.events.clone());
                current = data.parent;
            }
            chain
        };
        for events in chain {
            events.send_broadcast(&event);
        }
    }

    // -------------------------------------------------------------------------
    // Structure
    // -------------------------------------------------------------------------

    /// Insert `child` into `parent` at `index` (append when `None`).
    ///
    /// A sibling with the same name is removed first. If `child` is attached
    /// elsewhere it is detached, and moving a child forward within the same
    /// parent accounts for its own vacated slot. Broadcasts `Added` and
    /// returns the position the child ended up at.
    #[tracing::instrument(skip(self), target = "webact::tree", level = "trace")]
    pub fn add_child(&self, parent: NodeId, child: NodeId, index: Option<usize>) -> TreeResult<usize> {
        let (mut target, prior) = {
            let nodes = self.nodes.read();
            let parent_data = nodes.get(parent).ok_or(TreeError::InvalidNode)?;
            let child_data = nodes.get(child).ok_or(TreeError::InvalidNode)?;
            if child_data.name.is_empty() {
                return Err(TreeError::UnnamedNode);
            }
            if is_ancestor_of(&nodes, child, parent) {
                return Err(TreeError::CircularParentage);
            }
            let len = parent_data.children.len();
            let target = index.unwrap_or(len);
            if target > len {
                return Err(TreeError::IndexOutOfBounds { index: target, len });
            }
            let prior = parent_data
                .child_map
                .get(&child_data.name)
                .copied()
                .filter(|&prior| prior != child);
            (target, prior)
        };

        if let Some(prior) = prior {
            tracing::trace!(target: "webact::tree", ?prior, "evicting sibling with the same name");
            self.remove(prior);
        }
        if self.parent(child) == Some(parent) && self.index(child).is_some_and(|at| at < target) {
            target -= 1;
        }
        self.remove(child);

        let index = {
            let mut nodes = self.nodes.write();
            let name = nodes.get(child).ok_or(TreeError::InvalidNode)?.name.clone();
            let parent_data = nodes.get_mut(parent).ok_or(TreeError::InvalidNode)?;
            let index = target.min(parent_data.children.len());
            parent_data.children.insert(index, child);
            parent_data.child_map.insert(name, child);
            reindex(&mut nodes, parent);
            if let Some(child_data) = nodes.get_mut(child) {
                child_data.parent = Some(parent);
            }
            index
        };

        self.dispatch(
            parent,
            TreeEvent::Added {
                source: parent,
                index,
                child,
            },
        );
        Ok(index)
    }

    /// Detach `child` from `parent`, broadcasting `Removed` with the index
    /// the child had.
    ///
    /// Returns `false` when `child` is not a child of `parent`.
    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> bool {
        let index = {
            let mut nodes = self.nodes.write();
            let Some(name) = nodes.get(child).map(|data| data.name.clone()) else {
                return false;
            };
            let Some(parent_data) = nodes.get_mut(parent) else {
                return false;
            };
            let Some(index) = parent_data.children.iter().position(|&c| c == child) else {
                return false;
            };
            parent_data.children.remove(index);
            if parent_data.child_map.get(&name) == Some(&child) {
                parent_data.child_map.remove(&name);
            }
            reindex(&mut nodes, parent);
            if let Some(child_data) = nodes.get_mut(child)
                && child_data.parent == Some(parent)
            {
                child_data.parent = None;
                child_data.index = None;
            }
            index
        };

        tracing::trace!(target: "webact::tree", ?parent, ?child, index, "removed child");
        self.dispatch(
            parent,
            TreeEvent::Removed {
                source: parent,
                index,
                child,
                parent,
            },
        );
        true
    }

    /// Detach `node` from its parent. Returns `false` for a detached node.
    pub fn remove(&self, node: NodeId) -> bool {
        match self.parent(node) {
            Some(parent) => self.remove_child(parent, node),
            None => false,
        }
    }

    /// Detach `node` and free it together with its descendants.
    ///
    /// Handles to the destroyed nodes become invalid.
    #[tracing::instrument(skip(self), target = "webact::tree", level = "trace")]
    pub fn destroy(&self, node: NodeId) -> TreeResult<()> {
        if !self.contains(node) {
            return Err(TreeError::InvalidNode);
        }
        self.remove(node);
        let mut nodes = self.nodes.write();
        let mut doomed = Vec::new();
        preorder(&nodes, node, &mut doomed);
        tracing::trace!(target: "webact::tree", ?node, count = doomed.len(), "destroying subtree");
        for id in doomed {
            nodes.remove(id);
        }
        Ok(())
    }

    /// Resolve `path` from `start`, creating missing nodes.
    ///
    /// An empty segment (a leading `/`) jumps to the root of `start`.
    pub fn add_node(&self, start: NodeId, path: &str) -> TreeResult<NodeId>
    where
        D: Default,
    {
        if !self.contains(start) {
            return Err(TreeError::InvalidNode);
        }
        let mut examine = start;
        for name in paths::split(path) {
            if name.is_empty() {
                examine = self.root_of(examine);
                continue;
            }
            examine = match self.child_named(examine, name) {
                Some(next) => next,
                None => {
                    let next = self.create_node(name);
                    self.add_child(examine, next, None)?;
                    next
                }
            };
        }
        Ok(examine)
    }

    /// Resolve `path` from `start` without creating anything.
    pub fn get_node(&self, start: NodeId, path: &str) -> Option<NodeId> {
        if !self.contains(start) {
            return None;
        }
        let mut examine = start;
        for name in paths::split(path) {
            examine = if name.is_empty() {
                self.root_of(start)
            } else {
                self.child_named(examine, name)?
            };
        }
        Some(examine)
    }

    /// The topmost ancestor of `node` (the node itself when detached).
    pub fn root_of(&self, node: NodeId) -> NodeId {
        let nodes = self.nodes.read();
        let mut examine = node;
        while let Some(parent) = nodes.get(examine).and_then(|data| data.parent) {
            examine = parent;
        }
        examine
    }

    /// The child of `parent` named `name`.
    pub fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.read(parent, |data| data.child_map.get(name).copied())
            .ok()
            .flatten()
    }

    /// The child of `parent` at `index`.
    pub fn child(&self, parent: NodeId, index: usize) -> Option<NodeId> {
        self.read(parent, |data| data.children.get(index).copied())
            .ok()
            .flatten()
    }

    /// Number of children of `parent`.
    pub fn size(&self, parent: NodeId) -> usize {
        self.read(parent, |data| data.children.len()).unwrap_or(0)
    }

    /// The children of `parent`, in order.
    pub fn children(&self, parent: NodeId) -> Vec<NodeId> {
        self.read(parent, |data| data.children.clone())
            .unwrap_or_default()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.read(node, |data| data.parent).ok().flatten()
    }

    /// Position of `node` among its siblings; `None` when detached.
    pub fn index(&self, node: NodeId) -> Option<usize> {
        self.read(node, |data| data.index).ok().flatten()
    }

    pub fn name(&self, node: NodeId) -> Option<String> {
        self.read(node, |data| data.name.clone()).ok()
    }

    /// Calls `closure` with every child of `parent` and its index.
    pub fn each<F>(&self, parent: NodeId, mut closure: F)
    where
        F: FnMut(NodeId, usize),
    {
        for (index, child) in self.children(parent).into_iter().enumerate() {
            closure(child, index);
        }
    }

    /// The subtree rooted at `start`, in pre-order.
    pub fn subtree(&self, start: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        preorder(&self.nodes.read(), start, &mut result);
        result
    }

    /// Calls `closure` with `start` and each of its descendants, in pre-order.
    ///
    /// The traversal is computed up front, so the closure may modify the tree.
    pub fn each_node<F>(&self, start: NodeId, mut closure: F)
    where
        F: FnMut(NodeId),
    {
        for node in self.subtree(start) {
            closure(node);
        }
    }

    // -------------------------------------------------------------------------
    // Traversal
    // -------------------------------------------------------------------------

    /// The node after `node` in a pre-order walk of the whole tree.
    pub fn next(&self, node: NodeId) -> Option<NodeId> {
        if let Some(first) = self.child(node, 0) {
            return Some(first);
        }
        let mut examine = node;
        while let Some(ancestor) = self.parent(examine) {
            if let Some(after) = self.child_after(ancestor, examine) {
                return Some(after);
            }
            examine = ancestor;
        }
        None
    }

    /// The node before `node` in a pre-order walk of the whole tree.
    pub fn previous(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        match self.child_before(parent, node) {
            Some(before) => Some(self.last_descendant(before)),
            None => Some(parent),
        }
    }

    /// The sibling following `sibling` within `parent`.
    pub fn child_after(&self, parent: NodeId, sibling: NodeId) -> Option<NodeId> {
        let nodes = self.nodes.read();
        let data = nodes.get(sibling)?;
        if data.parent != Some(parent) {
            return None;
        }
        let index = data.index?;
        nodes.get(parent)?.children.get(index + 1).copied()
    }

    /// The sibling preceding `sibling` within `parent`.
    pub fn child_before(&self, parent: NodeId, sibling: NodeId) -> Option<NodeId> {
        let nodes = self.nodes.read();
        let data = nodes.get(sibling)?;
        if data.parent != Some(parent) {
            return None;
        }
        let index = data.index?.checked_sub(1)?;
        nodes.get(parent)?.children.get(index).copied()
    }

    /// The last node of the subtree rooted at `node` in pre-order.
    pub fn last_descendant(&self, node: NodeId) -> NodeId {
        let nodes = self.nodes.read();
        let mut examine = node;
        while let Some(&last) = nodes.get(examine).and_then(|data| data.children.last()) {
            examine = last;
        }
        examine
    }

    // -------------------------------------------------------------------------
    // Paths
    // -------------------------------------------------------------------------

    /// The names from the root down to `node`, joined with `/`.
    ///
    /// With a root named `/` this yields `"/a/b"`.
    pub fn path(&self, node: NodeId) -> String {
        let nodes = self.nodes.read();
        let mut names = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            let Some(data) = nodes.get(id) else { break };
            names.push(data.name.as_str());
            current = data.parent;
        }
        names.reverse();
        paths::join(names)
    }

    /// Override the absolute path of `node` and, through it, its descendants.
    pub fn set_base_path(&self, node: NodeId, base_path: impl Into<String>) -> TreeResult<()> {
        let base_path = base_path.into();
        self.write(node, |data| data.base_path = Some(base_path))
    }

    /// The path of `node` resolved against the nearest base path override.
    ///
    /// A detached node without a base path resolves to its own name.
    pub fn absolute_path(&self, node: NodeId) -> String {
        let nodes = self.nodes.read();
        let mut names = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            let Some(data) = nodes.get(id) else { break };
            if let Some(base_path) = &data.base_path {
                names.push(base_path.as_str());
                break;
            }
            names.push(data.name.as_str());
            current = data.parent;
        }
        if let [only] = names.as_slice() {
            return (*only).to_owned();
        }
        names.reverse();
        paths::join(names)
    }

    // -------------------------------------------------------------------------
    // Properties
    // -------------------------------------------------------------------------

    /// Set the committed value of property `name`.
    ///
    /// Does nothing and returns `Ok(false)` when the property already holds
    /// `value`. Otherwise the value is mirrored into the live field (unless an
    /// unrelated field of that name exists) and `Changed` is broadcast.
    pub fn set_property(&self, node: NodeId, name: &str, value: impl Into<Value>) -> TreeResult<bool> {
        let value = value.into();
        let update = self.write(node, |data| {
            let prior = data.properties.get(name).cloned();
            if prior.as_ref() == Some(&value) {
                return None;
            }
            data.properties.insert(name.to_owned(), value.clone());
            if !data.fields.contains_key(name) || data.visible.contains(name) {
                data.visible.insert(name.to_owned());
                data.fields.insert(name.to_owned(), value.clone());
            }
            Some((data.index, prior))
        })?;

        let Some((index, prior)) = update else {
            return Ok(false);
        };
        tracing::trace!(target: "webact::tree", ?node, name, "property changed");
        self.dispatch(
            node,
            TreeEvent::Changed {
                source: node,
                index,
                name: name.to_owned(),
                value,
                prior,
            },
        );
        Ok(true)
    }

    /// The committed value of property `name`.
    pub fn property(&self, node: NodeId, name: &str) -> Option<Value> {
        self.read(node, |data| data.properties.get(name).cloned())
            .ok()
            .flatten()
    }

    /// The committed value of property `name`, or `default` when it is
    /// missing or null.
    pub fn property_or(&self, node: NodeId, name: &str, default: impl Into<Value>) -> Value {
        match self.property(node, name) {
            Some(value) if !value.is_null() => value,
            _ => default.into(),
        }
    }

    /// Snapshot of all committed properties.
    pub fn properties(&self, node: NodeId) -> BTreeMap<String, Value> {
        self.read(node, |data| data.properties.clone())
            .unwrap_or_default()
    }

    /// The live value of field `name`.
    pub fn field(&self, node: NodeId, name: &str) -> Option<Value> {
        self.read(node, |data| data.fields.get(name).cloned())
            .ok()
            .flatten()
    }

    /// Edit the live value of field `name`. No event is sent.
    pub fn set_field(&self, node: NodeId, name: &str, value: impl Into<Value>) -> TreeResult<()> {
        let value = value.into();
        self.write(node, |data| {
            data.fields.insert(name.to_owned(), value);
        })
    }

    /// Promote live fields to committed properties.
    ///
    /// `names` defaults to every visible property. Listed names become
    /// visible; names without a live field are left alone. Afterwards all
    /// visible fields are reverted to their (now committed) properties.
    pub fn commit(&self, node: NodeId, names: Option<&[&str]>) -> TreeResult<()> {
        let names: Vec<String> = match names {
            Some(names) => names.iter().map(|name| (*name).to_owned()).collect(),
            None => self.read(node, |data| data.visible.iter().cloned().collect())?,
        };
        for name in names {
            let field = self.write(node, |data| {
                data.visible.insert(name.clone());
                data.fields.get(&name).cloned()
            })?;
            if let Some(value) = field {
                self.set_property(node, &name, value)?;
            }
        }
        self.revert(node)
    }

    /// Restore every visible field from its committed property.
    pub fn revert(&self, node: NodeId) -> TreeResult<()> {
        self.write(node, NodeData::revert)
    }

    /// Replace all properties, clearing the previously visible fields.
    ///
    /// Each new property is mirrored into a field unless an unrelated field of
    /// that name exists. No event is sent.
    pub fn reset<I, K>(&self, node: NodeId, properties: I) -> TreeResult<()>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.write(node, |data| data.reset(properties))
    }

    /// Whether any visible field differs from its committed property.
    pub fn is_changed(&self, node: NodeId) -> bool {
        self.read(node, |data| data.changed_names().next().is_some())
            .unwrap_or(false)
    }

    /// The live values of every visible field that differs from its
    /// committed property.
    pub fn changes(&self, node: NodeId) -> BTreeMap<String, Value> {
        self.read(node, |data| {
            data.changed_names()
                .filter_map(|name| Some((name.clone(), data.fields.get(name)?.clone())))
                .collect()
        })
        .unwrap_or_default()
    }

    // -------------------------------------------------------------------------
    // Events and payload
    // -------------------------------------------------------------------------

    /// Register a listener on `node`. It also receives events sent by
    /// descendants of `node`.
    pub fn add_listener<F>(&self, node: NodeId, kind: TreeEventKind, listener: F) -> TreeResult<ListenerId>
    where
        F: Fn(&TreeEvent) + Send + Sync + 'static,
    {
        let events = self.read(node, |data| data.events.clone())?;
        Ok(events.add_listener(kind, listener))
    }

    /// Remove a listener registered with [`add_listener`](Self::add_listener).
    pub fn remove_listener(&self, node: NodeId, kind: TreeEventKind, id: ListenerId) -> bool {
        self.read(node, |data| data.events.clone())
            .map(|events| events.remove_listener(kind, id))
            .unwrap_or(false)
    }

    /// The broadcaster owned by `node`.
    pub fn events(&self, node: NodeId) -> TreeResult<Arc<Broadcaster<TreeEvent>>> {
        self.read(node, |data| data.events.clone())
    }

    /// Run `f` with the payload of `node`.
    ///
    /// The tree is locked while `f` runs; `f` must not call back into it.
    pub fn with_data<R>(&self, node: NodeId, f: impl FnOnce(&D) -> R) -> TreeResult<R> {
        self.read(node, |data| f(&data.data))
    }

    /// Run `f` with mutable access to the payload of `node`.
    ///
    /// The tree is locked while `f` runs; `f` must not call back into it.
    pub fn modify_data<R>(&self, node: NodeId, f: impl FnOnce(&mut D) -> R) -> TreeResult<R> {
        self.write(node, |data| f(&mut data.data))
    }

    /// Render `node` and its descendants as `TreeNode(name, TreeNode(..), ..)`.
    pub fn describe(&self, node: NodeId) -> String {
        let nodes = self.nodes.read();
        let mut output = String::new();
        describe_into(&nodes, node, &mut output);
        output
    }
}

impl<D: Default + Send + Sync + 'static> Tree<D> {
    /// Create a detached node with a default payload.
    pub fn create_node(&self, name: impl Into<String>) -> NodeId {
        self.create_node_with(name, std::iter::empty::<(String, Value)>(), D::default())
    }
}

fn describe_into<D>(nodes: &Nodes<D>, node: NodeId, output: &mut String) {
    let Some(data) = nodes.get(node) else {
        return;
    };
    output.push_str("TreeNode(");
    output.push_str(&data.name);
    for &child in &data.children {
        output.push_str(", ");
        describe_into(nodes, child, output);
    }
    output.push(')');
}

impl<D> fmt::Debug for Tree<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("node_count", &self.nodes.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    fn record(tree: &Tree, node: NodeId) -> Arc<Mutex<Vec<TreeEvent>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        for kind in [TreeEventKind::Added, TreeEventKind::Removed, TreeEventKind::Changed] {
            let log = log.clone();
            tree.add_listener(node, kind, move |event| log.lock().push(event.clone()))
                .unwrap();
        }
        log
    }

    /// root "/" with children a, b, c; a has children a1, a2.
    fn sample() -> (Tree, NodeId, [NodeId; 5]) {
        let tree = Tree::new();
        let root = tree.create_node("/");
        let a = tree.add_node(root, "a").unwrap();
        let a1 = tree.add_node(a, "a1").unwrap();
        let a2 = tree.add_node(a, "a2").unwrap();
        let b = tree.add_node(root, "b").unwrap();
        let c = tree.add_node(root, "c").unwrap();
        (tree, root, [a, a1, a2, b, c])
    }

    #[test]
    fn test_add_and_lookup() {
        let tree: Tree = Tree::new();
        let root = tree.create_node("/");
        let child = tree.create_node("child");

        assert_eq!(tree.add_child(root, child, None), Ok(0));
        assert_eq!(tree.child_named(root, "child"), Some(child));
        assert_eq!(tree.parent(child), Some(root));
        assert_eq!(tree.index(child), Some(0));
        assert_eq!(tree.child(root, 0), Some(child));
        assert_eq!(tree.size(root), 1);

        assert!(tree.remove_child(root, child));
        assert_eq!(tree.child_named(root, "child"), None);
        assert_eq!(tree.parent(child), None);
        assert_eq!(tree.index(child), None);
        assert!(!tree.remove_child(root, child));
    }

    #[test]
    fn test_add_child_errors() {
        let (tree, root, [a, a1, ..]) = sample();
        let unnamed = tree.create_node("");

        assert_eq!(tree.add_child(root, unnamed, None), Err(TreeError::UnnamedNode));
        assert_eq!(tree.add_child(a1, a, None), Err(TreeError::CircularParentage));
        assert_eq!(tree.add_child(a, a, None), Err(TreeError::CircularParentage));
        assert_eq!(tree.add_child(a1, root, None), Err(TreeError::CircularParentage));

        let spare = tree.create_node("spare");
        assert_eq!(
            tree.add_child(a1, spare, Some(1)),
            Err(TreeError::IndexOutOfBounds { index: 1, len: 0 })
        );
        tree.destroy(spare).unwrap();
        assert_eq!(tree.add_child(root, spare, None), Err(TreeError::InvalidNode));
    }

    #[test]
    fn test_insert_at_index_reindexes() {
        let (tree, root, [a, _, _, b, c]) = sample();
        let first = tree.create_node("first");

        assert_eq!(tree.add_child(root, first, Some(0)), Ok(0));
        assert_eq!(tree.children(root), vec![first, a, b, c]);
        for (index, child) in tree.children(root).into_iter().enumerate() {
            assert_eq!(tree.index(child), Some(index));
        }
    }

    #[test]
    fn test_name_collision_evicts_sibling() {
        let (tree, root, [a, _, _, b, c]) = sample();
        let log = record(&tree, root);
        let replacement = tree.create_node("b");

        tree.add_child(root, replacement, None).unwrap();
        assert_eq!(tree.children(root), vec![a, c, replacement]);
        assert_eq!(tree.parent(b), None);
        assert_eq!(tree.child_named(root, "b"), Some(replacement));
        assert_eq!(
            *log.lock(),
            vec![
                TreeEvent::Removed {
                    source: root,
                    index: 1,
                    child: b,
                    parent: root
                },
                TreeEvent::Added {
                    source: root,
                    index: 2,
                    child: replacement
                },
            ]
        );
    }

    #[test]
    fn test_move_forward_within_parent() {
        let (tree, root, [a, _, _, b, c]) = sample();

        // Moving a to position 2 of [a, b, c] lands it before c
        assert_eq!(tree.add_child(root, a, Some(2)), Ok(1));
        assert_eq!(tree.children(root), vec![b, a, c]);

        // Moving to the end
        assert_eq!(tree.add_child(root, b, None), Ok(2));
        assert_eq!(tree.children(root), vec![a, c, b]);
    }

    #[test]
    fn test_reparent_detaches_first() {
        let (tree, root, [a, a1, a2, b, _]) = sample();
        let log = record(&tree, root);

        tree.add_child(b, a1, None).unwrap();
        assert_eq!(tree.children(a), vec![a2]);
        assert_eq!(tree.index(a2), Some(0));
        assert_eq!(tree.parent(a1), Some(b));
        assert_eq!(
            *log.lock(),
            vec![
                TreeEvent::Removed {
                    source: a,
                    index: 0,
                    child: a1,
                    parent: a
                },
                TreeEvent::Added {
                    source: b,
                    index: 0,
                    child: a1
                },
            ]
        );
    }

    #[test]
    fn test_events_propagate_to_ancestors() {
        let (tree, root, [a, a1, ..]) = sample();
        let at_root = record(&tree, root);
        let at_a = record(&tree, a);
        let at_leaf = record(&tree, a1);

        tree.set_property(a1, "title", "Leaf").unwrap();
        let expected = vec![TreeEvent::Changed {
            source: a1,
            index: Some(0),
            name: "title".into(),
            value: json!("Leaf"),
            prior: None,
        }];
        assert_eq!(*at_leaf.lock(), expected);
        assert_eq!(*at_a.lock(), expected);
        assert_eq!(*at_root.lock(), expected);
    }

    #[test]
    fn test_add_and_get_node_paths() {
        let tree: Tree = Tree::new();
        let root = tree.create_node("/");
        let c = tree.add_node(root, "/a/b/c").unwrap();

        assert_eq!(tree.len(), 4);
        assert_eq!(tree.get_node(root, "/a/b/c"), Some(c));
        assert_eq!(tree.add_node(root, "/a/b/c"), Ok(c));
        assert_eq!(tree.len(), 4);

        let a = tree.get_node(root, "a").unwrap();
        assert_eq!(tree.get_node(a, "b/c"), Some(c));
        assert_eq!(tree.get_node(c, "/a"), Some(a));
        assert_eq!(tree.get_node(root, "/a/missing"), None);
        assert_eq!(tree.get_node(root, "/"), Some(root));
        assert_eq!(tree.path(c), "/a/b/c");
        assert_eq!(tree.path(root), "");
        assert_eq!(tree.root_of(c), root);
    }

    #[test]
    fn test_traversal() {
        let (tree, root, [a, a1, a2, b, c]) = sample();

        let mut order = Vec::new();
        tree.each_node(root, |node| order.push(node));
        assert_eq!(order, vec![root, a, a1, a2, b, c]);

        let mut subtree = Vec::new();
        tree.each_node(a, |node| subtree.push(node));
        assert_eq!(subtree, vec![a, a1, a2]);

        assert_eq!(tree.next(root), Some(a));
        assert_eq!(tree.next(a2), Some(b));
        assert_eq!(tree.next(c), None);
        assert_eq!(tree.previous(b), Some(a2));
        assert_eq!(tree.previous(a1), Some(a));
        assert_eq!(tree.previous(root), None);
        assert_eq!(tree.child_after(root, a), Some(b));
        assert_eq!(tree.child_after(root, c), None);
        assert_eq!(tree.child_before(root, a), None);
        assert_eq!(tree.child_before(root, a1), None);
        assert_eq!(tree.last_descendant(root), c);
        assert_eq!(tree.last_descendant(a), a2);
        assert_eq!(tree.last_descendant(c), c);

        let mut seen = Vec::new();
        tree.each(a, |child, index| seen.push((index, child)));
        assert_eq!(seen, vec![(0, a1), (1, a2)]);
    }

    #[test]
    fn test_absolute_path_uses_base_path() {
        let (tree, root, [a, a1, ..]) = sample();
        assert_eq!(tree.absolute_path(a1), "/a/a1");

        tree.set_base_path(a, "/mounted/here").unwrap();
        assert_eq!(tree.absolute_path(a1), "/mounted/here/a1");
        assert_eq!(tree.absolute_path(a), "/mounted/here");
        assert_eq!(tree.path(a1), "/a/a1");
        assert_eq!(tree.absolute_path(root), "/");
    }

    #[test]
    fn test_set_property_mirrors_and_broadcasts() {
        let (tree, _, [a, ..]) = sample();
        let log = record(&tree, a);

        assert_eq!(tree.set_property(a, "title", "One"), Ok(true));
        assert_eq!(tree.set_property(a, "title", "One"), Ok(false));
        assert_eq!(tree.property(a, "title"), Some(json!("One")));
        assert_eq!(tree.field(a, "title"), Some(json!("One")));
        assert_eq!(log.lock().len(), 1);

        assert_eq!(tree.property_or(a, "missing", 7), json!(7));
        tree.set_property(a, "empty", Value::Null).unwrap();
        assert_eq!(tree.property_or(a, "empty", "fallback"), json!("fallback"));
    }

    #[test]
    fn test_unrelated_field_is_not_overwritten() {
        let (tree, _, [a, ..]) = sample();
        tree.set_field(a, "draft", "local").unwrap();
        tree.set_property(a, "draft", "server").unwrap();

        assert_eq!(tree.field(a, "draft"), Some(json!("local")));
        assert!(!tree.is_changed(a));
    }

    #[test]
    fn test_change_tracking() {
        let (tree, _, [a, ..]) = sample();
        tree.set_property(a, "title", "Old").unwrap();
        tree.set_property(a, "body", "Text").unwrap();
        assert!(!tree.is_changed(a));

        tree.set_field(a, "title", "New").unwrap();
        assert!(tree.is_changed(a));
        assert_eq!(tree.changes(a), BTreeMap::from([("title".to_string(), json!("New"))]));

        tree.revert(a).unwrap();
        assert!(!tree.is_changed(a));
        assert_eq!(tree.field(a, "title"), Some(json!("Old")));

        tree.set_field(a, "title", "Newer").unwrap();
        tree.commit(a, None).unwrap();
        assert!(!tree.is_changed(a));
        assert_eq!(tree.property(a, "title"), Some(json!("Newer")));
    }

    #[test]
    fn test_commit_named_fields() {
        let (tree, _, [a, ..]) = sample();
        let log = record(&tree, a);
        tree.set_field(a, "status", "draft").unwrap();
        tree.set_field(a, "scratch", 1).unwrap();

        tree.commit(a, Some(&["status"][..])).unwrap();
        assert_eq!(tree.property(a, "status"), Some(json!("draft")));
        assert_eq!(tree.property(a, "scratch"), None);
        assert_eq!(log.lock().len(), 1);

        // status is now tracked
        tree.set_field(a, "status", "published").unwrap();
        assert!(tree.is_changed(a));
    }

    #[test]
    fn test_reset() {
        let (tree, _, [a, ..]) = sample();
        let log = record(&tree, a);
        tree.set_property(a, "old", 1).unwrap();
        tree.set_field(a, "other", "kept").unwrap();

        tree.reset(a, json!({"title": "T", "other": "server"}).as_object().cloned().unwrap_or_default())
            .unwrap();
        assert_eq!(tree.property(a, "old"), None);
        assert_eq!(tree.field(a, "old"), None);
        assert_eq!(tree.field(a, "title"), Some(json!("T")));
        assert_eq!(tree.field(a, "other"), Some(json!("kept")));
        assert_eq!(tree.property(a, "other"), Some(json!("server")));
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_create_node_with_properties() {
        let tree: Tree<u32> = Tree::new();
        let node = tree.create_node_with("n", [("title", json!("T"))], 9);
        assert_eq!(tree.field(node, "title"), Some(json!("T")));
        assert_eq!(tree.with_data(node, |data| *data), Ok(9));
        tree.modify_data(node, |data| *data += 1).unwrap();
        assert_eq!(tree.with_data(node, |data| *data), Ok(10));
    }

    #[test]
    fn test_describe() {
        let (tree, root, _) = sample();
        assert_eq!(
            tree.describe(root),
            "TreeNode(/, TreeNode(a, TreeNode(a1), TreeNode(a2)), TreeNode(b), TreeNode(c))"
        );
    }

    #[test]
    fn test_destroy_frees_subtree() {
        let (tree, root, [a, a1, a2, ..]) = sample();
        assert_eq!(tree.len(), 6);

        tree.destroy(a).unwrap();
        assert_eq!(tree.len(), 3);
        assert!(!tree.contains(a1));
        assert!(!tree.contains(a2));
        assert_eq!(tree.child_named(root, "a"), None);
        assert_eq!(tree.destroy(a), Err(TreeError::InvalidNode));
    }

    #[test]
    fn test_listener_may_modify_tree() {
        let tree = Arc::new(Tree::<()>::new());
        let root = tree.create_node("/");
        let tree_clone = tree.clone();
        tree.add_listener(root, TreeEventKind::Added, move |event| {
            if let TreeEvent::Added { child, .. } = event {
                tree_clone.set_property(*child, "seen", true).unwrap();
            }
        })
        .unwrap();

        let child = tree.add_node(root, "x").unwrap();
        assert_eq!(tree.property(child, "seen"), Some(json!(true)));
    }

    #[test]
    fn test_remove_listener() {
        let (tree, root, [a, ..]) = sample();
        let count = Arc::new(Mutex::new(0));
        let count_clone = count.clone();
        let id = tree
            .add_listener(root, TreeEventKind::Changed, move |_| *count_clone.lock() += 1)
            .unwrap();

        tree.set_property(a, "x", 1).unwrap();
        assert!(tree.remove_listener(root, TreeEventKind::Changed, id));
        assert!(!tree.remove_listener(root, TreeEventKind::Changed, id));
        tree.set_property(a, "x", 2).unwrap();
        assert_eq!(*count.lock(), 1);
    }
}
