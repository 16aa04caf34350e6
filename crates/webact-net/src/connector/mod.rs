//! Sequential content connector.
//!
//! A [`Connector`] mirrors part of a remote content tree into a local
//! [`Tree`] and talks to the server through a strict one-at-a-time request
//! queue:
//!
//! - Every request (loads, saves, the whoami lookup, ad-hoc requests) is
//!   appended to a FIFO queue.
//! - [`Connector::next`] starts the head of the queue only when nothing is in
//!   flight.
//! - When a request completes, the in-flight slot is cleared and the next
//!   request is started *before* the caller's continuation runs. A failed
//!   request releases the slot exactly like a successful one.
//!
//! Continuations run on the tokio runtime the connector was built on.
//!
//! # Example
//!
//! ```ignore
//! use webact_net::connector::Connector;
//!
//! let connector = Connector::new("https://catalog.example.com/content")?;
//! let docs = connector.fetch("/docs").await?;
//! connector.tree().set_field(docs, "title", "Documentation")?;
//! connector.save(|result| println!("saved {result:?}"));
//! ```

mod config;
mod node;
mod transport;

pub use config::{ConnectorBuilder, ConnectorConfig};
pub use node::{RemoteNode, RemoteNodeData};
pub use transport::{HttpTransport, RemoteRequest, Transport};

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use webact::model::{NodeId, Tree, TreeError};
use webact_core::{Broadcaster, Event, IdAllocator, ListenerId};

use crate::error::{NetworkError, Result};
use crate::http::HttpMethod;

/// Notifications sent by a [`Connector`].
#[derive(Clone, Debug, PartialEq)]
pub enum ConnectorEvent {
    /// A request left the queue and was handed to the transport.
    RequestStarted {
        id: String,
        method: HttpMethod,
        url: String,
    },
    /// A request completed; its continuation runs right after.
    RequestFinished { id: String, success: bool },
    /// A node was populated from the server.
    NodeLoaded { node: NodeId },
    /// The changes of a node were accepted by the server.
    NodeSaved { node: NodeId },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectorEventKind {
    RequestStarted,
    RequestFinished,
    NodeLoaded,
    NodeSaved,
}

impl Event for ConnectorEvent {
    type Kind = ConnectorEventKind;

    fn kind(&self) -> ConnectorEventKind {
        match self {
            Self::RequestStarted { .. } => ConnectorEventKind::RequestStarted,
            Self::RequestFinished { .. } => ConnectorEventKind::RequestFinished,
            Self::NodeLoaded { .. } => ConnectorEventKind::NodeLoaded,
            Self::NodeSaved { .. } => ConnectorEventKind::NodeSaved,
        }
    }
}

type Completion = Box<dyn FnOnce(&Connector, Result<Value>) + Send>;
type UserContinuation = Box<dyn FnOnce(Result<Value>) + Send>;
type SaveContinuation = Box<dyn FnOnce(Result<usize>) + Send>;

struct QueuedRequest {
    request: RemoteRequest,
    completion: Completion,
}

#[derive(Default)]
struct RequestQueue {
    pending: VecDeque<QueuedRequest>,
    in_flight: Option<String>,
}

/// The whoami answer, or the callers waiting for it.
enum UserState {
    Unknown,
    Pending(Vec<UserContinuation>),
    Known(Value),
}

/// Tracks the updates issued by one `save` call.
struct SaveProgress {
    remaining: usize,
    saved: usize,
    error: Option<NetworkError>,
    continuation: Option<SaveContinuation>,
}

impl SaveProgress {
    fn record(progress: &Mutex<SaveProgress>, result: Result<()>) {
        let finished = {
            let mut progress = progress.lock();
            progress.remaining = progress.remaining.saturating_sub(1);
            match result {
                Ok(()) => progress.saved += 1,
                Err(error) => {
                    progress.error.get_or_insert(error);
                }
            }
            if progress.remaining > 0 {
                return;
            }
            let outcome = match progress.error.take() {
                Some(error) => Err(error),
                None => Ok(progress.saved),
            };
            progress.continuation.take().map(|continuation| (continuation, outcome))
        };
        if let Some((continuation, outcome)) = finished {
            continuation(outcome);
        }
    }
}

struct ConnectorInner {
    config: ConnectorConfig,
    transport: Arc<dyn Transport>,
    runtime: Handle,
    tree: Tree<RemoteNode>,
    root: NodeId,
    queue: Mutex<RequestQueue>,
    user: Mutex<UserState>,
    ids: IdAllocator,
    events: Broadcaster<ConnectorEvent>,
}

/// Serializing client mediating tree loads and saves against a content server.
///
/// Cloning is cheap; clones share the queue and the tree.
#[derive(Clone)]
pub struct Connector {
    inner: Arc<ConnectorInner>,
}

impl Connector {
    /// Connect to `base_url` over HTTP with default settings.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        ConnectorBuilder::new(base_url).build()
    }

    /// Connect using `config`.
    pub fn from_config(config: ConnectorConfig) -> Result<Self> {
        ConnectorBuilder::from_config(config).build()
    }

    /// Create a builder for a connector to `base_url`.
    pub fn builder(base_url: impl Into<String>) -> ConnectorBuilder {
        ConnectorBuilder::new(base_url)
    }

    pub(crate) fn from_parts(
        config: ConnectorConfig,
        transport: Arc<dyn Transport>,
        runtime: Handle,
    ) -> Self {
        let tree = Tree::new();
        let root = tree.create_node("/");
        tracing::debug!(target: "webact_net::connector", base_url = %config.base_url, "connector created");
        Self {
            inner: Arc::new(ConnectorInner {
                config,
                transport,
                runtime,
                tree,
                root,
                queue: Mutex::new(RequestQueue::default()),
                user: Mutex::new(UserState::Unknown),
                ids: IdAllocator::new(),
                events: Broadcaster::new(),
            }),
        }
    }

    /// The connector settings.
    pub fn config(&self) -> &ConnectorConfig {
        &self.inner.config
    }

    /// The local mirror of the remote tree.
    pub fn tree(&self) -> &Tree<RemoteNode> {
        &self.inner.tree
    }

    /// The root node (named `/`).
    pub fn root(&self) -> NodeId {
        self.inner.root
    }

    /// The connector's broadcaster.
    pub fn events(&self) -> &Broadcaster<ConnectorEvent> {
        &self.inner.events
    }

    /// Register a listener for one kind of connector event.
    pub fn add_listener<F>(&self, kind: ConnectorEventKind, listener: F) -> ListenerId
    where
        F: Fn(&ConnectorEvent) + Send + Sync + 'static,
    {
        self.inner.events.add_listener(kind, listener)
    }

    /// Server metadata of `node`.
    pub fn node(&self, node: NodeId) -> Option<RemoteNode> {
        self.inner.tree.with_data(node, RemoteNode::clone).ok()
    }

    /// Whether `node` has been populated from the server.
    pub fn is_loaded(&self, node: NodeId) -> bool {
        self.inner
            .tree
            .with_data(node, |data| data.is_loaded)
            .unwrap_or(false)
    }

    /// Whether `node` was created locally and has not been saved yet.
    pub fn is_new(&self, node: NodeId) -> bool {
        self.inner
            .tree
            .with_data(node, |data| data.is_new)
            .unwrap_or(false)
    }

    /// The cached whoami answer.
    pub fn user(&self) -> Option<Value> {
        match &*self.inner.user.lock() {
            UserState::Known(user) => Some(user.clone()),
            _ => None,
        }
    }

    /// Number of requests waiting behind the one in flight.
    pub fn pending_requests(&self) -> usize {
        self.inner.queue.lock().pending.len()
    }

    /// Id of the request currently in flight.
    pub fn in_flight(&self) -> Option<String> {
        self.inner.queue.lock().in_flight.clone()
    }

    /// Whether nothing is queued or in flight.
    pub fn is_idle(&self) -> bool {
        let queue = self.inner.queue.lock();
        queue.in_flight.is_none() && queue.pending.is_empty()
    }

    // -------------------------------------------------------------------------
    // Queue
    // -------------------------------------------------------------------------

    /// Queue `request`, calling `on_success` with the decoded answer or
    /// `on_error` with the failure. Returns the request id.
    pub fn request<S, E>(&self, request: RemoteRequest, on_success: S, on_error: E) -> String
    where
        S: FnOnce(Value) + Send + 'static,
        E: FnOnce(NetworkError) + Send + 'static,
    {
        self.enqueue(
            request,
            Box::new(move |_, result| match result {
                Ok(value) => on_success(value),
                Err(error) => on_error(error),
            }),
        )
    }

    fn enqueue(&self, mut request: RemoteRequest, completion: Completion) -> String {
        request.id = self.inner.ids.next_id("Request");
        let id = request.id.clone();
        tracing::trace!(target: "webact_net::connector", %id, url = %request.url, "request queued");
        self.inner
            .queue
            .lock()
            .pending
            .push_back(QueuedRequest { request, completion });
        self.next();
        id
    }

    /// Start the head of the queue unless a request is already in flight.
    pub fn next(&self) {
        let QueuedRequest { request, completion } = {
            let mut queue = self.inner.queue.lock();
            if queue.in_flight.is_some() {
                return;
            }
            let Some(queued) = queue.pending.pop_front() else {
                return;
            };
            queue.in_flight = Some(queued.request.id.clone());
            queued
        };

        let id = request.id.clone();
        tracing::debug!(
            target: "webact_net::connector",
            %id,
            method = %request.method,
            url = %request.url,
            "request started"
        );
        self.inner.events.broadcast(ConnectorEvent::RequestStarted {
            id: id.clone(),
            method: request.method,
            url: request.url.clone(),
        });

        let response = self.inner.transport.execute(request);
        let connector = self.clone();
        self.inner.runtime.spawn(async move {
            let result = response.await;
            connector.finish(id, result, completion);
        });
    }

    fn finish(&self, id: String, result: Result<Value>, completion: Completion) {
        self.inner.queue.lock().in_flight = None;
        match &result {
            Ok(_) => tracing::debug!(target: "webact_net::connector", %id, "request finished"),
            Err(error) => tracing::warn!(target: "webact_net::connector", %id, %error, "request failed"),
        }
        self.inner.events.broadcast(ConnectorEvent::RequestFinished {
            id,
            success: result.is_ok(),
        });
        self.next();
        completion(self, result);
    }

    // -------------------------------------------------------------------------
    // Loading
    // -------------------------------------------------------------------------

    /// Resolve `path` (creating placeholder nodes as needed) and make sure the
    /// node is loaded.
    ///
    /// An already loaded node is handed to `continuation` immediately.
    /// Otherwise a `GET` is queued and `continuation` receives the node once
    /// it has been populated, or the failure.
    #[tracing::instrument(skip(self, continuation), target = "webact_net::connector", level = "debug")]
    pub fn load<F>(&self, path: &str, continuation: F) -> Result<NodeId>
    where
        F: FnOnce(Result<NodeId>) + Send + 'static,
    {
        let node = self.inner.tree.add_node(self.inner.root, path)?;
        if self.is_loaded(node) {
            continuation(Ok(node));
            return Ok(node);
        }

        let url = self.inner.config.url_for(&self.inner.tree.path(node));
        self.enqueue(
            RemoteRequest::get(url),
            Box::new(move |connector, result| {
                let loaded = result.and_then(|value| {
                    let data: RemoteNodeData = serde_json::from_value(value)?;
                    connector.initialize_from(node, &data)?;
                    Ok(node)
                });
                if loaded.is_ok() {
                    connector.inner.events.broadcast(ConnectorEvent::NodeLoaded { node });
                }
                continuation(loaded);
            }),
        );
        Ok(node)
    }

    /// [`load`](Self::load) as a future.
    pub async fn fetch(&self, path: &str) -> Result<NodeId> {
        let (sender, receiver) = oneshot::channel();
        self.load(path, move |result| {
            let _ = sender.send(result);
        })?;
        receiver.await.map_err(|_| NetworkError::Cancelled)?
    }

    /// Look up the current user through the whoami endpoint.
    ///
    /// The answer is cached. Callers arriving while the lookup is in progress
    /// wait for the same request; after a failure the next call retries.
    pub fn load_user<F>(&self, continuation: F)
    where
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        let continuation: UserContinuation = Box::new(continuation);
        let mut state = self.inner.user.lock();
        match std::mem::replace(&mut *state, UserState::Unknown) {
            UserState::Known(user) => {
                *state = UserState::Known(user.clone());
                drop(state);
                continuation(Ok(user));
            }
            UserState::Pending(mut waiting) => {
                waiting.push(continuation);
                *state = UserState::Pending(waiting);
            }
            UserState::Unknown => {
                *state = UserState::Pending(vec![continuation]);
                drop(state);
                let url = self.inner.config.whoami_url();
                self.enqueue(
                    RemoteRequest::get(url),
                    Box::new(|connector, result| connector.user_loaded(result)),
                );
            }
        }
    }

    fn user_loaded(&self, result: Result<Value>) {
        let next_state = match &result {
            Ok(user) => UserState::Known(user.clone()),
            Err(_) => UserState::Unknown,
        };
        let waiting = match std::mem::replace(&mut *self.inner.user.lock(), next_state) {
            UserState::Pending(waiting) => waiting,
            _ => Vec::new(),
        };
        for continuation in waiting {
            continuation(result.clone());
        }
    }

    /// Populate `node` from its server representation and mark it loaded.
    pub fn initialize_from(&self, node: NodeId, data: &RemoteNodeData) -> Result<()> {
        let tree = &self.inner.tree;
        tree.modify_data(node, |remote| data.apply_metadata(remote))?;
        for (name, value) in data.properties() {
            tree.set_property(node, name, value.clone())?;
        }
        self.initialize_children(node, &data.children)?;
        tree.modify_data(node, |remote| remote.is_loaded = true)?;
        Ok(())
    }

    /// Create or refresh the child summaries of `node`.
    ///
    /// Children that are already loaded keep their state; nameless entries
    /// are skipped.
    pub fn initialize_children(&self, node: NodeId, children: &[RemoteNodeData]) -> Result<()> {
        let tree = &self.inner.tree;
        for child_data in children {
            let Some(name) = child_data.name.as_deref().filter(|name| !name.is_empty()) else {
                tracing::warn!(target: "webact_net::connector", ?node, "skipping child without a name");
                continue;
            };
            let child = match tree.child_named(node, name) {
                Some(child) => child,
                None => {
                    let child = tree.create_node(name);
                    tree.add_child(node, child, None)?;
                    child
                }
            };
            if self.is_loaded(child) {
                continue;
            }
            tree.modify_data(child, |remote| child_data.apply_metadata(remote))?;
            for (property, value) in child_data.properties() {
                tree.set_property(child, property, value.clone())?;
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Saving
    // -------------------------------------------------------------------------

    /// Resolve `path`, creating nodes as needed, and mark the node as new.
    pub fn create(&self, path: &str) -> Result<NodeId> {
        let node = self.inner.tree.add_node(self.inner.root, path)?;
        self.inner.tree.modify_data(node, |remote| remote.is_new = true)?;
        Ok(node)
    }

    /// Queue an update for every changed node under the root.
    ///
    /// `continuation` receives the number of nodes the server accepted once
    /// every update has completed, or the first failure. Returns the number
    /// of updates queued.
    pub fn save<F>(&self, continuation: F) -> usize
    where
        F: FnOnce(Result<usize>) + Send + 'static,
    {
        let tree = &self.inner.tree;
        let changed: Vec<NodeId> = tree
            .subtree(self.inner.root)
            .into_iter()
            .filter(|&node| tree.is_changed(node))
            .collect();
        if changed.is_empty() {
            continuation(Ok(0));
            return 0;
        }

        let progress = Arc::new(Mutex::new(SaveProgress {
            remaining: changed.len(),
            saved: 0,
            error: None,
            continuation: Some(Box::new(continuation)),
        }));
        let mut queued = 0;
        for node in changed {
            let tracker = progress.clone();
            match self.update_then(node, move |result| SaveProgress::record(&tracker, result)) {
                Ok(_) => queued += 1,
                Err(error) => SaveProgress::record(&progress, Err(error)),
            }
        }
        queued
    }

    /// Send the changes of `node` to the server and commit them locally.
    ///
    /// The node is committed right away; the `PUT` carries the changed
    /// properties as a JSON object in the `properties` form field. Returns
    /// the request id.
    ///
    /// Fails with [`TreeError::NotAttached`] for a node outside the
    /// connector's tree, which is left untouched.
    pub fn update(&self, node: NodeId) -> Result<String> {
        self.update_then(node, |_| {})
    }

    fn update_then<F>(&self, node: NodeId, done: F) -> Result<String>
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let tree = &self.inner.tree;
        if !tree.contains(node) {
            return Err(TreeError::InvalidNode.into());
        }
        if tree.root_of(node) != self.inner.root {
            let name = tree.name(node).unwrap_or_default();
            return Err(TreeError::NotAttached { name }.into());
        }
        let changes = serde_json::to_string(&tree.changes(node))?;
        let url = self.inner.config.url_for(&tree.path(node));
        tree.commit(node, None)?;

        let form = HashMap::from([("properties".to_string(), changes)]);
        Ok(self.enqueue(
            RemoteRequest::put(url, form),
            Box::new(move |connector, result| {
                let saved = result.map(|_| ());
                if saved.is_ok() {
                    if connector.inner.tree.modify_data(node, |remote| remote.is_new = false).is_err() {
                        tracing::trace!(target: "webact_net::connector", ?node, "saved node no longer exists");
                    }
                    connector.inner.events.broadcast(ConnectorEvent::NodeSaved { node });
                }
                done(saved);
            }),
        ))
    }
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let queue = self.inner.queue.lock();
        f.debug_struct("Connector")
            .field("base_url", &self.inner.config.base_url)
            .field("in_flight", &queue.in_flight)
            .field("pending", &queue.pending.len())
            .field("nodes", &self.inner.tree.len())
            .finish()
    }
}
