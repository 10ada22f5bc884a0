//! Editor session: the UI side of one mounted graph editor
//!
//! Every event reaching the editor (renderer gesture, backend command,
//! inbound mirror update, configuration toggle) is a [`SessionInput`]
//! delivered over one channel. The session applies inputs strictly in
//! arrival order and runs one sync tick after each, so the store is never
//! touched by two operations at once.

use std::sync::Arc;

use graph_sync::{
    diff_snapshots, propagate, validate_connection, AppliedChanges, CommandDispatcher, DragCreateController,
    EdgeChange, EdgeEndpoints, EventSink, GraphEdge, GraphEvent, GraphNode, GraphSnapshot, GraphStore, MirrorSlot,
    NodeChange, NodeClassRegistry, NodeId, OutboundMessage, PortCatalog, Position, SyncBridge, SyncError,
    UndoStack, ValidationConfig, Viewport,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::HostConfig;

/// One event delivered to the editor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "input")]
pub enum SessionInput {
    /// Renderer node change list
    NodesChanged { changes: Vec<NodeChange> },
    /// Renderer edge change list
    EdgesChanged { changes: Vec<EdgeChange> },
    /// The user dragged a connection between two ports
    Connect(EdgeEndpoints),
    /// The user picked up a palette item
    BeginDrag { class_name: String },
    CancelDrag,
    /// Drop at screen coordinates
    Drop { x: f64, y: f64 },
    /// Renderer pan/zoom changed
    SetViewport { x: f64, y: f64, zoom: f64 },
    /// An inline widget edited a node's payload
    EditNodeData {
        node_id: NodeId,
        patch: serde_json::Value,
    },
    /// Raw backend command
    Command { message: serde_json::Value },
    /// Backend "nodes" slot update
    MirrorNodes { nodes: Vec<GraphNode> },
    /// Backend "edges" slot update
    MirrorEdges { edges: Vec<GraphEdge> },
    SetAllowEdgeLoops { enabled: bool },
    SetDisplaySideBar { visible: bool },
    Undo,
    Redo,
}

impl SessionInput {
    /// Whether the input can add or remove nodes or edges
    fn may_restructure(&self) -> bool {
        match self {
            SessionInput::NodesChanged { changes } => changes.iter().any(|c| c.kind().is_structural()),
            SessionInput::EdgesChanged { changes } => changes.iter().any(|c| c.kind().is_structural()),
            SessionInput::Connect(_)
            | SessionInput::Drop { .. }
            | SessionInput::Command { .. }
            | SessionInput::Undo
            | SessionInput::Redo => true,
            _ => false,
        }
    }
}

/// Nodes to update after a structural change: new nodes, and the targets
/// of created or deleted edges
fn update_starts(before: &GraphSnapshot, after: &GraphSnapshot) -> Vec<NodeId> {
    diff_snapshots(before, after)
        .into_iter()
        .filter_map(|event| match event {
            GraphEvent::NodeCreated { node_id } => Some(node_id),
            GraphEvent::EdgeCreated { edge } | GraphEvent::EdgeDeleted { edge } => Some(edge.target),
            _ => None,
        })
        .collect()
}

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Session task failed: {0}")]
    Task(String),
}

/// State of one mounted editor
pub struct EditorSession {
    id: Uuid,
    store: GraphStore,
    catalog: PortCatalog,
    registry: Arc<NodeClassRegistry>,
    dispatcher: CommandDispatcher,
    bridge: SyncBridge,
    drag: DragCreateController,
    viewport: Viewport,
    validation: ValidationConfig,
    display_side_bar: bool,
    history: UndoStack,
    sink: Arc<dyn EventSink>,
}

impl EditorSession {
    /// Create an empty session
    pub fn new(config: &HostConfig, registry: Arc<NodeClassRegistry>, sink: Arc<dyn EventSink>) -> Self {
        let dispatcher = CommandDispatcher::new(Arc::clone(&registry)).with_policy(config.editor.dangling_edges);
        let mut history = UndoStack::new(config.history.max_snapshots);
        if let Err(e) = history.push(&GraphSnapshot::default()) {
            log::warn!("Failed to record empty graph in history: {}", e);
        }
        Self {
            id: Uuid::new_v4(),
            store: GraphStore::new(),
            catalog: PortCatalog::new(),
            registry,
            dispatcher,
            bridge: SyncBridge::new(),
            drag: DragCreateController::new(config.editor.node_id_prefix.clone()),
            viewport: Viewport::default(),
            validation: config.editor.validation(),
            display_side_bar: config.editor.display_side_bar,
            history,
            sink,
        }
    }

    /// Seed the session with an initial graph
    ///
    /// Ports are installed for every node from its class; the first tick
    /// publishes the whole snapshot.
    pub fn with_initial(mut self, snapshot: GraphSnapshot) -> Result<Self, SessionError> {
        self.history.clear();
        self.history.push(&snapshot)?;
        self.install_all_ports(&snapshot.nodes);
        self.store = GraphStore::from_snapshot(snapshot);
        Ok(self)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn catalog(&self) -> &PortCatalog {
        &self.catalog
    }

    pub fn bridge(&self) -> &SyncBridge {
        &self.bridge
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn validation(&self) -> ValidationConfig {
        self.validation
    }

    pub fn display_side_bar(&self) -> bool {
        self.display_side_bar
    }

    /// Send the palette contents and side-bar visibility
    pub fn announce_palette(&self) {
        let message = OutboundMessage::Palette {
            visible: self.display_side_bar,
            classes: self.registry.class_names(),
        };
        if let Err(e) = self.sink.send(message) {
            log::warn!("Failed to announce palette: {}", e);
        }
    }

    /// Run one sync tick
    pub fn tick(&mut self) -> Vec<MirrorSlot> {
        self.bridge.tick(&mut self.store, self.sink.as_ref())
    }

    /// Apply one input, then run one sync tick
    ///
    /// Structural changes and data edits are propagated downstream before
    /// the tick. Returns the mirror slots pushed by the tick.
    pub fn handle(&mut self, input: SessionInput) -> Result<Vec<MirrorSlot>, SessionError> {
        let before = input.may_restructure().then(|| self.store.snapshot());
        let mut starts = Vec::new();
        let mut record = false;

        match input {
            SessionInput::NodesChanged { changes } => {
                let applied = self.store.apply_node_changes(changes);
                for id in &applied.removed_nodes {
                    self.catalog.remove(id);
                }
                self.install_all_ports(&applied.added_nodes);
                self.bridge.notify(&applied, self.sink.as_ref());
                record = applied.is_structural() || applied.moves_finished > 0;
            }
            SessionInput::EdgesChanged { changes } => {
                let applied = self.apply_edge_changes(changes);
                self.bridge.notify(&applied, self.sink.as_ref());
                record = applied.is_structural();
            }
            SessionInput::Connect(candidate) => record = self.connect(candidate)?,
            SessionInput::BeginDrag { class_name } => self.drag.begin_drag(class_name),
            SessionInput::CancelDrag => self.drag.cancel_drag(),
            SessionInput::Drop { x, y } => {
                let created = self.drag.on_drop(
                    Position::new(x, y),
                    &self.viewport,
                    &mut self.store,
                    &mut self.catalog,
                    &self.registry,
                    self.sink.as_ref(),
                )?;
                record = created.is_some();
            }
            SessionInput::SetViewport { x, y, zoom } => self.viewport = Viewport { x, y, zoom },
            SessionInput::EditNodeData { node_id, patch } => match self.store.update_node_data(&node_id, patch) {
                Ok(_) => {
                    starts.push(node_id);
                    record = true;
                }
                Err(e) => log::warn!("Ignoring data edit: {}", e),
            },
            SessionInput::Command { message } => {
                let mutation = self
                    .dispatcher
                    .handle_message(&message, &mut self.store, &mut self.catalog);
                record = !mutation.is_empty();
            }
            SessionInput::MirrorNodes { nodes } => {
                self.bridge.absorb_mirror_nodes(nodes, &self.store);
            }
            SessionInput::MirrorEdges { edges } => {
                self.bridge.absorb_mirror_edges(edges, &self.store);
            }
            SessionInput::SetAllowEdgeLoops { enabled } => {
                log::info!("Edge loops {}", if enabled { "allowed" } else { "forbidden" });
                self.validation.allow_edge_loops = enabled;
            }
            SessionInput::SetDisplaySideBar { visible } => {
                self.display_side_bar = visible;
                self.announce_palette();
            }
            SessionInput::Undo => match self.history.undo() {
                Some(snapshot) => self.restore(snapshot?),
                None => log::debug!("Nothing to undo"),
            },
            SessionInput::Redo => match self.history.redo() {
                Some(snapshot) => self.restore(snapshot?),
                None => log::debug!("Nothing to redo"),
            },
        }

        if let Some(before) = before {
            starts.extend(update_starts(&before, &self.store.snapshot()));
        }
        if !starts.is_empty() {
            propagate(&mut self.store, &self.catalog, &self.registry, &starts)?;
        }
        if record {
            self.record_history()?;
        }

        Ok(self.tick())
    }

    /// Validate and insert a user connection; returns whether it was added
    fn connect(&mut self, candidate: EdgeEndpoints) -> Result<bool, SessionError> {
        let edge = match validate_connection(
            &candidate,
            self.store.nodes(),
            self.store.edges(),
            &self.catalog,
            &self.validation,
        ) {
            Ok(edge) => edge,
            Err(reason) => {
                log::debug!("Connection {} rejected: {}", candidate.edge_id(), reason);
                return Ok(false);
            }
        };

        let mutation = self.store.add_edge(edge.clone())?;
        let applied = AppliedChanges {
            added_edges: vec![edge],
            mutation,
            ..AppliedChanges::default()
        };
        self.bridge.notify(&applied, self.sink.as_ref());
        Ok(true)
    }

    /// Apply edge changes one by one, gating additions through the validator
    fn apply_edge_changes(&mut self, changes: Vec<EdgeChange>) -> AppliedChanges {
        let mut applied = AppliedChanges::default();
        for change in changes {
            let change = match change {
                EdgeChange::Add { item } => {
                    match validate_connection(
                        &item.endpoints(),
                        self.store.nodes(),
                        self.store.edges(),
                        &self.catalog,
                        &self.validation,
                    ) {
                        Ok(edge) => EdgeChange::Add { item: edge },
                        Err(reason) => {
                            log::debug!("Edge '{}' rejected: {}", item.id, reason);
                            continue;
                        }
                    }
                }
                other => other,
            };
            applied.merge(self.store.apply_edge_changes(vec![change]));
        }
        applied
    }

    /// Record the store as the newest history entry, unless it already is
    fn record_history(&mut self) -> Result<(), SessionError> {
        let snapshot = self.store.snapshot();
        if let Some(current) = self.history.current() {
            if current? == snapshot {
                return Ok(());
            }
        }
        self.history.push(&snapshot)?;
        Ok(())
    }

    /// Replace the graph with a history entry
    ///
    /// Nodes and edges the entry brings back are announced like any other
    /// addition, so the backend learns about them.
    fn restore(&mut self, snapshot: GraphSnapshot) {
        let applied = AppliedChanges::between(&self.store.snapshot(), &snapshot);
        self.catalog.clear();
        self.install_all_ports(&snapshot.nodes);
        self.store.replace(snapshot);
        self.bridge.notify(&applied, self.sink.as_ref());
    }

    fn install_all_ports(&mut self, nodes: &[GraphNode]) {
        for node in nodes {
            self.registry.install_ports(&mut self.catalog, &node.id, &node.node_type);
        }
    }
}

/// Drive a session from its inbound channel until the channel closes
///
/// The command dispatcher is registered once for the lifetime of the loop
/// and released when the channel closes. Input errors are logged and do not
/// stop the loop. Returns the session for inspection.
pub async fn run_session(
    mut session: EditorSession,
    mut inputs: mpsc::UnboundedReceiver<SessionInput>,
) -> Result<EditorSession, SessionError> {
    let registration = session.dispatcher.register()?;
    log::info!("Session {} mounted", session.id);

    session.announce_palette();
    session.tick();

    while let Some(input) = inputs.recv().await {
        if let Err(e) = session.handle(input) {
            log::warn!("Session {} failed to handle input: {}", session.id, e);
        }
    }

    drop(registration);
    log::info!("Session {} unmounted", session.id);
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendGraph;
    use crate::nodes::{builtin_registry, PORT_INPUT, PORT_OPTIONS, PORT_OUTPUT};
    use graph_sync::{ChannelEventSink, GraphEventKind, Mutation, VecEventSink};
    use std::sync::Mutex;

    fn session_with(config: &HostConfig) -> (EditorSession, Arc<VecEventSink>) {
        let sink = Arc::new(VecEventSink::new());
        let registry = Arc::new(builtin_registry());
        let session = EditorSession::new(config, registry, sink.clone());
        (session, sink)
    }

    fn create_node(session: &mut EditorSession, id: &str, class_name: &str) {
        let message = serde_json::json!({
            "action": "NodeCreation",
            "node_id": id,
            "x": 0.0,
            "y": 0.0,
            "class_name": class_name
        });
        session.handle(SessionInput::Command { message }).unwrap();
    }

    fn connect(source: &str, source_handle: &str, target: &str, target_handle: &str) -> SessionInput {
        SessionInput::Connect(EdgeEndpoints::new(source, source_handle, target, target_handle))
    }

    #[test]
    fn test_input_wire_format() {
        let input: SessionInput = serde_json::from_value(serde_json::json!({
            "input": "Connect",
            "source": "a",
            "sourceHandle": "Output",
            "target": "b",
            "targetHandle": "Input"
        }))
        .unwrap();
        assert_eq!(input, connect("a", "Output", "b", "Input"));

        let input: SessionInput = serde_json::from_str(r#"{"input": "Undo"}"#).unwrap();
        assert_eq!(input, SessionInput::Undo);
    }

    #[test]
    fn test_connect_validates_and_notifies() {
        let (mut session, sink) = session_with(&HostConfig::default());
        create_node(&mut session, "t", "Text Input");
        create_node(&mut session, "p", "Print");
        sink.clear();

        // The print node picks up its new input, so both slots are pushed
        let pushed = session.handle(connect("t", PORT_OUTPUT, "p", PORT_INPUT)).unwrap();
        assert_eq!(pushed, vec![MirrorSlot::Nodes, MirrorSlot::Edges]);
        assert!(matches!(sink.events()[0], OutboundMessage::Connected { .. }));

        // Unknown port: nothing happens
        sink.clear();
        let pushed = session.handle(connect("t", "Missing", "p", PORT_INPUT)).unwrap();
        assert!(pushed.is_empty());
        assert!(sink.events().is_empty());
        assert_eq!(session.store().edges().len(), 1);
    }

    #[test]
    fn test_choice_options_limit() {
        let (mut session, _) = session_with(&HostConfig::default());
        create_node(&mut session, "a", "Array Input");
        create_node(&mut session, "b", "Array Input");
        create_node(&mut session, "s", "Select");

        session.handle(connect("a", PORT_OUTPUT, "s", PORT_OPTIONS)).unwrap();
        session.handle(connect("b", PORT_OUTPUT, "s", PORT_OPTIONS)).unwrap();
        assert_eq!(session.store().edges().len(), 1);
        assert_eq!(session.store().edges()[0].source, "a");
    }

    #[test]
    fn test_edge_loops_toggle() {
        let (mut session, _) = session_with(&HostConfig::default());
        create_node(&mut session, "s1", "Select");
        create_node(&mut session, "s2", "Select");
        session.handle(connect("s1", PORT_OUTPUT, "s2", PORT_OPTIONS)).unwrap();

        session.handle(connect("s2", PORT_OUTPUT, "s1", PORT_OPTIONS)).unwrap();
        assert_eq!(session.store().edges().len(), 1);

        session.handle(SessionInput::SetAllowEdgeLoops { enabled: true }).unwrap();
        session.handle(connect("s2", PORT_OUTPUT, "s1", PORT_OPTIONS)).unwrap();
        assert_eq!(session.store().edges().len(), 2);

        // Self connections stay forbidden
        session.handle(connect("s1", PORT_OUTPUT, "s1", PORT_OPTIONS)).unwrap();
        assert_eq!(session.store().edges().len(), 2);
    }

    #[test]
    fn test_renderer_edge_additions_are_gated() {
        let (mut session, sink) = session_with(&HostConfig::default());
        create_node(&mut session, "t", "Text Input");
        create_node(&mut session, "p", "Print");
        sink.clear();

        let valid = GraphEdge::from_endpoints(EdgeEndpoints::new("t", PORT_OUTPUT, "p", PORT_INPUT));
        let invalid = GraphEdge::from_endpoints(EdgeEndpoints::new("p", PORT_INPUT, "t", PORT_OUTPUT));
        session
            .handle(SessionInput::EdgesChanged {
                changes: vec![EdgeChange::Add { item: valid }, EdgeChange::Add { item: invalid }],
            })
            .unwrap();

        assert_eq!(session.store().edges().len(), 1);
        let connected = sink
            .events()
            .into_iter()
            .filter(|m| matches!(m, OutboundMessage::Connected { .. }))
            .count();
        assert_eq!(connected, 1);
    }

    #[test]
    fn test_drag_moves_push_mirror_without_notifications() {
        let (mut session, sink) = session_with(&HostConfig::default());
        create_node(&mut session, "t", "Text Input");
        sink.clear();

        for x in 1..=3 {
            session
                .handle(SessionInput::NodesChanged {
                    changes: vec![NodeChange::Position {
                        id: "t".into(),
                        position: Some(Position::new(f64::from(x), 0.0)),
                        dragging: true,
                    }],
                })
                .unwrap();
        }
        assert_eq!(sink.push_count(), 3);
        assert_eq!(sink.events().len(), 3);
    }

    #[test]
    fn test_drop_uses_viewport_and_prefix() {
        let mut config = HostConfig::default();
        config.editor.node_id_prefix = "drop_".into();
        let (mut session, sink) = session_with(&config);

        session
            .handle(SessionInput::SetViewport {
                x: 100.0,
                y: 0.0,
                zoom: 2.0,
            })
            .unwrap();
        session
            .handle(SessionInput::BeginDrag {
                class_name: "Print".into(),
            })
            .unwrap();
        session.handle(SessionInput::Drop { x: 140.0, y: 20.0 }).unwrap();

        let node = &session.store().nodes()[0];
        assert!(node.id.starts_with("drop_"));
        assert_eq!(node.position, Position::new(20.0, 10.0));
        assert!(session.catalog().resolve(&node.id, PORT_INPUT).is_some());
        assert!(matches!(sink.events()[0], OutboundMessage::NewNode { .. }));
    }

    #[test]
    fn test_equal_inbound_mirror_is_not_pushed_back() {
        let (mut session, sink) = session_with(&HostConfig::default());
        create_node(&mut session, "t", "Text Input");
        sink.clear();

        let nodes = session.store().nodes().to_vec();
        let pushed = session.handle(SessionInput::MirrorNodes { nodes }).unwrap();
        assert!(pushed.is_empty());
        let pushed = session.handle(SessionInput::MirrorEdges { edges: Vec::new() }).unwrap();
        assert!(pushed.is_empty());
        assert_eq!(sink.push_count(), 0);
    }

    #[test]
    fn test_undo_redo_restores_and_pushes() {
        let (mut session, _) = session_with(&HostConfig::default());
        create_node(&mut session, "t", "Text Input");
        create_node(&mut session, "p", "Print");
        session.handle(connect("t", PORT_OUTPUT, "p", PORT_INPUT)).unwrap();

        let pushed = session.handle(SessionInput::Undo).unwrap();
        assert_eq!(pushed, vec![MirrorSlot::Nodes, MirrorSlot::Edges]);
        assert!(session.store().edges().is_empty());
        assert_eq!(session.store().find_node("p").unwrap().data["inputs"], serde_json::json!({}));

        session.handle(SessionInput::Undo).unwrap();
        assert_eq!(session.store().nodes().len(), 1);
        assert!(!session.catalog().contains_node("p"));

        session.handle(SessionInput::Redo).unwrap();
        session.handle(SessionInput::Redo).unwrap();
        assert_eq!(session.store().edges().len(), 1);
        assert!(session.catalog().contains_node("p"));
    }

    #[test]
    fn test_undo_announces_restored_items() {
        let (mut session, sink) = session_with(&HostConfig::default());
        create_node(&mut session, "t", "Text Input");
        session
            .handle(SessionInput::Command {
                message: serde_json::json!({"action": "NodesRemoval", "node_ids": ["t"]}),
            })
            .unwrap();
        sink.clear();

        session.handle(SessionInput::Undo).unwrap();
        assert!(session.store().contains_node("t"));
        assert!(matches!(
            &sink.events()[0],
            OutboundMessage::NodeChange { nodes } if nodes[0].id == "t"
        ));
    }

    #[test]
    fn test_drag_end_is_its_own_undo_step() {
        let (mut session, _) = session_with(&HostConfig::default());
        create_node(&mut session, "t", "Text Input");
        create_node(&mut session, "p", "Print");

        let drag = |x: f64, dragging: bool| SessionInput::NodesChanged {
            changes: vec![NodeChange::Position {
                id: "t".into(),
                position: Some(Position::new(x, 0.0)),
                dragging,
            }],
        };
        session.handle(drag(10.0, true)).unwrap();
        session.handle(drag(20.0, false)).unwrap();
        // A second drag end without movement adds nothing
        session.handle(drag(20.0, false)).unwrap();

        session.handle(SessionInput::Undo).unwrap();
        assert_eq!(session.store().find_node("t").unwrap().position, Position::default());
        assert!(session.store().contains_node("p"));

        session.handle(SessionInput::Undo).unwrap();
        assert!(!session.store().contains_node("p"));
    }

    #[test]
    fn test_values_propagate_through_choice_to_print() {
        let (mut session, _) = session_with(&HostConfig::default());
        create_node(&mut session, "t", "Text Input");
        create_node(&mut session, "s", "Select");
        create_node(&mut session, "p", "Print");

        let error = |session: &EditorSession| session.store().find_node("s").unwrap().data["error"].clone();
        assert_eq!(error(&session), "No node plugged in Options port");

        session.handle(connect("s", PORT_OUTPUT, "p", PORT_INPUT)).unwrap();
        assert_eq!(
            session.store().find_node("p").unwrap().data["inputs"],
            serde_json::json!({"s": {"value": null}})
        );

        // A text value is not an option list
        session.handle(connect("t", PORT_OUTPUT, "s", PORT_OPTIONS)).unwrap();
        assert_eq!(error(&session), "'options' found in input is not a list.");

        // Editing the text re-runs the chain
        session
            .handle(SessionInput::EditNodeData {
                node_id: "t".into(),
                patch: serde_json::json!({"value": "hello"}),
            })
            .unwrap();
        assert_eq!(error(&session), "'options' found in input is not a list.");
        assert_eq!(session.store().find_node("s").unwrap().data["options"], serde_json::json!([]));

        // Unplugging the options is reported too
        let edge_id = EdgeEndpoints::new("t", PORT_OUTPUT, "s", PORT_OPTIONS).edge_id();
        session
            .handle(SessionInput::EdgesChanged {
                changes: vec![EdgeChange::Remove { id: edge_id }],
            })
            .unwrap();
        assert_eq!(error(&session), "No node plugged in Options port");
    }

    #[test]
    fn test_option_list_reaches_print() {
        let (mut session, _) = session_with(&HostConfig::default());
        create_node(&mut session, "a", "Array Input");
        create_node(&mut session, "s", "Select");
        create_node(&mut session, "p", "Print");
        session.handle(connect("a", PORT_OUTPUT, "s", PORT_OPTIONS)).unwrap();
        session.handle(connect("s", PORT_OUTPUT, "p", PORT_INPUT)).unwrap();

        session
            .handle(SessionInput::EditNodeData {
                node_id: "a".into(),
                patch: serde_json::json!({"value": ["x", 2]}),
            })
            .unwrap();

        let select = session.store().find_node("s").unwrap();
        assert_eq!(select.data["options"], serde_json::json!(["x", "2"]));
        assert_eq!(select.data["value"], "x");
        assert_eq!(select.data["error"], serde_json::Value::Null);
        assert_eq!(
            session.store().find_node("p").unwrap().data["inputs"],
            serde_json::json!({"s": {"value": "x"}})
        );
    }

    #[test]
    fn test_edit_node_data() {
        let (mut session, _) = session_with(&HostConfig::default());
        create_node(&mut session, "t", "Text Input");
        let pushed = session
            .handle(SessionInput::EditNodeData {
                node_id: "t".into(),
                patch: serde_json::json!({"value": "hello"}),
            })
            .unwrap();
        assert_eq!(pushed, vec![MirrorSlot::Nodes]);
        assert_eq!(session.store().find_node("t").unwrap().data["value"], "hello");

        // Unknown node: recovered locally
        assert!(session
            .handle(SessionInput::EditNodeData {
                node_id: "ghost".into(),
                patch: serde_json::json!({}),
            })
            .is_ok());
    }

    #[test]
    fn test_initial_snapshot_installs_ports() {
        let snapshot = graph_sync::GraphBuilder::new()
            .add_node("1", "Text Input", (0.0, 0.0))
            .add_node("2", "Print", (200.0, 0.0))
            .add_edge("1", PORT_OUTPUT, "2", PORT_INPUT)
            .build();
        let (session, _) = session_with(&HostConfig::default());
        let mut session = session.with_initial(snapshot).unwrap();

        assert!(session.catalog().resolve("2", PORT_INPUT).is_some());
        assert_eq!(session.tick(), vec![MirrorSlot::Nodes, MirrorSlot::Edges]);
        assert_eq!(session.store().dirty(), Mutation::NONE);
    }

    #[tokio::test]
    async fn test_run_session_registers_once_and_releases() {
        let (session, sink) = session_with(&HostConfig::default());
        let dispatcher = session.dispatcher().clone();
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(run_session(session, rx));
        tx.send(SessionInput::BeginDrag {
            class_name: "Button".into(),
        })
        .unwrap();
        tx.send(SessionInput::Drop { x: 0.0, y: 0.0 }).unwrap();
        drop(tx);

        let session = handle.await.unwrap().unwrap();
        assert_eq!(session.store().nodes().len(), 1);
        assert!(!dispatcher.is_registered());
        assert!(matches!(sink.events()[0], OutboundMessage::Palette { .. }));
    }

    #[tokio::test]
    async fn test_second_session_loop_is_refused_while_mounted() {
        let (session, _) = session_with(&HostConfig::default());
        let _registration = session.dispatcher().register().unwrap();
        let (_tx, rx) = mpsc::unbounded_channel();
        assert!(matches!(
            run_session(session, rx).await,
            Err(SessionError::Sync(SyncError::AlreadyRegistered))
        ));
    }

    #[tokio::test]
    async fn test_backend_round_trip() {
        let registry = Arc::new(builtin_registry());
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let sink = Arc::new(ChannelEventSink::new(out_tx));
        let session = EditorSession::new(&HostConfig::default(), Arc::clone(&registry), sink);
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_session(session, rx));
        let mut backend = BackendGraph::new(registry, tx);

        let seen = Arc::new(Mutex::new(Vec::new()));
        for kind in [GraphEventKind::NodeCreated, GraphEventKind::EdgeCreated] {
            let seen = Arc::clone(&seen);
            backend.on_event(kind, move |event| seen.lock().unwrap().push(event.kind()));
        }

        backend.add_node("t", "Text Input", 0.0, 0.0).unwrap();
        backend.add_node("p", "Print", 200.0, 0.0).unwrap();
        backend
            .add_edges(vec![EdgeEndpoints::new("t", PORT_OUTPUT, "p", PORT_INPUT)])
            .unwrap();

        while backend.edges().is_empty() {
            let message = out_rx.recv().await.unwrap();
            backend.observe(&message).unwrap();
        }
        assert_eq!(backend.nodes().len(), 2);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![GraphEventKind::NodeCreated, GraphEventKind::NodeCreated, GraphEventKind::EdgeCreated]
        );

        backend.clear().unwrap();
        while !backend.nodes().is_empty() || !backend.edges().is_empty() {
            let message = out_rx.recv().await.unwrap();
            backend.observe(&message).unwrap();
        }

        drop(backend);
        let session = handle.await.unwrap().unwrap();
        assert!(session.store().nodes().is_empty());
        assert!(session.store().edges().is_empty());
    }

    async fn observe_until(
        backend: &mut BackendGraph,
        outbound: &mut mpsc::UnboundedReceiver<OutboundMessage>,
        done: impl Fn(&BackendGraph) -> bool,
    ) {
        while !done(backend) {
            let message = outbound.recv().await.unwrap();
            backend.observe(&message).unwrap();
        }
    }

    #[tokio::test]
    async fn test_backend_clears_nodes_it_did_not_create() {
        let registry = Arc::new(builtin_registry());
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let sink = Arc::new(ChannelEventSink::new(out_tx));
        let session = EditorSession::new(&HostConfig::default(), Arc::clone(&registry), sink);
        let (tx, rx) = mpsc::unbounded_channel();
        let ui = tx.clone();
        let handle = tokio::spawn(run_session(session, rx));
        let mut backend = BackendGraph::new(registry, tx);

        // Renderer-added node
        ui.send(SessionInput::NodesChanged {
            changes: vec![NodeChange::Add {
                item: GraphNode::new("x", "Print", Position::default()),
            }],
        })
        .unwrap();
        observe_until(&mut backend, &mut out_rx, |b| !b.nodes().is_empty()).await;
        assert_eq!(backend.node_ids(), ["x".to_string()]);

        // Node removed by the backend, then brought back by an undo
        backend.add_node("t", "Text Input", 0.0, 0.0).unwrap();
        observe_until(&mut backend, &mut out_rx, |b| b.nodes().len() == 2).await;
        backend.remove_nodes(vec!["t".into()]).unwrap();
        observe_until(&mut backend, &mut out_rx, |b| b.nodes().len() == 1).await;
        ui.send(SessionInput::Undo).unwrap();
        observe_until(&mut backend, &mut out_rx, |b| b.nodes().len() == 2).await;
        assert!(backend.node_ids().contains(&"t".to_string()));

        backend.clear().unwrap();
        observe_until(&mut backend, &mut out_rx, |b| b.nodes().is_empty()).await;

        drop(backend);
        drop(ui);
        let session = handle.await.unwrap().unwrap();
        assert!(session.store().nodes().is_empty());
    }
}
