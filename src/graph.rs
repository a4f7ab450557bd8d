//! Graph definition, compile-time validation and the compiled plan.

use crate::error::{EngineError, ValidationError};
use crate::node::{FnNode, Node, NodeError, NodeName, NodeOutput};
use crate::state::State;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

/// The terminal marker. Route an edge here to complete the run.
pub const END: &str = "__end__";

/// Name of one declared result of a routing function.
///
/// Each conditional edge binds a closed set of outcomes to destinations at
/// build time; a routing function returning anything outside that set is a
/// fatal [`EngineError::Routing`] error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Outcome(String);

impl Outcome {
    /// Creates a new Outcome
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the outcome name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Outcome {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Outcome {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Outcome {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for Outcome {
    fn borrow(&self) -> &str {
        &self.0
    }
}

type Router = Box<dyn Fn(&State) -> Outcome + Send + Sync>;

/// Where an edge leads once the graph is compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    Node(NodeName),
    End,
}

/// An edge as declared on the builder; destinations are still raw names.
enum EdgeDef {
    Direct(NodeName),
    Conditional {
        router: Router,
        outcomes: Vec<(Outcome, NodeName)>,
    },
}

/// An edge with every destination resolved against the declared node set.
enum Edge {
    Direct(Target),
    Conditional {
        router: Router,
        outcomes: HashMap<Outcome, Target>,
    },
}

/// Mutable graph definition.
///
/// Collects nodes, edges and the start marker, then [`build`](Self::build)s
/// them into an immutable [`Plan`]. All validation is deferred to `build`,
/// so declaration order never matters.
///
/// # Examples
///
/// ```
/// use meguru::{GraphBuilder, NodeOutput, State, Update, END};
///
/// let plan = GraphBuilder::new()
///     .add_fn("greet", |_state: &State| {
///         Ok(NodeOutput::advance(Update::new().set("greeting", "hello")))
///     })
///     .add_edge("greet", END)
///     .start_with("greet")
///     .build()
///     .expect("valid graph");
///
/// assert_eq!(plan.node_count(), 1);
/// ```
#[derive(Default)]
pub struct GraphBuilder {
    nodes: HashMap<NodeName, Box<dyn Node>>,
    edges: HashMap<NodeName, EdgeDef>,
    start: Option<NodeName>,
    duplicate_nodes: Vec<NodeName>,
    duplicate_edges: Vec<NodeName>,
    duplicate_start: bool,
}

impl GraphBuilder {
    /// Creates an empty graph definition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node under a unique name.
    pub fn add_node(mut self, name: impl Into<NodeName>, node: impl Node + 'static) -> Self {
        let name = name.into();
        if self.nodes.contains_key(&name) {
            self.duplicate_nodes.push(name);
            return self;
        }
        self.nodes.insert(name, Box::new(node));
        self
    }

    /// Registers a plain function as a node.
    pub fn add_fn<F>(self, name: impl Into<NodeName>, work: F) -> Self
    where
        F: Fn(&State) -> Result<NodeOutput, NodeError> + Send + Sync + 'static,
    {
        self.add_node(name, FnNode::new(work))
    }

    /// Declares the unconditional transition taken after `from` completes.
    ///
    /// `to` may be a node name or [`END`].
    pub fn add_edge(self, from: impl Into<NodeName>, to: impl Into<NodeName>) -> Self {
        self.insert_edge(from.into(), EdgeDef::Direct(to.into()))
    }

    /// Declares a conditional transition after `from` completes.
    ///
    /// The routing function is evaluated against the state *after* the
    /// node's update has been merged, and must return one of the declared
    /// outcomes. Each outcome binds to a node name or [`END`]; loop-backs to
    /// already-visited nodes are allowed and bounded by
    /// [`RunConfig::max_revisits`](crate::RunConfig::max_revisits).
    pub fn add_conditional_edge<R, O, T, I>(
        self,
        from: impl Into<NodeName>,
        router: R,
        outcomes: I,
    ) -> Self
    where
        R: Fn(&State) -> Outcome + Send + Sync + 'static,
        O: Into<Outcome>,
        T: Into<NodeName>,
        I: IntoIterator<Item = (O, T)>,
    {
        let outcomes = outcomes
            .into_iter()
            .map(|(outcome, to)| (outcome.into(), to.into()))
            .collect();
        self.insert_edge(
            from.into(),
            EdgeDef::Conditional {
                router: Box::new(router),
                outcomes,
            },
        )
    }

    /// Marks the entry node. Must be called exactly once.
    pub fn start_with(mut self, name: impl Into<NodeName>) -> Self {
        if self.start.is_some() {
            self.duplicate_start = true;
            return self;
        }
        self.start = Some(name.into());
        self
    }

    fn insert_edge(mut self, from: NodeName, edge: EdgeDef) -> Self {
        if self.edges.contains_key(&from) {
            self.duplicate_edges.push(from);
            return self;
        }
        self.edges.insert(from, edge);
        self
    }

    /// Validates the definition and compiles it into an immutable [`Plan`].
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found: duplicate names or
    /// edges, a missing/unknown/duplicated start marker, a dangling edge
    /// destination, an empty outcome set, a node with no outgoing edge, or a
    /// node unreachable from start.
    pub fn build(self) -> Result<Plan, ValidationError> {
        if let Some(name) = self.duplicate_nodes.into_iter().next() {
            return Err(ValidationError::DuplicateNode(name));
        }
        if let Some(name) = self.duplicate_edges.into_iter().next() {
            return Err(ValidationError::DuplicateEdge(name));
        }
        if self.duplicate_start {
            return Err(ValidationError::DuplicateStart);
        }

        let nodes = self.nodes;
        let start = self.start.ok_or(ValidationError::MissingStart)?;
        if !nodes.contains_key(&start) {
            return Err(ValidationError::UnknownStart(start));
        }

        for from in self.edges.keys() {
            if !nodes.contains_key(from) {
                return Err(ValidationError::UnknownSource(from.clone()));
            }
        }

        // Resolve every destination against the declared node set.
        let mut edges = HashMap::with_capacity(self.edges.len());
        for (from, def) in self.edges {
            let edge = match def {
                EdgeDef::Direct(to) => Edge::Direct(resolve(&nodes, &from, to)?),
                EdgeDef::Conditional { router, outcomes } => {
                    if outcomes.is_empty() {
                        return Err(ValidationError::EmptyOutcomes(from));
                    }
                    let mut resolved = HashMap::with_capacity(outcomes.len());
                    for (outcome, to) in outcomes {
                        let target = resolve(&nodes, &from, to)?;
                        resolved.insert(outcome, target);
                    }
                    Edge::Conditional {
                        router,
                        outcomes: resolved,
                    }
                }
            };
            edges.insert(from, edge);
        }

        // Every node needs exactly one outgoing path.
        let mut missing: Vec<&NodeName> =
            nodes.keys().filter(|name| !edges.contains_key(*name)).collect();
        missing.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        if let Some(name) = missing.first() {
            return Err(ValidationError::MissingEdge((*name).clone()));
        }

        // Breadth-first reachability from start, over unconditional edges
        // and every possible conditional outcome.
        let mut reachable = HashSet::from([start.clone()]);
        let mut queue = VecDeque::from([start.clone()]);
        while let Some(current) = queue.pop_front() {
            let Some(edge) = edges.get(&current) else {
                continue;
            };
            let targets: Vec<&Target> = match edge {
                Edge::Direct(target) => vec![target],
                Edge::Conditional { outcomes, .. } => outcomes.values().collect(),
            };
            for target in targets {
                if let Target::Node(name) = target {
                    if reachable.insert(name.clone()) {
                        queue.push_back(name.clone());
                    }
                }
            }
        }
        let mut unreachable: Vec<&NodeName> =
            nodes.keys().filter(|name| !reachable.contains(*name)).collect();
        unreachable.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        if let Some(name) = unreachable.first() {
            return Err(ValidationError::Unreachable((*name).clone()));
        }

        Ok(Plan {
            nodes,
            edges,
            start,
        })
    }
}

fn resolve(
    nodes: &HashMap<NodeName, Box<dyn Node>>,
    from: &NodeName,
    to: NodeName,
) -> Result<Target, ValidationError> {
    if to.as_str() == END {
        return Ok(Target::End);
    }
    if nodes.contains_key(&to) {
        Ok(Target::Node(to))
    } else {
        Err(ValidationError::DanglingEdge {
            from: from.clone(),
            to,
        })
    }
}

/// Validated, immutable, ready-to-run representation of a graph.
///
/// A plan holds no per-run state, so one plan may drive any number of
/// concurrent runs; each run owns its own [`State`](crate::State).
pub struct Plan {
    nodes: HashMap<NodeName, Box<dyn Node>>,
    edges: HashMap<NodeName, Edge>,
    start: NodeName,
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("start", &self.start)
            .finish()
    }
}

impl Plan {
    /// Returns the name of the start node.
    pub fn start(&self) -> &NodeName {
        &self.start
    }

    /// Returns `true` if a node with the given name exists.
    pub fn has_node(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Returns the number of declared nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns an iterator over all declared node names.
    pub fn node_names(&self) -> impl Iterator<Item = &NodeName> {
        self.nodes.keys()
    }

    pub(crate) fn node(&self, name: &NodeName) -> Option<&dyn Node> {
        self.nodes.get(name).map(Box::as_ref)
    }

    /// Determines the transition out of `from`, evaluating its routing
    /// function against the post-merge state if the edge is conditional.
    pub(crate) fn route(&self, from: &NodeName, state: &State) -> Result<Target, EngineError> {
        let edge = self
            .edges
            .get(from)
            .ok_or_else(|| EngineError::NodeNotFound(from.clone()))?;
        match edge {
            Edge::Direct(target) => Ok(target.clone()),
            Edge::Conditional { router, outcomes } => {
                let outcome = router(state);
                outcomes
                    .get(&outcome)
                    .cloned()
                    .ok_or_else(|| EngineError::Routing {
                        node: from.clone(),
                        outcome,
                    })
            }
        }
    }
}
