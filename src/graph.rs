//! Flattened formula graph.
//!
//! A [`Formula`] tree is flattened into an arena of [`Node`]s in preorder.
//! Every node records the half-open range `child_begin..child_end` of its
//! descendants, so "all nodes below `f`" is a slice of the arena rather than
//! a tree walk.
//!
//! # Storage
//!
//! Each node resolves to a [`Storage`]:
//!
//! - `false`/`true` read one of the two shared constant sets owned by the graph;
//! - binders and operators own a `RwLock<StateSet>` allocated once at build time;
//! - variables observe the set owned by their binder.
//!
//! Only owned sets are reachable through [`Graph::write`], so neither the
//! constants nor a variable alias can be written through.
//!
//! # Dependencies
//!
//! `deps` of a node is the set of variable slots occurring free below it.
//! A node with no free variables is closed: once evaluated, its value never
//! changes again.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

use log::debug;

use crate::bitset::{BitSet, StateSet};
use crate::formula::{Formula, Kind};
use crate::labels::{Label, LabelTable};

pub type NodeId = usize;

/// Dense index of a fixpoint variable name.
pub type Slot = usize;

/// Operator of a node, with its children resolved to arena indices.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Op {
    False,
    True,
    Var { slot: Slot, binder: NodeId },
    Mu { slot: Slot, body: NodeId },
    Nu { slot: Slot, body: NodeId },
    And(NodeId, NodeId),
    Or(NodeId, NodeId),
    Diamond { label: Label, body: NodeId },
    Box { label: Label, body: NodeId },
}

impl Op {
    pub fn kind(&self) -> Kind {
        match self {
            Op::False => Kind::False,
            Op::True => Kind::True,
            Op::Var { .. } => Kind::Var,
            Op::Mu { .. } => Kind::Mu,
            Op::Nu { .. } => Kind::Nu,
            Op::And(..) => Kind::And,
            Op::Or(..) => Kind::Or,
            Op::Diamond { .. } => Kind::Diamond,
            Op::Box { .. } => Kind::Box,
        }
    }
}

/// Where the value of a node lives.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Storage {
    /// One of the two shared constants.
    Constant(bool),
    /// The set owned by this node.
    Node(NodeId),
}

#[derive(Debug)]
pub struct Node {
    pub op: Op,
    pub child_begin: NodeId,
    pub child_end: NodeId,
    /// Kind of the nearest enclosing binder, if any.
    pub surrounding: Option<Kind>,
    /// Free variable slots.
    pub deps: BitSet,
    pub num_deps: usize,
    valid: AtomicBool,
    /// `None` for constants and variables.
    value: Option<RwLock<StateSet>>,
}

impl Node {
    pub fn kind(&self) -> Kind {
        self.op.kind()
    }

    pub fn is_open(&self) -> bool {
        self.num_deps > 0
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn mark_valid(&self) {
        self.valid.store(true, Ordering::Release);
    }

    /// Whether `slot` occurs free below this node.
    pub fn depends_on(&self, slot: Slot) -> bool {
        self.deps.contains(slot)
    }
}

/// Preorder arena of formula nodes; the root is node 0.
#[derive(Debug)]
pub struct Graph {
    nodes: Vec<Node>,
    /// Variable names, indexed by slot.
    slots: Vec<String>,
    empty: StateSet,
    full: StateSet,
}

struct Builder<'a> {
    nodes: Vec<Node>,
    slot_of: HashMap<String, Slot>,
    slots: Vec<String>,
    /// Binders in scope, innermost last.
    scope: Vec<(Slot, NodeId)>,
    /// Free variable slots, indexed by node id.
    free_of: Vec<Vec<Slot>>,
    labels: &'a mut LabelTable,
    num_states: usize,
}

impl Builder<'_> {
    fn slot(&mut self, name: &str) -> Slot {
        if let Some(&slot) = self.slot_of.get(name) {
            return slot;
        }
        let slot = self.slots.len();
        self.slots.push(name.to_string());
        self.slot_of.insert(name.to_string(), slot);
        slot
    }

    /// Appends `f` and its descendants in preorder.
    /// Returns the node id and its free variable slots.
    fn visit(&mut self, f: &Formula, surrounding: Option<Kind>) -> (NodeId, Vec<Slot>) {
        let id = self.nodes.len();
        self.nodes.push(Node {
            op: Op::False,
            child_begin: id + 1,
            child_end: id + 1,
            surrounding,
            deps: BitSet::new(0),
            num_deps: 0,
            valid: AtomicBool::new(false),
            value: None,
        });
        self.free_of.push(Vec::new());

        let (op, free) = match f {
            Formula::False => (Op::False, vec![]),
            Formula::True => (Op::True, vec![]),
            Formula::Var(x) => {
                let slot = self.slot(x);
                let binder = self
                    .scope
                    .iter()
                    .rev()
                    .find(|&&(s, _)| s == slot)
                    .map(|&(_, b)| b)
                    .unwrap_or_else(|| panic!("variable '{}' is not bound", x));
                // Reads always see the binder's current approximation.
                self.nodes[id].mark_valid();
                (Op::Var { slot, binder }, vec![slot])
            }
            Formula::Mu(x, body) | Formula::Nu(x, body) => {
                let kind = f.kind();
                let slot = self.slot(x);
                self.nodes[id].value = Some(RwLock::new(StateSet::filled(self.num_states, kind.identity())));
                self.scope.push((slot, id));
                let (body, mut free) = self.visit(body, Some(kind));
                self.scope.pop();
                free.retain(|&s| s != slot);
                let op = if kind == Kind::Mu {
                    Op::Mu { slot, body }
                } else {
                    Op::Nu { slot, body }
                };
                (op, free)
            }
            Formula::And(l, r) | Formula::Or(l, r) => {
                self.nodes[id].value = Some(RwLock::new(StateSet::new(self.num_states)));
                let (l, mut free) = self.visit(l, surrounding);
                let (r, free_r) = self.visit(r, surrounding);
                for s in free_r {
                    if !free.contains(&s) {
                        free.push(s);
                    }
                }
                let op = if f.kind() == Kind::And { Op::And(l, r) } else { Op::Or(l, r) };
                (op, free)
            }
            Formula::Diamond(a, body) | Formula::Box(a, body) => {
                self.nodes[id].value = Some(RwLock::new(StateSet::new(self.num_states)));
                let label = self.labels.intern(a);
                let (body, free) = self.visit(body, surrounding);
                let op = if f.kind() == Kind::Diamond {
                    Op::Diamond { label, body }
                } else {
                    Op::Box { label, body }
                };
                (op, free)
            }
        };

        let end = self.nodes.len();
        let node = &mut self.nodes[id];
        node.op = op;
        node.child_end = end;
        self.free_of[id] = free.clone();
        (id, free)
    }
}

impl Graph {
    /// Flattens `formula` for evaluation over `num_states` states,
    /// resolving modal labels through `labels`.
    ///
    /// # Panics
    ///
    /// Panics if a variable is not bound by an enclosing binder. The
    /// [parser][crate::parser::parse] never produces such a tree.
    pub fn build(formula: &Formula, labels: &mut LabelTable, num_states: usize) -> Self {
        let mut builder = Builder {
            nodes: Vec::with_capacity(formula.size()),
            slot_of: HashMap::new(),
            slots: Vec::new(),
            scope: Vec::new(),
            free_of: Vec::with_capacity(formula.size()),
            labels,
            num_states,
        };

        builder.visit(formula, None);

        let num_slots = builder.slots.len();
        let mut nodes = builder.nodes;
        for (node, free) in nodes.iter_mut().zip(builder.free_of) {
            let mut deps = BitSet::new(num_slots);
            for s in free {
                deps.insert(s);
            }
            node.num_deps = deps.count();
            node.deps = deps;
        }

        debug!("formula graph: {} nodes, {} variable slots", nodes.len(), num_slots);

        Graph {
            nodes,
            slots: builder.slots,
            empty: StateSet::filled(num_states, false),
            full: StateSet::filled(num_states, true),
        }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn num_states(&self) -> usize {
        self.empty.len()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Name of a variable slot.
    pub fn slot_name(&self, slot: Slot) -> &str {
        &self.slots[slot]
    }

    /// All strict descendants of `id`, in preorder.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &Node)> {
        let node = &self.nodes[id];
        (node.child_begin..node.child_end).map(move |i| (i, &self.nodes[i]))
    }

    /// Node `id` followed by all its descendants, in preorder.
    pub fn subtree(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &Node)> {
        let node = &self.nodes[id];
        (id..node.child_end).map(move |i| (i, &self.nodes[i]))
    }

    /// The shared all-false set.
    pub fn empty(&self) -> &StateSet {
        &self.empty
    }

    /// The shared all-true set.
    pub fn full(&self) -> &StateSet {
        &self.full
    }

    pub fn storage(&self, id: NodeId) -> Storage {
        match self.nodes[id].op {
            Op::False => Storage::Constant(false),
            Op::True => Storage::Constant(true),
            Op::Var { binder, .. } => Storage::Node(binder),
            _ => Storage::Node(id),
        }
    }

    /// Whether `a` and `b` read the very same set (not merely equal ones).
    pub fn same_storage(&self, a: NodeId, b: NodeId) -> bool {
        self.storage(a) == self.storage(b)
    }

    /// Calls `f` with the current value of node `id`.
    pub fn read<R>(&self, id: NodeId, f: impl FnOnce(&StateSet) -> R) -> R {
        match self.storage(id) {
            Storage::Constant(false) => f(&self.empty),
            Storage::Constant(true) => f(&self.full),
            Storage::Node(owner) => {
                let Some(cell) = &self.nodes[owner].value else {
                    unreachable!("node {} has no storage", owner)
                };
                let guard = cell.read().unwrap_or_else(PoisonError::into_inner);
                f(&guard)
            }
        }
    }

    /// Snapshot of the current value of node `id`.
    pub fn value(&self, id: NodeId) -> StateSet {
        self.read(id, StateSet::clone)
    }

    /// Write access to the set owned by node `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is a constant or a variable: those never own storage.
    pub fn write(&self, id: NodeId) -> RwLockWriteGuard<'_, StateSet> {
        match &self.nodes[id].value {
            Some(cell) => cell.write().unwrap_or_else(PoisonError::into_inner),
            None => unreachable!("node {} ({}) does not own a state set", id, self.nodes[id].kind()),
        }
    }

    /// Resets the binder `id` to the identity of its kind.
    pub fn reset_binder(&self, id: NodeId) {
        let kind = self.nodes[id].kind();
        debug_assert!(kind.is_binder());
        self.write(id).reset(kind.identity());
    }

    /// Renders node `id` in the textual syntax.
    pub fn display<'a>(&'a self, id: NodeId, labels: &'a LabelTable) -> DisplayNode<'a> {
        DisplayNode { graph: self, labels, id }
    }
}

pub struct DisplayNode<'a> {
    graph: &'a Graph,
    labels: &'a LabelTable,
    id: NodeId,
}

impl Display for DisplayNode<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let sub = |id| self.graph.display(id, self.labels);
        let label = |l: Label| self.labels.resolve(l).unwrap_or("?");
        match self.graph.nodes[self.id].op {
            Op::False => write!(f, "false"),
            Op::True => write!(f, "true"),
            Op::Var { slot, .. } => write!(f, "{}", self.graph.slot_name(slot)),
            Op::Mu { slot, body } => write!(f, "(mu {}. {})", self.graph.slot_name(slot), sub(body)),
            Op::Nu { slot, body } => write!(f, "(nu {}. {})", self.graph.slot_name(slot), sub(body)),
            Op::And(l, r) => write!(f, "({} && {})", sub(l), sub(r)),
            Op::Or(l, r) => write!(f, "({} || {})", sub(l), sub(r)),
            Op::Diamond { label: l, body } => write!(f, "<{}>{}", label(l), sub(body)),
            Op::Box { label: l, body } => write!(f, "[{}]{}", label(l), sub(body)),
        }
    }
}
