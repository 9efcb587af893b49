// src/graph/node.rs

use std::fmt;
use std::sync::Arc;

use crate::actions::Action;

/// How a composite node combines its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Children execute strictly in listed order; each child completes
    /// before the next starts.
    Series,
    /// Children start concurrently; the composite completes when all
    /// children reach a terminal state.
    Parallel,
}

/// A named unit of work: either a leaf action or a composite of child
/// nodes.
///
/// Nodes are immutable and carry no execution state, so the same node
/// value can safely appear under more than one parent graph (e.g. a
/// shared "clean" step). Execution state lives in the scheduler's
/// per-run record.
pub struct TaskNode {
    pub name: String,
    pub kind: NodeKind,
}

pub enum NodeKind {
    Leaf(Arc<dyn Action>),
    Composite {
        mode: Mode,
        children: Vec<Arc<TaskNode>>,
    },
}

impl fmt::Debug for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Leaf(_) => f
                .debug_struct("TaskNode")
                .field("name", &self.name)
                .field("kind", &"Leaf")
                .finish(),
            NodeKind::Composite { mode, children } => f
                .debug_struct("TaskNode")
                .field("name", &self.name)
                .field("mode", mode)
                .field("children", &children.len())
                .finish(),
        }
    }
}

impl TaskNode {
    /// Depth-first walk over this node and all descendants.
    pub fn visit(&self, f: &mut impl FnMut(&TaskNode)) {
        f(self);
        if let NodeKind::Composite { children, .. } = &self.kind {
            for child in children {
                child.visit(f);
            }
        }
    }
}

/// Wrap a leaf action in a named node.
pub fn leaf(name: impl Into<String>, action: Arc<dyn Action>) -> Arc<TaskNode> {
    Arc::new(TaskNode {
        name: name.into(),
        kind: NodeKind::Leaf(action),
    })
}

/// Compose children to run strictly in order.
pub fn series(
    name: impl Into<String>,
    children: impl IntoIterator<Item = Arc<TaskNode>>,
) -> Arc<TaskNode> {
    Arc::new(TaskNode {
        name: name.into(),
        kind: NodeKind::Composite {
            mode: Mode::Series,
            children: children.into_iter().collect(),
        },
    })
}

/// Compose children to run concurrently with a join barrier.
pub fn parallel(
    name: impl Into<String>,
    children: impl IntoIterator<Item = Arc<TaskNode>>,
) -> Arc<TaskNode> {
    Arc::new(TaskNode {
        name: name.into(),
        kind: NodeKind::Composite {
            mode: Mode::Parallel,
            children: children.into_iter().collect(),
        },
    })
}
