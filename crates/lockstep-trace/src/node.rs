//! The compiled script-node tree.
//!
//! The compiler reduces a source script into an ordered tree of nodes, each
//! carrying the bytecode it contributed and the source range it came from.
//! Ownership is strictly top-down — a parent owns its children and any
//! captured traces — so the tree is acyclic by construction.

use lockstep_vm::ProgramState;

use crate::range::{merge_ranges, Range};

/// One node of a compiled script.
#[derive(Debug, Clone)]
pub struct ScriptNode {
    /// The bytecode this node contributed to the compilation
    pub bytecode: Vec<u8>,
    /// The source range that produced the bytecode
    pub range: Range,
    /// What kind of node this is
    pub kind: ScriptNodeKind,
}

/// Node shape.
#[derive(Debug, Clone, Default)]
pub enum ScriptNodeKind {
    /// Plain bytecode with no structure beneath it
    #[default]
    Leaf,
    /// A concatenation of child nodes
    Compound {
        children: Vec<ScriptNode>,
    },
    /// Bytecode that is a compiled push of a nested script; `nested` holds
    /// the nested script's nodes
    Push {
        nested: Vec<ScriptNode>,
    },
    /// Bytecode produced by evaluating a nested script at compile time.
    ///
    /// `trace` is the captured debug trace of that evaluation, beginning
    /// with the nested pre-execution state (phase-boundary states are
    /// already excluded by the VM's `debug` contract).
    Evaluation {
        nested: Vec<ScriptNode>,
        trace: Vec<ProgramState>,
    },
}

impl ScriptNode {
    /// A leaf node.
    pub fn leaf(bytecode: Vec<u8>, range: Range) -> Self {
        Self {
            bytecode,
            range,
            kind: ScriptNodeKind::Leaf,
        }
    }

    /// A compound node; bytecode and range are derived from the children.
    ///
    /// # Panics
    /// Panics on an empty child list (a compound node concatenates at least
    /// one child).
    pub fn compound(children: Vec<ScriptNode>) -> Self {
        let bytecode = children
            .iter()
            .flat_map(|child| child.bytecode.iter().copied())
            .collect();
        let ranges: Vec<Range> = children.iter().map(|child| child.range).collect();
        Self {
            bytecode,
            range: merge_ranges(&ranges),
            kind: ScriptNodeKind::Compound { children },
        }
    }

    /// A push-of-nested-script node.
    pub fn push(bytecode: Vec<u8>, range: Range, nested: Vec<ScriptNode>) -> Self {
        Self {
            bytecode,
            range,
            kind: ScriptNodeKind::Push { nested },
        }
    }

    /// A compile-time evaluation node with its captured trace.
    pub fn evaluation(
        bytecode: Vec<u8>,
        range: Range,
        nested: Vec<ScriptNode>,
        trace: Vec<ProgramState>,
    ) -> Self {
        Self {
            bytecode,
            range,
            kind: ScriptNodeKind::Evaluation { nested, trace },
        }
    }
}
