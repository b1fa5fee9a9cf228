//! Tree rewriting before code generation.
//!
//! One walk does, per node and in this order: named-constant substitution,
//! function hoisting and discard marking; then the children; then constant
//! folding and built-in literal rewrites on the way back up, so arguments
//! are rewritten after they fold to literals.

use tracing::{debug, trace};

use crate::ast::{NodeId, NodeKind, Payload, Tree};
use crate::compiler::builtins::{self, CLIP_DEPTH_OFFSET, Constant, FSCOMMAND_PREFIX};
use crate::compiler::context::CompilationContext;
use crate::compiler::fold::fold_node;

/// Counts reported by a reorder walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReorderStats {
    /// Function definitions moved to the front of their hoist target
    pub hoisted: usize,
    /// Operators replaced by literals
    pub folded: usize,
    /// Named constants and built-in arguments rewritten
    pub rewritten: usize,
}

/// Rewrites the tree in place.
pub fn reorder(tree: &mut Tree, ctx: &mut CompilationContext) -> ReorderStats {
    let mut pass = Reorder {
        tree,
        ctx,
        stats: ReorderStats::default(),
    };
    let root = pass.tree.root();
    pass.visit(root);
    let stats = pass.stats;
    debug!(
        hoisted = stats.hoisted,
        folded = stats.folded,
        rewritten = stats.rewritten,
        "reorder finished"
    );
    stats
}

struct Reorder<'a> {
    tree: &'a mut Tree,
    ctx: &'a mut CompilationContext,
    stats: ReorderStats,
}

impl Reorder<'_> {
    /// Visits `id`; returns true when the node itself was hoisted.
    fn visit(&mut self, id: NodeId) -> bool {
        self.substitute_constant(id);
        let moved = self.tree.kind(id) == NodeKind::FunctionDef && self.hoist(id);
        self.mark_discard(id);

        let is_target = self.tree.kind(id).is_hoist_target();
        if is_target {
            self.ctx.push_hoist_target(id);
        }

        let mut i = 0;
        while i < self.tree.child_count(id) {
            let child = self.tree.child(id, i);
            let child_moved = self.visit(child);
            i = match (child_moved, self.tree.parent(child)) {
                // Hoisted within this list: everything up to `i` is done.
                (true, Some(parent)) if parent == id => i + 1,
                // Hoisted elsewhere: the next sibling slid into `i`.
                (true, _) => i,
                // Hoists into this list may have shifted the child.
                (false, _) => self.tree.index_of(id, child).map_or(i + 1, |at| at + 1),
            };
        }

        if is_target {
            self.ctx.pop_hoist_target();
        }

        if fold_node(self.tree, id) {
            self.stats.folded += 1;
        }
        if self.tree.kind(id) == NodeKind::Call {
            self.rewrite_builtin_arguments(id);
        }
        moved
    }

    // ========================================================================
    // Named constants
    // ========================================================================

    fn substitute_constant(&mut self, id: NodeId) {
        let constant = match self.tree.kind(id) {
            NodeKind::Identifier => builtins::named_constant(self.tree.name(id)),
            NodeKind::Attribute => {
                let object = self.tree.child(id, 0);
                if self.tree.kind(object) != NodeKind::Identifier {
                    return;
                }
                builtins::member_constant(self.tree.name(object), self.tree.name(id))
            }
            _ => return,
        };
        let Some(constant) = constant else {
            return;
        };
        if self.is_write_target(id) {
            return;
        }

        trace!(name = self.tree.name(id), ?constant, "substituted constant");
        let (kind, payload) = match constant {
            Constant::Int(n) => (NodeKind::IntegerLiteral, Payload::Int(n)),
            Constant::Double(d) => (NodeKind::DoubleLiteral, Payload::Double(d)),
            Constant::Str(s) => (NodeKind::StringLiteral, Payload::Str(s.to_owned())),
        };
        self.tree.set_literal(id, kind, payload);
        self.stats.rewritten += 1;
    }

    fn is_write_target(&self, id: NodeId) -> bool {
        let Some(parent) = self.tree.parent(id) else {
            return false;
        };
        let kind = self.tree.kind(parent);
        if kind == NodeKind::ParamList {
            return true;
        }
        let first = self.tree.children(parent).first() == Some(&id);
        first && (kind.is_assignment() || kind == NodeKind::ForIn)
    }

    // ========================================================================
    // Hoisting
    // ========================================================================

    fn hoist(&mut self, id: NodeId) -> bool {
        let (Some(target), Some(parent)) = (self.ctx.hoist_target(), self.tree.parent(id)) else {
            return false;
        };
        let list = if self.tree.kind(target).is_function() {
            self.tree.child(target, 1)
        } else {
            target
        };
        let Some(from) = self.tree.index_of(parent, id) else {
            return false;
        };

        // Statement slots keep their arity.
        if self.tree.kind(parent).is_statement_list() {
            self.tree.remove_child(parent, from);
        } else {
            let empty = self.tree.empty();
            self.tree.replace_child(parent, from, empty);
        }
        let at = self.tree.node(target).insertion_index;
        self.tree.insert_child(list, at, id);
        self.tree.node_mut(target).insertion_index = at + 1;

        trace!(name = self.tree.name(id), at, "hoisted function");
        self.stats.hoisted += 1;
        true
    }

    // ========================================================================
    // Built-in argument rewrites
    // ========================================================================

    fn rewrite_builtin_arguments(&mut self, id: NodeId) {
        let name = self.tree.name(id).to_ascii_lowercase();
        let args = self.tree.children(id).to_vec();
        let literal = |tree: &Tree, index: usize| -> Option<(NodeId, Payload)> {
            let arg = *args.get(index)?;
            tree.kind(arg)
                .is_literal()
                .then(|| (arg, tree.payload(arg).clone()))
        };

        let rewrite = match name.as_str() {
            "fscommand" => match literal(&*self.tree, 0) {
                Some((arg, Payload::Str(command))) => Some((
                    arg,
                    NodeKind::StringLiteral,
                    Payload::Str(format!("{FSCOMMAND_PREFIX}{command}")),
                )),
                _ => None,
            },
            "duplicatemovieclip" => match literal(&*self.tree, 2) {
                Some((arg, Payload::Int(depth))) => Some((
                    arg,
                    NodeKind::IntegerLiteral,
                    Payload::Int(depth.wrapping_add(CLIP_DEPTH_OFFSET)),
                )),
                _ => None,
            },
            "gotoandplay" | "gotoandstop" => match literal(&*self.tree, 0) {
                Some((arg, Payload::Int(frame))) => Some((
                    arg,
                    NodeKind::IntegerLiteral,
                    Payload::Int(frame.saturating_sub(1).max(0)),
                )),
                _ => None,
            },
            "getproperty" | "setproperty" => match literal(&*self.tree, 1) {
                Some((arg, Payload::Str(property))) => builtins::property_code(&property)
                    .map(|code| (arg, NodeKind::IntegerLiteral, Payload::Int(code))),
                _ => None,
            },
            _ => None,
        };

        if let Some((arg, kind, payload)) = rewrite {
            trace!(builtin = %name, ?payload, "rewrote built-in argument");
            self.tree.set_literal(arg, kind, payload);
            self.stats.rewritten += 1;
        }
    }

    // ========================================================================
    // Discard marking
    // ========================================================================

    fn mark_discard(&mut self, id: NodeId) {
        let kind = self.tree.kind(id);
        if kind.is_statement_list() {
            for child in self.tree.children(id).to_vec() {
                self.tree.set_discard(child, true);
            }
            return;
        }

        let positions: &[usize] = match kind {
            NodeKind::If => &[1, 2],
            NodeKind::While | NodeKind::With | NodeKind::TellTarget => &[1],
            NodeKind::DoWhile => &[0],
            NodeKind::For => &[0, 2, 3],
            NodeKind::ForIn => &[2],
            _ => return,
        };
        for &position in positions {
            if position >= self.tree.child_count(id) {
                continue;
            }
            let child = self.tree.child(id, position);
            if self.tree.kind(child) != NodeKind::StatementList {
                self.tree.set_discard(child, true);
            }
        }
    }
}
