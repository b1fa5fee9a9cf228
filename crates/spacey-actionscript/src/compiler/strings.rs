//! Constant pool collection.
//!
//! Interns every string the generator will push, in the order the VM sees
//! the pushes. The walk mirrors the generator node for node, including the
//! lexical-context labels, so the pool decisions made here hold there.

use tracing::debug;

use crate::ast::{NodeId, NodeKind, Tree};
use crate::compiler::builtins::{self, FSCOMMAND_PREFIX, LEVEL_PREFIX, Navigation, Rule};
use crate::compiler::context::{ARG_LABEL, CompilationContext, PropertyMode, context_label};

/// Fills `ctx.pool` from the tree.
pub fn collect_strings(tree: &Tree, ctx: &mut CompilationContext) {
    let mut collector = StringCollector { tree, ctx };
    collector.visit(tree.root());
    debug!(
        pooled = ctx.pool.len(),
        emitted = ctx.pool.must_emit(),
        "string collection finished"
    );
}

struct StringCollector<'a> {
    tree: &'a Tree,
    ctx: &'a mut CompilationContext,
}

impl StringCollector<'_> {
    fn visit(&mut self, id: NodeId) {
        self.ctx.enter(context_label(self.tree, id));
        self.visit_node(id);
        self.ctx.leave();
    }

    fn visit_all(&mut self, ids: &[NodeId]) {
        for &id in ids {
            self.visit(id);
        }
    }

    fn visit_reversed(&mut self, ids: &[NodeId]) {
        for &id in ids.iter().rev() {
            self.visit(id);
        }
    }

    fn intern(&mut self, s: &str) {
        self.ctx.pool.intern(s);
    }

    fn visit_node(&mut self, id: NodeId) {
        let tree = self.tree;
        let children = tree.children(id);
        match tree.kind(id) {
            NodeKind::StringLiteral => self.intern(tree.name(id)),
            NodeKind::Identifier => self.identifier(tree.name(id)),
            NodeKind::Attribute => {
                self.visit(children[0]);
                self.intern(tree.name(id));
            }
            NodeKind::Call => self.call(id),
            NodeKind::MethodCall => {
                self.visit_reversed(&children[1..]);
                self.visit(children[0]);
                self.intern(tree.name(id));
            }
            NodeKind::New => {
                self.visit_reversed(children);
                self.intern(tree.name(id));
            }
            NodeKind::ArrayLiteral => self.visit_reversed(children),
            NodeKind::ObjectProperty => {
                self.intern(tree.name(id));
                self.visit_all(children);
            }
            NodeKind::Var => {
                let in_function = self.ctx.in_function();
                for &declarator in children {
                    let init = tree.children(declarator).first().copied();
                    if in_function || init.is_some() {
                        self.intern(tree.name(declarator));
                    }
                    if let Some(init) = init {
                        self.visit(init);
                    }
                }
            }
            NodeKind::ForIn => {
                let object = children[1];
                if self.ctx.version() < 6 && tree.kind(object) == NodeKind::Identifier {
                    self.intern(tree.name(object));
                } else {
                    self.visit(object);
                }
                self.intern(tree.name(children[0]));
                self.visit(children[2]);
            }
            NodeKind::Delete => {
                let target = children[0];
                let target_children = tree.children(target);
                match tree.kind(target) {
                    NodeKind::Identifier => self.intern(tree.name(target)),
                    NodeKind::Attribute => {
                        self.visit(target_children[0]);
                        self.intern(tree.name(target));
                    }
                    NodeKind::Index => self.visit_all(target_children),
                    _ => self.visit(target),
                }
            }
            kind if kind.is_compound_assignment() => {
                // Setter prefix, then the regenerated read.
                self.visit(children[0]);
                self.visit_all(children);
            }
            NodeKind::Switch => {
                self.visit(children[0]);
                let cases = &children[1..];
                for &case in cases {
                    if tree.kind(case) == NodeKind::Case {
                        self.visit(tree.child(case, 0));
                    }
                }
                for &case in cases {
                    self.ctx.enter(context_label(tree, case));
                    let body = *tree.children(case).last().unwrap_or(&case);
                    self.visit(body);
                    self.ctx.leave();
                }
            }
            NodeKind::Conditional => {
                self.visit(children[0]);
                self.visit(children[2]);
                self.visit(children[1]);
            }
            NodeKind::For => {
                self.visit(children[0]);
                self.visit(children[1]);
                self.visit(children[3]);
                self.visit(children[2]);
            }
            NodeKind::TellTarget => {
                if builtins::literal_str(tree, children[0]).is_none() {
                    self.visit(children[0]);
                }
                self.visit(children[1]);
            }
            NodeKind::FunctionDef | NodeKind::FunctionExpr => self.visit(children[1]),
            NodeKind::ParamList => {}
            _ => self.visit_all(children),
        }
    }

    fn identifier(&mut self, name: &str) {
        if builtins::property_code(name).is_none() {
            self.intern(name);
            return;
        }
        match self.ctx.property_mode() {
            PropertyMode::With => self.intern(name),
            PropertyMode::Object => {
                self.intern("this");
                self.intern(name);
            }
            PropertyMode::PropertyCall => {}
            PropertyMode::Default => self.intern(""),
        }
    }

    fn call(&mut self, id: NodeId) {
        let tree = self.tree;
        let args = tree.children(id);
        let Some(builtin) = builtins::lookup(tree.name(id)) else {
            self.visit_reversed(args);
            self.intern(tree.name(id));
            return;
        };

        match builtin.rule {
            Rule::Opcode { .. } => self.visit_all(args),
            Rule::Reversed(_) => {
                if args.len() == 6 {
                    self.visit_all(&args[2..]);
                }
                let leading = args.len().min(2);
                self.visit_reversed(&args[..leading]);
            }
            Rule::Navigation(nav) => self.navigation(nav, args),
            Rule::ByName => {
                self.visit_reversed(args);
                self.intern(tree.name(id));
            }
        }
    }

    fn navigation(&mut self, nav: Navigation, args: &[NodeId]) {
        let tree = self.tree;
        match nav {
            Navigation::GetUrl => {
                if builtins::static_url(tree, args).is_some() {
                    return;
                }
                self.visit(args[0]);
                self.target_or_empty(args.get(1).copied());
            }
            Navigation::LoadMovie | Navigation::LoadVariables => self.visit_all(&args[..2]),
            Navigation::LoadMovieNum | Navigation::LoadVariablesNum => {
                self.visit(args[0]);
                self.level(args[1]);
            }
            Navigation::UnloadMovie => {
                self.intern("");
                self.visit(args[0]);
            }
            Navigation::UnloadMovieNum => {
                self.intern("");
                self.level(args[0]);
            }
            Navigation::FsCommand => {
                if builtins::static_fscommand(tree, args).is_some() {
                    return;
                }
                match builtins::literal_str(tree, args[0]) {
                    Some(command) => self.intern(command),
                    None => {
                        self.intern(FSCOMMAND_PREFIX);
                        self.visit(args[0]);
                    }
                }
                self.target_or_empty(args.get(1).copied());
            }
            Navigation::Goto { .. } => {
                let frame = args[0];
                if builtins::literal_frame(tree, frame).is_some() {
                    return;
                }
                match builtins::literal_str(tree, frame) {
                    Some(label) if self.ctx.version() >= 6 => self.intern(label),
                    Some(_) => {}
                    None => self.visit(frame),
                }
            }
            Navigation::SetTarget => {
                if builtins::literal_str(tree, args[0]).is_none() {
                    self.visit(args[0]);
                }
            }
            Navigation::DuplicateClip => self.visit_all(args),
            Navigation::GetProperty => {
                self.argument(args[0]);
                self.visit(args[1]);
            }
            Navigation::SetProperty => {
                self.argument(args[0]);
                self.visit(args[1]);
                self.argument(args[2]);
            }
        }
    }

    fn argument(&mut self, id: NodeId) {
        self.ctx.enter(ARG_LABEL);
        self.visit(id);
        self.ctx.leave();
    }

    fn target_or_empty(&mut self, target: Option<NodeId>) {
        match target {
            Some(target) => self.visit(target),
            None => self.intern(""),
        }
    }

    fn level(&mut self, level: NodeId) {
        match builtins::level_target(self.tree, level) {
            Some(target) => self.intern(&target),
            None => {
                self.intern(LEVEL_PREFIX);
                self.visit(level);
            }
        }
    }
}
