//! Structural checks on the reordered tree.
//!
//! The first violation in pre-order is reported; nothing is corrected.

use crate::ast::{NodeId, NodeKind, Tree};
use crate::compiler::builtins;
use crate::error::{CompileError, Result, ValidationErrorKind};

/// Checks control-flow placement, handler containers, built-in argument
/// counts and assignment targets.
pub fn validate(tree: &Tree) -> Result<()> {
    Validator {
        tree,
        loops: 0,
        switches: 0,
        functions: 0,
    }
    .visit(tree.root())
}

struct Validator<'a> {
    tree: &'a Tree,
    loops: usize,
    switches: usize,
    functions: usize,
}

impl Validator<'_> {
    fn fail(&self, kind: ValidationErrorKind, id: NodeId) -> Result<()> {
        Err(CompileError::validation(kind, self.tree.line(id)))
    }

    fn visit(&mut self, id: NodeId) -> Result<()> {
        let kind = self.tree.kind(id);
        self.check(id, kind)?;

        if kind.is_function() {
            let saved = (self.loops, self.switches);
            self.loops = 0;
            self.switches = 0;
            self.functions += 1;
            let result = self.visit_children(id);
            self.functions -= 1;
            (self.loops, self.switches) = saved;
            return result;
        }

        let is_loop = kind.is_loop();
        let is_switch = kind == NodeKind::Switch;
        self.loops += usize::from(is_loop);
        self.switches += usize::from(is_switch);
        let result = self.visit_children(id);
        self.loops -= usize::from(is_loop);
        self.switches -= usize::from(is_switch);
        result
    }

    fn visit_children(&mut self, id: NodeId) -> Result<()> {
        for &child in self.tree.children(id) {
            self.visit(child)?;
        }
        Ok(())
    }

    fn check(&self, id: NodeId, kind: NodeKind) -> Result<()> {
        match kind {
            NodeKind::Break if self.loops == 0 && self.switches == 0 => {
                self.fail(ValidationErrorKind::BreakOutsideLoop, id)
            }
            NodeKind::Continue if self.loops == 0 => {
                self.fail(ValidationErrorKind::ContinueOutsideLoop, id)
            }
            NodeKind::Return if self.functions == 0 => {
                self.fail(ValidationErrorKind::ReturnOutsideFunction, id)
            }
            NodeKind::ButtonScript | NodeKind::ClipScript => {
                let expected = if kind == NodeKind::ButtonScript {
                    NodeKind::ButtonEvent
                } else {
                    NodeKind::ClipEvent
                };
                match self
                    .tree
                    .children(id)
                    .iter()
                    .find(|&&child| self.tree.kind(child) != expected)
                {
                    Some(&child) => self.fail(ValidationErrorKind::InvalidEventHandler, child),
                    None => Ok(()),
                }
            }
            NodeKind::Call => self.check_arguments(id),
            kind if kind.is_assignment() => {
                let target = self.tree.child(id, 0);
                match self.tree.kind(target) {
                    NodeKind::Identifier | NodeKind::Attribute | NodeKind::Index => Ok(()),
                    _ => self.fail(ValidationErrorKind::InvalidAssignmentTarget, id),
                }
            }
            _ => Ok(()),
        }
    }

    fn check_arguments(&self, id: NodeId) -> Result<()> {
        let Some(builtin) = builtins::lookup(self.tree.name(id)) else {
            return Ok(());
        };
        let found = self.tree.child_count(id);
        if builtin.accepts(found) {
            return Ok(());
        }
        self.fail(
            ValidationErrorKind::ArgumentCount {
                name: builtin.name.to_string(),
                min: builtin.min_args,
                max: builtin.max_args,
                found,
            },
            id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(tree: &Tree) -> Option<ValidationErrorKind> {
        validate(tree).err().and_then(|e| e.validation_kind().cloned())
    }

    #[test]
    fn test_break_outside_loop() {
        let mut tree = Tree::script();
        tree.set_line(7);
        let brk = tree.break_stmt();
        tree.push_statements([brk]);
        let err = validate(&tree).unwrap_err();
        assert_eq!(err.validation_kind(), Some(&ValidationErrorKind::BreakOutsideLoop));
        assert_eq!(err.line(), Some(7));
    }

    #[test]
    fn test_break_inside_switch_is_valid() {
        let mut tree = Tree::script();
        let d = tree.ident("d");
        let test = tree.int(1);
        let brk = tree.break_stmt();
        let case = tree.case(test, [brk]);
        let switch = tree.switch(d, [case]);
        tree.push_statements([switch]);
        assert!(validate(&tree).is_ok());
    }

    #[test]
    fn test_continue_inside_switch_needs_loop() {
        let mut tree = Tree::script();
        let d = tree.ident("d");
        let test = tree.int(1);
        let cont = tree.continue_stmt();
        let case = tree.case(test, [cont]);
        let switch = tree.switch(d, [case]);
        tree.push_statements([switch]);
        assert_eq!(kind_of(&tree), Some(ValidationErrorKind::ContinueOutsideLoop));
    }

    #[test]
    fn test_function_resets_loop_nesting() {
        let mut tree = Tree::script();
        let brk = tree.break_stmt();
        let f = tree.function_expr(&[], [brk]);
        let body = tree.block([f]);
        let cond = tree.boolean(true);
        let looped = tree.while_loop(cond, body);
        tree.push_statements([looped]);
        assert_eq!(kind_of(&tree), Some(ValidationErrorKind::BreakOutsideLoop));
    }

    #[test]
    fn test_return_placement() {
        let mut tree = Tree::script();
        let ret = tree.return_stmt(None);
        tree.push_statements([ret]);
        assert_eq!(kind_of(&tree), Some(ValidationErrorKind::ReturnOutsideFunction));

        let mut tree = Tree::script();
        let ret = tree.return_stmt(None);
        let f = tree.function_def("f", &[], [ret]);
        tree.push_statements([f]);
        assert!(validate(&tree).is_ok());
    }

    #[test]
    fn test_event_handler_containers() {
        let mut tree = Tree::new(NodeKind::ClipScript);
        let good = tree.event(NodeKind::ClipEvent, 1, []);
        let bad = tree.event(NodeKind::ButtonEvent, 1, []);
        tree.push_statements([good, bad]);
        assert_eq!(kind_of(&tree), Some(ValidationErrorKind::InvalidEventHandler));
    }

    #[test]
    fn test_argument_counts() {
        let mut tree = Tree::script();
        let call = tree.call("gotoAndPlay", []);
        tree.push_statements([call]);
        assert_eq!(
            kind_of(&tree),
            Some(ValidationErrorKind::ArgumentCount {
                name: "gotoAndPlay".into(),
                min: 1,
                max: 1,
                found: 0,
            })
        );
    }

    #[test]
    fn test_first_violation_wins() {
        let mut tree = Tree::script();
        let cont = tree.continue_stmt();
        let brk = tree.break_stmt();
        tree.push_statements([cont, brk]);
        assert_eq!(kind_of(&tree), Some(ValidationErrorKind::ContinueOutsideLoop));
    }

    #[test]
    fn test_assignment_target() {
        let mut tree = Tree::script();
        let target = tree.int(1);
        let value = tree.int(2);
        let assign = tree.assign(target, value);
        tree.push_statements([assign]);
        assert_eq!(
            kind_of(&tree),
            Some(ValidationErrorKind::InvalidAssignmentTarget)
        );
    }
}
