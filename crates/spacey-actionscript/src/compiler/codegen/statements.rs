//! Statement lowering and branch layout.
//!
//! Offsets are relative to the end of the branch instruction. Each loop
//! resolves the placeholders of its own body with targets measured from
//! the start of that body.

use super::{Generator, JumpScope, SCRATCH_REGISTER, resolve_placeholders};
use crate::ast::{NodeId, NodeKind};
use crate::compiler::builtins;
use crate::compiler::bytecode::{ActionSequence, BRANCH_LEN, Instruction, OpCode, Operand, PushValue};
use crate::compiler::codegen::branch_offset;
use crate::compiler::context::context_label;
use crate::error::Result;

const BRANCH: isize = BRANCH_LEN as isize;

impl Generator<'_> {
    /// `cond; not; if +then; then; [jump +else; else]`
    pub(super) fn gen_if(&mut self, id: NodeId, out: &mut ActionSequence) -> Result<()> {
        let tree = self.tree;
        let children = tree.children(id);
        self.lower(children[0], out)?;
        out.op(OpCode::Not);

        let then = self.gen_into(children[1])?;
        let otherwise = match children.get(2) {
            Some(&branch) => Some(self.gen_into(branch)?),
            None => None,
        };

        // A branch ending in break/continue never falls into the else part.
        let skip_else = otherwise.is_some() && !then.ends_with_placeholder();
        let mut then_len = self.measure(&then)?;
        if skip_else {
            then_len += BRANCH;
        }

        out.emit(Instruction::branch_if(branch_offset(then_len)?));
        out.append(then);
        if let Some(otherwise) = otherwise {
            if skip_else {
                out.emit(Instruction::jump(branch_offset(self.measure(&otherwise)?)?));
            }
            out.append(otherwise);
        }
        Ok(())
    }

    /// `cond; not; if +exit; body; jump -start`
    pub(super) fn gen_while(&mut self, id: NodeId, out: &mut ActionSequence) -> Result<()> {
        let tree = self.tree;
        let mut head = ActionSequence::new();
        self.lower(tree.child(id, 0), &mut head)?;
        head.op(OpCode::Not);

        let mut body = self.scoped(JumpScope::Loop, |g| g.gen_into(tree.child(id, 1)))?;
        let head_len = self.measure(&head)? + BRANCH;
        let body_len = self.measure(&body)?;
        resolve_placeholders(
            &mut body,
            self.options(),
            Some(body_len + BRANCH),
            Some(-head_len),
        )?;

        head.emit(Instruction::branch_if(branch_offset(body_len + BRANCH)?));
        out.append(head);
        out.append(body);
        out.emit(Instruction::jump(branch_offset(-(head_len + body_len + BRANCH))?));
        Ok(())
    }

    /// `body; cond; if -start`
    pub(super) fn gen_do_while(&mut self, id: NodeId, out: &mut ActionSequence) -> Result<()> {
        let tree = self.tree;
        let mut body = self.scoped(JumpScope::Loop, |g| g.gen_into(tree.child(id, 0)))?;
        let cond = self.gen_into(tree.child(id, 1))?;

        let body_len = self.measure(&body)?;
        let cond_len = self.measure(&cond)?;
        resolve_placeholders(
            &mut body,
            self.options(),
            Some(body_len + cond_len + BRANCH),
            Some(body_len),
        )?;

        out.append(body);
        out.append(cond);
        out.emit(Instruction::branch_if(branch_offset(-(body_len + cond_len + BRANCH))?));
        Ok(())
    }

    /// `init; [cond; not; if +exit]; body; iter; jump -cond`
    pub(super) fn gen_for(&mut self, id: NodeId, out: &mut ActionSequence) -> Result<()> {
        let tree = self.tree;
        let children = tree.children(id);
        let (init, cond, iter, body) = (children[0], children[1], children[2], children[3]);

        self.lower(init, out)?;
        let has_cond = tree.kind(cond) != NodeKind::Empty;
        let mut head = ActionSequence::new();
        if has_cond {
            self.lower(cond, &mut head)?;
            head.op(OpCode::Not);
        }
        let mut body = self.scoped(JumpScope::Loop, |g| g.gen_into(body))?;
        let iter = self.gen_into(iter)?;

        let head_len = if has_cond {
            self.measure(&head)? + BRANCH
        } else {
            0
        };
        let body_len = self.measure(&body)?;
        let iter_len = self.measure(&iter)?;
        resolve_placeholders(
            &mut body,
            self.options(),
            Some(body_len + iter_len + BRANCH),
            Some(body_len),
        )?;

        if has_cond {
            head.emit(Instruction::branch_if(branch_offset(body_len + iter_len + BRANCH)?));
        }
        out.append(head);
        out.append(body);
        out.append(iter);
        out.emit(Instruction::jump(branch_offset(
            -(head_len + body_len + iter_len + BRANCH),
        )?));
        Ok(())
    }

    /// Enumerates onto the stack above a `null` sentinel, then pops one
    /// name per iteration into the loop variable. `break` leaves names on
    /// the stack, so it lands on a drain loop that pops down to the
    /// sentinel; normal exit skips the drain.
    pub(super) fn gen_for_in(&mut self, id: NodeId, out: &mut ActionSequence) -> Result<()> {
        let tree = self.tree;
        let children = tree.children(id);
        let (variable, object, body) = (children[0], children[1], children[2]);
        let declared = tree.payload(id).as_bool().unwrap_or(false);

        if self.supports(OpCode::Enumerate2) {
            self.lower(object, out)?;
            out.op(OpCode::Enumerate2);
        } else if tree.kind(object) == NodeKind::Identifier {
            self.push_str(out, tree.name(object));
            out.op(OpCode::Enumerate);
        } else {
            self.lower(object, out)?;
            out.op(OpCode::Enumerate);
        }

        let mut head = ActionSequence::new();
        Self::store_register(&mut head, SCRATCH_REGISTER);
        head.push(PushValue::Null);
        head.op(OpCode::Equals2);

        let mut assign = ActionSequence::new();
        self.push_str(&mut assign, tree.name(variable));
        assign.push(PushValue::Register(SCRATCH_REGISTER));
        assign.op(if declared && self.ctx.in_function() {
            OpCode::DefineLocal
        } else {
            OpCode::SetVariable
        });

        let mut body = self.scoped(JumpScope::Loop, |g| g.gen_into(body))?;
        let head_len = self.measure(&head)? + BRANCH;
        let assign_len = self.measure(&assign)?;
        let body_len = self.measure(&body)?;
        let breaks = resolve_placeholders(
            &mut body,
            self.options(),
            Some(body_len + BRANCH),
            Some(-(head_len + assign_len)),
        )?;

        let mut drain = ActionSequence::new();
        if breaks > 0 {
            drain.push(PushValue::Null);
            drain.op(OpCode::Equals2);
            drain.op(OpCode::Not);
            let back = self.measure(&drain)? + BRANCH;
            drain.emit(Instruction::branch_if(branch_offset(-back)?));
        }
        let drain_len = self.measure(&drain)?;

        head.emit(Instruction::branch_if(branch_offset(
            assign_len + body_len + BRANCH + drain_len,
        )?));
        out.append(head);
        out.append(assign);
        out.append(body);
        out.emit(Instruction::jump(branch_offset(
            -(head_len + assign_len + body_len + BRANCH),
        )?));
        out.append(drain);
        Ok(())
    }

    /// `discr; (dup; test; eq; if +body_i)*; jump +default; bodies; pop`
    pub(super) fn gen_switch(&mut self, id: NodeId, out: &mut ActionSequence) -> Result<()> {
        let tree = self.tree;
        let children = tree.children(id);
        self.lower(children[0], out)?;
        let cases = &children[1..];
        let equals = if self.supports(OpCode::StrictEquals) {
            OpCode::StrictEquals
        } else {
            OpCode::Equals2
        };

        // (label sequence, index of the body it jumps to)
        let mut labels = Vec::new();
        for (index, &case) in cases.iter().enumerate() {
            if tree.kind(case) != NodeKind::Case {
                continue;
            }
            let mut label = ActionSequence::new();
            label.op(OpCode::PushDuplicate);
            self.lower(tree.child(case, 0), &mut label)?;
            label.op(equals);
            labels.push((label, index));
        }
        let default = cases
            .iter()
            .position(|&case| tree.kind(case) == NodeKind::DefaultCase);

        let mut bodies = self.scoped(JumpScope::Switch, |g| {
            cases
                .iter()
                .map(|&case| {
                    g.ctx.enter(context_label(tree, case));
                    let body = match tree.children(case).last() {
                        Some(&body) => g.gen_into(body),
                        None => Ok(ActionSequence::new()),
                    };
                    g.ctx.leave();
                    body
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let body_lens = bodies
            .iter()
            .map(|body| self.measure(body))
            .collect::<Result<Vec<_>>>()?;
        let before = |index: usize| body_lens[..index].iter().sum::<isize>();
        let total: isize = body_lens.iter().sum();

        for (index, body) in bodies.iter_mut().enumerate() {
            let remaining = total - before(index);
            resolve_placeholders(body, self.options(), Some(remaining), None)?;
        }

        let label_lens = labels
            .iter()
            .map(|(label, _)| Ok(self.measure(label)? + BRANCH))
            .collect::<Result<Vec<_>>>()?;
        for (i, (mut label, target)) in labels.into_iter().enumerate() {
            let later: isize = label_lens[i + 1..].iter().sum();
            let offset = later + BRANCH + before(target);
            label.emit(Instruction::branch_if(branch_offset(offset)?));
            out.append(label);
        }
        let fallback = default.map_or(total, before);
        out.emit(Instruction::jump(branch_offset(fallback)?));
        for body in bodies {
            out.append(body);
        }
        out.op(OpCode::Pop);
        Ok(())
    }

    /// Pops the discriminant of every switch between here and the loop.
    pub(super) fn gen_continue(&mut self, out: &mut ActionSequence) {
        let switches = self
            .scopes
            .iter()
            .rev()
            .take_while(|&&scope| scope == JumpScope::Switch)
            .count();
        for _ in 0..switches {
            out.op(OpCode::Pop);
        }
        out.op(OpCode::Continue);
    }

    pub(super) fn gen_return(&mut self, id: NodeId, out: &mut ActionSequence) -> Result<()> {
        match self.tree.children(id).first() {
            Some(&value) => self.lower(value, out)?,
            None => {
                out.push(PushValue::Undefined);
            }
        }
        out.op(OpCode::Return);
        Ok(())
    }

    pub(super) fn gen_with(&mut self, id: NodeId, out: &mut ActionSequence) -> Result<()> {
        let tree = self.tree;
        self.lower(tree.child(id, 0), out)?;
        let body = self.gen_into(tree.child(id, 1))?;
        out.emit(Instruction::with_operand(OpCode::With, Operand::Block(body)));
        Ok(())
    }

    /// Switches the target clip for the body, then back to the timeline.
    pub(super) fn gen_tell_target(&mut self, id: NodeId, out: &mut ActionSequence) -> Result<()> {
        let tree = self.tree;
        let target = tree.child(id, 0);
        match builtins::literal_str(tree, target) {
            Some(path) => {
                out.emit(Instruction::with_operand(
                    OpCode::SetTarget,
                    Operand::Label(path.to_owned()),
                ));
            }
            None => {
                self.lower(target, out)?;
                out.op(OpCode::SetTarget2);
            }
        }
        self.lower(tree.child(id, 1), out)?;
        out.emit(Instruction::with_operand(
            OpCode::SetTarget,
            Operand::Label(String::new()),
        ));
        Ok(())
    }

    pub(super) fn gen_var(&mut self, id: NodeId, out: &mut ActionSequence) -> Result<()> {
        let tree = self.tree;
        let local = self.ctx.in_function();
        for &declarator in tree.children(id) {
            let init = tree.children(declarator).first().copied();
            match (local, init) {
                (true, Some(init)) => {
                    self.push_str(out, tree.name(declarator));
                    self.lower(init, out)?;
                    out.op(OpCode::DefineLocal);
                }
                (true, None) => {
                    self.push_str(out, tree.name(declarator));
                    out.op(OpCode::DefineLocal2);
                }
                (false, Some(init)) => {
                    self.push_str(out, tree.name(declarator));
                    self.lower(init, out)?;
                    out.op(OpCode::SetVariable);
                }
                (false, None) => {}
            }
        }
        Ok(())
    }

    pub(super) fn gen_function(&mut self, id: NodeId, name: String, out: &mut ActionSequence) -> Result<()> {
        let tree = self.tree;
        let params = tree
            .children(tree.child(id, 0))
            .iter()
            .map(|&param| tree.name(param).to_string())
            .collect();
        let body = self.scoped(JumpScope::Function, |g| g.gen_into(tree.child(id, 1)))?;
        out.emit(Instruction::with_operand(
            OpCode::DefineFunction,
            Operand::Function { name, params, body },
        ));
        Ok(())
    }
}
