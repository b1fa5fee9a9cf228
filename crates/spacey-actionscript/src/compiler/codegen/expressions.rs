//! Expression lowering: literals, names, operators and assignment.

use super::{Generator, SCRATCH_REGISTER};
use crate::ast::{NodeId, NodeKind, Payload};
use crate::compiler::builtins;
use crate::compiler::bytecode::{ActionSequence, BRANCH_LEN, Instruction, OpCode, PushValue};
use crate::compiler::codegen::branch_offset;
use crate::compiler::context::PropertyMode;
use crate::error::{CompileError, Result};

/// Registers holding the operands of a version 5 strict comparison.
const STRICT_LEFT: u8 = 1;
const STRICT_RIGHT: u8 = 2;

impl Generator<'_> {
    pub(super) fn gen_literal(&self, id: NodeId, out: &mut ActionSequence) {
        let value = match (self.tree.kind(id), self.tree.payload(id)) {
            (NodeKind::StringLiteral, Payload::Str(s)) => {
                self.push_str(out, s);
                return;
            }
            (_, Payload::Int(n)) => PushValue::Integer(*n),
            (_, Payload::Double(d)) => PushValue::Double(*d),
            (_, Payload::Bool(b)) => PushValue::Bool(*b),
            (NodeKind::NullLiteral, _) => PushValue::Null,
            _ => PushValue::Undefined,
        };
        out.push(value);
    }

    pub(super) fn gen_identifier(&mut self, name: &str, out: &mut ActionSequence) -> Result<()> {
        let Some(code) = builtins::property_code(name) else {
            self.push_str(out, name);
            out.op(OpCode::GetVariable);
            return Ok(());
        };

        match self.ctx.property_mode() {
            PropertyMode::With => {
                self.push_str(out, name);
                out.op(OpCode::GetVariable);
            }
            PropertyMode::Object => {
                self.push_str(out, "this");
                out.op(OpCode::GetVariable);
                self.push_str(out, name);
                out.op(OpCode::GetMember);
            }
            PropertyMode::PropertyCall => {
                out.push(PushValue::Integer(code));
            }
            PropertyMode::Default => {
                self.push_str(out, "");
                out.push(PushValue::Integer(code));
                out.op(OpCode::GetProperty);
            }
        }
        Ok(())
    }

    pub(super) fn gen_array(&mut self, id: NodeId, out: &mut ActionSequence) -> Result<()> {
        let elements = self.tree.children(id);
        for &element in elements.iter().rev() {
            self.lower(element, out)?;
        }
        out.push(PushValue::Integer(elements.len() as i32));
        out.op(OpCode::InitArray);
        Ok(())
    }

    pub(super) fn gen_object(&mut self, id: NodeId, out: &mut ActionSequence) -> Result<()> {
        let properties = self.tree.children(id);
        for &property in properties {
            self.lower(property, out)?;
        }
        out.push(PushValue::Integer(properties.len() as i32));
        out.op(OpCode::InitObject);
        Ok(())
    }

    pub(super) fn gen_delete(&mut self, id: NodeId, out: &mut ActionSequence) -> Result<()> {
        let tree = self.tree;
        let target = tree.child(id, 0);
        match tree.kind(target) {
            NodeKind::Identifier => {
                self.push_str(out, tree.name(target));
                out.op(OpCode::Delete2);
            }
            NodeKind::Attribute => {
                self.lower(tree.child(target, 0), out)?;
                self.push_str(out, tree.name(target));
                out.op(OpCode::Delete);
            }
            NodeKind::Index => {
                self.lower(tree.child(target, 0), out)?;
                self.lower(tree.child(target, 1), out)?;
                out.op(OpCode::Delete);
            }
            _ => {
                self.lower(target, out)?;
                out.op(OpCode::Pop);
                out.push(PushValue::Bool(true));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Operators
    // ========================================================================

    pub(super) fn gen_unary(&mut self, id: NodeId, kind: NodeKind, out: &mut ActionSequence) -> Result<()> {
        let operand = self.tree.child(id, 0);
        match kind {
            NodeKind::Not => {
                self.lower(operand, out)?;
                out.op(OpCode::Not);
            }
            NodeKind::BitNot => {
                self.lower(operand, out)?;
                out.push(PushValue::Integer(-1));
                out.op(OpCode::BitXor);
            }
            _ => {
                out.push(PushValue::Integer(0));
                self.lower(operand, out)?;
                out.op(OpCode::Subtract);
            }
        }
        Ok(())
    }

    pub(super) fn gen_binary(&mut self, id: NodeId, kind: NodeKind, out: &mut ActionSequence) -> Result<()> {
        let (left, right) = (self.tree.child(id, 0), self.tree.child(id, 1));
        let strict = self.supports(OpCode::StrictEquals);
        let greater = self.supports(OpCode::Greater);

        match kind {
            NodeKind::LogicalAnd | NodeKind::LogicalOr => {
                return self.gen_logical(kind == NodeKind::LogicalAnd, left, right, out);
            }
            NodeKind::StrictEqual | NodeKind::StrictNotEqual if !strict => {
                return self.gen_strict_equality(kind == NodeKind::StrictNotEqual, left, right, out);
            }
            NodeKind::InstanceOf if !self.supports(OpCode::InstanceOf) => return Err(self.unsupported(id, "instanceof")),
            _ => {}
        }

        self.lower(left, out)?;
        self.lower(right, out)?;

        use OpCode::*;
        let ops: &[OpCode] = match kind {
            NodeKind::Add => &[Add2],
            NodeKind::Sub => &[Subtract],
            NodeKind::Mul => &[Multiply],
            NodeKind::Div => &[Divide],
            NodeKind::Mod => &[Modulo],
            NodeKind::BitAnd => &[BitAnd],
            NodeKind::BitOr => &[BitOr],
            NodeKind::BitXor => &[BitXor],
            NodeKind::Shl => &[BitLShift],
            NodeKind::Shr => &[BitRShift],
            NodeKind::UShr => &[BitURShift],
            NodeKind::Equal => &[Equals2],
            NodeKind::NotEqual => &[Equals2, Not],
            NodeKind::StrictEqual => &[StrictEquals],
            NodeKind::StrictNotEqual => &[StrictEquals, Not],
            NodeKind::Less => &[Less2],
            NodeKind::GreaterEqual => &[Less2, Not],
            NodeKind::Greater if greater => &[Greater],
            NodeKind::Greater => &[StackSwap, Less2],
            NodeKind::LessEqual if greater => &[Greater, Not],
            NodeKind::LessEqual => &[StackSwap, Less2, Not],
            _ => &[InstanceOf],
        };
        for &op in ops {
            out.op(op);
        }
        Ok(())
    }

    /// `l; dup; [not;] if skip; pop; r`. The left value stays when it
    /// decides the result.
    fn gen_logical(&mut self, and: bool, left: NodeId, right: NodeId, out: &mut ActionSequence) -> Result<()> {
        self.lower(left, out)?;
        let rhs = self.gen_into(right)?;
        let skip = 1 + self.measure(&rhs)?;

        out.op(OpCode::PushDuplicate);
        if and {
            out.op(OpCode::Not);
        }
        out.emit(Instruction::branch_if(branch_offset(skip)?));
        out.op(OpCode::Pop);
        out.append(rhs);
        Ok(())
    }

    /// Version 5 has no strict equality: compare values, then compare
    /// `typeof` of both operands, and combine.
    fn gen_strict_equality(&mut self, negate: bool, left: NodeId, right: NodeId, out: &mut ActionSequence) -> Result<()> {
        self.lower(left, out)?;
        self.lower(right, out)?;
        Self::store_register(out, STRICT_RIGHT);
        out.op(OpCode::Pop);
        Self::store_register(out, STRICT_LEFT);
        out.op(OpCode::Pop);

        out.push(PushValue::Register(STRICT_LEFT));
        out.push(PushValue::Register(STRICT_RIGHT));
        out.op(OpCode::Equals2);
        out.push(PushValue::Register(STRICT_LEFT));
        out.op(OpCode::TypeOf);
        out.push(PushValue::Register(STRICT_RIGHT));
        out.op(OpCode::TypeOf);
        out.op(OpCode::Equals2);
        out.op(OpCode::And);
        if negate {
            out.op(OpCode::Not);
        }
        Ok(())
    }

    /// `c; if +else; else; jump +then; then`
    pub(super) fn gen_conditional(&mut self, id: NodeId, out: &mut ActionSequence) -> Result<()> {
        let tree = self.tree;
        self.lower(tree.child(id, 0), out)?;
        let otherwise = self.gen_into(tree.child(id, 2))?;
        let then = self.gen_into(tree.child(id, 1))?;

        let else_len = self.measure(&otherwise)? + BRANCH_LEN as isize;
        out.emit(Instruction::branch_if(branch_offset(else_len)?));
        out.append(otherwise);
        out.emit(Instruction::jump(branch_offset(self.measure(&then)?)?));
        out.append(then);
        Ok(())
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    pub(super) fn gen_assignment(&mut self, id: NodeId, kind: NodeKind, out: &mut ActionSequence) -> Result<()> {
        let tree = self.tree;
        let target = tree.child(id, 0);
        let used = !tree.discard(id);

        // Generate the target as a read, then trade its getter for a setter.
        self.lower(target, out)?;
        let setter = match out.pop().map(|getter| getter.opcode) {
            Some(OpCode::GetVariable) => OpCode::SetVariable,
            Some(OpCode::GetMember) => OpCode::SetMember,
            Some(OpCode::GetProperty) => OpCode::SetProperty,
            _ => {
                return Err(CompileError::InvalidAssignmentTarget {
                    line: tree.line(id),
                });
            }
        };

        match kind {
            NodeKind::Assign => {
                self.lower(tree.child(id, 1), out)?;
            }
            NodeKind::PreIncrement
            | NodeKind::PreDecrement
            | NodeKind::PostIncrement
            | NodeKind::PostDecrement => {
                let post = matches!(kind, NodeKind::PostIncrement | NodeKind::PostDecrement);
                let step = if matches!(kind, NodeKind::PreIncrement | NodeKind::PostIncrement) {
                    OpCode::Increment
                } else {
                    OpCode::Decrement
                };
                self.lower(target, out)?;
                if post && used {
                    Self::store_register(out, SCRATCH_REGISTER);
                }
                out.op(step);
                if !post && used {
                    Self::store_register(out, SCRATCH_REGISTER);
                }
                out.op(setter);
                if used {
                    out.push(PushValue::Register(SCRATCH_REGISTER));
                }
                return Ok(());
            }
            compound => {
                self.lower(target, out)?;
                self.lower(tree.child(id, 1), out)?;
                out.op(compound_operator(compound));
            }
        }

        if used {
            Self::store_register(out, SCRATCH_REGISTER);
        }
        out.op(setter);
        if used {
            out.push(PushValue::Register(SCRATCH_REGISTER));
        }
        Ok(())
    }
}

fn compound_operator(kind: NodeKind) -> OpCode {
    match kind {
        NodeKind::AddAssign => OpCode::Add2,
        NodeKind::SubAssign => OpCode::Subtract,
        NodeKind::MulAssign => OpCode::Multiply,
        NodeKind::DivAssign => OpCode::Divide,
        NodeKind::ModAssign => OpCode::Modulo,
        NodeKind::BitAndAssign => OpCode::BitAnd,
        NodeKind::BitOrAssign => OpCode::BitOr,
        NodeKind::BitXorAssign => OpCode::BitXor,
        NodeKind::ShlAssign => OpCode::BitLShift,
        NodeKind::ShrAssign => OpCode::BitRShift,
        _ => OpCode::BitURShift,
    }
}
