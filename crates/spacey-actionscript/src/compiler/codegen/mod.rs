//! Code generation from the reordered tree to actions.
//!
//! Structured constructs are generated into temporary sequences first so
//! their encoded lengths are known before the branches around them are
//! emitted. `break`/`continue` are emitted as placeholders and replaced
//! with jumps once the enclosing loop or switch has been measured.

mod calls;
mod expressions;
mod statements;


use tracing::debug;

use crate::ast::{NodeId, NodeKind, Tree};
use crate::compiler::builtins;
use crate::compiler::bytecode::{ActionSequence, BRANCH_LEN, Instruction, OpCode, Operand, PushValue};
use crate::compiler::context::{CompilationContext, context_label};
use crate::compiler::{ActionBlock, EventTrigger};
use crate::config::CompileOptions;
use crate::error::{CompileError, Result};

/// Register used to keep an assigned value on the stack, and by `for-in`.
const SCRATCH_REGISTER: u8 = 0;

/// Enclosing constructs that `break`/`continue` care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JumpScope {
    Loop,
    Switch,
    Function,
}

/// Lowers a tree to action blocks.
pub struct Generator<'a> {
    tree: &'a Tree,
    ctx: &'a mut CompilationContext,
    scopes: Vec<JumpScope>,
}

impl<'a> Generator<'a> {
    /// Creates a generator over a reordered, validated tree whose strings
    /// have been collected into `ctx`.
    pub fn new(tree: &'a Tree, ctx: &'a mut CompilationContext) -> Self {
        Self {
            tree,
            ctx,
            scopes: Vec::new(),
        }
    }

    /// Generates one block per event handler, or a single block for a
    /// frame script.
    pub fn generate(&mut self) -> Result<Vec<ActionBlock>> {
        let tree = self.tree;
        let root = tree.root();

        let blocks = match tree.kind(root) {
            NodeKind::ButtonScript | NodeKind::ClipScript => {
                self.ctx.enter(context_label(tree, root));
                let result = tree
                    .children(root)
                    .iter()
                    .map(|&handler| {
                        let flags = tree.payload(handler).as_int().unwrap_or(0) as u32;
                        let trigger = match tree.kind(handler) {
                            NodeKind::ButtonEvent => EventTrigger::Button(flags),
                            _ => EventTrigger::Clip(flags),
                        };
                        self.block(Some(trigger), handler)
                    })
                    .collect::<Result<Vec<_>>>();
                self.ctx.leave();
                result?
            }
            _ => vec![self.block(None, root)?],
        };

        debug!(blocks = blocks.len(), "generation finished");
        Ok(blocks)
    }

    fn block(&mut self, event: Option<EventTrigger>, id: NodeId) -> Result<ActionBlock> {
        let mut actions = ActionSequence::new();
        if let Some(pool) = self.ctx.pool.to_instruction() {
            actions.emit(pool);
        }
        self.lower(id, &mut actions)?;
        Ok(ActionBlock { event, actions })
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Generates `id` into `out`, popping its value if it is discarded.
    fn lower(&mut self, id: NodeId, out: &mut ActionSequence) -> Result<()> {
        self.ctx.enter(context_label(self.tree, id));
        let result = self.gen_node(id, out);
        self.ctx.leave();
        result?;

        if self.tree.discard(id) && self.yields_value(id) {
            out.op(OpCode::Pop);
        }
        Ok(())
    }

    /// Generates `id` into a fresh sequence.
    fn gen_into(&mut self, id: NodeId) -> Result<ActionSequence> {
        let mut seq = ActionSequence::new();
        self.lower(id, &mut seq)?;
        Ok(seq)
    }

    fn gen_node(&mut self, id: NodeId, out: &mut ActionSequence) -> Result<()> {
        let tree = self.tree;
        match tree.kind(id) {
            NodeKind::Script
            | NodeKind::ButtonScript
            | NodeKind::ClipScript
            | NodeKind::ButtonEvent
            | NodeKind::ClipEvent
            | NodeKind::StatementList => {
                for &child in tree.children(id) {
                    self.lower(child, out)?;
                }
                Ok(())
            }
            NodeKind::Case | NodeKind::DefaultCase => match tree.children(id).last() {
                Some(&body) => self.lower(body, out),
                None => Ok(()),
            },
            NodeKind::Empty | NodeKind::ParamList | NodeKind::VarDeclarator => Ok(()),

            NodeKind::If => self.gen_if(id, out),
            NodeKind::While => self.gen_while(id, out),
            NodeKind::DoWhile => self.gen_do_while(id, out),
            NodeKind::For => self.gen_for(id, out),
            NodeKind::ForIn => self.gen_for_in(id, out),
            NodeKind::Switch => self.gen_switch(id, out),
            NodeKind::Break => {
                out.op(OpCode::Break);
                Ok(())
            }
            NodeKind::Continue => {
                self.gen_continue(out);
                Ok(())
            }
            NodeKind::Return => self.gen_return(id, out),
            NodeKind::With => self.gen_with(id, out),
            NodeKind::TellTarget => self.gen_tell_target(id, out),
            NodeKind::Var => self.gen_var(id, out),
            NodeKind::FunctionDef => self.gen_function(id, tree.name(id).to_string(), out),
            NodeKind::FunctionExpr => self.gen_function(id, String::new(), out),

            NodeKind::Identifier => self.gen_identifier(tree.name(id), out),
            NodeKind::IntegerLiteral
            | NodeKind::DoubleLiteral
            | NodeKind::StringLiteral
            | NodeKind::BooleanLiteral
            | NodeKind::NullLiteral
            | NodeKind::UndefinedLiteral => {
                self.gen_literal(id, out);
                Ok(())
            }
            NodeKind::ArrayLiteral => self.gen_array(id, out),
            NodeKind::ObjectLiteral => self.gen_object(id, out),
            NodeKind::ObjectProperty => {
                self.push_str(out, tree.name(id));
                self.lower(tree.child(id, 0), out)
            }
            NodeKind::Attribute => {
                self.lower(tree.child(id, 0), out)?;
                self.push_str(out, tree.name(id));
                out.op(OpCode::GetMember);
                Ok(())
            }
            NodeKind::Index => {
                self.lower(tree.child(id, 0), out)?;
                self.lower(tree.child(id, 1), out)?;
                out.op(OpCode::GetMember);
                Ok(())
            }
            NodeKind::Call => self.gen_call(id, out),
            NodeKind::MethodCall => self.gen_method_call(id, out),
            NodeKind::New => self.gen_new(id, out),
            NodeKind::Delete => self.gen_delete(id, out),
            NodeKind::Conditional => self.gen_conditional(id, out),
            kind if kind.is_assignment() => self.gen_assignment(id, kind, out),
            kind if kind.is_binary_operator() => self.gen_binary(id, kind, out),
            kind => self.gen_unary(id, kind, out),
        }
    }

    /// Whether the node leaves a value on the stack.
    fn yields_value(&self, id: NodeId) -> bool {
        use NodeKind::*;

        let kind = self.tree.kind(id);
        match kind {
            Call => builtins::lookup(self.tree.name(id)).is_none_or(|b| b.yields_value()),
            Identifier | ArrayLiteral | ObjectLiteral | Attribute | Index | MethodCall | New
            | Delete | Conditional | FunctionExpr => true,
            _ => kind.is_literal() || kind.is_binary_operator() || kind.is_unary_operator(),
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn options(&self) -> &CompileOptions {
        &self.ctx.options
    }

    /// Pushes a string, through the constant pool when it holds it.
    fn push_str(&self, out: &mut ActionSequence, s: &str) {
        let value = match self.ctx.pool.index_of(s) {
            Some(index) => match u8::try_from(index) {
                Ok(index) => PushValue::Constant8(index),
                Err(_) => PushValue::Constant16(index as u16),
            },
            None => PushValue::Str(s.to_owned()),
        };
        out.push(value);
    }

    fn store_register(out: &mut ActionSequence, register: u8) {
        out.emit(Instruction::with_operand(
            OpCode::StoreRegister,
            Operand::Register(register),
        ));
    }

    /// Encoded length of a sequence as a signed offset term.
    fn measure(&self, seq: &ActionSequence) -> Result<isize> {
        Ok(seq.encoded_len(self.options())? as isize)
    }

    /// Runs `f` with `scope` pushed on the jump-scope stack.
    fn scoped<T>(&mut self, scope: JumpScope, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.scopes.push(scope);
        let result = f(self);
        self.scopes.pop();
        result
    }

    /// Whether the target VM understands `op`.
    fn supports(&self, op: OpCode) -> bool {
        self.ctx.version() >= op.min_version()
    }

    fn unsupported(&self, id: NodeId, construct: &'static str) -> CompileError {
        CompileError::Unsupported {
            construct,
            version: self.ctx.version(),
            line: self.tree.line(id),
        }
    }
}

/// Checks that a branch offset fits the 16-bit field.
pub(crate) fn branch_offset(offset: isize) -> Result<i16> {
    i16::try_from(offset).map_err(|_| CompileError::BranchOutOfRange { offset })
}

/// Replaces `break`/`continue` placeholders whose targets are given.
///
/// Targets are byte positions relative to the start of `seq`. Placeholders
/// inside `with` bodies are resolved too; function bodies are left alone.
/// Returns how many breaks were resolved.
pub(crate) fn resolve_placeholders(
    seq: &mut ActionSequence,
    options: &CompileOptions,
    break_target: Option<isize>,
    continue_target: Option<isize>,
) -> Result<usize> {
    let mut position = 0;
    resolve_from(seq, options, &mut position, break_target, continue_target)
}

fn resolve_from(
    seq: &mut ActionSequence,
    options: &CompileOptions,
    position: &mut isize,
    break_target: Option<isize>,
    continue_target: Option<isize>,
) -> Result<usize> {
    let mut breaks = 0;
    for instruction in &mut seq.instructions {
        let len = instruction.encoded_len(options)? as isize;
        let target = match instruction.opcode {
            OpCode::Break => break_target,
            OpCode::Continue => continue_target,
            _ => None,
        };

        if let Some(target) = target {
            breaks += usize::from(instruction.opcode == OpCode::Break);
            let offset = branch_offset(target - (*position + BRANCH_LEN as isize))?;
            *instruction = Instruction::jump(offset);
        } else if let Some(Operand::Block(body)) = &mut instruction.operand {
            // Record header plus the body size field
            let mut inner = *position + 5;
            breaks += resolve_from(body, options, &mut inner, break_target, continue_target)?;
        }
        *position += len;
    }
    Ok(breaks)
}
