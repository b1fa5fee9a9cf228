//! Calls, constructors and built-in functions.

use tracing::warn;

use super::Generator;
use crate::ast::NodeId;
use crate::compiler::builtins::{
    self, CLIP_DEPTH_OFFSET, FSCOMMAND_PREFIX, LEVEL_PREFIX, Navigation, Rule, URL_LOAD_TARGET,
    URL_LOAD_VARIABLES,
};
use crate::compiler::bytecode::{ActionSequence, Instruction, OpCode, Operand, PushValue};
use crate::compiler::context::ARG_LABEL;
use crate::error::Result;

impl Generator<'_> {
    pub(super) fn gen_call(&mut self, id: NodeId, out: &mut ActionSequence) -> Result<()> {
        let tree = self.tree;
        let name = tree.name(id);
        let args = tree.children(id);
        let Some(builtin) = builtins::lookup(name) else {
            return self.gen_call_by_name(name, args, out);
        };

        match builtin.rule {
            Rule::Opcode { op, .. } => {
                for &arg in args {
                    self.lower(arg, out)?;
                }
                out.op(op);
            }
            Rule::Reversed(op) => {
                self.gen_start_drag(id, args, out)?;
                out.op(op);
            }
            Rule::Navigation(nav) => self.gen_navigation(id, nav, args, out)?,
            Rule::ByName => return self.gen_call_by_name(name, args, out),
        }

        // Void built-ins used as a value produce `undefined`.
        if !builtin.yields_value() && !tree.discard(id) {
            out.push(PushValue::Undefined);
        }
        Ok(())
    }

    fn gen_call_by_name(&mut self, name: &str, args: &[NodeId], out: &mut ActionSequence) -> Result<()> {
        for &arg in args.iter().rev() {
            self.lower(arg, out)?;
        }
        out.push(PushValue::Integer(args.len() as i32));
        self.push_str(out, name);
        out.op(OpCode::CallFunction);
        Ok(())
    }

    pub(super) fn gen_method_call(&mut self, id: NodeId, out: &mut ActionSequence) -> Result<()> {
        let tree = self.tree;
        let children = tree.children(id);
        let args = &children[1..];
        for &arg in args.iter().rev() {
            self.lower(arg, out)?;
        }
        out.push(PushValue::Integer(args.len() as i32));
        self.lower(children[0], out)?;
        self.push_str(out, tree.name(id));
        out.op(OpCode::CallMethod);
        Ok(())
    }

    pub(super) fn gen_new(&mut self, id: NodeId, out: &mut ActionSequence) -> Result<()> {
        let tree = self.tree;
        let args = tree.children(id);
        for &arg in args.iter().rev() {
            self.lower(arg, out)?;
        }
        out.push(PushValue::Integer(args.len() as i32));
        self.push_str(out, tree.name(id));
        out.op(OpCode::NewObject);
        Ok(())
    }

    /// `startDrag(target[, lock[, left, top, right, bottom]])`. The VM pops
    /// target, lock and the constrain flag first, so those go on last.
    fn gen_start_drag(&mut self, id: NodeId, args: &[NodeId], out: &mut ActionSequence) -> Result<()> {
        match args.len() {
            6 => {
                for &edge in &args[2..] {
                    self.lower(edge, out)?;
                }
                out.push(PushValue::Integer(1));
            }
            1 => {
                out.push(PushValue::Integer(0));
                out.push(PushValue::Integer(0));
            }
            count => {
                if count > 2 {
                    warn!(
                        line = self.tree.line(id),
                        count, "startDrag needs all four edges, ignoring the constraint"
                    );
                }
                out.push(PushValue::Integer(0));
            }
        }
        let leading = args.len().min(2);
        for &arg in args[..leading].iter().rev() {
            self.lower(arg, out)?;
        }
        Ok(())
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    fn gen_navigation(
        &mut self,
        id: NodeId,
        nav: Navigation,
        args: &[NodeId],
        out: &mut ActionSequence,
    ) -> Result<()> {
        let tree = self.tree;
        match nav {
            Navigation::GetUrl => {
                let method = self.method_bits(id, args.get(2).copied());
                if let Some((url, target)) = builtins::static_url(tree, args) {
                    out.emit(Instruction::with_operand(
                        OpCode::GetUrl,
                        Operand::Url { url, target },
                    ));
                    return Ok(());
                }
                self.lower(args[0], out)?;
                self.gen_target_or_empty(args.get(1).copied(), out)?;
                get_url2(out, method);
            }
            Navigation::LoadMovie | Navigation::LoadVariables => {
                let mut flags = URL_LOAD_TARGET | self.method_bits(id, args.get(2).copied());
                if nav == Navigation::LoadVariables {
                    flags |= URL_LOAD_VARIABLES;
                }
                self.lower(args[0], out)?;
                self.lower(args[1], out)?;
                get_url2(out, flags);
            }
            Navigation::LoadMovieNum | Navigation::LoadVariablesNum => {
                let mut flags = self.method_bits(id, args.get(2).copied());
                if nav == Navigation::LoadVariablesNum {
                    flags |= URL_LOAD_VARIABLES;
                }
                self.lower(args[0], out)?;
                self.gen_level(args[1], out)?;
                get_url2(out, flags);
            }
            Navigation::UnloadMovie => {
                self.push_str(out, "");
                self.lower(args[0], out)?;
                get_url2(out, URL_LOAD_TARGET);
            }
            Navigation::UnloadMovieNum => {
                self.push_str(out, "");
                self.gen_level(args[0], out)?;
                get_url2(out, 0);
            }
            Navigation::FsCommand => {
                if let Some((url, target)) = builtins::static_fscommand(tree, args) {
                    out.emit(Instruction::with_operand(
                        OpCode::GetUrl,
                        Operand::Url { url, target },
                    ));
                    return Ok(());
                }
                match builtins::literal_str(tree, args[0]) {
                    Some(command) => self.push_str(out, command),
                    None => {
                        self.push_str(out, FSCOMMAND_PREFIX);
                        self.lower(args[0], out)?;
                        out.op(OpCode::StringAdd);
                    }
                }
                self.gen_target_or_empty(args.get(1).copied(), out)?;
                get_url2(out, 0);
            }
            Navigation::Goto { play } => self.gen_goto(args[0], play, out)?,
            Navigation::SetTarget => match builtins::literal_str(tree, args[0]) {
                Some(path) => {
                    out.emit(Instruction::with_operand(
                        OpCode::SetTarget,
                        Operand::Label(path.to_owned()),
                    ));
                }
                None => {
                    self.lower(args[0], out)?;
                    out.op(OpCode::SetTarget2);
                }
            },
            Navigation::DuplicateClip => {
                self.lower(args[0], out)?;
                self.lower(args[1], out)?;
                self.lower(args[2], out)?;
                // Literal depths were offset before generation.
                if builtins::literal_int(tree, args[2]).is_none() {
                    out.push(PushValue::Integer(CLIP_DEPTH_OFFSET));
                    out.op(OpCode::Add2);
                }
                out.op(OpCode::CloneSprite);
            }
            Navigation::GetProperty => {
                self.gen_argument(args[0], out)?;
                self.lower(args[1], out)?;
                out.op(OpCode::GetProperty);
            }
            Navigation::SetProperty => {
                self.gen_argument(args[0], out)?;
                self.lower(args[1], out)?;
                self.gen_argument(args[2], out)?;
                out.op(OpCode::SetProperty);
            }
        }
        Ok(())
    }

    fn gen_goto(&mut self, frame: NodeId, play: bool, out: &mut ActionSequence) -> Result<()> {
        let tree = self.tree;
        if let Some(frame) = builtins::literal_frame(tree, frame) {
            out.emit(Instruction::with_operand(OpCode::GotoFrame, Operand::Frame(frame)));
            if play {
                out.op(OpCode::Play);
            }
            return Ok(());
        }

        match builtins::literal_str(tree, frame) {
            Some(label) if self.ctx.version() < 6 => {
                out.emit(Instruction::with_operand(
                    OpCode::GoToLabel,
                    Operand::Label(label.to_owned()),
                ));
                if play {
                    out.op(OpCode::Play);
                }
                return Ok(());
            }
            Some(label) => self.push_str(out, label),
            None => match builtins::literal_int(tree, frame) {
                // Zero-based after reorder; GotoFrame2 counts from one.
                Some(zero_based) => {
                    out.push(PushValue::Integer(zero_based.saturating_add(1)));
                }
                None => self.lower(frame, out)?,
            },
        }
        out.emit(Instruction::with_operand(OpCode::GotoFrame2, Operand::Play(play)));
        Ok(())
    }

    /// Generates a built-in argument that reads properties of the current
    /// clip target.
    fn gen_argument(&mut self, id: NodeId, out: &mut ActionSequence) -> Result<()> {
        self.ctx.enter(ARG_LABEL);
        let result = self.lower(id, out);
        self.ctx.leave();
        result
    }

    fn gen_target_or_empty(&mut self, target: Option<NodeId>, out: &mut ActionSequence) -> Result<()> {
        match target {
            Some(target) => self.lower(target, out),
            None => {
                self.push_str(out, "");
                Ok(())
            }
        }
    }

    /// `"_levelN"` for a literal level, `"_level" + level` otherwise.
    fn gen_level(&mut self, level: NodeId, out: &mut ActionSequence) -> Result<()> {
        if let Some(target) = builtins::level_target(self.tree, level) {
            self.push_str(out, &target);
            return Ok(());
        }
        self.push_str(out, LEVEL_PREFIX);
        self.lower(level, out)?;
        out.op(OpCode::StringAdd);
        Ok(())
    }

    fn method_bits(&self, id: NodeId, method: Option<NodeId>) -> u8 {
        let bits = builtins::method_flag(self.tree, method);
        if method.is_some() && bits == 0 {
            warn!(
                line = self.tree.line(id),
                "ignoring request method, expected \"GET\" or \"POST\""
            );
        }
        bits
    }
}

fn get_url2(out: &mut ActionSequence, flags: u8) {
    out.emit(Instruction::with_operand(OpCode::GetUrl2, Operand::UrlFlags(flags)));
}
