// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-actionscript
//!
//! Lowers ActionScript 1.0 syntax trees to action sequences for the
//! stack-based Flash Player VM (versions 5 and 6).
//!
//! ## Overview
//!
//! Compilation runs four passes over a parsed [`Tree`]:
//! - reorder: named constants, function hoisting, built-in argument
//!   rewrites, discard marking and constant folding
//! - validation: misplaced `break`/`continue`/`return`, malformed event
//!   handler lists, built-in argument counts
//! - string collection: builds the constant pool
//! - generation: emits actions with all branch offsets resolved
//!
//! ## Quick Start
//!
//! ```rust
//! use spacey_actionscript::{CompileOptions, Tree, compile};
//!
//! let mut tree = Tree::script();
//! let x = tree.ident("x");
//! let two = tree.int(2);
//! let three = tree.int(3);
//! let sum = tree.binary(spacey_actionscript::NodeKind::Add, two, three);
//! let assign = tree.assign(x, sum);
//! tree.push_statements([assign]);
//!
//! let script = compile(&mut tree, &CompileOptions::default()).unwrap();
//! let bytes = script.encode().unwrap();
//! assert_eq!(bytes.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod compiler;
pub mod config;
pub mod error;

use tracing::{debug, instrument};

pub use ast::{NodeId, NodeKind, Payload, Tree};
pub use compiler::{ActionBlock, ActionSequence, EventTrigger, Instruction, OpCode};
pub use config::{CompileOptions, StringEncoding};
pub use error::{CompileError, Result, ValidationErrorKind};

use compiler::{CompilationContext, Generator, reorder, strings, validate};

/// End-of-actions marker closing every encoded block.
pub const ACTION_END: u8 = 0x00;

/// Output of a compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledScript {
    /// One block per event handler, or one block for a frame script
    pub blocks: Vec<ActionBlock>,
    /// Options the script was compiled with
    pub options: CompileOptions,
}

impl CompiledScript {
    /// Encodes every block, each terminated by [`ACTION_END`].
    pub fn encode(&self) -> Result<Vec<Vec<u8>>> {
        let encoded = self
            .blocks
            .iter()
            .map(|block| {
                let mut bytes = block.actions.to_bytes(&self.options)?;
                bytes.push(ACTION_END);
                Ok(bytes)
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(
            blocks = encoded.len(),
            bytes = encoded.iter().map(Vec::len).sum::<usize>(),
            "encoded script"
        );
        Ok(encoded)
    }
}

/// Compiles scripts one after another with the same options.
///
/// State is reset before every script, so nothing leaks between them.
#[derive(Debug)]
pub struct Compiler {
    ctx: CompilationContext,
}

impl Compiler {
    /// Creates a compiler, rejecting unsupported options up front.
    pub fn new(options: CompileOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            ctx: CompilationContext::new(options),
        })
    }

    /// Lowers one tree. The tree is rewritten in place by the reorder pass.
    #[instrument(skip(self, tree), fields(version = self.ctx.version()))]
    pub fn compile(&mut self, tree: &mut Tree) -> Result<CompiledScript> {
        self.ctx.reset();
        reorder::reorder(tree, &mut self.ctx);
        validate::validate(tree)?;
        strings::collect_strings(tree, &mut self.ctx);
        let blocks = Generator::new(tree, &mut self.ctx).generate()?;
        Ok(CompiledScript {
            blocks,
            options: self.ctx.options.clone(),
        })
    }
}

/// Lowers a tree with the given options.
pub fn compile(tree: &mut Tree, options: &CompileOptions) -> Result<CompiledScript> {
    Compiler::new(options.clone())?.compile(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_checked_before_lowering() {
        let mut tree = Tree::script();
        let bogus = tree.break_stmt();
        tree.push_statements([bogus]);
        let err = compile(&mut tree, &CompileOptions::for_version(4)).unwrap_err();
        assert_eq!(err, CompileError::UnsupportedVersion(4));
    }

    #[test]
    fn test_encoded_block_is_terminated() {
        let mut tree = Tree::script();
        let stop = tree.call("stop", []);
        tree.push_statements([stop]);
        let script = compile(&mut tree, &CompileOptions::default()).unwrap();
        assert_eq!(script.encode().unwrap(), vec![vec![0x07, ACTION_END]]);
    }

    #[test]
    fn test_compiler_resets_between_scripts() {
        let mut compiler = Compiler::new(CompileOptions::default()).unwrap();

        let mut first = Tree::script();
        let a = first.ident("shared");
        let b = first.ident("shared");
        first.push_statements([a, b]);
        let script = compiler.compile(&mut first).unwrap();
        assert_eq!(script.blocks[0].actions.instructions[0].opcode, OpCode::ConstantPool);

        let mut second = Tree::script();
        let c = second.ident("shared");
        second.push_statements([c]);
        let script = compiler.compile(&mut second).unwrap();
        assert_ne!(script.blocks[0].actions.instructions[0].opcode, OpCode::ConstantPool);
    }
}
