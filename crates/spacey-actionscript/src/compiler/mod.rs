//! Lowering passes from syntax tree to actions.
//!
//! # Module Structure
//!
//! - `bytecode`: Action definitions and encoded lengths
//! - `encode`: Byte encoding of actions
//! - `builtins`: Built-in function, constant and property tables
//! - `context`: Per-compilation state (constant pool, lexical labels)
//! - `reorder`: Constant substitution, hoisting, discard marking
//!   - `fold`: Constant folding
//! - `validate`: Structural checks
//! - `strings`: Constant pool collection
//! - `codegen`: Action generation

pub mod builtins;
pub mod bytecode;
pub mod codegen;
pub mod context;
mod encode;
pub mod fold;
pub mod reorder;
pub mod strings;
pub mod validate;

pub use bytecode::{ActionSequence, Instruction, OpCode, Operand, PushValue};
pub use codegen::Generator;
pub use context::{CompilationContext, StringPool};

/// Event that runs a block of actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTrigger {
    /// Button `on (...)` handler with its event flags
    Button(u32),
    /// Clip `onClipEvent (...)` handler with its event flags
    Clip(u32),
}

/// Actions of one frame script or event handler.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionBlock {
    /// Trigger, `None` for frame scripts
    pub event: Option<EventTrigger>,
    /// The actions, starting with the constant pool when one is emitted
    pub actions: ActionSequence,
}
