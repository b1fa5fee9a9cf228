//! Per-compilation state shared by every pass.

use std::borrow::Cow;

use rustc_hash::FxHashMap;

use crate::ast::{NodeId, NodeKind, Tree};
use crate::compiler::bytecode::{Instruction, OpCode, Operand};
use crate::config::CompileOptions;

/// Most strings the constant pool can hold.
pub const POOL_CAPACITY: usize = 256;

/// Label pushed around built-in arguments that read clip properties of the
/// current target.
pub const ARG_LABEL: &str = "<arg>";

/// Lexical-context label for a node: the lower-cased callee for calls, the
/// kind's display name otherwise.
pub fn context_label(tree: &Tree, id: NodeId) -> Cow<'static, str> {
    match tree.kind(id) {
        NodeKind::Call => Cow::Owned(tree.name(id).to_ascii_lowercase()),
        kind => Cow::Borrowed(kind.display_name()),
    }
}

/// De-duplicated string table referenced by `Push` instead of inline text.
#[derive(Debug, Clone, Default)]
pub struct StringPool {
    strings: Vec<String>,
    slots: FxHashMap<String, usize>,
    must_emit: bool,
}

impl StringPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a use of `s`.
    ///
    /// A second use of a pooled string marks the pool for emission. New
    /// strings are dropped once the pool is full.
    pub fn intern(&mut self, s: &str) {
        if self.slots.contains_key(s) {
            self.must_emit = true;
            return;
        }
        if self.strings.len() >= POOL_CAPACITY {
            return;
        }
        self.slots.insert(s.to_owned(), self.strings.len());
        self.strings.push(s.to_owned());
    }

    /// Pool slot to push for `s`, if the pool is emitted and holds it.
    pub fn index_of(&self, s: &str) -> Option<usize> {
        if !self.must_emit {
            return None;
        }
        self.slots.get(s).copied()
    }

    /// Whether any string was referenced twice.
    pub fn must_emit(&self) -> bool {
        self.must_emit
    }

    /// Pooled strings in slot order.
    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// Number of pooled strings.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// True when nothing was interned.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// The `ConstantPool` action, when the pool is emitted.
    pub fn to_instruction(&self) -> Option<Instruction> {
        self.must_emit.then(|| {
            Instruction::with_operand(OpCode::ConstantPool, Operand::Pool(self.strings.clone()))
        })
    }

    fn clear(&mut self) {
        self.strings.clear();
        self.slots.clear();
        self.must_emit = false;
    }
}

/// How an identifier naming a clip property is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyMode {
    /// Property of the current target: `push ""; push code; GetProperty`
    Default,
    /// Inside `with`: plain variable lookup by name
    With,
    /// Inside an object literal: member of `this`
    Object,
    /// Property argument of `getProperty`/`setProperty`: the bare code
    PropertyCall,
}

/// Mutable state threaded through reorder, collection and generation.
#[derive(Debug)]
pub struct CompilationContext {
    /// Target version and string encoding
    pub options: CompileOptions,
    /// The constant pool
    pub pool: StringPool,
    hoist_targets: Vec<NodeId>,
    labels: Vec<Cow<'static, str>>,
}

impl CompilationContext {
    /// Creates a context for already validated options.
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            pool: StringPool::new(),
            hoist_targets: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Target VM version.
    pub fn version(&self) -> u8 {
        self.options.version
    }

    /// Clears everything but the options.
    pub fn reset(&mut self) {
        self.pool.clear();
        self.hoist_targets.clear();
        self.labels.clear();
    }

    // ========================================================================
    // Hoist targets
    // ========================================================================

    /// Make `target` the receiver of hoisted definitions.
    pub fn push_hoist_target(&mut self, target: NodeId) {
        self.hoist_targets.push(target);
    }

    /// Leave the innermost hoist target.
    pub fn pop_hoist_target(&mut self) -> Option<NodeId> {
        self.hoist_targets.pop()
    }

    /// Innermost hoist target.
    pub fn hoist_target(&self) -> Option<NodeId> {
        self.hoist_targets.last().copied()
    }

    // ========================================================================
    // Lexical context
    // ========================================================================

    /// Push a label for the construct being entered.
    pub fn enter(&mut self, label: impl Into<Cow<'static, str>>) {
        self.labels.push(label.into());
    }

    /// Pop the innermost label.
    pub fn leave(&mut self) {
        self.labels.pop();
    }

    /// Labels from outermost to innermost.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(|label| label.as_ref())
    }

    /// Whether code is being produced inside a function body.
    pub fn in_function(&self) -> bool {
        self.labels().any(|label| label == "function")
    }

    /// Decide how a property identifier is read from the innermost
    /// relevant label.
    pub fn property_mode(&self) -> PropertyMode {
        for label in self.labels.iter().rev() {
            match label.as_ref() {
                "with" => return PropertyMode::With,
                "{}" => return PropertyMode::Object,
                "getproperty" | "setproperty" => return PropertyMode::PropertyCall,
                "function" | ARG_LABEL => return PropertyMode::Default,
                _ => {}
            }
        }
        PropertyMode::Default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_use_marks_pool() {
        let mut pool = StringPool::new();
        pool.intern("a");
        assert!(!pool.must_emit());
        assert_eq!(pool.index_of("a"), None);
        pool.intern("a");
        assert!(pool.must_emit());
        assert_eq!(pool.index_of("a"), Some(0));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_pool_cap() {
        let mut pool = StringPool::new();
        for i in 0..300 {
            pool.intern(&format!("s{i}"));
        }
        assert_eq!(pool.len(), POOL_CAPACITY);
        pool.intern("s299");
        assert!(!pool.must_emit());
        pool.intern("s0");
        assert_eq!(pool.index_of("s255"), Some(255));
        assert_eq!(pool.index_of("s256"), None);
    }

    #[test]
    fn test_pool_instruction_only_when_emitted() {
        let mut pool = StringPool::new();
        pool.intern("x");
        assert!(pool.to_instruction().is_none());
        pool.intern("x");
        let instruction = pool.to_instruction().unwrap();
        assert_eq!(instruction.opcode, OpCode::ConstantPool);
        assert_eq!(instruction.operand, Some(Operand::Pool(vec!["x".into()])));
    }

    #[test]
    fn test_property_mode_innermost_wins() {
        let mut ctx = CompilationContext::new(CompileOptions::default());
        assert_eq!(ctx.property_mode(), PropertyMode::Default);
        ctx.enter("with");
        ctx.enter("block");
        assert_eq!(ctx.property_mode(), PropertyMode::With);
        ctx.enter("{}");
        assert_eq!(ctx.property_mode(), PropertyMode::Object);
        ctx.enter(String::from("getproperty"));
        assert_eq!(ctx.property_mode(), PropertyMode::PropertyCall);
        ctx.enter(ARG_LABEL);
        assert_eq!(ctx.property_mode(), PropertyMode::Default);
        ctx.leave();
        ctx.leave();
        ctx.leave();
        ctx.enter("function");
        assert_eq!(ctx.property_mode(), PropertyMode::Default);
        assert!(ctx.in_function());
    }

    #[test]
    fn test_call_labels_are_lower_cased() {
        let mut tree = Tree::script();
        let call = tree.call("getProperty", []);
        let body = tree.block([]);
        let with = tree.with(call, body);
        assert_eq!(context_label(&tree, call), "getproperty");
        assert_eq!(context_label(&tree, with), "with");
    }

    #[test]
    fn test_reset_clears_state() {
        let mut ctx = CompilationContext::new(CompileOptions::for_version(5));
        ctx.pool.intern("a");
        ctx.enter("with");
        ctx.push_hoist_target(crate::ast::Tree::script().root());
        ctx.reset();
        assert!(ctx.pool.is_empty());
        assert_eq!(ctx.labels().count(), 0);
        assert_eq!(ctx.hoist_target(), None);
        assert_eq!(ctx.version(), 5);
    }
}
