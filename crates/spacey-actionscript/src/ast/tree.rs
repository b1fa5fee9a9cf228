//! Arena-backed syntax tree.
//!
//! All nodes live in one `Vec` owned by the [`Tree`]. Ownership is still a
//! tree: a node appears in at most one child list, and detaching it clears
//! its parent link. Detached nodes stay in the arena but are unreachable.
//!
//! Child indices outside `[0, count)` are caller bugs and panic.

use super::{NodeKind, Payload};

/// Handle to a node in a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Arena slot of this node.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A single syntax node.
#[derive(Debug, Clone)]
pub struct Node {
    /// Node kind
    pub kind: NodeKind,
    /// Payload (shape depends on kind)
    pub payload: Payload,
    /// Value is unused and must be popped
    pub discard: bool,
    /// Where the next hoisted definition goes (hoist targets only)
    pub insertion_index: usize,
    /// Source line, for diagnostics
    pub line: u32,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl Node {
    /// Owned children in order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Non-owning parent link.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

/// A syntax tree with a single root container.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
    line: u32,
}

impl Tree {
    /// Creates a tree whose root is a container of the given kind.
    pub fn new(root_kind: NodeKind) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            line: 1,
        };
        tree.root = tree.add_node(root_kind, Payload::None);
        tree
    }

    /// Creates a frame script tree.
    pub fn script() -> Self {
        Self::new(NodeKind::Script)
    }

    /// The root container.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Line number stamped on nodes created from now on.
    pub fn set_line(&mut self, line: u32) -> &mut Self {
        self.line = line;
        self
    }

    /// Borrow a node.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Mutably borrow a node.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Kind of a node.
    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind
    }

    /// Payload of a node.
    pub fn payload(&self, id: NodeId) -> &Payload {
        &self.node(id).payload
    }

    /// String payload, or `""` for kinds without one.
    pub fn name(&self, id: NodeId) -> &str {
        self.payload(id).as_str().unwrap_or("")
    }

    /// Source line of a node.
    pub fn line(&self, id: NodeId) -> u32 {
        self.node(id).line
    }

    /// Discard flag of a node.
    pub fn discard(&self, id: NodeId) -> bool {
        self.node(id).discard
    }

    /// Set the discard flag.
    pub fn set_discard(&mut self, id: NodeId, discard: bool) {
        self.node_mut(id).discard = discard;
    }

    /// Children of a node.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Number of children.
    pub fn child_count(&self, id: NodeId) -> usize {
        self.node(id).children.len()
    }

    /// Child at `index`.
    pub fn child(&self, id: NodeId, index: usize) -> NodeId {
        let children = &self.node(id).children;
        assert!(
            index < children.len(),
            "child index {} out of range for {:?} with {} children",
            index,
            self.kind(id),
            children.len()
        );
        children[index]
    }

    /// Parent of a node, if attached.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Position of `child` in `parent`'s list.
    ///
    /// Compares node identity, not structure; with duplicates the first
    /// match wins.
    pub fn index_of(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.children(parent).iter().position(|&c| c == child)
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Allocate a detached node.
    pub fn add_node(&mut self, kind: NodeKind, payload: Payload) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            payload,
            discard: false,
            insertion_index: 0,
            line: self.line,
            children: Vec::new(),
            parent: None,
        });
        id
    }

    /// Append `child` to `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let count = self.child_count(parent);
        self.insert_child(parent, count, child);
    }

    /// Insert `child` at `index` (`index == count` appends).
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        assert!(
            self.parent(child).is_none(),
            "node {:?} already has a parent",
            child
        );
        let count = self.child_count(parent);
        assert!(
            index <= count,
            "insert index {} out of range for {} children",
            index,
            count
        );
        self.node_mut(parent).children.insert(index, child);
        self.node_mut(child).parent = Some(parent);
    }

    /// Detach and return the child at `index`.
    pub fn remove_child(&mut self, parent: NodeId, index: usize) -> NodeId {
        let child = self.child(parent, index);
        self.node_mut(parent).children.remove(index);
        self.node_mut(child).parent = None;
        child
    }

    /// Put `replacement` at `index`, returning the detached old child.
    pub fn replace_child(&mut self, parent: NodeId, index: usize, replacement: NodeId) -> NodeId {
        let old = self.remove_child(parent, index);
        self.insert_child(parent, index, replacement);
        old
    }

    /// Turn a node into a literal in place, detaching its children.
    pub fn set_literal(&mut self, id: NodeId, kind: NodeKind, payload: Payload) {
        debug_assert!(kind.is_literal());
        let children = std::mem::take(&mut self.node_mut(id).children);
        for child in children {
            self.node_mut(child).parent = None;
        }
        let node = self.node_mut(id);
        node.kind = kind;
        node.payload = payload;
    }

    // ========================================================================
    // Construction helpers
    // ========================================================================

    /// Create a node with the given children.
    pub fn node_with(
        &mut self,
        kind: NodeKind,
        payload: Payload,
        children: impl IntoIterator<Item = NodeId>,
    ) -> NodeId {
        let id = self.add_node(kind, payload);
        for child in children {
            self.append_child(id, child);
        }
        id
    }

    /// Append statements to the root container.
    pub fn push_statements(&mut self, statements: impl IntoIterator<Item = NodeId>) {
        let root = self.root;
        for statement in statements {
            self.append_child(root, statement);
        }
    }

    /// Integer literal
    pub fn int(&mut self, value: i32) -> NodeId {
        self.add_node(NodeKind::IntegerLiteral, Payload::Int(value))
    }

    /// Double literal
    pub fn double(&mut self, value: f64) -> NodeId {
        self.add_node(NodeKind::DoubleLiteral, Payload::Double(value))
    }

    /// String literal
    pub fn string(&mut self, value: impl Into<String>) -> NodeId {
        self.add_node(NodeKind::StringLiteral, Payload::Str(value.into()))
    }

    /// Boolean literal
    pub fn boolean(&mut self, value: bool) -> NodeId {
        self.add_node(NodeKind::BooleanLiteral, Payload::Bool(value))
    }

    /// `null`
    pub fn null(&mut self) -> NodeId {
        self.add_node(NodeKind::NullLiteral, Payload::None)
    }

    /// `undefined`
    pub fn undefined(&mut self) -> NodeId {
        self.add_node(NodeKind::UndefinedLiteral, Payload::None)
    }

    /// Identifier
    pub fn ident(&mut self, name: impl Into<String>) -> NodeId {
        self.add_node(NodeKind::Identifier, Payload::Str(name.into()))
    }

    /// Unary operator
    pub fn unary(&mut self, kind: NodeKind, operand: NodeId) -> NodeId {
        self.node_with(kind, Payload::None, [operand])
    }

    /// Binary operator or assignment
    pub fn binary(&mut self, kind: NodeKind, left: NodeId, right: NodeId) -> NodeId {
        self.node_with(kind, Payload::None, [left, right])
    }

    /// `target = value`
    pub fn assign(&mut self, target: NodeId, value: NodeId) -> NodeId {
        self.binary(NodeKind::Assign, target, value)
    }

    /// Function call by name
    pub fn call(&mut self, name: impl Into<String>, args: impl IntoIterator<Item = NodeId>) -> NodeId {
        self.node_with(NodeKind::Call, Payload::Str(name.into()), args)
    }

    /// Method call
    pub fn method_call(
        &mut self,
        object: NodeId,
        name: impl Into<String>,
        args: impl IntoIterator<Item = NodeId>,
    ) -> NodeId {
        let id = self.node_with(NodeKind::MethodCall, Payload::Str(name.into()), [object]);
        for arg in args {
            self.append_child(id, arg);
        }
        id
    }

    /// `new Name(args)`
    pub fn new_object(&mut self, name: impl Into<String>, args: impl IntoIterator<Item = NodeId>) -> NodeId {
        self.node_with(NodeKind::New, Payload::Str(name.into()), args)
    }

    /// `object.member`
    pub fn attribute(&mut self, object: NodeId, member: impl Into<String>) -> NodeId {
        self.node_with(NodeKind::Attribute, Payload::Str(member.into()), [object])
    }

    /// `object[key]`
    pub fn index(&mut self, object: NodeId, key: NodeId) -> NodeId {
        self.node_with(NodeKind::Index, Payload::None, [object, key])
    }

    /// `[a, b, ...]`
    pub fn array(&mut self, elements: impl IntoIterator<Item = NodeId>) -> NodeId {
        self.node_with(NodeKind::ArrayLiteral, Payload::None, elements)
    }

    /// `{key: value, ...}`
    pub fn object(&mut self, properties: Vec<(String, NodeId)>) -> NodeId {
        let object = self.add_node(NodeKind::ObjectLiteral, Payload::None);
        for (key, value) in properties {
            let property = self.node_with(NodeKind::ObjectProperty, Payload::Str(key), [value]);
            self.append_child(object, property);
        }
        object
    }

    /// `cond ? then : otherwise`
    pub fn conditional(&mut self, cond: NodeId, then: NodeId, otherwise: NodeId) -> NodeId {
        self.node_with(NodeKind::Conditional, Payload::None, [cond, then, otherwise])
    }

    /// `delete target`
    pub fn delete(&mut self, target: NodeId) -> NodeId {
        self.unary(NodeKind::Delete, target)
    }

    /// `{ statements }`
    pub fn block(&mut self, statements: impl IntoIterator<Item = NodeId>) -> NodeId {
        self.node_with(NodeKind::StatementList, Payload::None, statements)
    }

    /// `if (cond) then [else otherwise]`
    pub fn if_else(&mut self, cond: NodeId, then: NodeId, otherwise: Option<NodeId>) -> NodeId {
        let id = self.node_with(NodeKind::If, Payload::None, [cond, then]);
        if let Some(otherwise) = otherwise {
            self.append_child(id, otherwise);
        }
        id
    }

    /// `while (cond) body`
    pub fn while_loop(&mut self, cond: NodeId, body: NodeId) -> NodeId {
        self.node_with(NodeKind::While, Payload::None, [cond, body])
    }

    /// `do body while (cond)`
    pub fn do_while(&mut self, body: NodeId, cond: NodeId) -> NodeId {
        self.node_with(NodeKind::DoWhile, Payload::None, [body, cond])
    }

    /// `for (init; cond; iter) body`, absent parts become `Empty`
    pub fn for_loop(
        &mut self,
        init: Option<NodeId>,
        cond: Option<NodeId>,
        iter: Option<NodeId>,
        body: NodeId,
    ) -> NodeId {
        let init = init.unwrap_or_else(|| self.empty());
        let cond = cond.unwrap_or_else(|| self.empty());
        let iter = iter.unwrap_or_else(|| self.empty());
        self.node_with(NodeKind::For, Payload::None, [init, cond, iter, body])
    }

    /// `for ([var] name in object) body`
    pub fn for_in(&mut self, declare: bool, name: impl Into<String>, object: NodeId, body: NodeId) -> NodeId {
        let var = self.ident(name);
        self.node_with(NodeKind::ForIn, Payload::Bool(declare), [var, object, body])
    }

    /// `switch (discriminant) { cases }`
    pub fn switch(&mut self, discriminant: NodeId, cases: impl IntoIterator<Item = NodeId>) -> NodeId {
        let id = self.node_with(NodeKind::Switch, Payload::None, [discriminant]);
        for case in cases {
            self.append_child(id, case);
        }
        id
    }

    /// `case test: statements`
    pub fn case(&mut self, test: NodeId, statements: impl IntoIterator<Item = NodeId>) -> NodeId {
        let body = self.block(statements);
        self.node_with(NodeKind::Case, Payload::None, [test, body])
    }

    /// `default: statements`
    pub fn default_case(&mut self, statements: impl IntoIterator<Item = NodeId>) -> NodeId {
        let body = self.block(statements);
        self.node_with(NodeKind::DefaultCase, Payload::None, [body])
    }

    /// `break`
    pub fn break_stmt(&mut self) -> NodeId {
        self.add_node(NodeKind::Break, Payload::None)
    }

    /// `continue`
    pub fn continue_stmt(&mut self) -> NodeId {
        self.add_node(NodeKind::Continue, Payload::None)
    }

    /// `return [value]`
    pub fn return_stmt(&mut self, value: Option<NodeId>) -> NodeId {
        self.node_with(NodeKind::Return, Payload::None, value)
    }

    /// `with (object) body`
    pub fn with(&mut self, object: NodeId, body: NodeId) -> NodeId {
        self.node_with(NodeKind::With, Payload::None, [object, body])
    }

    /// `tellTarget (target) body`
    pub fn tell_target(&mut self, target: NodeId, body: NodeId) -> NodeId {
        self.node_with(NodeKind::TellTarget, Payload::None, [target, body])
    }

    /// `var a [= init], ...`
    pub fn var(&mut self, declarators: Vec<(String, Option<NodeId>)>) -> NodeId {
        let var = self.add_node(NodeKind::Var, Payload::None);
        for (name, init) in declarators {
            let declarator = self.node_with(NodeKind::VarDeclarator, Payload::Str(name), init);
            self.append_child(var, declarator);
        }
        var
    }

    /// `function name(params) { body }`
    pub fn function_def(
        &mut self,
        name: impl Into<String>,
        params: &[&str],
        body: impl IntoIterator<Item = NodeId>,
    ) -> NodeId {
        let params = self.params(params);
        let body = self.block(body);
        self.node_with(NodeKind::FunctionDef, Payload::Str(name.into()), [params, body])
    }

    /// `function (params) { body }` as an expression
    pub fn function_expr(&mut self, params: &[&str], body: impl IntoIterator<Item = NodeId>) -> NodeId {
        let params = self.params(params);
        let body = self.block(body);
        self.node_with(NodeKind::FunctionExpr, Payload::None, [params, body])
    }

    fn params(&mut self, params: &[&str]) -> NodeId {
        let list = self.add_node(NodeKind::ParamList, Payload::None);
        for param in params {
            let ident = self.ident(*param);
            self.append_child(list, ident);
        }
        list
    }

    /// `;`
    pub fn empty(&mut self) -> NodeId {
        self.add_node(NodeKind::Empty, Payload::None)
    }

    /// `on (...)` / `onClipEvent (...)` handler with its statements
    pub fn event(
        &mut self,
        kind: NodeKind,
        flags: i32,
        statements: impl IntoIterator<Item = NodeId>,
    ) -> NodeId {
        debug_assert!(matches!(kind, NodeKind::ButtonEvent | NodeKind::ClipEvent));
        self.node_with(kind, Payload::Int(flags), statements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_sets_parent() {
        let mut tree = Tree::script();
        let x = tree.ident("x");
        tree.push_statements([x]);
        assert_eq!(tree.parent(x), Some(tree.root()));
        assert_eq!(tree.child_count(tree.root()), 1);
    }

    #[test]
    fn test_remove_clears_parent() {
        let mut tree = Tree::script();
        let a = tree.int(1);
        let b = tree.int(2);
        tree.push_statements([a, b]);
        let removed = tree.remove_child(tree.root(), 0);
        assert_eq!(removed, a);
        assert_eq!(tree.parent(a), None);
        assert_eq!(tree.child(tree.root(), 0), b);
    }

    #[test]
    fn test_insert_and_index_of() {
        let mut tree = Tree::script();
        let a = tree.int(1);
        let b = tree.int(2);
        let c = tree.int(3);
        tree.push_statements([a, c]);
        tree.insert_child(tree.root(), 1, b);
        assert_eq!(tree.index_of(tree.root(), b), Some(1));
        assert_eq!(tree.index_of(tree.root(), c), Some(2));
    }

    #[test]
    fn test_index_of_is_identity() {
        let mut tree = Tree::script();
        let a = tree.int(7);
        let lookalike = tree.int(7);
        tree.push_statements([a]);
        assert_eq!(tree.index_of(tree.root(), lookalike), None);
    }

    #[test]
    fn test_replace_child() {
        let mut tree = Tree::script();
        let a = tree.int(1);
        tree.push_statements([a]);
        let b = tree.int(2);
        let old = tree.replace_child(tree.root(), 0, b);
        assert_eq!(old, a);
        assert_eq!(tree.parent(a), None);
        assert_eq!(tree.parent(b), Some(tree.root()));
    }

    #[test]
    fn test_set_literal_detaches_children() {
        let mut tree = Tree::script();
        let l = tree.int(2);
        let r = tree.int(3);
        let add = tree.binary(NodeKind::Add, l, r);
        tree.set_literal(add, NodeKind::IntegerLiteral, Payload::Int(5));
        assert_eq!(tree.child_count(add), 0);
        assert_eq!(tree.parent(l), None);
        assert_eq!(tree.payload(add), &Payload::Int(5));
    }

    #[test]
    fn test_line_stamping() {
        let mut tree = Tree::script();
        tree.set_line(42);
        let x = tree.ident("x");
        assert_eq!(tree.line(x), 42);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_child_out_of_range_panics() {
        let tree = Tree::script();
        tree.child(tree.root(), 0);
    }

    #[test]
    #[should_panic(expected = "already has a parent")]
    fn test_double_ownership_panics() {
        let mut tree = Tree::script();
        let x = tree.ident("x");
        tree.push_statements([x]);
        let block = tree.block([]);
        tree.append_child(block, x);
    }
}
