//! Syntax tree definitions for ActionScript.
//!
//! The tree is arena-backed (see [`Tree`]): nodes are addressed by
//! [`NodeId`], every node has exactly one owner, and the parent link is a
//! plain index used only for upward queries.

mod tree;

pub use tree::{Node, NodeId, Tree};

/// The kind of a syntax node.
///
/// Child layout per kind is listed on each variant; `?` marks an optional
/// trailing child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    // Containers
    /// Frame script; children are statements
    Script,
    /// Button actions; children are `ButtonEvent`s
    ButtonScript,
    /// Clip actions; children are `ClipEvent`s
    ClipScript,
    /// `on (...)` handler, `Int` event flags; children are statements
    ButtonEvent,
    /// `onClipEvent (...)` handler, `Int` event flags; children are statements
    ClipEvent,

    // Statements
    /// `{ ... }`
    StatementList,
    /// `[cond, then, else?]`
    If,
    /// `[cond, body]`
    While,
    /// `[body, cond]`
    DoWhile,
    /// `[init, cond, iter, body]`, missing parts are `Empty`
    For,
    /// `Bool` var-declared, `[Identifier, object, body]`
    ForIn,
    /// `[discriminant, Case | DefaultCase ...]`
    Switch,
    /// `[test, StatementList]`
    Case,
    /// `[StatementList]`
    DefaultCase,
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `[value?]`
    Return,
    /// `[object, body]`
    With,
    /// `[target, body]`
    TellTarget,
    /// `[VarDeclarator ...]`
    Var,
    /// `Str` name, `[init?]`
    VarDeclarator,
    /// `;`
    Empty,

    // Definitions
    /// `Str` name, `[ParamList, StatementList]`
    FunctionDef,
    /// `[ParamList, StatementList]`
    FunctionExpr,
    /// `[Identifier ...]`
    ParamList,

    // Literals and primaries
    /// `Str` name
    Identifier,
    /// `Int`
    IntegerLiteral,
    /// `Double`
    DoubleLiteral,
    /// `Str`
    StringLiteral,
    /// `Bool`
    BooleanLiteral,
    /// `null`
    NullLiteral,
    /// `undefined`
    UndefinedLiteral,
    /// `[element ...]`
    ArrayLiteral,
    /// `[ObjectProperty ...]`
    ObjectLiteral,
    /// `Str` key, `[value]`
    ObjectProperty,
    /// `Str` member, `[object]`
    Attribute,
    /// `[object, key]`
    Index,
    /// `Str` callee, `[arg ...]`
    Call,
    /// `Str` method, `[object, arg ...]`
    MethodCall,
    /// `Str` constructor, `[arg ...]`
    New,
    /// `[target]`
    Delete,
    /// `[cond, then, else]`
    Conditional,

    // Assignment, `[target, value]`
    /// `=`
    Assign,
    /// `+=`
    AddAssign,
    /// `-=`
    SubAssign,
    /// `*=`
    MulAssign,
    /// `/=`
    DivAssign,
    /// `%=`
    ModAssign,
    /// `&=`
    BitAndAssign,
    /// `|=`
    BitOrAssign,
    /// `^=`
    BitXorAssign,
    /// `<<=`
    ShlAssign,
    /// `>>=`
    ShrAssign,
    /// `>>>=`
    UShrAssign,
    /// `++x`, `[target]`
    PreIncrement,
    /// `--x`, `[target]`
    PreDecrement,
    /// `x++`, `[target]`
    PostIncrement,
    /// `x--`, `[target]`
    PostDecrement,

    // Binary operators, `[left, right]`
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `>>>`
    UShr,
    /// `&&`
    LogicalAnd,
    /// `||`
    LogicalOr,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `===`
    StrictEqual,
    /// `!==`
    StrictNotEqual,
    /// `<`
    Less,
    /// `>`
    Greater,
    /// `<=`
    LessEqual,
    /// `>=`
    GreaterEqual,
    /// `instanceof`
    InstanceOf,

    // Unary operators, `[operand]`
    /// `!`
    Not,
    /// `~`
    BitNot,
    /// unary `-`
    Negate,
}

impl NodeKind {
    /// Label pushed on the lexical-context stack while the node is visited.
    pub fn display_name(self) -> &'static str {
        use NodeKind::*;
        match self {
            Script => "script",
            ButtonScript => "button",
            ClipScript => "clip",
            ButtonEvent => "on",
            ClipEvent => "onClipEvent",
            StatementList => "block",
            If => "if",
            While => "while",
            DoWhile => "do",
            For => "for",
            ForIn => "for-in",
            Switch => "switch",
            Case => "case",
            DefaultCase => "default",
            Break => "break",
            Continue => "continue",
            Return => "return",
            With => "with",
            TellTarget => "tellTarget",
            Var => "var",
            VarDeclarator => "declarator",
            Empty => "empty",
            FunctionDef | FunctionExpr => "function",
            ParamList => "params",
            Identifier => "identifier",
            IntegerLiteral => "integer",
            DoubleLiteral => "double",
            StringLiteral => "string",
            BooleanLiteral => "boolean",
            NullLiteral => "null",
            UndefinedLiteral => "undefined",
            ArrayLiteral => "[]",
            ObjectLiteral => "{}",
            ObjectProperty => "property",
            Attribute => ".",
            Index => "[.]",
            Call => "call",
            MethodCall => "method",
            New => "new",
            Delete => "delete",
            Conditional => "?:",
            Assign => "=",
            AddAssign => "+=",
            SubAssign => "-=",
            MulAssign => "*=",
            DivAssign => "/=",
            ModAssign => "%=",
            BitAndAssign => "&=",
            BitOrAssign => "|=",
            BitXorAssign => "^=",
            ShlAssign => "<<=",
            ShrAssign => ">>=",
            UShrAssign => ">>>=",
            PreIncrement | PostIncrement => "++",
            PreDecrement | PostDecrement => "--",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            BitAnd => "&",
            BitOr => "|",
            BitXor => "^",
            Shl => "<<",
            Shr => ">>",
            UShr => ">>>",
            LogicalAnd => "&&",
            LogicalOr => "||",
            Equal => "==",
            NotEqual => "!=",
            StrictEqual => "===",
            StrictNotEqual => "!==",
            Less => "<",
            Greater => ">",
            LessEqual => "<=",
            GreaterEqual => ">=",
            InstanceOf => "instanceof",
            Not => "!",
            BitNot => "~",
            Negate => "neg",
        }
    }

    /// Literal kinds carry their value in the payload and have no children.
    pub fn is_literal(self) -> bool {
        matches!(
            self,
            NodeKind::IntegerLiteral
                | NodeKind::DoubleLiteral
                | NodeKind::StringLiteral
                | NodeKind::BooleanLiteral
                | NodeKind::NullLiteral
                | NodeKind::UndefinedLiteral
        )
    }

    /// Kinds whose children form a plain statement list.
    pub fn is_statement_list(self) -> bool {
        matches!(
            self,
            NodeKind::Script
                | NodeKind::StatementList
                | NodeKind::ButtonEvent
                | NodeKind::ClipEvent
        )
    }

    /// Kinds that receive hoisted function definitions.
    pub fn is_hoist_target(self) -> bool {
        matches!(
            self,
            NodeKind::Script
                | NodeKind::ButtonEvent
                | NodeKind::ClipEvent
                | NodeKind::FunctionDef
                | NodeKind::FunctionExpr
        )
    }

    /// Function definitions and expressions.
    pub fn is_function(self) -> bool {
        matches!(self, NodeKind::FunctionDef | NodeKind::FunctionExpr)
    }

    /// Loop statements (`break` and `continue` targets).
    pub fn is_loop(self) -> bool {
        matches!(
            self,
            NodeKind::While | NodeKind::DoWhile | NodeKind::For | NodeKind::ForIn
        )
    }

    /// Assignment and increment kinds.
    pub fn is_assignment(self) -> bool {
        use NodeKind::*;
        matches!(
            self,
            Assign
                | AddAssign
                | SubAssign
                | MulAssign
                | DivAssign
                | ModAssign
                | BitAndAssign
                | BitOrAssign
                | BitXorAssign
                | ShlAssign
                | ShrAssign
                | UShrAssign
                | PreIncrement
                | PreDecrement
                | PostIncrement
                | PostDecrement
        )
    }

    /// Two-operand operators.
    pub fn is_binary_operator(self) -> bool {
        use NodeKind::*;
        matches!(
            self,
            Add | Sub
                | Mul
                | Div
                | Mod
                | BitAnd
                | BitOr
                | BitXor
                | Shl
                | Shr
                | UShr
                | LogicalAnd
                | LogicalOr
                | Equal
                | NotEqual
                | StrictEqual
                | StrictNotEqual
                | Less
                | Greater
                | LessEqual
                | GreaterEqual
                | InstanceOf
        )
    }

    /// One-operand operators.
    pub fn is_unary_operator(self) -> bool {
        matches!(self, NodeKind::Not | NodeKind::BitNot | NodeKind::Negate)
    }

    /// Compound assignments read their target before writing it.
    pub fn is_compound_assignment(self) -> bool {
        self.is_assignment() && self != NodeKind::Assign
    }
}

/// Node payload. Exactly one shape is valid for a given kind.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    /// No payload
    #[default]
    None,
    /// Boolean
    Bool(bool),
    /// 32-bit integer
    Int(i32),
    /// IEEE double
    Double(f64),
    /// String (names, literal text)
    Str(String),
}

impl Payload {
    /// String payload, if present
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Payload::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer payload, if present
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Payload::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Boolean payload, if present
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Payload::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Double payload, if present
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Payload::Double(d) => Some(*d),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_kinds_share_label() {
        assert_eq!(NodeKind::FunctionDef.display_name(), "function");
        assert_eq!(NodeKind::FunctionExpr.display_name(), "function");
    }

    #[test]
    fn test_kind_classes() {
        assert!(NodeKind::IntegerLiteral.is_literal());
        assert!(!NodeKind::Identifier.is_literal());
        assert!(NodeKind::ClipEvent.is_hoist_target());
        assert!(!NodeKind::ClipScript.is_hoist_target());
        assert!(NodeKind::ForIn.is_loop());
        assert!(!NodeKind::Switch.is_loop());
        assert!(NodeKind::PostIncrement.is_compound_assignment());
        assert!(NodeKind::InstanceOf.is_binary_operator());
        assert!(!NodeKind::Assign.is_binary_operator());
        assert!(NodeKind::Negate.is_unary_operator());
        assert!(!NodeKind::Assign.is_compound_assignment());
    }

    #[test]
    fn test_payload_accessors() {
        assert_eq!(Payload::Str("x".into()).as_str(), Some("x"));
        assert_eq!(Payload::Int(3).as_int(), Some(3));
        assert_eq!(Payload::Int(3).as_str(), None);
        assert_eq!(Payload::None.as_bool(), None);
    }
}
