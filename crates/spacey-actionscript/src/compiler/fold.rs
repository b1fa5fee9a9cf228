//! Constant folding of operators over literal operands.
//!
//! Integer arithmetic wraps like the VM's 32-bit integers; anything that
//! leaves the integer domain (fractional quotients, `NaN`, `i32::MIN`
//! negation) becomes a double.

use tracing::trace;

use crate::ast::{NodeId, NodeKind, Payload, Tree};

/// A literal operand or result.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// `true` / `false`
    Bool(bool),
    /// 32-bit integer
    Int(i32),
    /// IEEE double
    Double(f64),
    /// String
    Str(String),
}

impl Literal {
    /// Read the literal held by a node, if it is one of the foldable kinds.
    pub fn of(tree: &Tree, id: NodeId) -> Option<Literal> {
        match (tree.kind(id), tree.payload(id)) {
            (NodeKind::BooleanLiteral, Payload::Bool(b)) => Some(Literal::Bool(*b)),
            (NodeKind::IntegerLiteral, Payload::Int(n)) => Some(Literal::Int(*n)),
            (NodeKind::DoubleLiteral, Payload::Double(d)) => Some(Literal::Double(*d)),
            (NodeKind::StringLiteral, Payload::Str(s)) => Some(Literal::Str(s.clone())),
            _ => None,
        }
    }

    fn into_node(self) -> (NodeKind, Payload) {
        match self {
            Literal::Bool(b) => (NodeKind::BooleanLiteral, Payload::Bool(b)),
            Literal::Int(n) => (NodeKind::IntegerLiteral, Payload::Int(n)),
            Literal::Double(d) => (NodeKind::DoubleLiteral, Payload::Double(d)),
            Literal::Str(s) => (NodeKind::StringLiteral, Payload::Str(s)),
        }
    }

    fn number(&self) -> Option<f64> {
        match self {
            Literal::Int(n) => Some(f64::from(*n)),
            Literal::Double(d) => Some(*d),
            _ => None,
        }
    }

    fn int32(&self) -> Option<i32> {
        match self {
            Literal::Int(n) => Some(*n),
            Literal::Double(d) => Some(to_int32(*d)),
            _ => None,
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Literal::Bool(b) => *b,
            Literal::Int(n) => *n != 0,
            Literal::Double(d) => *d != 0.0 && !d.is_nan(),
            Literal::Str(s) => !s.is_empty(),
        }
    }
}

/// Fold `id` in place when it is an operator over literal children.
///
/// Returns whether the node was replaced.
pub fn fold_node(tree: &mut Tree, id: NodeId) -> bool {
    let kind = tree.kind(id);
    let operands: Option<Vec<Literal>> = tree
        .children(id)
        .iter()
        .map(|&child| Literal::of(tree, child))
        .collect();
    let Some(operands) = operands else {
        return false;
    };

    let result = match operands.as_slice() {
        [operand] => evaluate_unary(kind, operand),
        [left, right] => evaluate_binary(kind, left, right),
        _ => None,
    };
    let Some(result) = result else {
        return false;
    };

    trace!(?kind, ?result, line = tree.line(id), "folded constant");
    let (literal_kind, payload) = result.into_node();
    tree.set_literal(id, literal_kind, payload);
    true
}

/// Result of a unary operator over a literal.
pub fn evaluate_unary(kind: NodeKind, operand: &Literal) -> Option<Literal> {
    match kind {
        NodeKind::Not => match operand {
            Literal::Str(_) => None,
            _ => Some(Literal::Bool(!operand.truthy())),
        },
        NodeKind::BitNot => operand.int32().map(|n| Literal::Int(!n)),
        NodeKind::Negate => match operand {
            Literal::Int(i32::MIN) => Some(Literal::Double(-f64::from(i32::MIN))),
            Literal::Int(n) => Some(Literal::Int(-n)),
            Literal::Double(d) => Some(Literal::Double(-d)),
            _ => None,
        },
        _ => None,
    }
}

/// Result of a binary operator over two literals.
pub fn evaluate_binary(kind: NodeKind, left: &Literal, right: &Literal) -> Option<Literal> {
    use NodeKind::*;

    match kind {
        Add | Sub | Mul | Div | Mod => arithmetic(kind, left, right),
        BitAnd | BitOr | BitXor | Shl | Shr | UShr => {
            bitwise(kind, left.int32()?, right.int32()?)
        }
        LogicalAnd | LogicalOr => logical(kind == LogicalAnd, left, right),
        _ => None,
    }
}

fn arithmetic(kind: NodeKind, left: &Literal, right: &Literal) -> Option<Literal> {
    match (left, right) {
        (Literal::Int(a), Literal::Int(b)) => Some(integer_arithmetic(kind, *a, *b)),
        (Literal::Str(a), Literal::Str(b)) if kind == NodeKind::Add => {
            Some(Literal::Str(format!("{a}{b}")))
        }
        (Literal::Int(_) | Literal::Double(_), Literal::Int(_) | Literal::Double(_)) => {
            let (a, b) = (left.number()?, right.number()?);
            let value = match kind {
                NodeKind::Add => a + b,
                NodeKind::Sub => a - b,
                NodeKind::Mul => a * b,
                NodeKind::Div => a / b,
                NodeKind::Mod => a % b,
                _ => return None,
            };
            Some(Literal::Double(value))
        }
        _ => None,
    }
}

fn integer_arithmetic(kind: NodeKind, a: i32, b: i32) -> Literal {
    match kind {
        NodeKind::Add => Literal::Int(a.wrapping_add(b)),
        NodeKind::Sub => Literal::Int(a.wrapping_sub(b)),
        NodeKind::Mul => Literal::Int(a.wrapping_mul(b)),
        NodeKind::Div => match a.checked_rem(b) {
            Some(0) => Literal::Int(a / b),
            _ => Literal::Double(f64::from(a) / f64::from(b)),
        },
        // Mod
        _ => {
            if b == 0 {
                Literal::Double(f64::NAN)
            } else {
                Literal::Int(a.wrapping_rem(b))
            }
        }
    }
}

fn bitwise(kind: NodeKind, a: i32, b: i32) -> Option<Literal> {
    let shift = (b & 31) as u32;
    let result = match kind {
        NodeKind::BitAnd => a & b,
        NodeKind::BitOr => a | b,
        NodeKind::BitXor => a ^ b,
        NodeKind::Shl => a.wrapping_shl(shift),
        NodeKind::Shr => a >> shift,
        NodeKind::UShr => {
            let value = (a as u32) >> shift;
            return Some(match i32::try_from(value) {
                Ok(n) => Literal::Int(n),
                Err(_) => Literal::Double(f64::from(value)),
            });
        }
        _ => return None,
    };
    Some(Literal::Int(result))
}

// Integer pairs select an operand, boolean pairs and mixed bool/int pairs
// collapse to a boolean, anything involving doubles or strings is kept.
fn logical(and: bool, left: &Literal, right: &Literal) -> Option<Literal> {
    match (left, right) {
        (Literal::Int(a), Literal::Int(b)) => {
            let pick_left = if and { *a == 0 } else { *a != 0 };
            Some(Literal::Int(if pick_left { *a } else { *b }))
        }
        (Literal::Bool(_), Literal::Bool(_))
        | (Literal::Bool(_), Literal::Int(_))
        | (Literal::Int(_), Literal::Bool(_)) => {
            let value = if and {
                left.truthy() && right.truthy()
            } else {
                left.truthy() || right.truthy()
            };
            Some(Literal::Bool(value))
        }
        _ => None,
    }
}

/// ECMAScript ToInt32.
pub fn to_int32(value: f64) -> i32 {
    if !value.is_finite() {
        return 0;
    }
    value.trunc().rem_euclid(4_294_967_296.0) as u32 as i32
}
