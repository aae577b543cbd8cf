//! AST node definitions for the Lyra compiler core.
//!
//! The whole input and output of semantic analysis is a tree of [`Node`]
//! values held in a [`crate::arena::NodeArena`]. A node carries a closed
//! [`NodeKind`] tag, a source [`Position`], polymorphic payload fields
//! (string, integer, float), a [`NodeFlags`] bit set, a tristate-capable
//! [`NodeAttrs`] bit set, the ordered child list and the non-owning
//! cross-edges set up by the resolvers (`instance`, `type`, `goto` enter
//! and exit).
//!
//! Ownership is tree shaped; the cross-edges are arena indices that never
//! dangle because nodes are only dropped with the whole arena at the end
//! of the pass.

use bitmask_enum::bitmask;
use indexmap::IndexMap;
use strum_macros::{AsRefStr, Display};

use crate::{arena::NodeId, position::Position};

/// The closed set of node kinds understood by the semantic pass
///
/// Walkers match exhaustively on this tag so the compiler enforces
/// coverage whenever a kind is added.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum NodeKind {
    // structural
    Root,
    Program,
    Package,
    Import,
    Use,
    Class,
    Interface,
    Enum,
    Extends,
    Implements,
    Function,
    Parameters,
    Parameter,
    Var,
    Variable,
    VarAttributes,
    Set,
    DirectiveList,
    Attributes,
    Label,
    If,
    Else,
    For,
    While,
    Do,
    Switch,
    Case,
    Default,
    Try,
    Catch,
    Finally,
    Throw,
    Return,
    Break,
    Continue,
    Goto,
    With,
    List,
    Member,
    Call,
    New,
    Name,
    Type,
    This,
    Super,
    As,
    Empty,
    Unknown,
    Scope,
    Namespace,
    Auto,
    ParamMatch,
    Private,
    Public,

    // literals
    Identifier,
    VIdentifier,
    String,
    Integer,
    Float,
    True,
    False,
    Null,
    Undefined,
    RegularExpression,
    ObjectLiteral,
    ArrayLiteral,

    // operators
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    ShiftLeft,
    ShiftRight,
    ShiftRightUnsigned,
    RotateLeft,
    RotateRight,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    BitwiseNot,
    LogicalAnd,
    LogicalOr,
    LogicalXor,
    LogicalNot,
    Minimum,
    Maximum,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    StrictlyEqual,
    StrictlyNotEqual,
    In,
    InstanceOf,
    TypeOf,
    Delete,
    Conditional,
    Increment,
    Decrement,
    PostIncrement,
    PostDecrement,

    // assignments
    Assignment,
    AssignmentAdd,
    AssignmentSubtract,
    AssignmentMultiply,
    AssignmentDivide,
    AssignmentModulo,
    AssignmentPower,
    AssignmentShiftLeft,
    AssignmentShiftRight,
    AssignmentShiftRightUnsigned,
    AssignmentRotateLeft,
    AssignmentRotateRight,
    AssignmentBitwiseAnd,
    AssignmentBitwiseOr,
    AssignmentBitwiseXor,
    AssignmentLogicalAnd,
    AssignmentLogicalOr,
    AssignmentLogicalXor,
    AssignmentMinimum,
    AssignmentMaximum,
}

impl NodeKind {
    /// Whether this kind is one of the compound or plain assignment operators
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            NodeKind::Assignment
                | NodeKind::AssignmentAdd
                | NodeKind::AssignmentSubtract
                | NodeKind::AssignmentMultiply
                | NodeKind::AssignmentDivide
                | NodeKind::AssignmentModulo
                | NodeKind::AssignmentPower
                | NodeKind::AssignmentShiftLeft
                | NodeKind::AssignmentShiftRight
                | NodeKind::AssignmentShiftRightUnsigned
                | NodeKind::AssignmentRotateLeft
                | NodeKind::AssignmentRotateRight
                | NodeKind::AssignmentBitwiseAnd
                | NodeKind::AssignmentBitwiseOr
                | NodeKind::AssignmentBitwiseXor
                | NodeKind::AssignmentLogicalAnd
                | NodeKind::AssignmentLogicalOr
                | NodeKind::AssignmentLogicalXor
                | NodeKind::AssignmentMinimum
                | NodeKind::AssignmentMaximum
        )
    }

    /// Whether this kind is a binary operator eligible for operator overload lookup
    pub fn is_binary_operator(self) -> bool {
        matches!(
            self,
            NodeKind::Add
                | NodeKind::Subtract
                | NodeKind::Multiply
                | NodeKind::Divide
                | NodeKind::Modulo
                | NodeKind::Power
                | NodeKind::ShiftLeft
                | NodeKind::ShiftRight
                | NodeKind::ShiftRightUnsigned
                | NodeKind::RotateLeft
                | NodeKind::RotateRight
                | NodeKind::BitwiseAnd
                | NodeKind::BitwiseOr
                | NodeKind::BitwiseXor
                | NodeKind::LogicalAnd
                | NodeKind::LogicalOr
                | NodeKind::LogicalXor
                | NodeKind::Minimum
                | NodeKind::Maximum
                | NodeKind::Less
                | NodeKind::LessEqual
                | NodeKind::Greater
                | NodeKind::GreaterEqual
                | NodeKind::Equal
                | NodeKind::NotEqual
                | NodeKind::StrictlyEqual
                | NodeKind::StrictlyNotEqual
        )
    }

    /// Whether this kind is a unary operator eligible for operator overload lookup
    ///
    /// `Add` and `Subtract` count as unary when the node has a single child.
    pub fn is_unary_operator(self) -> bool {
        matches!(
            self,
            NodeKind::Add
                | NodeKind::Subtract
                | NodeKind::BitwiseNot
                | NodeKind::LogicalNot
                | NodeKind::Increment
                | NodeKind::Decrement
                | NodeKind::PostIncrement
                | NodeKind::PostDecrement
        )
    }

    /// Whether a node of this kind can hold a literal value known at compile time
    pub fn is_literal(self) -> bool {
        matches!(
            self,
            NodeKind::String
                | NodeKind::Integer
                | NodeKind::Float
                | NodeKind::True
                | NodeKind::False
                | NodeKind::Null
                | NodeKind::Undefined
                | NodeKind::RegularExpression
        )
    }

    /// The operator symbol used to look up an operator overload
    ///
    /// Returns `None` for kinds that are not operators.
    pub fn operator_symbol(self) -> Option<&'static str> {
        let symbol = match self {
            NodeKind::Add => "+",
            NodeKind::Subtract => "-",
            NodeKind::Multiply => "*",
            NodeKind::Divide => "/",
            NodeKind::Modulo => "%",
            NodeKind::Power => "**",
            NodeKind::ShiftLeft => "<<",
            NodeKind::ShiftRight => ">>",
            NodeKind::ShiftRightUnsigned => ">>>",
            NodeKind::RotateLeft => "<!",
            NodeKind::RotateRight => ">!",
            NodeKind::BitwiseAnd => "&",
            NodeKind::BitwiseOr => "|",
            NodeKind::BitwiseXor => "^",
            NodeKind::BitwiseNot => "~",
            NodeKind::LogicalAnd => "&&",
            NodeKind::LogicalOr => "||",
            NodeKind::LogicalXor => "^^",
            NodeKind::LogicalNot => "!",
            NodeKind::Minimum => "<?",
            NodeKind::Maximum => ">?",
            NodeKind::Less => "<",
            NodeKind::LessEqual => "<=",
            NodeKind::Greater => ">",
            NodeKind::GreaterEqual => ">=",
            NodeKind::Equal => "==",
            NodeKind::NotEqual => "!=",
            NodeKind::StrictlyEqual => "===",
            NodeKind::StrictlyNotEqual => "!==",
            NodeKind::Increment | NodeKind::PostIncrement => "++",
            NodeKind::Decrement | NodeKind::PostDecrement => "--",
            NodeKind::Assignment => "=",
            NodeKind::AssignmentAdd => "+=",
            NodeKind::AssignmentSubtract => "-=",
            NodeKind::AssignmentMultiply => "*=",
            NodeKind::AssignmentDivide => "/=",
            NodeKind::AssignmentModulo => "%=",
            NodeKind::AssignmentPower => "**=",
            NodeKind::AssignmentShiftLeft => "<<=",
            NodeKind::AssignmentShiftRight => ">>=",
            NodeKind::AssignmentShiftRightUnsigned => ">>>=",
            NodeKind::AssignmentRotateLeft => "<!=",
            NodeKind::AssignmentRotateRight => ">!=",
            NodeKind::AssignmentBitwiseAnd => "&=",
            NodeKind::AssignmentBitwiseOr => "|=",
            NodeKind::AssignmentBitwiseXor => "^=",
            NodeKind::AssignmentLogicalAnd => "&&=",
            NodeKind::AssignmentLogicalOr => "||=",
            NodeKind::AssignmentLogicalXor => "^^=",
            NodeKind::AssignmentMinimum => "<?=",
            NodeKind::AssignmentMaximum => ">?=",
            _ => return None,
        };
        Some(symbol)
    }
}

/// Boolean state bits maintained on nodes by the resolvers
///
/// Variables use `Defined` (seen by the declaration checker), `InUse`,
/// `Compiled` (initializer resolved, never re-resolved), `Local`,
/// `Member`, `Const`, and `ToAdd`/`Defining` while a synthesized
/// declaration waits to be hoisted into its directive list. Functions
/// use `NoParams`, `Operator`, `Getter`/`Setter` (the `->`/`<-` sigil
/// carriers), `Void`, `Never` and `Unprototyped`. Parameters use
/// `Referenced`, `ParamRef`, `Rest`, `Out`, `Unchecked` and `Catch`.
/// `Typed` marks identifiers and catch clauses whose type resolution ran
/// (successfully or not), `With` marks identifiers resolved through a
/// `with` object, `SwitchDefault` sits on a switch holding a `default`,
/// `FoundLabels`/`PackageReferenced` track per package work,
/// `Implements` makes an import compile eagerly and `NewVariables`
/// marks a directive list with synthesized variables to hoist.
#[bitmask(u32)]
pub enum NodeFlags {
    Defined,
    InUse,
    Compiled,
    Local,
    Member,
    Const,
    ToAdd,
    Defining,
    NoParams,
    Operator,
    Getter,
    Setter,
    Void,
    Never,
    Unprototyped,
    Referenced,
    ParamRef,
    Rest,
    Out,
    Unchecked,
    Catch,
    Typed,
    With,
    SwitchDefault,
    FoundLabels,
    PackageReferenced,
    Implements,
    NewVariables,
}

/// Declaration attributes; a bit present means the attribute is set
///
/// `Defined` records that the attribute set of the node has been
/// computed, giving the tristate of the data model: until `Defined` is
/// set the attributes are unknown.
#[bitmask(u32)]
pub enum NodeAttrs {
    Public,
    Private,
    Protected,
    Internal,
    Static,
    Abstract,
    Virtual,
    Final,
    Constructor,
    Dynamic,
    Intrinsic,
    Unused,
    True,
    False,
    Defined,
}

/// A single AST node stored in the arena
///
/// Payload fields are used polymorphically depending on [`NodeKind`]:
/// identifiers, strings and declarations use `string`; integer literals use
/// `integer`; float literals use `float`; `ParamMatch` and `Call` nodes use
/// the score vector and the argument mapping produced by overload
/// selection.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) position: Position,
    pub(crate) string: String,
    pub(crate) integer: i64,
    pub(crate) float: f64,
    pub(crate) flags: NodeFlags,
    pub(crate) attrs: NodeAttrs,
    pub(crate) children: Vec<NodeId>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) instance: Option<NodeId>,
    pub(crate) type_link: Option<NodeId>,
    pub(crate) goto_enter: Option<NodeId>,
    pub(crate) goto_exit: Option<NodeId>,
    /// Label index; only populated on program, package and function nodes
    pub(crate) labels: IndexMap<String, NodeId>,
    /// Variables declared in this scope, in declaration order
    pub(crate) variables: Vec<NodeId>,
    /// Per-formal scores filled on `ParamMatch` nodes by overload selection
    pub(crate) match_scores: Vec<usize>,
    /// Argument to formal index mapping, copied to the call on selection
    pub(crate) match_map: Vec<usize>,
    /// Reentrancy lock depth; structural mutations are queued while held
    pub(crate) lock: u32,
    /// Children appended while the node was locked, flushed on unlock
    pub(crate) pending: Vec<NodeId>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, position: Position) -> Self {
        Self {
            kind,
            position,
            string: String::new(),
            integer: 0,
            float: 0.0,
            flags: NodeFlags::none(),
            attrs: NodeAttrs::none(),
            children: Vec::new(),
            parent: None,
            instance: None,
            type_link: None,
            goto_enter: None,
            goto_exit: None,
            labels: IndexMap::new(),
            variables: Vec::new(),
            match_scores: Vec::new(),
            match_map: Vec::new(),
            lock: 0,
            pending: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(NodeKind::Add, "+")]
    #[case(NodeKind::AssignmentAdd, "+=")]
    #[case(NodeKind::StrictlyEqual, "===")]
    #[case(NodeKind::PostIncrement, "++")]
    #[case(NodeKind::ShiftRightUnsigned, ">>>")]
    #[case(NodeKind::LogicalXor, "^^")]
    fn operator_symbols(#[case] kind: NodeKind, #[case] symbol: &str) {
        assert_eq!(kind.operator_symbol(), Some(symbol));
    }

    #[test]
    fn non_operators_have_no_symbol() {
        assert_eq!(NodeKind::Class.operator_symbol(), None);
        assert_eq!(NodeKind::DirectiveList.operator_symbol(), None);
    }

    #[test]
    fn assignment_classification() {
        assert!(NodeKind::Assignment.is_assignment());
        assert!(NodeKind::AssignmentShiftRightUnsigned.is_assignment());
        assert!(!NodeKind::Equal.is_assignment());
    }

    #[test]
    fn flag_bits_are_distinct() {
        let flags = NodeFlags::Defined | NodeFlags::InUse | NodeFlags::Rest;
        assert!(flags.contains(NodeFlags::Defined));
        assert!(flags.contains(NodeFlags::Rest));
        assert!(!flags.contains(NodeFlags::Getter));
    }
}
