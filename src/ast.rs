//! The AST node taxonomy consumed by the analyzer.
//!
//! This module is the contract boundary with the external parser: every
//! node shape the language grammar defines is modeled here as a variant of
//! the appropriate tagged sum. The analyzer is the only thing that ever
//! writes to a node's `resolved_type` slot or `flags`; everything else about
//! a node is produced by the parser and treated as read-only.

use std::cell::{Cell, RefCell};
use smallvec::SmallVec;

use crate::source::SourceLocation;
use crate::symbol::Symbol;
use crate::types::TypeDescriptor;

bitflags::bitflags! {
  /// Per-node flags the analyzer may set. The analyzer only ever mutates a
  /// node's `resolved_type` slot and these flags.
  #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
  pub struct NodeFlags: u8 {
    /// Set on expression nodes the constant evaluator has successfully
    /// folded to a `ConstValue`.
    const IS_CONSTANT_EXPR = 1 << 0;
    /// Set on statements found unreachable (dead code after a `never`
    /// typed statement).
    const UNREACHABLE = 1 << 1;
    /// Set by the security sub-analyzer when a place is tainted as
    /// `volatile`.
    const VOLATILE_TAINTED = 1 << 2;
  }
}

/// Generic wrapper providing the four fields every AST node carries:
/// location, kind-specific payload, annotation list, and the analyzer's
/// resolved-type slot + flags.
#[derive(Debug)]
pub struct AstNode<K> {
  pub location: SourceLocation,
  pub kind: K,
  pub annotations: Vec<Annotation>,
  resolved_type: RefCell<Option<TypeDescriptor>>,
  flags: Cell<NodeFlags>,
}

impl<K> AstNode<K> {
  #[must_use] pub fn new(location: SourceLocation, kind: K) -> Self {
    Self { location, kind, annotations: Vec::new(), resolved_type: RefCell::new(None), flags: Cell::new(NodeFlags::empty()) }
  }

  #[must_use] pub fn with_annotations(mut self, annotations: Vec<Annotation>) -> Self {
    self.annotations = annotations;
    self
  }

  /// The resolved type, if the analyzer has visited this node.
  #[must_use] pub fn resolved_type(&self) -> Option<TypeDescriptor> { self.resolved_type.borrow().clone() }

  /// Attach a resolved type. Called exactly once per node by the analyzer
  /// (re-analysis after a rollback may call it again with the same value).
  pub fn set_resolved_type(&self, ty: TypeDescriptor) { *self.resolved_type.borrow_mut() = Some(ty); }

  #[must_use] pub fn flags(&self) -> NodeFlags { self.flags.get() }
  pub fn set_flag(&self, flag: NodeFlags) { self.flags.set(self.flags.get() | flag); }
  #[must_use] pub fn has_flag(&self, flag: NodeFlags) -> bool { self.flags.get().contains(flag) }

  pub fn annotation(&self, name: Symbol) -> Option<&Annotation> {
    self.annotations.iter().find(|a| a.name == name)
  }

  pub fn has_annotation(&self, name: Symbol) -> bool { self.annotation(name).is_some() }
}

/// An annotation attached to a node, e.g. `#[deprecated(message: "...")]`,
/// `#[constant_time]`, or `#[transfer_full]`. The AST does not distinguish
/// the semantic-tag / security-tag / ffi-transfer-tag *syntax* the parser
/// accepted; the annotation engine classifies by registered name.
#[derive(Clone, Debug)]
pub struct Annotation {
  pub name: Symbol,
  pub params: Vec<AnnotationParam>,
  pub location: SourceLocation,
}

#[derive(Clone, Debug)]
pub struct AnnotationParam {
  pub name: Option<Symbol>,
  pub value: AnnotationValue,
  pub location: SourceLocation,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AnnotationValue {
  Int(i64),
  Str(String),
  Ident(Symbol),
  Bool(bool),
}

// ---------------------------------------------------------------------
// Type-level nodes
// ---------------------------------------------------------------------

pub type TypeNode = AstNode<TypeNodeKind>;

#[derive(Debug)]
pub enum TypeNodeKind {
  /// A bare name: a primitive, a user type with no arguments, or a
  /// reference to a type parameter / alias.
  Base { name: Symbol, args: Vec<TypeNode> },
  Struct { name: Symbol, args: Vec<TypeNode> },
  Enum { name: Symbol, args: Vec<TypeNode> },
  Slice { element: Box<TypeNode> },
  Array { element: Box<TypeNode>, size: Box<Expr> },
  Pointer { pointee: Box<TypeNode>, mutable: bool },
  Result { ok: Box<TypeNode>, err: Box<TypeNode> },
  Tuple { elements: Vec<TypeNode> },
}

// ---------------------------------------------------------------------
// Patterns (used by let, for, match)
// ---------------------------------------------------------------------

#[derive(Debug)]
pub enum Pattern {
  Wildcard,
  Binding { name: Symbol, mutable: bool },
  EnumVariant { enum_name: Option<Symbol>, variant: Symbol, payload: Option<Box<Pattern>> },
  Tuple(Vec<Pattern>),
  Literal(Box<Expr>),
}

// ---------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------

pub type Expr = AstNode<ExprKind>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
  Add, Sub, Mul, Div, Mod,
  Eq, Ne, Lt, Le, Gt, Ge,
  And, Or,
  BitAnd, BitOr, BitXor, Shl, Shr,
}

impl BinOp {
  #[must_use] pub fn is_arith(self) -> bool { matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod) }
  #[must_use] pub fn is_comparison(self) -> bool { matches!(self, BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge) }
  #[must_use] pub fn is_logical(self) -> bool { matches!(self, BinOp::And | BinOp::Or) }
  #[must_use] pub fn is_bitwise(self) -> bool { matches!(self, BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr) }
  #[must_use] pub fn is_div_or_mod(self) -> bool { matches!(self, BinOp::Div | BinOp::Mod) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp { Neg, Not, BitNot }

#[derive(Debug)]
pub enum ExprKind {
  IntLiteral(i64),
  FloatLiteral(u64), // bit pattern of an f64, so ExprKind stays Eq-free but comparable
  StringLiteral(Symbol),
  BoolLiteral(bool),
  CharLiteral(char),
  UnitLiteral,
  Identifier(Symbol),
  Binary { op: BinOp, left: Box<Expr>, right: Box<Expr> },
  Unary { op: UnOp, operand: Box<Expr> },
  Cast { expr: Box<Expr>, ty: Box<TypeNode> },
  Call { callee: Box<Expr>, type_args: Vec<TypeNode>, args: Vec<Expr> },
  AssociatedFuncCall { base: Box<TypeNode>, method: Symbol, type_args: Vec<TypeNode>, args: Vec<Expr> },
  FieldAccess { base: Box<Expr>, field: Symbol },
  IndexAccess { base: Box<Expr>, index: Box<Expr> },
  StructLiteral { ty: Box<TypeNode>, fields: Vec<(Symbol, Expr)> },
  EnumVariant { ty: Option<Box<TypeNode>>, variant: Symbol, payload: Option<Box<Expr>> },
  TupleLiteral(Vec<Expr>),
  ArrayLiteral(Vec<Expr>),
}

impl Expr {
  #[must_use] pub fn float_literal(value: f64, location: SourceLocation) -> Self {
    Self::new(location, ExprKind::FloatLiteral(value.to_bits()))
  }
  #[must_use] pub fn float_value(&self) -> Option<f64> {
    if let ExprKind::FloatLiteral(bits) = self.kind { Some(f64::from_bits(bits)) } else { None }
  }
}

// ---------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------

pub type Stmt = AstNode<StmtKind>;

#[derive(Debug)]
pub enum StmtKind {
  Let { pattern: Pattern, declared_type: Option<Box<TypeNode>>, init: Option<Box<Expr>> },
  Assignment { target: Box<Expr>, value: Box<Expr> },
  Return { value: Option<Box<Expr>> },
  If { condition: Box<Expr>, then_branch: Box<Stmt>, else_branch: Option<Box<Stmt>> },
  IfLet { pattern: Pattern, scrutinee: Box<Expr>, then_branch: Box<Stmt>, else_branch: Option<Box<Stmt>> },
  Match { scrutinee: Box<Expr>, arms: Vec<MatchArm> },
  For { binding: Pattern, iterable: Box<Expr>, body: Box<Stmt> },
  Block(Vec<Stmt>),
  Spawn { body: Box<Expr> },
  SpawnWithHandle { body: Box<Expr> },
  Await { expr: Box<Expr> },
  Unsafe(Box<Stmt>),
  Expression(Box<Expr>),
}

#[derive(Debug)]
pub struct MatchArm {
  pub pattern: Pattern,
  pub guard: Option<Box<Expr>>,
  pub body: Box<Stmt>,
  pub location: SourceLocation,
}

// ---------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------

pub type Decl = AstNode<DeclKind>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility { Public, Private }

#[derive(Debug)]
pub struct ParamDecl {
  pub name: Symbol,
  pub ty: TypeNode,
  pub mutable: bool,
  pub location: SourceLocation,
}

#[derive(Debug)]
pub struct FieldDecl {
  pub name: Symbol,
  pub ty: TypeNode,
  pub visibility: Visibility,
  pub optional: bool,
  pub location: SourceLocation,
}

#[derive(Debug)]
pub struct VariantDecl {
  pub name: Symbol,
  pub payload: Option<TypeNode>,
  pub discriminant: Option<Box<Expr>>,
  pub location: SourceLocation,
}

#[derive(Debug)]
pub struct TypeParam {
  pub name: Symbol,
  pub location: SourceLocation,
}

#[derive(Debug)]
pub enum DeclKind {
  Program(Vec<Decl>),
  Import { path: Vec<Symbol>, alias: Option<Symbol> },
  Function {
    name: Symbol,
    type_params: Vec<TypeParam>,
    params: Vec<ParamDecl>,
    return_type: Option<Box<TypeNode>>,
    body: Option<Box<Stmt>>,
    visibility: Visibility,
  },
  Struct {
    name: Symbol,
    type_params: Vec<TypeParam>,
    fields: Vec<FieldDecl>,
    visibility: Visibility,
  },
  Enum {
    name: Symbol,
    type_params: Vec<TypeParam>,
    variants: Vec<VariantDecl>,
    visibility: Visibility,
  },
  Extern {
    name: Symbol,
    params: Vec<ParamDecl>,
    return_type: Option<Box<TypeNode>>,
    external_name: Option<String>,
  },
  Impl {
    target: TypeNode,
    methods: Vec<Decl>,
  },
  Method {
    name: Symbol,
    type_params: Vec<TypeParam>,
    params: Vec<ParamDecl>,
    return_type: Option<Box<TypeNode>>,
    body: Option<Box<Stmt>>,
    visibility: Visibility,
  },
  Const {
    name: Symbol,
    declared_type: Box<TypeNode>,
    value: Box<Expr>,
    visibility: Visibility,
  },
}

/// A small-size-optimized list of annotation-site kinds; used by the
/// annotation engine to bound-check the valid-context bitmask without an
/// allocation in the common one-annotation case.
pub type AnnotationList = SmallVec<[Annotation; 2]>;
