// AST node types for the textual IR.
//
// Mirrors the generic-form subset accepted by the parser: a module of
// `func.func` definitions whose bodies are regions of generic operations.
// Attribute values are already semantic (`attr::Attribute`); only SSA names
// and block structure are left for `resolve`.
//
// Preconditions: produced by the parser from a valid token stream.
// Postconditions: each node's span covers the source range of the construct.
// Failure modes: none (data-only module).
// Side effects: none.

use chumsky::span::SimpleSpan;

use crate::attr::Attribute;
use crate::types::Type;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

/// A name as written in source (`%arg0`, `@main`, `^bb1`), sigil included.
#[derive(Debug, Clone, PartialEq)]
pub struct Name {
    pub text: String,
    pub span: Span,
}

// ── Root ──

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleAst {
    pub funcs: Vec<FuncAst>,
    pub span: Span,
}

// ── func.func @name(%a: T, ...) -> (T, ...) { region } ──

#[derive(Debug, Clone, PartialEq)]
pub struct FuncAst {
    pub name: Name,
    pub args: Vec<ArgDecl>,
    pub results: Vec<Type>,
    pub body: RegionAst,
    pub span: Span,
}

/// `%name: type` in a function signature or block header.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgDecl {
    pub name: Name,
    pub ty: Type,
    pub span: Span,
}

// ── Regions and blocks ──

#[derive(Debug, Clone, PartialEq)]
pub struct RegionAst {
    pub blocks: Vec<BlockAst>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockAst {
    pub label: Option<Name>,
    pub args: Vec<ArgDecl>,
    pub ops: Vec<OpAst>,
    pub span: Span,
}

// ── %r:N = "dialect.op"(%a, %b#1) ({...}) {attrs} : (T, T) -> T ──

#[derive(Debug, Clone, PartialEq)]
pub struct OpAst {
    pub results: Vec<ResultGroup>,
    pub name: String,
    pub operands: Vec<ValueRef>,
    pub regions: Vec<RegionAst>,
    pub attributes: Vec<AttrEntry>,
    pub signature: OpSignature,
    pub span: Span,
}

impl OpAst {
    /// Total number of results bound by the result groups.
    pub fn num_results(&self) -> usize {
        self.results.iter().map(|g| g.count as usize).sum()
    }
}

/// `%name` or `%name:N` on the left of an op.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultGroup {
    pub name: Name,
    pub count: u32,
}

/// Use of a value: `%name` or `%name#index`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRef {
    pub name: String,
    pub index: Option<u32>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttrEntry {
    pub name: String,
    pub value: Attribute,
    pub span: Span,
}

/// Trailing `: (inputs) -> outputs` functional type.
#[derive(Debug, Clone, PartialEq)]
pub struct OpSignature {
    pub inputs: Vec<Type>,
    pub outputs: Vec<Type>,
    pub span: Span,
}
