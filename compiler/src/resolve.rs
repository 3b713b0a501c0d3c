// resolve.rs — AST → IR construction with SSA name resolution
//
// Walks the parsed module, builds the IR arena, and binds every `%name` use
// to the value that defines it. Value names follow MLIR scoping: a region
// sees the names of its enclosing regions, a function body sees only its own
// arguments, and a name may be bound only once along a scope chain.
//
// Preconditions: `module` is a well-formed AST from the parser over `source`.
// Postconditions: returns the IR module plus all accumulated diagnostics.
//   When the diagnostics contain errors the module is structurally valid but
//   may be missing operands; it must not be handed to later passes.
// Failure modes: undefined or redefined values, operand/result counts that
//   disagree with the op signature, and type mismatches produce `E000x`
//   errors. Resolution continues past errors.
// Side effects: none.

use std::collections::HashMap;

use crate::ast::*;
use crate::attr::NamedAttribute;
use crate::diag::{codes, DiagSink, Diagnostic};
use crate::id::{BlockId, RegionId, ValueId};
use crate::ir::{Func, IrContext, Module, OperationState};
use crate::location::{LineIndex, Location};
use crate::types::Type;

// ── Public types ────────────────────────────────────────────────────────────

/// Result of resolution.
#[derive(Debug)]
pub struct ResolveResult {
    pub module: Module,
    pub diagnostics: Vec<Diagnostic>,
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Build the IR for a parsed module.
pub fn resolve(ast: &ModuleAst, source: &str) -> ResolveResult {
    let mut ctx = ResolveCtx {
        ir: IrContext::new(),
        scopes: Vec::new(),
        lines: LineIndex::new(source),
        diagnostics: Vec::new(),
    };

    let mut funcs: Vec<Func> = Vec::with_capacity(ast.funcs.len());
    for func in &ast.funcs {
        if funcs.iter().any(|f| f.name == func.name.text[1..]) {
            ctx.error(
                func.name.span,
                codes::E0002,
                format!("redefinition of function '{}'", func.name.text),
            );
            continue;
        }
        funcs.push(ctx.resolve_func(func));
    }

    ResolveResult {
        module: Module { ctx: ctx.ir, funcs },
        diagnostics: ctx.diagnostics,
    }
}

// ── Internal context ────────────────────────────────────────────────────────

/// Values bound by one name: a single value, or all results of an `%r:N` group.
type Binding = Vec<ValueId>;

struct ResolveCtx {
    ir: IrContext,
    scopes: Vec<HashMap<String, Binding>>,
    lines: LineIndex,
    diagnostics: Vec<Diagnostic>,
}

impl ResolveCtx {
    fn loc(&self, span: Span) -> Location {
        self.lines.location(span.start)
    }

    fn error(&mut self, span: Span, code: crate::diag::DiagCode, message: String) {
        let loc = self.loc(span);
        self.diagnostics.emit(Diagnostic::error(loc, message).with_code(code));
    }

    // ── Scopes ──

    fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    fn define(&mut self, name: &Name, binding: Binding) {
        if self.lookup(&name.text).is_some() {
            self.error(
                name.span,
                codes::E0002,
                format!("redefinition of SSA value '{}'", name.text),
            );
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.text.clone(), binding);
        }
    }

    // ── Functions ──

    fn resolve_func(&mut self, func: &FuncAst) -> Func {
        // Function bodies are isolated from above.
        let saved = std::mem::take(&mut self.scopes);
        self.scopes.push(HashMap::new());

        let entry = self.ir.create_block(func.args.iter().map(|a| a.ty.clone()));
        let params = self.ir.block(entry).args.clone();
        for (arg, value) in func.args.iter().zip(params) {
            self.define(&arg.name, vec![value]);
        }

        let mut blocks = vec![entry];
        let mut ast_blocks = func.body.blocks.iter();
        if let Some(first) = ast_blocks.next() {
            if !first.args.is_empty() {
                self.error(
                    first.span,
                    codes::E0003,
                    "the entry block of a function takes its arguments from the signature"
                        .to_string(),
                );
            }
            self.resolve_ops(entry, &first.ops, Some(func.results.as_slice()));
        }
        for block in ast_blocks {
            blocks.push(self.resolve_block(block, Some(func.results.as_slice())));
        }
        let body = self.ir.create_region(blocks);

        self.scopes = saved;
        Func {
            name: func.name.text[1..].to_string(),
            result_types: func.results.clone(),
            body,
            location: self.loc(func.span),
        }
    }

    // ── Regions and blocks ──

    fn resolve_region(&mut self, region: &RegionAst) -> RegionId {
        self.scopes.push(HashMap::new());
        let blocks = region
            .blocks
            .iter()
            .map(|b| self.resolve_block(b, None))
            .collect();
        self.scopes.pop();
        self.ir.create_region(blocks)
    }

    fn resolve_block(&mut self, block: &BlockAst, func_results: Option<&[Type]>) -> BlockId {
        let id = self.ir.create_block(block.args.iter().map(|a| a.ty.clone()));
        let values = self.ir.block(id).args.clone();
        for (arg, value) in block.args.iter().zip(values) {
            self.define(&arg.name, vec![value]);
        }
        self.resolve_ops(id, &block.ops, func_results);
        id
    }

    fn resolve_ops(&mut self, block: BlockId, ops: &[OpAst], func_results: Option<&[Type]>) {
        for op in ops {
            self.resolve_op(block, op, func_results);
        }
    }

    // ── Operations ──

    fn resolve_op(&mut self, block: BlockId, op: &OpAst, func_results: Option<&[Type]>) {
        let operands: Vec<ValueId> = op
            .operands
            .iter()
            .filter_map(|r| self.resolve_use(r))
            .collect();

        self.check_operands(op, &operands);
        if op.name == "func.return" {
            if let Some(expected) = func_results {
                self.check_return(op, expected);
            }
        }
        if op.num_results() != op.signature.outputs.len() {
            self.error(
                op.span,
                codes::E0005,
                format!(
                    "'{}' binds {} result(s), but its signature produces {}",
                    op.name,
                    op.num_results(),
                    op.signature.outputs.len()
                ),
            );
        }

        for (i, entry) in op.attributes.iter().enumerate() {
            if op.attributes[..i].iter().any(|a| a.name == entry.name) {
                self.error(
                    entry.span,
                    codes::E0007,
                    format!("duplicate attribute '{}' on '{}'", entry.name, op.name),
                );
            }
        }

        // An op's results are not visible inside its own regions.
        let regions: Vec<RegionId> = op.regions.iter().map(|r| self.resolve_region(r)).collect();

        let state = OperationState::new(op.name.clone(), self.loc(op.span))
            .operands(operands)
            .results(op.signature.outputs.iter().cloned())
            .attributes(
                op.attributes
                    .iter()
                    .map(|a| NamedAttribute::new(a.name.clone(), a.value.clone())),
            )
            .regions(regions);
        let id = self.ir.create_op(state);
        self.ir.append_op(block, id);

        let mut results = self.ir.op(id).results.clone().into_iter();
        for group in &op.results {
            let binding: Binding = results.by_ref().take(group.count as usize).collect();
            self.define(&group.name, binding);
        }
    }

    fn resolve_use(&mut self, r: &ValueRef) -> Option<ValueId> {
        let Some(binding) = self.lookup(&r.name).cloned() else {
            self.error(
                r.span,
                codes::E0001,
                format!("use of undefined value '{}'", r.name),
            );
            return None;
        };
        match (r.index, binding.len()) {
            (None, 1) => Some(binding[0]),
            (None, n) => {
                self.error(
                    r.span,
                    codes::E0006,
                    format!("'{}' names {n} results; select one with '{}#<index>'", r.name, r.name),
                );
                None
            }
            (Some(i), n) if (i as usize) < n => Some(binding[i as usize]),
            (Some(i), n) => {
                self.error(
                    r.span,
                    codes::E0006,
                    format!("result index {i} is out of range for '{}' ({n} result(s))", r.name),
                );
                None
            }
        }
    }

    fn check_operands(&mut self, op: &OpAst, operands: &[ValueId]) {
        if op.operands.len() != op.signature.inputs.len() {
            self.error(
                op.span,
                codes::E0003,
                format!(
                    "'{}' has {} operand(s), but its signature lists {} type(s)",
                    op.name,
                    op.operands.len(),
                    op.signature.inputs.len()
                ),
            );
            return;
        }
        // Unresolved operands were already reported; compare only when all resolved.
        if operands.len() != op.operands.len() {
            return;
        }
        for (i, (&value, expected)) in operands.iter().zip(&op.signature.inputs).enumerate() {
            let actual = self.ir.value_type(value).clone();
            if &actual != expected {
                self.error(
                    op.operands[i].span,
                    codes::E0004,
                    format!(
                        "operand #{i} of '{}' has type {actual}, but the signature says {expected}",
                        op.name
                    ),
                );
            }
        }
    }

    fn check_return(&mut self, op: &OpAst, expected: &[Type]) {
        if op.signature.inputs.as_slice() != expected {
            let render = |types: &[Type]| {
                types
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            self.error(
                op.span,
                codes::E0004,
                format!(
                    "return types ({}) do not match the function results ({})",
                    render(&op.signature.inputs),
                    render(expected)
                ),
            );
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::{DiagCode, DiagLevel};

    fn resolve_source(source: &str) -> ResolveResult {
        let result = crate::parser::parse(source);
        assert!(
            result.errors.is_empty(),
            "parse errors in test: {:?}",
            result.errors
        );
        let module = result.module.expect("parse failed in test");
        resolve(&module, source)
    }

    fn resolve_ok(source: &str) -> Module {
        let result = resolve_source(source);
        assert!(
            result.diagnostics.iter().all(|d| d.level != DiagLevel::Error),
            "unexpected errors: {:#?}",
            result.diagnostics
        );
        result.module
    }

    fn error_codes(source: &str) -> Vec<DiagCode> {
        resolve_source(source)
            .diagnostics
            .iter()
            .filter(|d| d.level == DiagLevel::Error)
            .filter_map(|d| d.code)
            .collect()
    }

    const CHAIN: &str = "func.func @main(%arg0: tensor<2xf32>) -> tensor<2xf32> {
  %0 = \"stablehlo.abs\"(%arg0) : (tensor<2xf32>) -> tensor<2xf32>
  %1 = \"stablehlo.negate\"(%0) : (tensor<2xf32>) -> tensor<2xf32>
  return %1 : tensor<2xf32>
}";

    #[test]
    fn builds_use_def_chain() {
        let m = resolve_ok(CHAIN);
        let f = m.func("main").expect("main");
        let ops = m.ctx.walk_post_order(f.body);
        assert_eq!(ops.len(), 3);
        let abs = m.ctx.op(ops[0]);
        let neg = m.ctx.op(ops[1]);
        assert_eq!(abs.name, "stablehlo.abs");
        assert_eq!(neg.operands, abs.results);
        let entry = m.ctx.region(f.body).blocks[0];
        assert_eq!(abs.operands, m.ctx.block(entry).args);
    }

    #[test]
    fn locations_come_from_source_lines() {
        let m = resolve_ok(CHAIN);
        let ops = m.all_ops();
        assert_eq!(m.ctx.op(ops[0]).location, Location::new(2, 3));
        assert_eq!(m.funcs[0].location, Location::new(1, 1));
    }

    #[test]
    fn multi_result_groups_and_indexing() {
        let m = resolve_ok(
            "func.func @f(%a: tensor<f32>) -> tensor<f32> {
  %0:2 = \"stablehlo.pair\"(%a) : (tensor<f32>) -> (tensor<f32>, tensor<f32>)
  return %0#1 : tensor<f32>
}",
        );
        let ops = m.all_ops();
        let pair = m.ctx.op(ops[0]);
        assert_eq!(m.ctx.op(ops[1]).operands, vec![pair.results[1]]);
    }

    #[test]
    fn nested_region_sees_outer_values() {
        let m = resolve_ok(
            "func.func @f(%a: tensor<f32>) -> tensor<f32> {
  %0 = \"stablehlo.wrap\"() ({
    \"stablehlo.return\"(%a) : (tensor<f32>) -> ()
  }) : () -> tensor<f32>
  return %0 : tensor<f32>
}",
        );
        assert_eq!(m.ctx.num_ops(), 3);
    }

    #[test]
    fn undefined_value() {
        assert_eq!(
            error_codes(
                "func.func @f() {
  \"stablehlo.use\"(%nope) : (tensor<f32>) -> ()
  return
}"
            ),
            vec![codes::E0001]
        );
    }

    #[test]
    fn redefinition() {
        assert_eq!(
            error_codes(
                "func.func @f(%a: tensor<f32>) {
  %a = \"stablehlo.abs\"(%a) : (tensor<f32>) -> tensor<f32>
  return
}"
            ),
            vec![codes::E0002]
        );
    }

    #[test]
    fn operand_count_mismatch() {
        assert_eq!(
            error_codes(
                "func.func @f(%a: tensor<f32>) {
  \"stablehlo.use\"(%a, %a) : (tensor<f32>) -> ()
  return
}"
            ),
            vec![codes::E0003]
        );
    }

    #[test]
    fn operand_type_mismatch() {
        assert_eq!(
            error_codes(
                "func.func @f(%a: tensor<f32>) {
  \"stablehlo.use\"(%a) : (tensor<i32>) -> ()
  return
}"
            ),
            vec![codes::E0004]
        );
    }

    #[test]
    fn return_type_mismatch() {
        assert_eq!(
            error_codes(
                "func.func @f(%a: tensor<f32>) -> tensor<i32> {
  return %a : tensor<f32>
}"
            ),
            vec![codes::E0004]
        );
    }

    #[test]
    fn result_count_mismatch() {
        assert_eq!(
            error_codes(
                "func.func @f(%a: tensor<f32>) {
  %0:2 = \"stablehlo.abs\"(%a) : (tensor<f32>) -> tensor<f32>
  return
}"
            ),
            vec![codes::E0005]
        );
    }

    #[test]
    fn multi_result_used_without_index() {
        assert_eq!(
            error_codes(
                "func.func @f(%a: tensor<f32>) {
  %0:2 = \"stablehlo.pair\"(%a) : (tensor<f32>) -> (tensor<f32>, tensor<f32>)
  \"stablehlo.use\"(%0) : (tensor<f32>) -> ()
  return
}"
            ),
            vec![codes::E0006]
        );
    }

    #[test]
    fn duplicate_attribute() {
        assert_eq!(
            error_codes(
                "func.func @f() {
  \"stablehlo.use\"() {k = 1, k = 2} : () -> ()
  return
}"
            ),
            vec![codes::E0007]
        );
    }

    #[test]
    fn duplicate_function() {
        assert_eq!(
            error_codes("func.func @f() {\n  return\n}\nfunc.func @f() {\n  return\n}"),
            vec![codes::E0002]
        );
    }

    #[test]
    fn resolution_continues_after_errors() {
        let result = resolve_source(
            "func.func @f() {
  \"stablehlo.use\"(%x) : (tensor<f32>) -> ()
  \"stablehlo.use\"(%y) : (tensor<f32>) -> ()
  return
}",
        );
        assert_eq!(result.diagnostics.len(), 2);
        assert!(result.diagnostics[1].message.contains("%y"));
    }
}
