// printer.rs — Textual IR output
//
// Prints a module in the same generic form the parser accepts, renaming
// values the way MLIR does: function and block arguments become `%argN`,
// op results `%N` in program order, multi-result ops `%N:k` with uses
// `%N#i`. Output is a pure function of the IR, so printing the same module
// twice yields identical text.

use std::collections::HashMap;
use std::fmt::{self, Write as _};

use crate::attr::{is_bare_identifier, write_string_literal, Attribute, NamedAttribute};
use crate::id::{BlockId, OpId, RegionId, ValueId};
use crate::ir::{Func, IrContext, Module};
use crate::types::Type;

/// Text that replaces byte blobs when `elide_bytes` is set.
pub const ELIDED_BYTES: &str = "#tfl<const_bytes : __elided__>";

#[derive(Debug, Clone, Copy, Default)]
pub struct PrintOptions {
    /// Print `#tfl<const_bytes : __elided__>` instead of blob contents.
    pub elide_bytes: bool,
}

/// Render `module` to text.
pub fn print_module(module: &Module, options: PrintOptions) -> String {
    let mut out = String::new();
    out.push_str("module {\n");
    for func in &module.funcs {
        let mut printer = FuncPrinter {
            ctx: &module.ctx,
            options,
            names: HashMap::new(),
            next_result: 0,
            next_arg: 0,
            out: &mut out,
        };
        printer.print_func(func);
    }
    out.push_str("}\n");
    out
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&print_module(self, PrintOptions::default()))
    }
}

fn type_list(types: &[Type]) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `T` for one result, `(T, U)` otherwise.
fn result_list(types: &[Type]) -> String {
    match types {
        [single] => single.to_string(),
        _ => format!("({})", type_list(types)),
    }
}

struct FuncPrinter<'a> {
    ctx: &'a IrContext,
    options: PrintOptions,
    names: HashMap<ValueId, String>,
    next_result: usize,
    next_arg: usize,
    out: &'a mut String,
}

impl FuncPrinter<'_> {
    fn indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.out.push_str("  ");
        }
    }

    fn name_arg(&mut self, value: ValueId) -> String {
        let name = format!("%arg{}", self.next_arg);
        self.next_arg += 1;
        self.names.insert(value, name.clone());
        name
    }

    fn value(&self, value: ValueId) -> &str {
        self.names
            .get(&value)
            .map(String::as_str)
            .unwrap_or("%<<UNKNOWN>>")
    }

    fn print_func(&mut self, func: &Func) {
        let ctx = self.ctx;
        let region = ctx.region(func.body);
        let entry = region.blocks.first().copied();

        let mut params = Vec::new();
        if let Some(entry) = entry {
            for &arg in &self.ctx.block(entry).args.clone() {
                let name = self.name_arg(arg);
                params.push(format!("{name}: {}", self.ctx.value_type(arg)));
            }
        }
        let _ = write!(self.out, "  func.func @{}({})", func.name, params.join(", "));
        if !func.result_types.is_empty() {
            let _ = write!(self.out, " -> {}", result_list(&func.result_types));
        }
        self.out.push_str(" {\n");
        for (i, &block) in region.blocks.iter().enumerate() {
            if i > 0 {
                self.print_block_header(block, i, 1);
            }
            self.print_ops(block, 2);
        }
        self.out.push_str("  }\n");
    }

    fn print_block_header(&mut self, block: BlockId, index: usize, depth: usize) {
        let args: Vec<String> = self
            .ctx
            .block(block)
            .args
            .clone()
            .into_iter()
            .map(|arg| {
                let name = self.name_arg(arg);
                format!("{name}: {}", self.ctx.value_type(arg))
            })
            .collect();
        self.indent(depth);
        let _ = write!(self.out, "^bb{index}");
        if !args.is_empty() {
            let _ = write!(self.out, "({})", args.join(", "));
        }
        self.out.push_str(":\n");
    }

    fn print_ops(&mut self, block: BlockId, depth: usize) {
        let ctx = self.ctx;
        for &op in &ctx.block(block).ops {
            self.print_op(op, depth);
        }
    }

    fn print_region(&mut self, region: RegionId, depth: usize) {
        self.out.push_str("{\n");
        let ctx = self.ctx;
        let blocks = &ctx.region(region).blocks;
        for (i, &block) in blocks.iter().enumerate() {
            if i > 0 || !self.ctx.block(block).args.is_empty() {
                self.print_block_header(block, i, depth);
            }
            self.print_ops(block, depth + 1);
        }
        self.indent(depth);
        self.out.push('}');
    }

    fn print_op(&mut self, op: OpId, depth: usize) {
        let ctx = self.ctx;
        let data = ctx.op(op);
        self.indent(depth);

        if data.name == "func.return" {
            self.out.push_str("return");
            if !data.operands.is_empty() {
                let operands: Vec<String> =
                    data.operands.iter().map(|&v| self.value(v).to_string()).collect();
                let types: Vec<Type> = data
                    .operands
                    .iter()
                    .map(|&v| self.ctx.value_type(v).clone())
                    .collect();
                let _ = write!(self.out, " {} : {}", operands.join(", "), type_list(&types));
            }
            self.out.push('\n');
            return;
        }

        let operands: Vec<String> = data.operands.iter().map(|&v| self.value(v).to_string()).collect();
        let operand_types: Vec<Type> = data
            .operands
            .iter()
            .map(|&v| self.ctx.value_type(v).clone())
            .collect();
        let result_types: Vec<Type> = data
            .results
            .iter()
            .map(|&v| self.ctx.value_type(v).clone())
            .collect();

        // Results are named before regions so numbering follows program order.
        if !data.results.is_empty() {
            let base = format!("%{}", self.next_result);
            self.next_result += 1;
            if data.results.len() == 1 {
                self.names.insert(data.results[0], base.clone());
                let _ = write!(self.out, "{base} = ");
            } else {
                for (i, &r) in data.results.iter().enumerate() {
                    self.names.insert(r, format!("{base}#{i}"));
                }
                let _ = write!(self.out, "{base}:{} = ", data.results.len());
            }
        }

        self.out.push('"');
        self.out.push_str(&data.name);
        self.out.push('"');
        let _ = write!(self.out, "({})", operands.join(", "));

        if !data.regions.is_empty() {
            self.out.push_str(" (");
            for (i, &region) in data.regions.iter().enumerate() {
                if i > 0 {
                    self.out.push_str(", ");
                }
                self.print_region(region, depth);
            }
            self.out.push(')');
        }

        if !data.attributes.is_empty() {
            self.out.push_str(" {");
            self.print_attributes(&data.attributes);
            self.out.push('}');
        }

        let _ = writeln!(
            self.out,
            " : ({}) -> {}",
            type_list(&operand_types),
            result_list(&result_types)
        );
    }

    fn print_attributes(&mut self, attrs: &[NamedAttribute]) {
        for (i, entry) in attrs.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            if is_bare_identifier(&entry.name) {
                self.out.push_str(&entry.name);
            } else {
                let _ = write_string_literal(&mut *self.out, &entry.name);
            }
            match &entry.value {
                Attribute::Unit => {}
                Attribute::Bytes(_) if self.options.elide_bytes => {
                    let _ = write!(self.out, " = {ELIDED_BYTES}");
                }
                value => {
                    let _ = write!(self.out, " = {value}");
                }
            }
        }
    }
}
