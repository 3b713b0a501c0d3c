// legalize.rs — StableHLO → TFLite custom-op rewrite driver
//
// Walks every function body and replaces each eligible op by a custom op
// carrying the op's effective name and its attributes serialized as a
// FlexBuffers blob. Operands, result types and location carry over, so the
// replacement is a drop-in for every use.
//
// Preconditions: the module was built by `resolve` (use lists consistent).
// Postconditions: no live op of `config.source_dialect` remains; one
//   `RewriteRecord` per replaced op, in walk order.
// Failure modes: none; attribute and composite problems are warnings.
// Side effects: mutates the module in place, emits diagnostics.

use tracing::{debug, instrument};

use crate::attr::Attribute;
use crate::diag::{DiagSink, Diagnostic};
use crate::encode::encode_options;
use crate::id::RegionId;
use crate::ir::{IrContext, Module, OperationState};
use crate::location::Location;
use crate::registry::CompositeAllowList;
use crate::select::select;

// ── Configuration ──────────────────────────────────────────────────────────

/// Pass argument, as registered with a pass manager.
pub const PASS_ARGUMENT: &str = "stablehlo-tfl";
/// One-line pass description.
pub const PASS_DESCRIPTION: &str = "Legalize StableHLO ops to TFLite custom ops.";

/// Knobs of the rewrite. `Default` reproduces the stock pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegalizeConfig {
    /// Dialect namespace whose ops are rewritten.
    pub source_dialect: String,
    /// Name of the replacement op.
    pub custom_op: String,
    /// Composites legalized under their own declared name.
    pub composites: CompositeAllowList,
}

impl Default for LegalizeConfig {
    fn default() -> Self {
        Self {
            source_dialect: "stablehlo".to_string(),
            custom_op: "tfl.custom".to_string(),
            composites: CompositeAllowList::builtin(),
        }
    }
}

impl LegalizeConfig {
    /// Compact JSON with sorted keys; the input of the provenance fingerprint.
    pub fn canonical_json(&self) -> String {
        serde_json::json!({
            "source_dialect": self.source_dialect,
            "custom_op": self.custom_op,
            "composites": self.composites.iter().collect::<Vec<_>>(),
        })
        .to_string()
    }
}

// ── Result types ───────────────────────────────────────────────────────────

/// One replaced operation.
#[derive(Debug, Clone, PartialEq)]
pub struct RewriteRecord {
    /// Enclosing function.
    pub function: String,
    /// Name of the op that was replaced.
    pub source_op: String,
    /// `custom_code` of the replacement.
    pub custom_code: String,
    pub location: Location,
    /// `custom_option` of the replacement.
    pub options: Vec<u8>,
}

#[derive(Debug)]
pub struct LegalizeResult {
    pub rewrites: Vec<RewriteRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

// ── Driver ─────────────────────────────────────────────────────────────────

/// Legalize every function of `module` in place.
pub fn legalize_module(module: &mut Module, config: &LegalizeConfig) -> LegalizeResult {
    let mut diagnostics = Vec::new();
    let mut rewrites = Vec::new();
    for func in &module.funcs {
        rewrites.extend(legalize_region(
            &mut module.ctx,
            func.body,
            &func.name,
            config,
            &mut diagnostics,
        ));
    }
    LegalizeResult {
        rewrites,
        diagnostics,
    }
}

/// Legalize all ops nested under `region`, innermost first.
///
/// The walk is a snapshot: replacements created here are never revisited,
/// and an op erased together with an enclosing op is skipped.
#[instrument(skip(ctx, config, sink), fields(ops = tracing::field::Empty))]
pub fn legalize_region(
    ctx: &mut IrContext,
    region: RegionId,
    function: &str,
    config: &LegalizeConfig,
    sink: &mut dyn DiagSink,
) -> Vec<RewriteRecord> {
    let order = ctx.walk_post_order(region);
    tracing::Span::current().record("ops", order.len());

    let mut rewrites = Vec::new();
    for op in order {
        if !ctx.is_live(op) {
            continue;
        }
        let Some(selection) = select(ctx, op, config, sink) else {
            continue;
        };
        let data = ctx.op(op);
        let location = data.location;
        let options = encode_options(selection.attributes, location, sink);
        let custom_code = selection.custom_code;
        let source_op = data.name.clone();

        let result_types: Vec<_> = data
            .results
            .iter()
            .map(|&r| ctx.value_type(r).clone())
            .collect();
        let state = OperationState::new(config.custom_op.as_str(), location)
            .operands(data.operands.clone())
            .results(result_types)
            .attribute("custom_code", Attribute::String(custom_code.clone()))
            .attribute("custom_option", Attribute::Bytes(options.clone()));

        let replacement = ctx.create_op(state);
        ctx.insert_op_before(op, replacement);
        ctx.replace_op(op, replacement);

        debug!(
            %function,
            %location,
            op = %source_op,
            %custom_code,
            option_bytes = options.len(),
            "rewrote op"
        );
        rewrites.push(RewriteRecord {
            function: function.to_string(),
            source_op,
            custom_code,
            location,
            options,
        });
    }
    rewrites
}
