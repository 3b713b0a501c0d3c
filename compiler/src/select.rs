// select.rs — Node selector
//
// Decides whether an operation is rewritten and, if so, under which custom
// code and with which attributes. Composites are unwrapped to their declared
// name only when that name is on the allow-list.
//
// Preconditions: `op` is live in `ctx`.
// Postconditions: `None` for ineligible ops; otherwise a name and the
//   attribute list to encode, in declaration order.
// Failure modes: none; unknown composites fall back to the raw op.
// Side effects: emits W0201 for composites without a specialization.

use crate::attr::{Attribute, NamedAttribute};
use crate::diag::{codes, DiagSink, Diagnostic};
use crate::id::OpId;
use crate::ir::IrContext;
use crate::legalize::LegalizeConfig;

/// Op name suffix of the composite wrapper within the source dialect.
const COMPOSITE_OP: &str = "composite";

/// What a selected op becomes.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection<'a> {
    /// Effective name, written as `custom_code`.
    pub custom_code: String,
    /// Attributes to encode into `custom_option`.
    pub attributes: &'a [NamedAttribute],
}

pub fn select<'a>(
    ctx: &'a IrContext,
    op: OpId,
    config: &LegalizeConfig,
    sink: &mut dyn DiagSink,
) -> Option<Selection<'a>> {
    let data = ctx.op(op);
    if data.dialect() != config.source_dialect {
        return None;
    }

    let is_composite = data
        .name
        .strip_prefix(config.source_dialect.as_str())
        .and_then(|rest| rest.strip_prefix('.'))
        == Some(COMPOSITE_OP);
    if is_composite {
        let declared = data.attribute("name").and_then(Attribute::as_str);
        match declared {
            Some(name) if config.composites.contains(name) => {
                let attributes = data
                    .attribute("composite_attributes")
                    .and_then(Attribute::as_dictionary)
                    .unwrap_or(&[]);
                return Some(Selection {
                    custom_code: name.to_string(),
                    attributes,
                });
            }
            Some(name) => sink.emit(
                Diagnostic::warning(
                    data.location,
                    format!("composite has no specialization: {name}"),
                )
                .with_code(codes::W0201)
                .with_hint(format!(
                    "legalized as '{}'; add '{name}' to the composite allow-list to use its own kernel",
                    data.name
                )),
            ),
            None => sink.emit(
                Diagnostic::warning(data.location, "composite has no string 'name' attribute")
                    .with_code(codes::W0201),
            ),
        }
    }

    Some(Selection {
        custom_code: data.name.clone(),
        attributes: &data.attributes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Diagnostic;
    use crate::ir::OperationState;
    use crate::location::Location;
    use crate::registry::CompositeAllowList;

    fn single_op(state: OperationState) -> (IrContext, OpId) {
        let mut ctx = IrContext::new();
        let op = ctx.create_op(state);
        (ctx, op)
    }

    fn composite(name: &str, attrs: Vec<NamedAttribute>) -> OperationState {
        OperationState::new("stablehlo.composite", Location::new(3, 5))
            .attribute("name", Attribute::string(name))
            .attribute("composite_attributes", Attribute::Dictionary(attrs))
            .attribute("decomposition", Attribute::SymbolRef("impl".into()))
    }

    #[test]
    fn other_dialects_are_ineligible() {
        let config = LegalizeConfig::default();
        let mut diags: Vec<Diagnostic> = Vec::new();
        for name in ["func.return", "tfl.custom", "stablehlox.abs", "arith.constant"] {
            let (ctx, op) = single_op(OperationState::new(name, Location::unknown()));
            assert_eq!(select(&ctx, op, &config, &mut diags), None, "{name}");
        }
        assert!(diags.is_empty());
    }

    #[test]
    fn plain_op_keeps_name_and_attributes() {
        let (ctx, op) = single_op(
            OperationState::new("stablehlo.transpose", Location::unknown())
                .attribute("permutation", Attribute::DenseI64Array(vec![1, 0]))
                .attribute("b", Attribute::int(1)),
        );
        let mut diags: Vec<Diagnostic> = Vec::new();
        let sel = select(&ctx, op, &LegalizeConfig::default(), &mut diags).unwrap();
        assert_eq!(sel.custom_code, "stablehlo.transpose");
        let names: Vec<&str> = sel.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["permutation", "b"]);
        assert!(diags.is_empty());
    }

    #[test]
    fn allow_listed_composite_is_unwrapped() {
        let (ctx, op) = single_op(composite(
            "odml.update_kv_cache",
            vec![NamedAttribute::new("cache_size", Attribute::int(512))],
        ));
        let mut diags: Vec<Diagnostic> = Vec::new();
        let sel = select(&ctx, op, &LegalizeConfig::default(), &mut diags).unwrap();
        assert_eq!(sel.custom_code, "odml.update_kv_cache");
        assert_eq!(sel.attributes.len(), 1);
        assert_eq!(sel.attributes[0].name, "cache_size");
        assert!(diags.is_empty());
    }

    #[test]
    fn allow_listed_composite_without_attributes() {
        let (ctx, op) = single_op(
            OperationState::new("stablehlo.composite", Location::unknown())
                .attribute("name", Attribute::string("odml.scaled_dot_product_attention")),
        );
        let mut diags: Vec<Diagnostic> = Vec::new();
        let sel = select(&ctx, op, &LegalizeConfig::default(), &mut diags).unwrap();
        assert_eq!(sel.custom_code, "odml.scaled_dot_product_attention");
        assert!(sel.attributes.is_empty());
    }

    #[test]
    fn unknown_composite_falls_back_with_warning() {
        let (ctx, op) = single_op(composite("odml.rms_norm", vec![]));
        let mut diags: Vec<Diagnostic> = Vec::new();
        let sel = select(&ctx, op, &LegalizeConfig::default(), &mut diags).unwrap();
        assert_eq!(sel.custom_code, "stablehlo.composite");
        assert_eq!(sel.attributes.len(), 3);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, Some(codes::W0201));
        assert!(diags[0].message.contains("odml.rms_norm"));
        assert_eq!(diags[0].location, Location::new(3, 5));
    }

    #[test]
    fn extra_composites_extend_the_allow_list() {
        let (ctx, op) = single_op(composite("odml.rms_norm", vec![]));
        let config = LegalizeConfig {
            composites: CompositeAllowList::with_extra(["odml.rms_norm"]),
            ..LegalizeConfig::default()
        };
        let mut diags: Vec<Diagnostic> = Vec::new();
        let sel = select(&ctx, op, &config, &mut diags).unwrap();
        assert_eq!(sel.custom_code, "odml.rms_norm");
        assert!(diags.is_empty());
    }

    #[test]
    fn composite_without_name_warns() {
        let (ctx, op) = single_op(OperationState::new("stablehlo.composite", Location::unknown()));
        let mut diags: Vec<Diagnostic> = Vec::new();
        let sel = select(&ctx, op, &LegalizeConfig::default(), &mut diags).unwrap();
        assert_eq!(sel.custom_code, "stablehlo.composite");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, Some(codes::W0201));
    }

    #[test]
    fn source_dialect_is_configurable() {
        let config = LegalizeConfig {
            source_dialect: "mhlo".into(),
            ..LegalizeConfig::default()
        };
        let mut diags: Vec<Diagnostic> = Vec::new();
        let (ctx, op) = single_op(OperationState::new("mhlo.abs", Location::unknown()));
        assert!(select(&ctx, op, &config, &mut diags).is_some());
        let (ctx, op) = single_op(OperationState::new("stablehlo.abs", Location::unknown()));
        assert!(select(&ctx, op, &config, &mut diags).is_none());
    }
}
