// encode.rs — Attribute → FlexBuffers option encoder
//
// Serializes an ordered attribute list into one FlexBuffers map keyed by
// attribute name. The blob becomes the `custom_option` payload of the
// replacement op and is the contract with the downstream kernel, so the
// per-shape layouts below must never change.
//
// Preconditions: attribute names are unique within `attrs`.
// Postconditions: the returned bytes are a finished FlexBuffers map; every
//   supported attribute has exactly one entry under its own name.
// Failure modes: unsupported shapes are skipped (or written as an empty
//   vector) with a warning; encoding never fails as a whole.
// Side effects: emits diagnostics into `sink`.

use crate::attr::{
    sign_extend, Attribute, ConvDimensionNumbers, DenseElementsAttr, DotDimensionNumbers,
    GatherDimensionNumbers, NamedAttribute, ScatterDimensionNumbers,
};
use crate::diag::{codes, DiagSink, Diagnostic};
use crate::flexbuf::Writer;
use crate::location::Location;
use crate::types::{ElementType, FloatType};

/// Integer element widths accepted in dense elements.
const DENSE_INT_WIDTHS: &[u32] = &[1, 16, 32, 64, 128];

/// Encode `attrs` as a FlexBuffers map. Diagnostics are reported at `location`.
pub fn encode_options(
    attrs: &[NamedAttribute],
    location: Location,
    sink: &mut dyn DiagSink,
) -> Vec<u8> {
    let mut w = Writer::new();
    let map = w.start();
    for (i, attr) in attrs.iter().enumerate() {
        if attrs[..i].iter().any(|a| a.name == attr.name) {
            sink.emit(
                Diagnostic::warning(
                    location,
                    format!("duplicate option key '{}'; keeping the first value", attr.name),
                )
                .with_code(codes::W0104),
            );
            continue;
        }
        encode_attribute(&mut w, attr, location, sink);
    }
    w.end_map(map);
    w.finish()
}

// Every array-valued attribute is a variable-length typed vector; the
// positional records and their nested index lists are untyped vectors.
fn encode_attribute(
    w: &mut Writer,
    attr: &NamedAttribute,
    location: Location,
    sink: &mut dyn DiagSink,
) {
    let key = attr.name.as_str();
    match &attr.value {
        Attribute::Integer(i) => {
            w.key(key);
            w.int(i.signed_value());
        }
        Attribute::Float(f) => {
            w.key(key);
            w.float(f.value);
        }
        Attribute::DenseElements(dense) => {
            w.key(key);
            let vec = w.start();
            if !push_dense(w, dense) {
                sink.emit(
                    Diagnostic::warning(
                        location,
                        format!(
                            "attribute '{key}': dense elements of type {} are not supported; \
                             writing an empty vector",
                            dense.element_type()
                        ),
                    )
                    .with_code(codes::W0102)
                    .with_hint("only integer widths 1/16/32/64/128 and f32/f64/f128 are encoded"),
                );
            }
            w.end_vector(vec, true);
        }
        Attribute::DenseI64Array(values) => {
            w.key(key);
            let vec = w.start();
            values.iter().for_each(|&v| w.int(v));
            w.end_vector(vec, true);
        }
        Attribute::DenseBoolArray(values) => {
            w.key(key);
            let vec = w.start();
            values.iter().for_each(|&v| w.bool(v));
            w.end_vector(vec, true);
        }
        Attribute::String(s) => {
            w.key(key);
            w.string(s);
        }
        Attribute::Array(items) => {
            w.key(key);
            let vec = w.start();
            match string_array(items) {
                Ok(strings) => strings.iter().for_each(|s| w.string(s)),
                Err(found) => sink.emit(
                    Diagnostic::warning(
                        location,
                        format!(
                            "attribute '{key}': arrays may only hold strings or precision \
                             values, found {found}; writing an empty vector"
                        ),
                    )
                    .with_code(codes::W0103),
                ),
            }
            w.end_vector(vec, true);
        }
        Attribute::ConvDimensionNumbers(conv) => {
            w.key(key);
            let vec = w.start();
            push_conv(w, conv);
            w.end_vector(vec, false);
        }
        Attribute::GatherDimensionNumbers(gather) => {
            w.key(key);
            let vec = w.start();
            push_gather(w, gather);
            w.end_vector(vec, false);
        }
        Attribute::ScatterDimensionNumbers(scatter) => {
            w.key(key);
            let vec = w.start();
            push_scatter(w, scatter);
            w.end_vector(vec, false);
        }
        Attribute::DotDimensionNumbers(dot) => {
            w.key(key);
            let vec = w.start();
            push_dot(w, dot);
            w.end_vector(vec, false);
        }
        Attribute::ComparisonDirection(d) => {
            w.key(key);
            w.string(d.as_str());
        }
        Attribute::ComparisonType(t) => {
            w.key(key);
            w.string(t.as_str());
        }
        Attribute::Unit
        | Attribute::Type(_)
        | Attribute::SymbolRef(_)
        | Attribute::Dictionary(_)
        | Attribute::Bytes(_)
        | Attribute::DenseArray { .. }
        | Attribute::Precision(_)
        | Attribute::DialectEnum { .. }
        | Attribute::Record { .. } => sink.emit(
            Diagnostic::warning(
                location,
                format!(
                    "serialization not supported for attribute '{key}' ({})",
                    attr.value.kind_name()
                ),
            )
            .with_code(codes::W0101),
        ),
    }
}

/// Push the logical values of `dense`; returns false (pushing nothing) for
/// unsupported element types. Integers are read back signed at their
/// declared width, so an i1 `true` is -1.
fn push_dense(w: &mut Writer, dense: &DenseElementsAttr) -> bool {
    let element = dense.element_type();
    let supported = match element {
        ElementType::Int(it) => DENSE_INT_WIDTHS.contains(&it.width),
        ElementType::Float(ft) => matches!(ft, FloatType::F32 | FloatType::F64 | FloatType::F128),
        ElementType::Index => false,
    };
    if !supported {
        return false;
    }
    if let Some(ints) = dense.int_values() {
        ints.for_each(|v| w.int(sign_extend(v, element)));
    } else if let Some(floats) = dense.float_values() {
        floats.for_each(|v| w.float(v));
    }
    true
}

/// All elements as strings, or the kind name of the first offending element.
fn string_array(items: &[Attribute]) -> Result<Vec<&str>, &'static str> {
    items
        .iter()
        .map(|item| match item {
            Attribute::String(s) => Ok(s.as_str()),
            Attribute::Precision(p) => Ok(p.as_str()),
            other => Err(other.kind_name()),
        })
        .collect()
}

fn push_ints(w: &mut Writer, values: &[i64]) {
    let nested = w.start();
    values.iter().for_each(|&v| w.int(v));
    w.end_vector(nested, false);
}

fn push_conv(w: &mut Writer, conv: &ConvDimensionNumbers) {
    w.int(conv.input_batch_dimension);
    w.int(conv.input_feature_dimension);
    push_ints(w, &conv.input_spatial_dimensions);
    w.int(conv.kernel_input_feature_dimension);
    w.int(conv.kernel_output_feature_dimension);
    push_ints(w, &conv.kernel_spatial_dimensions);
    w.int(conv.output_batch_dimension);
    w.int(conv.output_feature_dimension);
    push_ints(w, &conv.output_spatial_dimensions);
}

fn push_gather(w: &mut Writer, gather: &GatherDimensionNumbers) {
    push_ints(w, &gather.offset_dims);
    push_ints(w, &gather.collapsed_slice_dims);
    push_ints(w, &gather.start_index_map);
    w.int(gather.index_vector_dim);
}

fn push_scatter(w: &mut Writer, scatter: &ScatterDimensionNumbers) {
    push_ints(w, &scatter.update_window_dims);
    push_ints(w, &scatter.inserted_window_dims);
    push_ints(w, &scatter.scatter_dims_to_operand_dims);
    w.int(scatter.index_vector_dim);
}

fn push_dot(w: &mut Writer, dot: &DotDimensionNumbers) {
    push_ints(w, &dot.lhs_batching_dimensions);
    push_ints(w, &dot.rhs_batching_dimensions);
    push_ints(w, &dot.lhs_contracting_dimensions);
    push_ints(w, &dot.rhs_contracting_dimensions);
}
