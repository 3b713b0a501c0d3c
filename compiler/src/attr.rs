// attr.rs — IR attribute values
//
// `Attribute` is the closed set of attribute shapes the front end can build
// and the option encoder can be asked to serialize. Dialect-specific records
// (StableHLO dimension numbers, comparison enums, precision) are first-class
// variants; any other `#dialect.name<...>` record or `#dialect<kind VALUE>`
// enum is kept generically so it can be printed back and rejected by the
// encoder without guessing.
//
// Display renders the MLIR-style textual form accepted by the parser.

use std::fmt::{self, Write as _};
use std::str::FromStr;

use crate::types::{ElementType, FloatType, IntType, Signedness, TensorType, Type};

// ── Scalars ──────────────────────────────────────────────────────────────

/// Integer attribute; `ty` is an integer or `index` element type.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegerAttr {
    pub value: i64,
    pub ty: ElementType,
}

impl IntegerAttr {
    pub fn i64(value: i64) -> Self {
        Self {
            value,
            ty: ElementType::Int(IntType::I64),
        }
    }

    pub fn bool(value: bool) -> Self {
        Self {
            value: value as i64,
            ty: ElementType::Int(IntType::I1),
        }
    }

    pub fn is_bool(&self) -> bool {
        self.ty == ElementType::Int(IntType::I1)
    }

    /// The value read as a signed integer of the attribute's width.
    pub fn signed_value(&self) -> i64 {
        sign_extend(self.value, self.ty)
    }
}

/// Reinterpret the low `width` bits of `value` as a signed integer. An i1
/// `true` becomes -1; unsigned types and widths of 64 or more are unchanged.
pub fn sign_extend(value: i64, ty: ElementType) -> i64 {
    match ty {
        ElementType::Int(IntType { width, signedness })
            if width < 64 && signedness != Signedness::Unsigned =>
        {
            let shift = 64 - width;
            (value << shift) >> shift
        }
        _ => value,
    }
}

/// Float attribute. The value is held as f64 after rounding to `ty`'s
/// precision where that precision is narrower (f32).
#[derive(Debug, Clone, PartialEq)]
pub struct FloatAttr {
    pub value: f64,
    pub ty: FloatType,
}

impl FloatAttr {
    pub fn new(value: f64, ty: FloatType) -> Self {
        Self {
            value: round_to(value, ty),
            ty,
        }
    }

    pub fn f64(value: f64) -> Self {
        Self::new(value, FloatType::F64)
    }
}

fn round_to(value: f64, ty: FloatType) -> f64 {
    match ty {
        FloatType::F32 => value as f32 as f64,
        _ => value,
    }
}

// ── Dense storage ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum DenseValues {
    Int(Vec<i64>),
    Float(Vec<f64>),
}

impl DenseValues {
    pub fn len(&self) -> usize {
        match self {
            DenseValues::Int(v) => v.len(),
            DenseValues::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `dense<...> : tensor<...>`. A single stored value is a splat over the
/// whole shape.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseElementsAttr {
    ty: TensorType,
    values: DenseValues,
}

impl DenseElementsAttr {
    pub fn new(ty: TensorType, values: DenseValues) -> Result<Self, String> {
        let count = ty
            .num_elements()
            .ok_or_else(|| format!("dense elements require a static shape, got {ty}"))?;
        match (&values, ty.element) {
            (DenseValues::Int(_), e) if e.is_integer() => {}
            (DenseValues::Float(_), e) if e.is_float() => {}
            (_, e) => return Err(format!("dense literal does not match element type {e}")),
        }
        let stored = values.len();
        if stored != count && !(stored == 1 && count > 1) {
            return Err(format!(
                "dense literal has {stored} elements, but {ty} holds {count}"
            ));
        }
        let values = match values {
            DenseValues::Float(v) => {
                DenseValues::Float(v.into_iter().map(|x| round_to_element(x, ty.element)).collect())
            }
            ints => ints,
        };
        Ok(Self { ty, values })
    }

    pub fn ty(&self) -> &TensorType {
        &self.ty
    }

    pub fn element_type(&self) -> ElementType {
        self.ty.element
    }

    pub fn is_splat(&self) -> bool {
        self.values.len() == 1
    }

    /// Number of logical elements (splats expanded).
    pub fn len(&self) -> usize {
        self.ty.num_elements().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn raw_values(&self) -> &DenseValues {
        &self.values
    }

    /// Logical integer values in row-major order, or `None` for float data.
    pub fn int_values(&self) -> Option<impl Iterator<Item = i64> + '_> {
        match &self.values {
            DenseValues::Int(v) => Some(expand(v, self.len())),
            DenseValues::Float(_) => None,
        }
    }

    /// Logical float values in row-major order, or `None` for integer data.
    pub fn float_values(&self) -> Option<impl Iterator<Item = f64> + '_> {
        match &self.values {
            DenseValues::Float(v) => Some(expand(v, self.len())),
            DenseValues::Int(_) => None,
        }
    }
}

fn round_to_element(value: f64, element: ElementType) -> f64 {
    match element {
        ElementType::Float(ft) => round_to(value, ft),
        _ => value,
    }
}

fn expand<T: Copy>(stored: &[T], len: usize) -> impl Iterator<Item = T> + '_ {
    let splat = stored.len() == 1;
    (0..len).map(move |i| if splat { stored[0] } else { stored[i] })
}

// ── StableHLO enums ──────────────────────────────────────────────────────

macro_rules! symbol_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Keyword used in `#stablehlo<KIND VALUE>`.
            pub const KIND: &'static str = $kind;

            /// Canonical symbol name.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("unknown {} '{}'", $kind, s)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

symbol_enum!(ComparisonDirection, "comparison_direction" {
    Eq => "EQ",
    Ne => "NE",
    Ge => "GE",
    Gt => "GT",
    Le => "LE",
    Lt => "LT",
});

symbol_enum!(ComparisonType, "comparison_type" {
    NoType => "NOTYPE",
    Float => "FLOAT",
    TotalOrder => "TOTALORDER",
    Signed => "SIGNED",
    Unsigned => "UNSIGNED",
});

symbol_enum!(
    /// Dot/convolution operand precision.
    Precision, "precision" {
        Default => "DEFAULT",
        High => "HIGH",
        Highest => "HIGHEST",
    }
);

// ── StableHLO dimension-number records ───────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConvDimensionNumbers {
    pub input_batch_dimension: i64,
    pub input_feature_dimension: i64,
    pub input_spatial_dimensions: Vec<i64>,
    pub kernel_input_feature_dimension: i64,
    pub kernel_output_feature_dimension: i64,
    pub kernel_spatial_dimensions: Vec<i64>,
    pub output_batch_dimension: i64,
    pub output_feature_dimension: i64,
    pub output_spatial_dimensions: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GatherDimensionNumbers {
    pub offset_dims: Vec<i64>,
    pub collapsed_slice_dims: Vec<i64>,
    pub operand_batching_dims: Vec<i64>,
    pub start_indices_batching_dims: Vec<i64>,
    pub start_index_map: Vec<i64>,
    pub index_vector_dim: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScatterDimensionNumbers {
    pub update_window_dims: Vec<i64>,
    pub inserted_window_dims: Vec<i64>,
    pub input_batching_dims: Vec<i64>,
    pub scatter_indices_batching_dims: Vec<i64>,
    pub scatter_dims_to_operand_dims: Vec<i64>,
    pub index_vector_dim: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DotDimensionNumbers {
    pub lhs_batching_dimensions: Vec<i64>,
    pub rhs_batching_dimensions: Vec<i64>,
    pub lhs_contracting_dimensions: Vec<i64>,
    pub rhs_contracting_dimensions: Vec<i64>,
}

/// One entry of the compact convolution layout `[b, 0, 1, f]x[0, 1, i, o]->[b, 0, 1, f]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvDimLabel {
    Batch,
    Feature,
    InputFeature,
    OutputFeature,
    Spatial(i64),
}

impl ConvDimensionNumbers {
    pub fn from_layout(
        input: &[ConvDimLabel],
        kernel: &[ConvDimLabel],
        output: &[ConvDimLabel],
    ) -> Result<Self, String> {
        use ConvDimLabel::*;
        let (input_batch_dimension, input_feature_dimension, input_spatial_dimensions) =
            split_layout("input", input, Batch, Feature)?;
        let (kernel_input_feature_dimension, kernel_output_feature_dimension, kernel_spatial_dimensions) =
            split_layout("kernel", kernel, InputFeature, OutputFeature)?;
        let (output_batch_dimension, output_feature_dimension, output_spatial_dimensions) =
            split_layout("output", output, Batch, Feature)?;
        if input_spatial_dimensions.len() != kernel_spatial_dimensions.len()
            || input_spatial_dimensions.len() != output_spatial_dimensions.len()
        {
            return Err("convolution layouts disagree on the number of spatial dimensions".into());
        }
        Ok(Self {
            input_batch_dimension,
            input_feature_dimension,
            input_spatial_dimensions,
            kernel_input_feature_dimension,
            kernel_output_feature_dimension,
            kernel_spatial_dimensions,
            output_batch_dimension,
            output_feature_dimension,
            output_spatial_dimensions,
        })
    }
}

/// Returns the positions of the two named labels and the spatial positions
/// ordered by spatial index.
fn split_layout(
    which: &str,
    labels: &[ConvDimLabel],
    first: ConvDimLabel,
    second: ConvDimLabel,
) -> Result<(i64, i64, Vec<i64>), String> {
    let mut a = None;
    let mut b = None;
    let mut spatial: Vec<Option<i64>> = vec![None; labels.len().saturating_sub(2)];
    for (pos, label) in labels.iter().enumerate() {
        let pos = pos as i64;
        let slot = match label {
            l if *l == first => &mut a,
            l if *l == second => &mut b,
            ConvDimLabel::Spatial(k) => {
                let k = usize::try_from(*k)
                    .ok()
                    .filter(|k| *k < spatial.len())
                    .ok_or_else(|| format!("{which} layout has out-of-range spatial index {k}"))?;
                &mut spatial[k]
            }
            other => return Err(format!("{which} layout cannot contain {other:?}")),
        };
        if slot.replace(pos).is_some() {
            return Err(format!("{which} layout repeats a dimension"));
        }
    }
    let a = a.ok_or_else(|| format!("{which} layout is missing {first:?}"))?;
    let b = b.ok_or_else(|| format!("{which} layout is missing {second:?}"))?;
    let spatial = spatial
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| format!("{which} layout is missing a spatial dimension"))?;
    Ok((a, b, spatial))
}

// ── Attribute ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct NamedAttribute {
    pub name: String,
    pub value: Attribute,
}

impl NamedAttribute {
    pub fn new(name: impl Into<String>, value: Attribute) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Unit,
    Integer(IntegerAttr),
    Float(FloatAttr),
    String(String),
    /// Raw bytes (`#tfl<const_bytes : "0x...">`).
    Bytes(Vec<u8>),
    Type(Type),
    SymbolRef(String),
    Array(Vec<Attribute>),
    Dictionary(Vec<NamedAttribute>),
    DenseElements(DenseElementsAttr),
    DenseI64Array(Vec<i64>),
    DenseBoolArray(Vec<bool>),
    /// `array<T: ...>` for element types other than i64 and i1.
    DenseArray {
        element: ElementType,
        values: DenseValues,
    },
    ConvDimensionNumbers(ConvDimensionNumbers),
    GatherDimensionNumbers(GatherDimensionNumbers),
    ScatterDimensionNumbers(ScatterDimensionNumbers),
    DotDimensionNumbers(DotDimensionNumbers),
    ComparisonDirection(ComparisonDirection),
    ComparisonType(ComparisonType),
    Precision(Precision),
    /// Any other `#dialect<kind VALUE>` enum.
    DialectEnum {
        dialect: String,
        kind: String,
        value: String,
    },
    /// Any other `#dialect.name<key = value, ...>` record.
    Record {
        name: String,
        fields: Vec<NamedAttribute>,
    },
}

impl Attribute {
    pub fn int(value: i64) -> Self {
        Attribute::Integer(IntegerAttr::i64(value))
    }

    pub fn float(value: f64) -> Self {
        Attribute::Float(FloatAttr::f64(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Attribute::String(value.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Attribute::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&[NamedAttribute]> {
        match self {
            Attribute::Dictionary(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Attribute::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Short human-readable shape name, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Attribute::Unit => "unit",
            Attribute::Integer(_) => "integer",
            Attribute::Float(_) => "float",
            Attribute::String(_) => "string",
            Attribute::Bytes(_) => "bytes",
            Attribute::Type(_) => "type",
            Attribute::SymbolRef(_) => "symbol reference",
            Attribute::Array(_) => "array",
            Attribute::Dictionary(_) => "dictionary",
            Attribute::DenseElements(_) => "dense elements",
            Attribute::DenseI64Array(_) => "i64 array",
            Attribute::DenseBoolArray(_) => "bool array",
            Attribute::DenseArray { .. } => "dense array",
            Attribute::ConvDimensionNumbers(_) => "convolution dimension numbers",
            Attribute::GatherDimensionNumbers(_) => "gather dimension numbers",
            Attribute::ScatterDimensionNumbers(_) => "scatter dimension numbers",
            Attribute::DotDimensionNumbers(_) => "dot dimension numbers",
            Attribute::ComparisonDirection(_) => "comparison direction",
            Attribute::ComparisonType(_) => "comparison type",
            Attribute::Precision(_) => "precision",
            Attribute::DialectEnum { .. } => "dialect enum",
            Attribute::Record { .. } => "dialect record",
        }
    }

    /// Builds `#dialect<kind VALUE>`, recognizing the StableHLO enums.
    pub fn dialect_enum(dialect: &str, kind: &str, value: &str) -> Result<Attribute, String> {
        if dialect == "stablehlo" {
            match kind {
                ComparisonDirection::KIND => return value.parse().map(Attribute::ComparisonDirection),
                ComparisonType::KIND => return value.parse().map(Attribute::ComparisonType),
                Precision::KIND => return value.parse().map(Attribute::Precision),
                _ => {}
            }
        }
        Ok(Attribute::DialectEnum {
            dialect: dialect.to_string(),
            kind: kind.to_string(),
            value: value.to_string(),
        })
    }

    /// Builds `#name<fields>`, recognizing the StableHLO dimension-number
    /// records. Unknown record names are kept as `Record`.
    pub fn record(name: &str, fields: Vec<NamedAttribute>) -> Result<Attribute, String> {
        let mut reader = FieldReader::new(name, &fields);
        let attr = match name {
            "stablehlo.conv" => Attribute::ConvDimensionNumbers(ConvDimensionNumbers {
                input_batch_dimension: reader.scalar("input_batch_dimension")?,
                input_feature_dimension: reader.scalar("input_feature_dimension")?,
                input_spatial_dimensions: reader.dims("input_spatial_dimensions")?,
                kernel_input_feature_dimension: reader.scalar("kernel_input_feature_dimension")?,
                kernel_output_feature_dimension: reader.scalar("kernel_output_feature_dimension")?,
                kernel_spatial_dimensions: reader.dims("kernel_spatial_dimensions")?,
                output_batch_dimension: reader.scalar("output_batch_dimension")?,
                output_feature_dimension: reader.scalar("output_feature_dimension")?,
                output_spatial_dimensions: reader.dims("output_spatial_dimensions")?,
            }),
            "stablehlo.gather" => Attribute::GatherDimensionNumbers(GatherDimensionNumbers {
                offset_dims: reader.dims("offset_dims")?,
                collapsed_slice_dims: reader.dims("collapsed_slice_dims")?,
                operand_batching_dims: reader.dims("operand_batching_dims")?,
                start_indices_batching_dims: reader.dims("start_indices_batching_dims")?,
                start_index_map: reader.dims("start_index_map")?,
                index_vector_dim: reader.scalar("index_vector_dim")?,
            }),
            "stablehlo.scatter" => Attribute::ScatterDimensionNumbers(ScatterDimensionNumbers {
                update_window_dims: reader.dims("update_window_dims")?,
                inserted_window_dims: reader.dims("inserted_window_dims")?,
                input_batching_dims: reader.dims("input_batching_dims")?,
                scatter_indices_batching_dims: reader.dims("scatter_indices_batching_dims")?,
                scatter_dims_to_operand_dims: reader.dims("scatter_dims_to_operand_dims")?,
                index_vector_dim: reader.scalar("index_vector_dim")?,
            }),
            "stablehlo.dot" => Attribute::DotDimensionNumbers(DotDimensionNumbers {
                lhs_batching_dimensions: reader.dims("lhs_batching_dimensions")?,
                rhs_batching_dimensions: reader.dims("rhs_batching_dimensions")?,
                lhs_contracting_dimensions: reader.dims("lhs_contracting_dimensions")?,
                rhs_contracting_dimensions: reader.dims("rhs_contracting_dimensions")?,
            }),
            _ => {
                return Ok(Attribute::Record {
                    name: name.to_string(),
                    fields,
                })
            }
        };
        reader.finish()?;
        Ok(attr)
    }
}

/// Pulls typed fields out of a parsed record body; every field must be
/// consumed exactly once. Missing fields default to 0 / empty, as in the
/// StableHLO assembly format.
struct FieldReader<'a> {
    record: &'a str,
    fields: &'a [NamedAttribute],
    used: Vec<bool>,
}

impl<'a> FieldReader<'a> {
    fn new(record: &'a str, fields: &'a [NamedAttribute]) -> Self {
        Self {
            record,
            fields,
            used: vec![false; fields.len()],
        }
    }

    fn take(&mut self, key: &str) -> Option<&'a Attribute> {
        let idx = self.fields.iter().position(|f| f.name == key)?;
        self.used[idx] = true;
        Some(&self.fields[idx].value)
    }

    fn scalar(&mut self, key: &str) -> Result<i64, String> {
        match self.take(key) {
            None => Ok(0),
            Some(Attribute::Integer(i)) => Ok(i.value),
            Some(other) => Err(format!(
                "#{}: field '{key}' expects an integer, found {}",
                self.record,
                other.kind_name()
            )),
        }
    }

    fn dims(&mut self, key: &str) -> Result<Vec<i64>, String> {
        let record = self.record;
        let bad = |found: &str| format!("#{record}: field '{key}' expects a list of integers, found {found}");
        match self.take(key) {
            None => Ok(Vec::new()),
            Some(Attribute::DenseI64Array(v)) => Ok(v.clone()),
            Some(Attribute::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Attribute::Integer(i) => Ok(i.value),
                    other => Err(bad(other.kind_name())),
                })
                .collect(),
            Some(other) => Err(bad(other.kind_name())),
        }
    }

    fn finish(self) -> Result<(), String> {
        match self.used.iter().position(|u| !u) {
            Some(idx) => Err(format!(
                "#{}: unknown field '{}'",
                self.record, self.fields[idx].name
            )),
            None => Ok(()),
        }
    }
}

// ── Textual form ─────────────────────────────────────────────────────────

pub(crate) fn is_bare_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'))
}

pub(crate) fn write_string_literal(f: &mut impl fmt::Write, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            c if (c as u32) < 0x20 => write!(f, "\\{:02X}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

fn format_float(value: f64, ty: FloatType) -> String {
    if !value.is_finite() {
        return match ty {
            FloatType::F32 => format!("0x{:08X}", (value as f32).to_bits()),
            _ => format!("0x{:016X}", value.to_bits()),
        };
    }
    match ty {
        FloatType::F32 => format!("{:?}", value as f32),
        _ => format!("{:?}", value),
    }
}

fn format_int(value: i64, ty: ElementType) -> String {
    if ty == ElementType::Int(IntType::I1) {
        (if value != 0 { "true" } else { "false" }).to_string()
    } else {
        value.to_string()
    }
}

fn write_dims(f: &mut fmt::Formatter<'_>, dims: &[i64]) -> fmt::Result {
    f.write_char('[')?;
    for (i, d) in dims.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{d}")?;
    }
    f.write_char(']')
}

/// Writes `key = [..]` entries, skipping empty lists, then the scalar fields.
fn write_dim_fields(
    f: &mut fmt::Formatter<'_>,
    lists: &[(&str, &[i64])],
    scalars: &[(&str, i64)],
) -> fmt::Result {
    let mut first = true;
    for (key, dims) in lists {
        if dims.is_empty() {
            continue;
        }
        if !first {
            f.write_str(", ")?;
        }
        first = false;
        write!(f, "{key} = ")?;
        write_dims(f, dims)?;
    }
    for (key, value) in scalars {
        if !first {
            f.write_str(", ")?;
        }
        first = false;
        write!(f, "{key} = {value}")?;
    }
    Ok(())
}

fn write_nested(
    f: &mut fmt::Formatter<'_>,
    shape: &[i64],
    items: &[String],
    offset: &mut usize,
) -> fmt::Result {
    match shape.split_first() {
        None => {
            f.write_str(&items[*offset])?;
            *offset += 1;
            Ok(())
        }
        Some((&n, rest)) => {
            f.write_char('[')?;
            for i in 0..n {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_nested(f, rest, items, offset)?;
            }
            f.write_char(']')
        }
    }
}

pub(crate) fn write_entries(f: &mut fmt::Formatter<'_>, entries: &[NamedAttribute]) -> fmt::Result {
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        if is_bare_identifier(&entry.name) {
            f.write_str(&entry.name)?;
        } else {
            write_string_literal(f, &entry.name)?;
        }
        if entry.value != Attribute::Unit {
            write!(f, " = {}", entry.value)?;
        }
    }
    Ok(())
}

impl fmt::Display for DenseElementsAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let element = self.ty.element;
        let items: Vec<String> = match &self.values {
            DenseValues::Int(v) => v.iter().map(|x| format_int(*x, element)).collect(),
            DenseValues::Float(v) => {
                let ft = match element {
                    ElementType::Float(ft) => ft,
                    _ => FloatType::F64,
                };
                v.iter().map(|x| format_float(*x, ft)).collect()
            }
        };
        f.write_str("dense<")?;
        if items.len() == 1 {
            f.write_str(&items[0])?;
        } else if !items.is_empty() {
            let shape: Vec<i64> = self.ty.dims.iter().map(|d| d.unwrap_or(0)).collect();
            write_nested(f, &shape, &items, &mut 0)?;
        }
        write!(f, "> : {}", self.ty)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Unit => f.write_str("unit"),
            Attribute::Integer(i) if i.is_bool() => f.write_str(&format_int(i.value, i.ty)),
            Attribute::Integer(i) => write!(f, "{} : {}", i.value, i.ty),
            Attribute::Float(x) => {
                write!(f, "{} : {}", format_float(x.value, x.ty), ElementType::Float(x.ty))
            }
            Attribute::String(s) => write_string_literal(f, s),
            Attribute::Bytes(bytes) => {
                f.write_str("#tfl<const_bytes : \"0x")?;
                for b in bytes {
                    write!(f, "{b:02X}")?;
                }
                f.write_str("\">")
            }
            Attribute::Type(ty) => write!(f, "{ty}"),
            Attribute::SymbolRef(name) => write!(f, "@{name}"),
            Attribute::Array(items) => {
                f.write_char('[')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_char(']')
            }
            Attribute::Dictionary(entries) => {
                f.write_char('{')?;
                write_entries(f, entries)?;
                f.write_char('}')
            }
            Attribute::DenseElements(d) => write!(f, "{d}"),
            Attribute::DenseI64Array(values) => {
                let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write_dense_array(f, "i64", &items)
            }
            Attribute::DenseBoolArray(values) => {
                let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write_dense_array(f, "i1", &items)
            }
            Attribute::DenseArray { element, values } => {
                let items: Vec<String> = match (values, element) {
                    (DenseValues::Int(v), e) => v.iter().map(|x| format_int(*x, *e)).collect(),
                    (DenseValues::Float(v), ElementType::Float(ft)) => {
                        v.iter().map(|x| format_float(*x, *ft)).collect()
                    }
                    (DenseValues::Float(v), _) => v.iter().map(|x| format!("{x:?}")).collect(),
                };
                write_dense_array(f, &element.to_string(), &items)
            }
            Attribute::ConvDimensionNumbers(c) => {
                f.write_str("#stablehlo.conv<raw ")?;
                write!(f, "input_batch_dimension = {}, ", c.input_batch_dimension)?;
                write!(f, "input_feature_dimension = {}, ", c.input_feature_dimension)?;
                f.write_str("input_spatial_dimensions = ")?;
                write_dims(f, &c.input_spatial_dimensions)?;
                write!(f, ", kernel_input_feature_dimension = {}", c.kernel_input_feature_dimension)?;
                write!(f, ", kernel_output_feature_dimension = {}", c.kernel_output_feature_dimension)?;
                f.write_str(", kernel_spatial_dimensions = ")?;
                write_dims(f, &c.kernel_spatial_dimensions)?;
                write!(f, ", output_batch_dimension = {}", c.output_batch_dimension)?;
                write!(f, ", output_feature_dimension = {}", c.output_feature_dimension)?;
                f.write_str(", output_spatial_dimensions = ")?;
                write_dims(f, &c.output_spatial_dimensions)?;
                f.write_char('>')
            }
            Attribute::GatherDimensionNumbers(g) => {
                f.write_str("#stablehlo.gather<")?;
                write_dim_fields(
                    f,
                    &[
                        ("offset_dims", &g.offset_dims),
                        ("collapsed_slice_dims", &g.collapsed_slice_dims),
                        ("operand_batching_dims", &g.operand_batching_dims),
                        ("start_indices_batching_dims", &g.start_indices_batching_dims),
                        ("start_index_map", &g.start_index_map),
                    ],
                    &[("index_vector_dim", g.index_vector_dim)],
                )?;
                f.write_char('>')
            }
            Attribute::ScatterDimensionNumbers(s) => {
                f.write_str("#stablehlo.scatter<")?;
                write_dim_fields(
                    f,
                    &[
                        ("update_window_dims", &s.update_window_dims),
                        ("inserted_window_dims", &s.inserted_window_dims),
                        ("input_batching_dims", &s.input_batching_dims),
                        ("scatter_indices_batching_dims", &s.scatter_indices_batching_dims),
                        ("scatter_dims_to_operand_dims", &s.scatter_dims_to_operand_dims),
                    ],
                    &[("index_vector_dim", s.index_vector_dim)],
                )?;
                f.write_char('>')
            }
            Attribute::DotDimensionNumbers(d) => {
                f.write_str("#stablehlo.dot<")?;
                write_dim_fields(
                    f,
                    &[
                        ("lhs_batching_dimensions", &d.lhs_batching_dimensions),
                        ("rhs_batching_dimensions", &d.rhs_batching_dimensions),
                        ("lhs_contracting_dimensions", &d.lhs_contracting_dimensions),
                        ("rhs_contracting_dimensions", &d.rhs_contracting_dimensions),
                    ],
                    &[],
                )?;
                f.write_char('>')
            }
            Attribute::ComparisonDirection(v) => {
                write!(f, "#stablehlo<{} {v}>", ComparisonDirection::KIND)
            }
            Attribute::ComparisonType(v) => write!(f, "#stablehlo<{} {v}>", ComparisonType::KIND),
            Attribute::Precision(v) => write!(f, "#stablehlo<{} {v}>", Precision::KIND),
            Attribute::DialectEnum {
                dialect,
                kind,
                value,
            } => write!(f, "#{dialect}<{kind} {value}>"),
            Attribute::Record { name, fields } => {
                write!(f, "#{name}<")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} = {}", field.name, field.value)?;
                }
                f.write_char('>')
            }
        }
    }
}

fn write_dense_array(f: &mut fmt::Formatter<'_>, element: &str, items: &[String]) -> fmt::Result {
    write!(f, "array<{element}")?;
    if !items.is_empty() {
        write!(f, ": {}", items.join(", "))?;
    }
    f.write_char('>')
}
