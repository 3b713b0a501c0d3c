// Parser for the textual IR.
//
// Parses a token stream (from the lexer) into a `ModuleAst`. Uses chumsky
// combinators. Attribute syntax is parsed straight into `attr::Attribute`;
// malformed attribute payloads (bad dense counts, unknown enum symbols,
// broken convolution layouts) are reported as parse errors at their span.
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns an AST plus any parse errors.
// Failure modes: syntax errors produce `Rich` diagnostics.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::attr::{
    Attribute, ConvDimLabel, ConvDimensionNumbers, DenseElementsAttr, DenseValues, FloatAttr,
    IntegerAttr, NamedAttribute,
};
use crate::lexer::Token;
use crate::types::{ElementType, FloatType, IntType, Signedness, TensorType, Type};

/// Result of parsing: AST plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub module: Option<ModuleAst>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

type ParserError<'tokens> = extra::Err<Rich<'tokens, Token, SimpleSpan>>;

/// Parse an IR source string. Lexes then parses.
///
/// Returns an AST (if parsing succeeded) plus any errors.
pub fn parse(source: &str) -> ParseResult {
    let (stream, mut errors) = token_stream(source);
    let (module, parse_errors) = module_parser(source).parse(stream).into_output_errors();
    errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));
    ParseResult { module, errors }
}

/// Parse a single attribute value, e.g. `dense<[1, 2]> : tensor<2xi32>`.
pub fn parse_attribute(source: &str) -> Result<Attribute, Vec<Rich<'static, Token, SimpleSpan>>> {
    let (stream, mut errors) = token_stream(source);
    let (attr, parse_errors) = attribute_parser(source)
        .then_ignore(end())
        .parse(stream)
        .into_output_errors();
    errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));
    match attr {
        Some(attr) if errors.is_empty() => Ok(attr),
        _ => Err(errors),
    }
}

/// Lex `source` into a chumsky stream; lex errors come back as `Rich`
/// errors so they merge with parse errors.
fn token_stream<'tokens>(
    source: &str,
) -> (
    impl ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
    Vec<Rich<'static, Token, SimpleSpan>>,
) {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    // Convert lexer output to chumsky stream.
    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let errors = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    (stream, errors)
}

// ── Literal helpers ──

/// Untyped literal inside `dense<...>` and `array<...>`.
#[derive(Debug, Clone, PartialEq)]
enum DenseLit {
    Int(i64),
    Float(f64),
    Hex(u64),
    Bool(bool),
    List(Vec<DenseLit>),
}

fn flatten(lit: DenseLit, out: &mut Vec<DenseLit>) {
    match lit {
        DenseLit::List(items) => items.into_iter().for_each(|item| flatten(item, out)),
        leaf => out.push(leaf),
    }
}

fn int_leaf(lit: &DenseLit) -> Result<i64, String> {
    match lit {
        DenseLit::Int(v) => Ok(*v),
        DenseLit::Bool(b) => Ok(*b as i64),
        DenseLit::Hex(bits) => Ok(*bits as i64),
        _ => Err("expected an integer literal".into()),
    }
}

fn float_leaf(lit: &DenseLit, ft: FloatType) -> Result<f64, String> {
    match lit {
        DenseLit::Float(v) => Ok(*v),
        DenseLit::Int(v) => Ok(*v as f64),
        DenseLit::Hex(bits) => float_from_bits(*bits, ft),
        _ => Err("expected a float literal".into()),
    }
}

fn bool_leaf(lit: &DenseLit) -> Result<bool, String> {
    match lit {
        DenseLit::Bool(b) => Ok(*b),
        DenseLit::Int(0) => Ok(false),
        DenseLit::Int(1) => Ok(true),
        _ => Err("expected true or false".into()),
    }
}

fn float_from_bits(bits: u64, ft: FloatType) -> Result<f64, String> {
    match ft {
        FloatType::F32 => u32::try_from(bits)
            .map(|b| f32::from_bits(b) as f64)
            .map_err(|_| format!("0x{bits:X} does not fit in f32")),
        FloatType::F64 => Ok(f64::from_bits(bits)),
        _ => Err("hexadecimal float literals are only supported for f32 and f64".into()),
    }
}

fn typed_int(value: i64, ty: Option<Type>) -> Result<Attribute, String> {
    match ty {
        None => Ok(Attribute::int(value)),
        Some(Type::Scalar(e @ (ElementType::Int(_) | ElementType::Index))) => {
            Ok(Attribute::Integer(IntegerAttr { value, ty: e }))
        }
        Some(Type::Scalar(ElementType::Float(ft))) => {
            Ok(Attribute::Float(FloatAttr::new(value as f64, ft)))
        }
        Some(other) => Err(format!("integer literal cannot have type {other}")),
    }
}

fn typed_float(value: f64, ty: Option<Type>) -> Result<Attribute, String> {
    match ty {
        None => Ok(Attribute::float(value)),
        Some(Type::Scalar(ElementType::Float(ft))) => Ok(Attribute::Float(FloatAttr::new(value, ft))),
        Some(other) => Err(format!("float literal cannot have type {other}")),
    }
}

fn typed_hex(bits: u64, ty: Option<Type>) -> Result<Attribute, String> {
    match ty {
        Some(Type::Scalar(ElementType::Float(ft))) => {
            Ok(Attribute::Float(FloatAttr::new(float_from_bits(bits, ft)?, ft)))
        }
        other => typed_int(bits as i64, other),
    }
}

fn build_dense(lit: Option<DenseLit>, ty: TensorType) -> Result<Attribute, String> {
    let mut leaves = Vec::new();
    if let Some(lit) = lit {
        flatten(lit, &mut leaves);
    }
    let values = match ty.element {
        ElementType::Float(ft) => DenseValues::Float(
            leaves
                .iter()
                .map(|l| float_leaf(l, ft))
                .collect::<Result<_, _>>()?,
        ),
        _ => DenseValues::Int(leaves.iter().map(int_leaf).collect::<Result<_, _>>()?),
    };
    DenseElementsAttr::new(ty, values).map(Attribute::DenseElements)
}

fn build_dense_array(element: ElementType, items: Vec<DenseLit>) -> Result<Attribute, String> {
    match element {
        ElementType::Int(IntType {
            width: 64,
            signedness: Signedness::Signless,
        }) => Ok(Attribute::DenseI64Array(
            items.iter().map(int_leaf).collect::<Result<_, _>>()?,
        )),
        ElementType::Int(IntType { width: 1, .. }) => Ok(Attribute::DenseBoolArray(
            items.iter().map(bool_leaf).collect::<Result<_, _>>()?,
        )),
        ElementType::Float(ft) => Ok(Attribute::DenseArray {
            element,
            values: DenseValues::Float(
                items
                    .iter()
                    .map(|l| float_leaf(l, ft).map(|v| FloatAttr::new(v, ft).value))
                    .collect::<Result<_, _>>()?,
            ),
        }),
        _ => Ok(Attribute::DenseArray {
            element,
            values: DenseValues::Int(items.iter().map(int_leaf).collect::<Result<_, _>>()?),
        }),
    }
}

fn parse_bytes(hex: &str) -> Result<Vec<u8>, String> {
    let digits = hex
        .strip_prefix("0x")
        .ok_or_else(|| format!("const_bytes must start with 0x, found {hex:?}"))?;
    if digits.len() % 2 != 0 {
        return Err("const_bytes must have an even number of hex digits".into());
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| format!("invalid hex digits in const_bytes: {:?}", &digits[i..i + 2]))
        })
        .collect()
}

/// Body of a `#name<...>` attribute, before it is interpreted.
enum HashBody {
    Bytes(String),
    Enum(String, String),
    Layout(Vec<ConvDimLabel>, Vec<ConvDimLabel>, Vec<ConvDimLabel>),
    Fields(Vec<NamedAttribute>),
}

fn build_hash_attr(name: &str, body: HashBody) -> Result<Attribute, String> {
    match body {
        HashBody::Bytes(hex) if name == "tfl" => parse_bytes(&hex).map(Attribute::Bytes),
        HashBody::Bytes(_) => Err(format!("#{name} has no const_bytes form")),
        HashBody::Enum(kind, value) => Attribute::dialect_enum(name, &kind, &value),
        HashBody::Layout(input, kernel, output) if name == "stablehlo.conv" => {
            ConvDimensionNumbers::from_layout(&input, &kernel, &output)
                .map(Attribute::ConvDimensionNumbers)
        }
        HashBody::Layout(..) => Err(format!("#{name} has no layout form")),
        HashBody::Fields(fields) => Attribute::record(name, fields),
    }
}

// ── Types ──

fn type_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, Type, ParserError<'tokens>> + Clone + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let element_type = just(Token::Ident).try_map(move |_, span: SimpleSpan| {
        source[span.start()..span.end()]
            .parse::<ElementType>()
            .map_err(|m| Rich::custom(span, m))
    });

    choice((
        select! { Token::TensorType(t) => Type::Tensor(t) },
        just(Token::BangIdent).map_with(move |_, e| {
            let span: SimpleSpan = e.span();
            Type::Opaque(source[span.start() + 1..span.end()].to_string())
        }),
        element_type.map(Type::Scalar),
    ))
}

// ── Attributes ──

fn attribute_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, Attribute, ParserError<'tokens>> + Clone + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let text = move |span: SimpleSpan| &source[span.start()..span.end()];
    let ty = type_parser(source);

    let word = any()
        .filter(|t: &Token| t.is_word())
        .map_with(move |_, e| text(e.span()).to_string());

    // A specific bare word, e.g. `raw` or the `x` between conv layouts.
    let keyword = move |kw: &'static str| {
        just(Token::Ident).try_map(move |_, span: SimpleSpan| {
            if text(span) == kw {
                Ok(())
            } else {
                Err(Rich::custom(span, format!("expected '{kw}'")))
            }
        })
    };

    let dense_scalar = select! {
        Token::Int(v) => DenseLit::Int(v),
        Token::Float(v) => DenseLit::Float(v),
        Token::Hex(v) => DenseLit::Hex(v),
        Token::True => DenseLit::Bool(true),
        Token::False => DenseLit::Bool(false),
    };

    let dense_lit = recursive(|lit| {
        dense_scalar.clone().or(lit
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBracket), just(Token::RBracket))
            .map(DenseLit::List))
    });

    let element_type = just(Token::Ident).try_map(move |_, span: SimpleSpan| {
        text(span)
            .parse::<ElementType>()
            .map_err(|m| Rich::custom(span, m))
    });

    recursive(move |attr| {
        let type_suffix = just(Token::Colon).ignore_then(ty.clone()).or_not();

        let integer = select! { Token::Int(v) => v }
            .then(type_suffix.clone())
            .try_map(|(v, t), span| typed_int(v, t).map_err(|m| Rich::custom(span, m)));

        let float = select! { Token::Float(v) => v }
            .then(type_suffix.clone())
            .try_map(|(v, t), span| typed_float(v, t).map_err(|m| Rich::custom(span, m)));

        let hex = select! { Token::Hex(v) => v }
            .then(type_suffix)
            .try_map(|(v, t), span| typed_hex(v, t).map_err(|m| Rich::custom(span, m)));

        let boolean = select! {
            Token::True => Attribute::Integer(IntegerAttr::bool(true)),
            Token::False => Attribute::Integer(IntegerAttr::bool(false)),
            Token::Unit => Attribute::Unit,
        };

        let string = select! { Token::StringLit(s) => Attribute::String(s) };

        let symbol = just(Token::SymbolRef)
            .map_with(move |_, e| Attribute::SymbolRef(text(e.span())[1..].to_string()));

        let array = attr
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBracket), just(Token::RBracket))
            .map(Attribute::Array);

        let key = word.clone().or(select! { Token::StringLit(s) => s });

        let dictionary = key
            .then(just(Token::Equals).ignore_then(attr.clone()).or_not())
            .map(|(name, value)| NamedAttribute::new(name, value.unwrap_or(Attribute::Unit)))
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .map(Attribute::Dictionary);

        let dense = just(Token::Dense)
            .ignore_then(
                dense_lit
                    .clone()
                    .or_not()
                    .delimited_by(just(Token::Lt), just(Token::Gt)),
            )
            .then_ignore(just(Token::Colon))
            .then(select! { Token::TensorType(t) => t })
            .try_map(|(lit, t), span| build_dense(lit, t).map_err(|m| Rich::custom(span, m)));

        let dense_array = just(Token::Array)
            .ignore_then(
                element_type
                    .clone()
                    .then(
                        just(Token::Colon)
                            .ignore_then(
                                dense_scalar
                                    .separated_by(just(Token::Comma))
                                    .collect::<Vec<_>>(),
                            )
                            .or_not(),
                    )
                    .delimited_by(just(Token::Lt), just(Token::Gt)),
            )
            .try_map(|(element, items), span| {
                build_dense_array(element, items.unwrap_or_default())
                    .map_err(|m| Rich::custom(span, m))
            });

        // ── #name<...> ──

        let field = word
            .clone()
            .then_ignore(just(Token::Equals))
            .then(attr.clone())
            .map(|(name, value)| NamedAttribute::new(name, value));

        let fields_body = keyword("raw")
            .or_not()
            .ignore_then(
                field
                    .separated_by(just(Token::Comma))
                    .allow_trailing()
                    .collect::<Vec<_>>(),
            )
            .map(HashBody::Fields);

        let bytes_body = keyword("const_bytes")
            .ignore_then(just(Token::Colon))
            .ignore_then(select! { Token::StringLit(s) => s })
            .map(HashBody::Bytes);

        let enum_body = word
            .clone()
            .then(word.clone())
            .map(|(kind, value)| HashBody::Enum(kind, value));

        let label = choice((
            select! { Token::Int(k) => ConvDimLabel::Spatial(k) },
            just(Token::Ident).try_map(move |_, span: SimpleSpan| match text(span) {
                "b" => Ok(ConvDimLabel::Batch),
                "f" => Ok(ConvDimLabel::Feature),
                "i" => Ok(ConvDimLabel::InputFeature),
                "o" => Ok(ConvDimLabel::OutputFeature),
                other => Err(Rich::custom(span, format!("unknown convolution dimension '{other}'"))),
            }),
        ));
        let layout = label
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBracket), just(Token::RBracket));
        let layout_body = layout
            .clone()
            .then_ignore(keyword("x"))
            .then(layout.clone())
            .then_ignore(just(Token::Arrow))
            .then(layout)
            .map(|((input, kernel), output)| HashBody::Layout(input, kernel, output));

        let hash = just(Token::HashIdent)
            .map_with(move |_, e| text(e.span())[1..].to_string())
            .then(
                choice((bytes_body, layout_body, enum_body, fields_body))
                    .delimited_by(just(Token::Lt), just(Token::Gt)),
            )
            .try_map(|(name, body), span| {
                build_hash_attr(&name, body).map_err(|m| Rich::custom(span, m))
            });

        choice((
            integer,
            float,
            hex,
            boolean,
            string,
            symbol,
            array,
            dictionary,
            dense,
            dense_array,
            hash,
            ty.clone().map(Attribute::Type),
        ))
    })
}

// ── Module parser ──
//
// Ops, blocks and regions are mutually recursive; the recursion is rooted at
// the region parser so `func.func` bodies can reuse it directly.

fn module_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, ModuleAst, ParserError<'tokens>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let text = move |span: SimpleSpan| &source[span.start()..span.end()];
    let ty = type_parser(source);
    let attribute = attribute_parser(source);

    let name = move |tok: Token| {
        just(tok).map_with(move |_, e| Name {
            text: text(e.span()).to_string(),
            span: e.span(),
        })
    };

    let value_ref = just(Token::ValueId).try_map(move |_, span: SimpleSpan| {
        let raw = text(span);
        match raw.split_once('#') {
            None => Ok(ValueRef {
                name: raw.to_string(),
                index: None,
                span,
            }),
            Some((base, idx)) => idx
                .parse::<u32>()
                .map(|i| ValueRef {
                    name: base.to_string(),
                    index: Some(i),
                    span,
                })
                .map_err(|_| Rich::custom(span, format!("invalid result index in {raw}"))),
        }
    });

    let arg_decl = name(Token::ValueId)
        .then_ignore(just(Token::Colon))
        .then(ty.clone())
        .map_with(|(name, ty), e| ArgDecl {
            name,
            ty,
            span: e.span(),
        });

    let arg_list = arg_decl
        .separated_by(just(Token::Comma))
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    let type_list = ty
        .clone()
        .separated_by(just(Token::Comma))
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    let result_types = type_list.clone().or(ty.clone().map(|t| vec![t]));

    let attr_dict = select! {
        Token::StringLit(s) => s,
    }
    .or(any()
        .filter(|t: &Token| t.is_word())
        .map_with(move |_, e| text(e.span()).to_string()))
    .then(just(Token::Equals).ignore_then(attribute.clone()).or_not())
    .map_with(|(name, value), e| AttrEntry {
        name,
        value: value.unwrap_or(Attribute::Unit),
        span: e.span(),
    })
    .separated_by(just(Token::Comma))
    .allow_trailing()
    .collect::<Vec<_>>()
    .delimited_by(just(Token::LBrace), just(Token::RBrace));

    let region = recursive(|region| {
        // ── %r, %s:2 = ──
        let result_group = name(Token::ValueId)
            .then(
                just(Token::Colon)
                    .ignore_then(select! { Token::Int(n) if n > 0 && n <= u32::MAX as i64 => n as u32 })
                    .or_not(),
            )
            .map(|(name, count)| ResultGroup {
                name,
                count: count.unwrap_or(1),
            });

        let results = result_group
            .separated_by(just(Token::Comma))
            .at_least(1)
            .collect::<Vec<_>>()
            .then_ignore(just(Token::Equals));

        let signature = just(Token::Colon)
            .ignore_then(type_list.clone())
            .then_ignore(just(Token::Arrow))
            .then(result_types.clone())
            .map_with(|(inputs, outputs), e| OpSignature {
                inputs,
                outputs,
                span: e.span(),
            });

        let generic_op = results
            .or_not()
            .then(select! { Token::StringLit(s) => s })
            .then(
                value_ref
                    .clone()
                    .separated_by(just(Token::Comma))
                    .collect::<Vec<_>>()
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .then(
                region
                    .separated_by(just(Token::Comma))
                    .at_least(1)
                    .collect::<Vec<_>>()
                    .delimited_by(just(Token::LParen), just(Token::RParen))
                    .or_not(),
            )
            .then(attr_dict.clone().or_not())
            .then(signature)
            .map_with(
                |(((((results, name), operands), regions), attributes), signature), e| OpAst {
                    results: results.unwrap_or_default(),
                    name,
                    operands,
                    regions: regions.unwrap_or_default(),
                    attributes: attributes.unwrap_or_default(),
                    signature,
                    span: e.span(),
                },
            );

        // ── return %a, %b : T, T ──
        let return_op = just(Token::Return)
            .ignore_then(
                value_ref
                    .clone()
                    .separated_by(just(Token::Comma))
                    .at_least(1)
                    .collect::<Vec<_>>()
                    .then_ignore(just(Token::Colon))
                    .then(
                        ty.clone()
                            .separated_by(just(Token::Comma))
                            .at_least(1)
                            .collect::<Vec<_>>(),
                    )
                    .or_not(),
            )
            .map_with(|operands, e| {
                let (operands, inputs) = operands.unwrap_or_default();
                OpAst {
                    results: Vec::new(),
                    name: "func.return".to_string(),
                    operands,
                    regions: Vec::new(),
                    attributes: Vec::new(),
                    signature: OpSignature {
                        inputs,
                        outputs: Vec::new(),
                        span: e.span(),
                    },
                    span: e.span(),
                }
            });

        let op = generic_op.or(return_op);

        // ── ^bb0(%a: T): ──
        let block_header = name(Token::Caret)
            .then(arg_list.clone().or_not())
            .then_ignore(just(Token::Colon));

        let entry_block = block_header
            .clone()
            .or_not()
            .then(op.clone().repeated().collect::<Vec<_>>())
            .map_with(|(header, ops), e| {
                let (label, args) = match header {
                    Some((label, args)) => (Some(label), args.unwrap_or_default()),
                    None => (None, Vec::new()),
                };
                BlockAst {
                    label,
                    args,
                    ops,
                    span: e.span(),
                }
            });

        let labeled_block = block_header
            .then(op.repeated().collect::<Vec<_>>())
            .map_with(|((label, args), ops), e| BlockAst {
                label: Some(label),
                args: args.unwrap_or_default(),
                ops,
                span: e.span(),
            });

        entry_block
            .then(labeled_block.repeated().collect::<Vec<_>>())
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .map_with(|(entry, rest), e| {
                let mut blocks = Vec::with_capacity(rest.len() + 1);
                if entry.label.is_some() || !entry.ops.is_empty() || !rest.is_empty() {
                    blocks.push(entry);
                }
                blocks.extend(rest);
                RegionAst {
                    blocks,
                    span: e.span(),
                }
            })
    });

    // ── func.func @name(args) -> results { body } ──
    let func = just(Token::FuncFunc)
        .ignore_then(name(Token::SymbolRef))
        .then(arg_list)
        .then(just(Token::Arrow).ignore_then(result_types).or_not())
        .then(region)
        .map_with(|(((name, args), results), body), e| FuncAst {
            name,
            args,
            results: results.unwrap_or_default(),
            body,
            span: e.span(),
        });

    let funcs = func.repeated().collect::<Vec<_>>();

    let wrapped = just(Token::Module)
        .ignore_then(just(Token::SymbolRef).or_not())
        .ignore_then(funcs.clone().delimited_by(just(Token::LBrace), just(Token::RBrace)));

    wrapped
        .or(funcs)
        .then_ignore(end())
        .map_with(|funcs, e| ModuleAst {
            funcs,
            span: e.span(),
        })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::{ComparisonDirection, DotDimensionNumbers, Precision};

    /// Helper: parse and assert no errors.
    fn parse_ok(source: &str) -> ModuleAst {
        let result = parse(source);
        assert!(
            result.errors.is_empty(),
            "unexpected parse errors: {:?}",
            result.errors
        );
        result.module.expect("module")
    }

    fn attr_ok(source: &str) -> Attribute {
        parse_attribute(source).unwrap_or_else(|e| panic!("{source}: {e:?}"))
    }

    fn first_op(module: &ModuleAst) -> &OpAst {
        &module.funcs[0].body.blocks[0].ops[0]
    }

    // ── Attributes ──

    #[test]
    fn integer_defaults_to_i64() {
        assert_eq!(attr_ok("2"), Attribute::int(2));
        let Attribute::Integer(i) = attr_ok("7 : i32") else {
            panic!("expected integer")
        };
        assert_eq!(i.ty, "i32".parse().unwrap());
    }

    #[test]
    fn float_defaults_to_f64_and_rounds_f32() {
        assert_eq!(attr_ok("0.001"), Attribute::float(0.001));
        let Attribute::Float(f) = attr_ok("0.1 : f32") else {
            panic!("expected float")
        };
        assert_eq!(f.ty, FloatType::F32);
        assert_eq!(f.value, 0.1f32 as f64);
    }

    #[test]
    fn hex_float_bit_pattern() {
        let Attribute::Float(f) = attr_ok("0x7F800000 : f32") else {
            panic!("expected float")
        };
        assert!(f.value.is_infinite());
    }

    #[test]
    fn booleans_and_unit() {
        assert_eq!(attr_ok("true"), Attribute::Integer(IntegerAttr::bool(true)));
        assert_eq!(attr_ok("unit"), Attribute::Unit);
    }

    #[test]
    fn nested_array_and_dictionary() {
        let attr = attr_ok(r#"[["a", "b"], {flag, k = 1 : i64}]"#);
        let Attribute::Array(items) = attr else {
            panic!("expected array")
        };
        assert_eq!(
            items[0],
            Attribute::Array(vec![Attribute::string("a"), Attribute::string("b")])
        );
        assert_eq!(
            items[1],
            Attribute::Dictionary(vec![
                NamedAttribute::new("flag", Attribute::Unit),
                NamedAttribute::new("k", Attribute::int(1)),
            ])
        );
    }

    #[test]
    fn dense_nested_and_splat() {
        let Attribute::DenseElements(d) = attr_ok("dense<[[1, 2], [3, 4]]> : tensor<2x2xi32>") else {
            panic!("expected dense")
        };
        assert_eq!(d.int_values().unwrap().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        let Attribute::DenseElements(s) = attr_ok("dense<1.5> : tensor<3xf32>") else {
            panic!("expected dense")
        };
        assert!(s.is_splat());
        assert_eq!(s.float_values().unwrap().count(), 3);
    }

    #[test]
    fn dense_count_mismatch_is_an_error() {
        assert!(parse_attribute("dense<[1, 2, 3]> : tensor<2xi32>").is_err());
    }

    #[test]
    fn dense_arrays() {
        assert_eq!(
            attr_ok("array<i64: 0, 2, 1, 3>"),
            Attribute::DenseI64Array(vec![0, 2, 1, 3])
        );
        assert_eq!(attr_ok("array<i64>"), Attribute::DenseI64Array(vec![]));
        assert_eq!(
            attr_ok("array<i1: true, false>"),
            Attribute::DenseBoolArray(vec![true, false])
        );
        assert!(matches!(
            attr_ok("array<i32: 1, 2>"),
            Attribute::DenseArray { .. }
        ));
    }

    #[test]
    fn stablehlo_enums() {
        assert_eq!(
            attr_ok("#stablehlo<comparison_direction GT>"),
            Attribute::ComparisonDirection(ComparisonDirection::Gt)
        );
        assert_eq!(
            attr_ok("[#stablehlo<precision DEFAULT>, #stablehlo<precision HIGH>]"),
            Attribute::Array(vec![
                Attribute::Precision(Precision::Default),
                Attribute::Precision(Precision::High),
            ])
        );
        assert!(parse_attribute("#stablehlo<comparison_direction SIDEWAYS>").is_err());
    }

    #[test]
    fn dot_dimension_numbers() {
        let attr = attr_ok(
            "#stablehlo.dot<lhs_batching_dimensions = [0], rhs_batching_dimensions = [0], \
             lhs_contracting_dimensions = [2], rhs_contracting_dimensions = [1]>",
        );
        assert_eq!(
            attr,
            Attribute::DotDimensionNumbers(DotDimensionNumbers {
                lhs_batching_dimensions: vec![0],
                rhs_batching_dimensions: vec![0],
                lhs_contracting_dimensions: vec![2],
                rhs_contracting_dimensions: vec![1],
            })
        );
    }

    #[test]
    fn conv_compact_and_raw_forms_agree() {
        let compact = attr_ok("#stablehlo.conv<[b, 0, 1, f]x[0, 1, i, o]->[b, 0, 1, f]>");
        let raw = attr_ok(
            "#stablehlo.conv<raw input_batch_dimension = 0, input_feature_dimension = 3, \
             input_spatial_dimensions = [1, 2], kernel_input_feature_dimension = 2, \
             kernel_output_feature_dimension = 3, kernel_spatial_dimensions = [0, 1], \
             output_batch_dimension = 0, output_feature_dimension = 3, \
             output_spatial_dimensions = [1, 2]>",
        );
        assert_eq!(compact, raw);
    }

    #[test]
    fn const_bytes() {
        assert_eq!(
            attr_ok(r#"#tfl<const_bytes : "0x0AFF">"#),
            Attribute::Bytes(vec![0x0a, 0xff])
        );
        assert!(parse_attribute(r#"#tfl<const_bytes : "0xABC">"#).is_err());
    }

    #[test]
    fn unknown_record_and_type_attribute() {
        assert!(matches!(
            attr_ok("#mhlo.foo<bar = 1>"),
            Attribute::Record { .. }
        ));
        assert!(matches!(attr_ok("tensor<2xf32>"), Attribute::Type(_)));
        assert_eq!(attr_ok("@callee"), Attribute::SymbolRef("callee".into()));
    }

    #[test]
    fn printed_attributes_reparse() {
        for src in [
            "dense<[[1, 2], [3, 4]]> : tensor<2x2xi64>",
            "#stablehlo.gather<offset_dims = [1], start_index_map = [0], index_vector_dim = 1>",
            "#stablehlo<comparison_type TOTALORDER>",
            "array<i1: true, false>",
            "{flag, k = 1 : i64}",
        ] {
            let attr = attr_ok(src);
            assert_eq!(attr_ok(&attr.to_string()), attr, "{src}");
        }
    }

    // ── Module structure ──

    #[test]
    fn minimal_function() {
        let m = parse_ok(
            "func.func @main(%arg0: tensor<2xf32>) -> tensor<2xf32> {\n\
               %0 = \"stablehlo.abs\"(%arg0) : (tensor<2xf32>) -> tensor<2xf32>\n\
               return %0 : tensor<2xf32>\n\
             }",
        );
        assert_eq!(m.funcs.len(), 1);
        let f = &m.funcs[0];
        assert_eq!(f.name.text, "@main");
        assert_eq!(f.args[0].name.text, "%arg0");
        assert_eq!(f.body.blocks[0].ops.len(), 2);
        let op = first_op(&m);
        assert_eq!(op.name, "stablehlo.abs");
        assert_eq!(op.results[0].name.text, "%0");
        assert_eq!(op.operands[0].name, "%arg0");
        assert_eq!(f.body.blocks[0].ops[1].name, "func.return");
    }

    #[test]
    fn module_wrapper_and_attributes() {
        let m = parse_ok(
            "module {\n\
               func.func @f(%a: tensor<4xf32>) -> tensor<4xf32> {\n\
                 %0 = \"stablehlo.foo\"(%a) {axis = 2 : i64, epsilon = 0.001 : f32} : (tensor<4xf32>) -> tensor<4xf32>\n\
                 return %0 : tensor<4xf32>\n\
               }\n\
             }",
        );
        let op = first_op(&m);
        assert_eq!(op.attributes.len(), 2);
        assert_eq!(op.attributes[0].name, "axis");
        assert_eq!(op.attributes[0].value, Attribute::int(2));
        assert_eq!(op.attributes[1].name, "epsilon");
    }

    #[test]
    fn multi_result_and_indexed_use() {
        let m = parse_ok(
            "func.func @f(%a: tensor<f32>) -> tensor<f32> {\n\
               %0:2 = \"stablehlo.pair\"(%a) : (tensor<f32>) -> (tensor<f32>, tensor<f32>)\n\
               return %0#1 : tensor<f32>\n\
             }",
        );
        let ops = &m.funcs[0].body.blocks[0].ops;
        assert_eq!(ops[0].results[0].count, 2);
        assert_eq!(ops[0].num_results(), 2);
        assert_eq!(ops[1].operands[0].name, "%0");
        assert_eq!(ops[1].operands[0].index, Some(1));
    }

    #[test]
    fn nested_region_with_block_arguments() {
        let m = parse_ok(
            "func.func @f(%a: tensor<4xf32>, %init: tensor<f32>) -> tensor<f32> {\n\
               %0 = \"stablehlo.reduce\"(%a, %init) ({\n\
                 ^bb0(%x: tensor<f32>, %y: tensor<f32>):\n\
                   %s = \"stablehlo.add\"(%x, %y) : (tensor<f32>, tensor<f32>) -> tensor<f32>\n\
                   \"stablehlo.return\"(%s) : (tensor<f32>) -> ()\n\
               }) {dimensions = array<i64: 0>} : (tensor<4xf32>, tensor<f32>) -> tensor<f32>\n\
               return %0 : tensor<f32>\n\
             }",
        );
        let reduce = first_op(&m);
        assert_eq!(reduce.regions.len(), 1);
        let block = &reduce.regions[0].blocks[0];
        assert_eq!(block.label.as_ref().unwrap().text, "^bb0");
        assert_eq!(block.args.len(), 2);
        assert_eq!(block.ops.len(), 2);
        assert!(block.ops[1].signature.outputs.is_empty());
    }

    #[test]
    fn zero_operand_return() {
        let m = parse_ok("func.func @f() {\n  return\n}");
        let ret = first_op(&m);
        assert_eq!(ret.name, "func.return");
        assert!(ret.operands.is_empty());
    }

    #[test]
    fn missing_signature_is_an_error() {
        let result = parse("func.func @f() {\n  \"stablehlo.foo\"()\n}");
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn lex_errors_are_reported() {
        let result = parse("func.func @f() { ` }");
        assert!(!result.errors.is_empty());
    }
}
