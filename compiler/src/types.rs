// types.rs — IR value types
//
// Only what the legalizer needs to carry through unchanged: ranked tensors,
// scalar element types, and opaque dialect types (`!stablehlo.token`).

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signedness {
    Signless,
    Signed,
    Unsigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntType {
    pub width: u32,
    pub signedness: Signedness,
}

impl IntType {
    pub const fn signless(width: u32) -> Self {
        Self {
            width,
            signedness: Signedness::Signless,
        }
    }

    pub const I1: IntType = IntType::signless(1);
    pub const I32: IntType = IntType::signless(32);
    pub const I64: IntType = IntType::signless(64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatType {
    F16,
    BF16,
    F32,
    F64,
    F128,
}

/// Scalar element type of tensors and of typed attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Int(IntType),
    Index,
    Float(FloatType),
}

impl ElementType {
    pub fn is_integer(&self) -> bool {
        matches!(self, ElementType::Int(_) | ElementType::Index)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ElementType::Float(_))
    }

    /// Integer width regardless of signedness, as `Type::isInteger(w)` sees it.
    pub fn int_width(&self) -> Option<u32> {
        match self {
            ElementType::Int(it) => Some(it.width),
            _ => None,
        }
    }
}

impl FromStr for ElementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let float = match s {
            "f16" => Some(FloatType::F16),
            "bf16" => Some(FloatType::BF16),
            "f32" => Some(FloatType::F32),
            "f64" => Some(FloatType::F64),
            "f128" => Some(FloatType::F128),
            _ => None,
        };
        if let Some(ft) = float {
            return Ok(ElementType::Float(ft));
        }
        if s == "index" {
            return Ok(ElementType::Index);
        }
        let (signedness, digits) = if let Some(rest) = s.strip_prefix("si") {
            (Signedness::Signed, rest)
        } else if let Some(rest) = s.strip_prefix("ui") {
            (Signedness::Unsigned, rest)
        } else if let Some(rest) = s.strip_prefix('i') {
            (Signedness::Signless, rest)
        } else {
            return Err(format!("unknown element type '{s}'"));
        };
        match digits.parse::<u32>() {
            Ok(width) if (1..=128).contains(&width) && !digits.starts_with('0') => {
                Ok(ElementType::Int(IntType { width, signedness }))
            }
            _ => Err(format!("unknown element type '{s}'")),
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Int(IntType { width, signedness }) => {
                let prefix = match signedness {
                    Signedness::Signless => "i",
                    Signedness::Signed => "si",
                    Signedness::Unsigned => "ui",
                };
                write!(f, "{prefix}{width}")
            }
            ElementType::Index => write!(f, "index"),
            ElementType::Float(ft) => {
                let name = match ft {
                    FloatType::F16 => "f16",
                    FloatType::BF16 => "bf16",
                    FloatType::F32 => "f32",
                    FloatType::F64 => "f64",
                    FloatType::F128 => "f128",
                };
                write!(f, "{name}")
            }
        }
    }
}

/// Ranked tensor type; `None` dims are dynamic (`?`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TensorType {
    pub dims: Vec<Option<i64>>,
    pub element: ElementType,
}

impl TensorType {
    pub fn new(dims: Vec<Option<i64>>, element: ElementType) -> Self {
        Self { dims, element }
    }

    pub fn is_static(&self) -> bool {
        self.dims.iter().all(|d| d.is_some())
    }

    /// Element count of a static shape; `None` if any dimension is dynamic.
    pub fn num_elements(&self) -> Option<usize> {
        self.dims
            .iter()
            .copied()
            .try_fold(1usize, |acc, d| d.and_then(|d| acc.checked_mul(d as usize)))
    }
}

impl FromStr for TensorType {
    type Err = String;

    /// Parses the inside of `tensor<...>`, e.g. `2x?x4xf32` or `f32`.
    fn from_str(body: &str) -> Result<Self, Self::Err> {
        let body = body.trim();
        // `index` is the only element type spelled with an `x`.
        let (shape, element) = match body.strip_suffix("index") {
            Some(shape) => (shape, "index"),
            None => match body.rfind('x') {
                Some(i) => (&body[..i + 1], &body[i + 1..]),
                None => ("", body),
            },
        };
        let element = element.trim().parse::<ElementType>()?;
        let mut dims = Vec::new();
        if !shape.is_empty() {
            let shape = shape
                .strip_suffix('x')
                .ok_or_else(|| format!("invalid tensor type '{body}'"))?;
            for part in shape.split('x') {
                let part = part.trim();
                if part == "?" {
                    dims.push(None);
                } else {
                    let d = part
                        .parse::<i64>()
                        .ok()
                        .filter(|d| *d >= 0)
                        .ok_or_else(|| format!("invalid tensor dimension '{part}'"))?;
                    dims.push(Some(d));
                }
            }
        }
        Ok(TensorType { dims, element })
    }
}

impl fmt::Display for TensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tensor<")?;
        for d in &self.dims {
            match d {
                Some(d) => write!(f, "{d}x")?,
                None => write!(f, "?x")?,
            }
        }
        write!(f, "{}>", self.element)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Tensor(TensorType),
    Scalar(ElementType),
    /// Dialect type kept verbatim, e.g. `!stablehlo.token`.
    Opaque(String),
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Tensor(t) => write!(f, "{t}"),
            Type::Scalar(e) => write!(f, "{e}"),
            Type::Opaque(name) => write!(f, "!{name}"),
        }
    }
}
