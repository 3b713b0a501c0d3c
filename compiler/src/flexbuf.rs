// flexbuf.rs — FlexBuffers writer with caller-chosen vector typing
//
// Stack builder following the reference C++ `flexbuffers::Builder`: scalars,
// keys and references are pushed onto a value stack, and `end_vector` /
// `end_map` pack a run of stack entries into the buffer. The caller decides
// whether a vector is typed. Typed vectors always carry a length prefix, so
// a vector's type never depends on how many elements it has. Buffers read
// back with `flexbuffers::Reader`.
//
// Preconditions: typed vectors hold one element type; map keys are unique
//   and free of NUL bytes.
// Postconditions: `finish` returns a complete buffer with exactly one root.
// Failure modes: misuse (mixed typed vector, odd map stack, finishing with
//   other than one root value) panics.
// Side effects: none.

use flexbuffers::{BitWidth, FlexBufferType};

const WIDTHS: [BitWidth; 4] = [BitWidth::W8, BitWidth::W16, BitWidth::W32, BitWidth::W64];

// ── Widths ─────────────────────────────────────────────────────────────────

fn width_u(u: u64) -> BitWidth {
    if u <= u8::MAX as u64 {
        BitWidth::W8
    } else if u <= u16::MAX as u64 {
        BitWidth::W16
    } else if u <= u32::MAX as u64 {
        BitWidth::W32
    } else {
        BitWidth::W64
    }
}

fn width_i(i: i64) -> BitWidth {
    let u = (i as u64) << 1;
    width_u(if i >= 0 { u } else { !u })
}

fn width_f(f: f64) -> BitWidth {
    if (f as f32) as f64 == f {
        BitWidth::W32
    } else {
        BitWidth::W64
    }
}

fn padding(len: usize, byte_width: usize) -> usize {
    len.wrapping_neg() & (byte_width - 1)
}

#[allow(deprecated)]
fn typed_vector_of(element: FlexBufferType) -> FlexBufferType {
    match element {
        FlexBufferType::Int => FlexBufferType::VectorInt,
        FlexBufferType::UInt => FlexBufferType::VectorUInt,
        FlexBufferType::Float => FlexBufferType::VectorFloat,
        FlexBufferType::Key => FlexBufferType::VectorKey,
        FlexBufferType::String => FlexBufferType::VectorString,
        FlexBufferType::Bool => FlexBufferType::VectorBool,
        other => panic!("{other:?} cannot be the element type of a typed vector"),
    }
}

// ── Stack values ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Value {
    /// Scalar bits for inline values, absolute buffer address otherwise.
    bits: u64,
    ty: FlexBufferType,
    /// Width of the scalar itself, or of a reference's elements / length.
    min_width: BitWidth,
}

impl Value {
    fn inline(bits: u64, ty: FlexBufferType, min_width: BitWidth) -> Self {
        Self { bits, ty, min_width }
    }

    fn reference(address: usize, ty: FlexBufferType, min_width: BitWidth) -> Self {
        Self {
            bits: address as u64,
            ty,
            min_width,
        }
    }

    /// Width needed to store this value as element `index` of a vector
    /// written at the current end (`buf_len`) of the buffer.
    fn elem_width(&self, buf_len: usize, index: usize) -> BitWidth {
        if self.ty.is_inline() {
            return self.min_width;
        }
        for width in WIDTHS {
            let n = width.n_bytes();
            let slot = buf_len + padding(buf_len, n) + index * n;
            if width_u(slot as u64 - self.bits) == width {
                return width;
            }
        }
        BitWidth::W64
    }

    fn stored_width(&self, parent: BitWidth) -> BitWidth {
        if self.ty.is_inline() {
            self.min_width.max(parent)
        } else {
            self.min_width
        }
    }

    fn packed_type(&self, parent: BitWidth) -> u8 {
        ((self.ty as u8) << 2) | self.stored_width(parent) as u8
    }
}

// ── Writer ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
    stack: Vec<Value>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marker for a following `end_vector` / `end_map`.
    pub fn start(&self) -> usize {
        self.stack.len()
    }

    pub fn key(&mut self, key: &str) {
        debug_assert!(!key.bytes().any(|b| b == 0), "map keys must not contain NUL");
        let address = self.buf.len();
        self.buf.extend_from_slice(key.as_bytes());
        self.buf.push(0);
        self.stack
            .push(Value::reference(address, FlexBufferType::Key, BitWidth::W8));
    }

    pub fn int(&mut self, value: i64) {
        self.stack
            .push(Value::inline(value as u64, FlexBufferType::Int, width_i(value)));
    }

    pub fn float(&mut self, value: f64) {
        self.stack.push(Value::inline(
            value.to_bits(),
            FlexBufferType::Float,
            width_f(value),
        ));
    }

    pub fn bool(&mut self, value: bool) {
        self.stack
            .push(Value::inline(value as u64, FlexBufferType::Bool, BitWidth::W8));
    }

    pub fn string(&mut self, value: &str) {
        let width = width_u(value.len() as u64);
        let byte_width = self.align(width);
        self.write_uint(value.len() as u64, byte_width);
        let address = self.buf.len();
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
        self.stack
            .push(Value::reference(address, FlexBufferType::String, width));
    }

    /// Pack everything pushed since `start` into one vector. A typed vector
    /// with no elements is a `VectorKey`.
    pub fn end_vector(&mut self, start: usize, typed: bool) {
        let len = self.stack.len() - start;
        let vector = self.create_vector(start, len, 1, typed, None);
        self.stack.truncate(start);
        self.stack.push(vector);
    }

    /// Pack the key/value pairs pushed since `start` into a map, keys sorted
    /// bytewise.
    pub fn end_map(&mut self, start: usize) {
        let entries = self.stack.len() - start;
        assert!(entries % 2 == 0, "end_map: unpaired key or value on the stack");
        let len = entries / 2;

        let mut pairs: Vec<(Value, Value)> = self.stack[start..]
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .collect();
        pairs.sort_by(|a, b| self.key_bytes(&a.0).cmp(self.key_bytes(&b.0)));
        for (i, (key, value)) in pairs.into_iter().enumerate() {
            self.stack[start + 2 * i] = key;
            self.stack[start + 2 * i + 1] = value;
        }

        let keys = self.create_vector(start, len, 2, true, None);
        let map = self.create_vector(start + 1, len, 2, false, Some(keys));
        self.stack.truncate(start);
        self.stack.push(map);
    }

    /// Write the root value and return the finished buffer.
    pub fn finish(mut self) -> Vec<u8> {
        assert_eq!(
            self.stack.len(),
            1,
            "finish: expected exactly one root value on the stack"
        );
        let root = self.stack[0];
        let byte_width = self.align(root.elem_width(self.buf.len(), 0));
        self.write_any(&root, byte_width);
        self.buf.push(root.packed_type(BitWidth::W8));
        self.buf.push(byte_width as u8);
        self.buf
    }

    // ── Internals ──

    fn key_bytes(&self, key: &Value) -> &[u8] {
        let start = key.bits as usize;
        let end = self.buf[start..]
            .iter()
            .position(|&b| b == 0)
            .map_or(self.buf.len(), |p| start + p);
        &self.buf[start..end]
    }

    fn create_vector(
        &mut self,
        start: usize,
        len: usize,
        step: usize,
        typed: bool,
        keys: Option<Value>,
    ) -> Value {
        let elements: Vec<Value> = self.stack[start..]
            .iter()
            .step_by(step)
            .take(len)
            .copied()
            .collect();

        let mut width = width_u(len as u64);
        let mut prefix = 1;
        if let Some(keys) = &keys {
            width = width.max(keys.elem_width(self.buf.len(), 0));
            prefix += 2;
        }
        let mut element_type = FlexBufferType::Key;
        for (i, element) in elements.iter().enumerate() {
            // Stack distance, not element index, as the reference builder does.
            width = width.max(element.elem_width(self.buf.len(), i * step + prefix));
            if typed {
                if i == 0 {
                    element_type = element.ty;
                } else {
                    assert_eq!(
                        element_type, element.ty,
                        "typed vector with mixed element types"
                    );
                }
            }
        }

        let byte_width = self.align(width);
        if let Some(keys) = &keys {
            self.write_offset(keys.bits, byte_width);
            self.write_uint(keys.min_width.n_bytes() as u64, byte_width);
        }
        self.write_uint(len as u64, byte_width);
        let address = self.buf.len();
        for element in &elements {
            self.write_any(element, byte_width);
        }
        if !typed {
            for element in &elements {
                self.buf.push(element.packed_type(width));
            }
        }

        let ty = if keys.is_some() {
            FlexBufferType::Map
        } else if typed {
            typed_vector_of(element_type)
        } else {
            FlexBufferType::Vector
        };
        Value::reference(address, ty, width)
    }

    fn align(&mut self, width: BitWidth) -> usize {
        let byte_width = width.n_bytes();
        let pad = padding(self.buf.len(), byte_width);
        self.buf.resize(self.buf.len() + pad, 0);
        byte_width
    }

    fn write_uint(&mut self, value: u64, byte_width: usize) {
        self.buf
            .extend_from_slice(&value.to_le_bytes()[..byte_width]);
    }

    fn write_offset(&mut self, address: u64, byte_width: usize) {
        let relative = self.buf.len() as u64 - address;
        self.write_uint(relative, byte_width);
    }

    fn write_any(&mut self, value: &Value, byte_width: usize) {
        match value.ty {
            FlexBufferType::Null
            | FlexBufferType::Int
            | FlexBufferType::UInt
            | FlexBufferType::Bool => self.write_uint(value.bits, byte_width),
            FlexBufferType::Float => {
                let f = f64::from_bits(value.bits);
                match byte_width {
                    8 => self.write_uint(f.to_bits(), 8),
                    4 => self.write_uint((f as f32).to_bits() as u64, 4),
                    n => unreachable!("floats are never stored in {n} bytes"),
                }
            }
            _ => self.write_offset(value.bits, byte_width),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flexbuffers::Reader;

    fn map_with(fill: impl FnOnce(&mut Writer)) -> Vec<u8> {
        let mut w = Writer::new();
        let start = w.start();
        fill(&mut w);
        w.end_map(start);
        w.finish()
    }

    #[test]
    fn widths_follow_value_ranges() {
        assert_eq!(width_i(127), BitWidth::W8);
        assert_eq!(width_i(-128), BitWidth::W8);
        assert_eq!(width_i(128), BitWidth::W16);
        assert_eq!(width_i(-1), BitWidth::W8);
        assert_eq!(width_i(i64::MIN), BitWidth::W64);
        assert_eq!(width_u(256), BitWidth::W16);
        assert_eq!(width_f(0.5), BitWidth::W32);
        assert_eq!(width_f(0.1), BitWidth::W64);
    }

    #[test]
    fn single_int_map_bytes() {
        let bytes = map_with(|w| {
            w.key("axis");
            w.int(2);
        });
        assert_eq!(
            bytes,
            vec![b'a', b'x', b'i', b's', 0, 1, 6, 1, 1, 1, 2, 4, 2, 36, 1]
        );
    }

    #[test]
    fn typed_int_vector_bytes() {
        let bytes = map_with(|w| {
            w.key("perm");
            let v = w.start();
            [0, 2, 1, 3].into_iter().for_each(|i| w.int(i));
            w.end_vector(v, true);
        });
        assert_eq!(
            bytes,
            vec![
                b'p', b'e', b'r', b'm', 0, 4, 0, 2, 1, 3, 1, 11, 1, 1, 1, 9, 44, 2, 36, 1
            ]
        );
    }

    #[test]
    fn keys_are_sorted_bytewise() {
        let bytes = map_with(|w| {
            w.key("b");
            w.int(1);
            w.key("B");
            w.int(2);
            w.key("a");
            w.int(3);
        });
        let map = Reader::get_root(bytes.as_slice()).unwrap().as_map();
        let keys: Vec<String> = map.iter_keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["B", "a", "b"]);
        assert_eq!(map.idx("a").as_i64(), 3);
        assert_eq!(map.idx("B").as_i64(), 2);
    }

    #[test]
    fn vector_typing_is_explicit() {
        let bytes = map_with(|w| {
            for (key, typed) in [("typed", true), ("untyped", false)] {
                w.key(key);
                let v = w.start();
                w.int(7);
                w.int(8);
                w.end_vector(v, typed);
            }
            w.key("empty");
            let v = w.start();
            w.end_vector(v, true);
        });
        let map = Reader::get_root(bytes.as_slice()).unwrap().as_map();
        assert_eq!(map.idx("typed").flexbuffer_type(), FlexBufferType::VectorInt);
        assert_eq!(map.idx("untyped").flexbuffer_type(), FlexBufferType::Vector);
        assert_eq!(map.idx("empty").flexbuffer_type(), FlexBufferType::VectorKey);
        let untyped = map.idx("untyped").as_vector();
        assert_eq!(untyped.idx(0).flexbuffer_type(), FlexBufferType::Int);
        assert_eq!(untyped.idx(1).as_i64(), 8);
    }

    #[test]
    fn wide_and_mixed_values_read_back() {
        let long = "x".repeat(300);
        let bytes = map_with(|w| {
            w.key("big");
            w.int(1 << 40);
            w.key("neg");
            w.int(-70000);
            w.key("pi");
            w.float(std::f64::consts::PI);
            w.key("half");
            w.float(0.5);
            w.key("flag");
            w.bool(true);
            w.key("long");
            w.string(&long);
            w.key("nested");
            let outer = w.start();
            w.int(1);
            let inner = w.start();
            w.int(-1);
            w.end_vector(inner, false);
            w.end_vector(outer, false);
        });
        let map = Reader::get_root(bytes.as_slice()).unwrap().as_map();
        assert_eq!(map.idx("big").as_i64(), 1 << 40);
        assert_eq!(map.idx("neg").as_i64(), -70000);
        assert_eq!(map.idx("pi").as_f64(), std::f64::consts::PI);
        assert_eq!(map.idx("half").as_f64(), 0.5);
        assert!(map.idx("flag").as_bool());
        assert_eq!(map.idx("long").as_str(), long);
        let nested = map.idx("nested").as_vector();
        assert_eq!(nested.idx(0).as_i64(), 1);
        assert_eq!(nested.idx(1).as_vector().idx(0).as_i64(), -1);
    }

    #[test]
    fn typed_string_vector_reads_back() {
        let bytes = map_with(|w| {
            w.key("names");
            let v = w.start();
            w.string("DEFAULT");
            w.string("HIGH");
            w.end_vector(v, true);
        });
        let map = Reader::get_root(bytes.as_slice()).unwrap().as_map();
        #[allow(deprecated)]
        let expected = FlexBufferType::VectorString;
        assert_eq!(map.idx("names").flexbuffer_type(), expected);
        let names: Vec<String> = map
            .idx("names")
            .as_vector()
            .iter()
            .map(|r| r.as_str().to_string())
            .collect();
        assert_eq!(names, vec!["DEFAULT", "HIGH"]);
    }

    #[test]
    #[should_panic(expected = "mixed element types")]
    fn typed_vector_rejects_mixed_elements() {
        let mut w = Writer::new();
        let v = w.start();
        w.int(1);
        w.bool(true);
        w.end_vector(v, true);
    }
}
