// inspect.rs — Human-readable dump of option blobs
//
// Decodes a `custom_option` FlexBuffers blob into a `serde_json::Value`.
// The dump is structural only: record vectors stay positional arrays, since
// giving their slots names is the kernel-side decoder's job.

use flexbuffers::{FlexBufferType, Reader};
use serde_json::{Map, Value};

use crate::error::Error;

/// Decode an option blob whose root must be a map.
pub fn options_to_json(bytes: &[u8]) -> Result<Value, Error> {
    let root = Reader::get_root(bytes).map_err(malformed)?;
    if root.flexbuffer_type() != FlexBufferType::Map {
        return Err(Error::MalformedOptions(format!(
            "root is {:?}, expected a map",
            root.flexbuffer_type()
        )));
    }
    to_json(root)
}

fn to_json(reader: Reader<&[u8]>) -> Result<Value, Error> {
    let ty = reader.flexbuffer_type();
    let value = match ty {
        FlexBufferType::Null => Value::Null,
        FlexBufferType::Bool => Value::Bool(reader.get_bool().map_err(malformed)?),
        FlexBufferType::Int | FlexBufferType::IndirectInt => {
            Value::from(reader.get_i64().map_err(malformed)?)
        }
        FlexBufferType::UInt | FlexBufferType::IndirectUInt => {
            Value::from(reader.get_u64().map_err(malformed)?)
        }
        FlexBufferType::Float | FlexBufferType::IndirectFloat => {
            Value::from(reader.get_f64().map_err(malformed)?)
        }
        FlexBufferType::String => Value::String(reader.get_str().map_err(malformed)?.to_string()),
        // Elements of typed string vectors come back as keys.
        FlexBufferType::Key => Value::String(reader.get_key().map_err(malformed)?.to_string()),
        FlexBufferType::Map => {
            let map = reader.get_map().map_err(malformed)?;
            let mut object = Map::new();
            for (key, value) in map.iter_keys().zip(map.iter_values()) {
                object.insert(key.to_string(), to_json(value)?);
            }
            Value::Object(object)
        }
        t if t.is_vector() => {
            let vector = reader.get_vector().map_err(malformed)?;
            Value::Array(vector.iter().map(to_json).collect::<Result<_, _>>()?)
        }
        other => {
            return Err(Error::MalformedOptions(format!(
                "unexpected {other:?} value"
            )))
        }
    };
    Ok(value)
}

fn malformed(e: flexbuffers::ReaderError) -> Error {
    Error::MalformedOptions(format!("{e:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::{Attribute, NamedAttribute};
    use crate::encode::encode_options;
    use crate::location::Location;
    use serde_json::json;

    fn encode(attrs: Vec<NamedAttribute>) -> Vec<u8> {
        let mut diags = Vec::new();
        encode_options(&attrs, Location::unknown(), &mut diags)
    }

    #[test]
    fn decodes_scalars_and_vectors() {
        let bytes = encode(vec![
            NamedAttribute::new("axis", Attribute::int(-1)),
            NamedAttribute::new("perm", Attribute::DenseI64Array(vec![0, 2, 1, 3])),
            NamedAttribute::new("keep", Attribute::DenseBoolArray(vec![true])),
            NamedAttribute::new("mode", Attribute::string("SAME")),
        ]);
        assert_eq!(
            options_to_json(&bytes).unwrap(),
            json!({"axis": -1, "perm": [0, 2, 1, 3], "keep": [true], "mode": "SAME"})
        );
    }

    #[test]
    fn decodes_string_vectors_and_i1_flags() {
        let bytes = encode(vec![
            NamedAttribute::new(
                "precision_config",
                Attribute::Array(vec![Attribute::string("DEFAULT"), Attribute::string("HIGH")]),
            ),
            NamedAttribute::new("empty", Attribute::DenseI64Array(vec![])),
            NamedAttribute::new("flag", Attribute::Integer(crate::attr::IntegerAttr::bool(true))),
        ]);
        assert_eq!(
            options_to_json(&bytes).unwrap(),
            json!({"precision_config": ["DEFAULT", "HIGH"], "empty": [], "flag": -1})
        );
    }

    #[test]
    fn empty_blob_is_an_empty_object() {
        assert_eq!(options_to_json(&encode(vec![])).unwrap(), json!({}));
    }

    #[test]
    fn rejects_non_map_roots() {
        let mut w = crate::flexbuf::Writer::new();
        let v = w.start();
        w.int(1);
        w.end_vector(v, false);
        let err = options_to_json(&w.finish()).unwrap_err();
        assert!(matches!(err, Error::MalformedOptions(_)));
    }

    #[test]
    fn rejects_garbage() {
        assert!(options_to_json(&[]).is_err());
    }
}
