//! Value codec for encoding documents to and from bytes.
//!
//! Format of an encoded document:
//! - Field count (4 bytes, little-endian)
//! - For each field:
//!   - Field name length (2 bytes, little-endian)
//!   - Field name (UTF-8 bytes)
//!   - Value tag (1 byte)
//!   - Value data (variable length, depends on type)
//!
//! Arrays and embedded documents nest. Materialized entities are written as
//! their identifier, so a populated document that slips through encodes as
//! the reference it came from.

use docpop_proto::{Document, Value};

use crate::error::Error;

/// Type tag for encoded values.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueTag {
    Null = 0,
    Bool = 1,
    Int32 = 2,
    Int64 = 3,
    Float64 = 5,
    String = 6,
    Uuid = 8,
    Timestamp = 9,
    Array = 17,
    Object = 18,
}

impl TryFrom<u8> for ValueTag {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ValueTag::Null),
            1 => Ok(ValueTag::Bool),
            2 => Ok(ValueTag::Int32),
            3 => Ok(ValueTag::Int64),
            5 => Ok(ValueTag::Float64),
            6 => Ok(ValueTag::String),
            8 => Ok(ValueTag::Uuid),
            9 => Ok(ValueTag::Timestamp),
            17 => Ok(ValueTag::Array),
            18 => Ok(ValueTag::Object),
            _ => Err(Error::InvalidData(format!("Unknown value tag: {}", value))),
        }
    }
}

/// Encode a document's fields to bytes.
pub fn encode_document(doc: &Document) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    encode_fields(&mut buf, doc.fields())?;
    Ok(buf)
}

/// Decode bytes back to a document.
pub fn decode_document(data: &[u8]) -> Result<Document, Error> {
    let mut reader = Reader::new(data);
    let fields = decode_fields(&mut reader)?;
    if !reader.is_exhausted() {
        return Err(Error::InvalidData("Trailing bytes after document".into()));
    }
    Ok(Document::from_fields(fields))
}

fn encode_fields(buf: &mut Vec<u8>, fields: &[(String, Value)]) -> Result<(), Error> {
    if fields.len() > u32::MAX as usize {
        return Err(Error::Serialization("Too many fields".into()));
    }
    buf.extend_from_slice(&(fields.len() as u32).to_le_bytes());

    for (name, value) in fields {
        let name_bytes = name.as_bytes();
        if name_bytes.len() > u16::MAX as usize {
            return Err(Error::Serialization("Field name too long".into()));
        }
        buf.extend_from_slice(&(name_bytes.len() as u16).to_le_bytes());
        buf.extend_from_slice(name_bytes);
        encode_value(buf, value)?;
    }
    Ok(())
}

fn encode_value(buf: &mut Vec<u8>, value: &Value) -> Result<(), Error> {
    match value {
        Value::Null => {
            buf.push(ValueTag::Null as u8);
        }
        Value::Bool(b) => {
            buf.push(ValueTag::Bool as u8);
            buf.push(if *b { 1 } else { 0 });
        }
        Value::Int32(n) => {
            buf.push(ValueTag::Int32 as u8);
            buf.extend_from_slice(&n.to_le_bytes());
        }
        Value::Int64(n) => {
            buf.push(ValueTag::Int64 as u8);
            buf.extend_from_slice(&n.to_le_bytes());
        }
        Value::Float64(f) => {
            buf.push(ValueTag::Float64 as u8);
            buf.extend_from_slice(&f.to_le_bytes());
        }
        Value::String(s) => {
            buf.push(ValueTag::String as u8);
            let bytes = s.as_bytes();
            if bytes.len() > u32::MAX as usize {
                return Err(Error::Serialization("String too long".into()));
            }
            buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            buf.extend_from_slice(bytes);
        }
        Value::Uuid(uuid) => {
            buf.push(ValueTag::Uuid as u8);
            buf.extend_from_slice(uuid);
        }
        Value::Timestamp(ts) => {
            buf.push(ValueTag::Timestamp as u8);
            buf.extend_from_slice(&ts.to_le_bytes());
        }
        Value::Array(items) => {
            buf.push(ValueTag::Array as u8);
            if items.len() > u32::MAX as usize {
                return Err(Error::Serialization("Array too long".into()));
            }
            buf.extend_from_slice(&(items.len() as u32).to_le_bytes());
            for item in items {
                encode_value(buf, item)?;
            }
        }
        Value::Object(doc) => {
            buf.push(ValueTag::Object as u8);
            encode_fields(buf, doc.fields())?;
        }
        Value::Entity(entity) => {
            encode_value(buf, &entity.id().to_value())?;
        }
    }
    Ok(())
}

/// Bounds-checked cursor over encoded bytes.
struct Reader<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, cursor: 0 }
    }

    fn is_exhausted(&self) -> bool {
        self.cursor == self.data.len()
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8], Error> {
        let end = self
            .cursor
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| Error::InvalidData(format!("Data too short for {}", what)))?;
        let bytes = &self.data[self.cursor..end];
        self.cursor = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N], Error> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn u8(&mut self, what: &str) -> Result<u8, Error> {
        Ok(self.array::<1>(what)?[0])
    }

    fn u16(&mut self, what: &str) -> Result<u16, Error> {
        Ok(u16::from_le_bytes(self.array(what)?))
    }

    fn u32(&mut self, what: &str) -> Result<u32, Error> {
        Ok(u32::from_le_bytes(self.array(what)?))
    }

    fn string(&mut self, len: usize, what: &str) -> Result<String, Error> {
        let bytes = self.take(len, what)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::InvalidData(format!("Invalid UTF-8 in {}", what)))
    }
}

fn decode_fields(reader: &mut Reader<'_>) -> Result<Vec<(String, Value)>, Error> {
    let count = reader.u32("field count")? as usize;
    let mut fields = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let name_len = reader.u16("field name length")? as usize;
        let name = reader.string(name_len, "field name")?;
        let value = decode_value(reader)?;
        fields.push((name, value));
    }
    Ok(fields)
}

fn decode_value(reader: &mut Reader<'_>) -> Result<Value, Error> {
    let tag = ValueTag::try_from(reader.u8("value tag")?)?;
    let value = match tag {
        ValueTag::Null => Value::Null,
        ValueTag::Bool => Value::Bool(reader.u8("bool")? != 0),
        ValueTag::Int32 => Value::Int32(i32::from_le_bytes(reader.array("i32")?)),
        ValueTag::Int64 => Value::Int64(i64::from_le_bytes(reader.array("i64")?)),
        ValueTag::Float64 => Value::Float64(f64::from_le_bytes(reader.array("f64")?)),
        ValueTag::String => {
            let len = reader.u32("string length")? as usize;
            Value::String(reader.string(len, "string")?)
        }
        ValueTag::Uuid => Value::Uuid(reader.array("uuid")?),
        ValueTag::Timestamp => Value::Timestamp(i64::from_le_bytes(reader.array("timestamp")?)),
        ValueTag::Array => {
            let len = reader.u32("array length")? as usize;
            let mut items = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                items.push(decode_value(reader)?);
            }
            Value::Array(items)
        }
        ValueTag::Object => Value::Object(Document::from_fields(decode_fields(reader)?)),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docpop_proto::{DocId, Entity, EntityBackend, Error as ProtoError};
    use std::sync::Arc;

    struct NoopBackend;

    impl EntityBackend for NoopBackend {
        fn save_document(&self, _: &str, _: &DocId, _: &Document) -> Result<(), ProtoError> {
            Ok(())
        }

        fn remove_document(&self, _: &str, _: &DocId) -> Result<bool, ProtoError> {
            Ok(false)
        }
    }

    #[test]
    fn test_nested_document_roundtrip() {
        let doc = Document::new()
            .with("_id", Value::Uuid([3; 16]))
            .with("title", "Story")
            .with("rating", 4.5)
            .with("published", true)
            .with("at", Value::Timestamp(1_700_000_000_000_000))
            .with("fans", Value::Array(vec![Value::Int64(1), Value::Null]))
            .with(
                "comments",
                Value::Array(vec![Value::Object(
                    Document::new().with("text", "hi").with("author", Value::Int32(7)),
                )]),
            );

        let bytes = encode_document(&doc).unwrap();
        assert_eq!(decode_document(&bytes).unwrap(), doc);
    }

    #[test]
    fn test_entity_encodes_as_id() {
        let entity = Entity::new(
            "Person",
            DocId::Int(5),
            Document::new().with("name", "Al"),
            Arc::new(NoopBackend),
        );
        let doc = Document::new().with("author", entity);
        let decoded = decode_document(&encode_document(&doc).unwrap()).unwrap();
        assert_eq!(decoded.get("author"), Some(&Value::Int64(5)));
    }

    #[test]
    fn test_truncated_and_unknown_data() {
        let bytes = encode_document(&Document::new().with("name", "Al")).unwrap();
        assert!(decode_document(&bytes[..bytes.len() - 1]).is_err());
        assert!(decode_document(&[1, 0, 0, 0, 1, 0, b'x', 99]).is_err());

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(decode_document(&trailing).is_err());
    }
}
