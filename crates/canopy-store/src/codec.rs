//! Node codec and canonical binary encoding.
//!
//! Node records are self-delimiting so a spill file is just records back to
//! back:
//!
//! ```text
//! flags:u8  name:str  object_id:[u8;32]
//!   [metadata_id:[u8;32]]            if flags & METADATA
//!   [min_x max_x min_y max_y: f64be] if flags & BOUNDS
//!   [count:varint (key:str value)*]  if flags & EXTRA
//! ```
//!
//! `str` and byte strings are a varint length followed by the bytes. The same
//! primitives encode every stored object, and those bytes are what object ids
//! hash, so this layout must not change.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};

use canopy_types::object::OBJECT_ID_LEN;
use canopy_types::{Envelope, ObjectId};

use crate::error::{StoreError, StoreResult};
use crate::node::{Node, NodeType, Value};

const FLAG_FEATURE: u8 = 0x01;
const FLAG_METADATA: u8 = 0x02;
const FLAG_BOUNDS: u8 = 0x04;
const FLAG_EXTRA: u8 = 0x08;
const KNOWN_FLAGS: u8 = FLAG_FEATURE | FLAG_METADATA | FLAG_BOUNDS | FLAG_EXTRA;

const VALUE_NULL: u8 = 0;
const VALUE_BOOL: u8 = 1;
const VALUE_INT: u8 = 2;
const VALUE_TEXT: u8 = 3;
const VALUE_BYTES: u8 = 4;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode a u64 as a variable-length integer.
pub(crate) fn encode_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

pub(crate) fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_varint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

pub(crate) fn encode_str(buf: &mut Vec<u8>, s: &str) {
    encode_bytes(buf, s.as_bytes());
}

pub(crate) fn encode_id(buf: &mut Vec<u8>, id: &ObjectId) {
    buf.extend_from_slice(id.as_bytes());
}

pub(crate) fn encode_i64(buf: &mut Vec<u8>, value: i64) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn encode_envelope(buf: &mut Vec<u8>, env: &Envelope) {
    for v in [env.min_x, env.max_x, env.min_y, env.max_y] {
        buf.extend_from_slice(&v.to_bits().to_be_bytes());
    }
}

fn encode_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => buf.push(VALUE_NULL),
        Value::Bool(b) => {
            buf.push(VALUE_BOOL);
            buf.push(*b as u8);
        }
        Value::Int(i) => {
            buf.push(VALUE_INT);
            encode_i64(buf, *i);
        }
        Value::Text(s) => {
            buf.push(VALUE_TEXT);
            encode_str(buf, s);
        }
        Value::Bytes(b) => {
            buf.push(VALUE_BYTES);
            encode_bytes(buf, b);
        }
    }
}

pub(crate) fn encode_values(buf: &mut Vec<u8>, values: &[Value]) {
    encode_varint(buf, values.len() as u64);
    for value in values {
        encode_value(buf, value);
    }
}

/// Append one node record to `buf`.
pub fn encode_node(node: &Node, buf: &mut Vec<u8>) {
    let mut flags = 0u8;
    if node.node_type() == NodeType::Feature {
        flags |= FLAG_FEATURE;
    }
    if node.metadata_id().is_some() {
        flags |= FLAG_METADATA;
    }
    if node.bounds().is_some() {
        flags |= FLAG_BOUNDS;
    }
    if !node.extra().is_empty() {
        flags |= FLAG_EXTRA;
    }
    buf.push(flags);
    encode_str(buf, node.name());
    encode_id(buf, node.object_id());
    if let Some(md) = node.metadata_id() {
        encode_id(buf, md);
    }
    if let Some(bounds) = node.bounds() {
        encode_envelope(buf, bounds);
    }
    if !node.extra().is_empty() {
        encode_varint(buf, node.extra().len() as u64);
        for (key, value) in node.extra() {
            encode_str(buf, key);
            encode_value(buf, value);
        }
    }
}

/// Write one node record to `sink`.
pub fn write_node<W: Write>(node: &Node, sink: &mut W) -> StoreResult<()> {
    let mut buf = Vec::with_capacity(64 + node.name().len());
    encode_node(node, &mut buf);
    sink.write_all(&buf)?;
    Ok(())
}

/// Read the next node record from `source`.
///
/// Returns `Ok(None)` when the source is exhausted exactly at a record
/// boundary, and [`StoreError::Truncated`] when it ends inside a record.
pub fn read_node<R: Read>(source: &mut R) -> StoreResult<Option<Node>> {
    Decoder::new(source).next_node()
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Pull-style decoder over any byte source.
pub(crate) struct Decoder<R> {
    inner: R,
}

impl<R: Read> Decoder<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self { inner }
    }

    pub(crate) fn into_inner(self) -> R {
        self.inner
    }

    fn fill(&mut self, buf: &mut [u8], context: &'static str) -> StoreResult<()> {
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => StoreError::Truncated { context },
            _ => StoreError::Io(e),
        })
    }

    /// Read one byte, or `None` at end of input.
    fn try_u8(&mut self) -> StoreResult<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub(crate) fn u8(&mut self, context: &'static str) -> StoreResult<u8> {
        let mut byte = [0u8; 1];
        self.fill(&mut byte, context)?;
        Ok(byte[0])
    }

    pub(crate) fn varint(&mut self, context: &'static str) -> StoreResult<u64> {
        let mut value: u64 = 0;
        let mut shift = 0;
        loop {
            let byte = self.u8(context)?;
            value |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift >= 64 {
                return Err(StoreError::CorruptRecord(format!("varint overflow in {context}")));
            }
        }
    }

    pub(crate) fn bytes(&mut self, context: &'static str) -> StoreResult<Vec<u8>> {
        let len = self.varint(context)?;
        // Grow as data arrives instead of trusting the length up front.
        let mut out = Vec::new();
        (&mut self.inner).take(len).read_to_end(&mut out)?;
        if out.len() as u64 != len {
            return Err(StoreError::Truncated { context });
        }
        Ok(out)
    }

    pub(crate) fn string(&mut self, context: &'static str) -> StoreResult<String> {
        String::from_utf8(self.bytes(context)?)
            .map_err(|_| StoreError::CorruptRecord(format!("{context} is not valid UTF-8")))
    }

    pub(crate) fn id(&mut self, context: &'static str) -> StoreResult<ObjectId> {
        let mut raw = [0u8; OBJECT_ID_LEN];
        self.fill(&mut raw, context)?;
        Ok(ObjectId::from_hash(raw))
    }

    pub(crate) fn i64(&mut self, context: &'static str) -> StoreResult<i64> {
        let mut raw = [0u8; 8];
        self.fill(&mut raw, context)?;
        Ok(i64::from_be_bytes(raw))
    }

    fn f64(&mut self, context: &'static str) -> StoreResult<f64> {
        let mut raw = [0u8; 8];
        self.fill(&mut raw, context)?;
        Ok(f64::from_bits(u64::from_be_bytes(raw)))
    }

    pub(crate) fn envelope(&mut self) -> StoreResult<Envelope> {
        let min_x = self.f64("bounds")?;
        let max_x = self.f64("bounds")?;
        let min_y = self.f64("bounds")?;
        let max_y = self.f64("bounds")?;
        Ok(Envelope {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    fn value(&mut self) -> StoreResult<Value> {
        match self.u8("value tag")? {
            VALUE_NULL => Ok(Value::Null),
            VALUE_BOOL => Ok(Value::Bool(self.u8("bool value")? != 0)),
            VALUE_INT => Ok(Value::Int(self.i64("int value")?)),
            VALUE_TEXT => Ok(Value::Text(self.string("text value")?)),
            VALUE_BYTES => Ok(Value::Bytes(self.bytes("bytes value")?)),
            tag => Err(StoreError::CorruptRecord(format!("unknown value tag {tag}"))),
        }
    }

    pub(crate) fn values(&mut self) -> StoreResult<Vec<Value>> {
        let count = self.varint("value count")?;
        (0..count).map(|_| self.value()).collect()
    }

    /// Next node record, or `None` on a clean end of input.
    pub(crate) fn next_node(&mut self) -> StoreResult<Option<Node>> {
        match self.try_u8()? {
            None => Ok(None),
            Some(flags) => self.node_body(flags).map(Some),
        }
    }

    /// A node record that must be present.
    pub(crate) fn node(&mut self) -> StoreResult<Node> {
        let flags = self.u8("node flags")?;
        self.node_body(flags)
    }

    fn node_body(&mut self, flags: u8) -> StoreResult<Node> {
        if flags & !KNOWN_FLAGS != 0 {
            return Err(StoreError::CorruptRecord(format!("unknown node flags {flags:#04x}")));
        }
        let node_type = if flags & FLAG_FEATURE != 0 {
            NodeType::Feature
        } else {
            NodeType::Tree
        };
        let name = self.string("node name")?;
        let object_id = self.id("node object id")?;
        let metadata_id = if flags & FLAG_METADATA != 0 {
            Some(self.id("node metadata id")?)
        } else {
            None
        };
        let bounds = if flags & FLAG_BOUNDS != 0 {
            Some(self.envelope()?)
        } else {
            None
        };
        let mut extra = BTreeMap::new();
        if flags & FLAG_EXTRA != 0 {
            let count = self.varint("extra count")?;
            for _ in 0..count {
                let key = self.string("extra key")?;
                let value = self.value()?;
                extra.insert(key, value);
            }
        }
        Ok(Node::new(name, object_id, metadata_id, node_type).with_parts(bounds, extra))
    }
}

/// Decode a whole in-memory buffer with `f`, rejecting trailing bytes.
pub(crate) fn decode_exact<'a, T>(
    data: &'a [u8],
    f: impl FnOnce(&mut Decoder<&'a [u8]>) -> StoreResult<T>,
) -> StoreResult<T> {
    let mut dec = Decoder::new(data);
    let value = f(&mut dec)?;
    let rest = dec.into_inner();
    if !rest.is_empty() {
        return Err(StoreError::CorruptRecord(format!("{} trailing bytes", rest.len())));
    }
    Ok(value)
}
