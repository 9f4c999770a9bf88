use flate2::{read::GzDecoder, write::GzEncoder, Compression as GzLevel};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;

use crate::tree::{Container, Node, Scalar, Sequence};

const TAG_END: u8 = 0;
const TAG_BYTE: u8 = 1;
const TAG_SHORT: u8 = 2;
const TAG_INT: u8 = 3;
const TAG_LONG: u8 = 4;
const TAG_FLOAT: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_BYTE_ARRAY: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_LIST: u8 = 9;
const TAG_COMPOUND: u8 = 10;
const TAG_INT_ARRAY: u8 = 11;
const TAG_LONG_ARRAY: u8 = 12;

const MAX_DEPTH: usize = 512;
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

#[derive(Debug, Error)]
pub enum NbtError {
    #[error("unexpected end of data at offset {offset}")]
    UnexpectedEof { offset: usize },

    #[error("unknown tag id {tag} at offset {offset}")]
    UnknownTag { tag: u8, offset: usize },

    #[error("root tag must be a compound, found tag id {0}")]
    RootNotCompound(u8),

    #[error("negative length {len} at offset {offset}")]
    NegativeLength { len: i32, offset: usize },

    #[error("nesting deeper than 512 levels")]
    TooDeep,

    #[error("list mixes tag {expected} and tag {found}")]
    MixedList { expected: u8, found: u8 },

    #[error("cannot encode {0} as a tagged value")]
    Unencodable(&'static str),

    #[error("string of {0} bytes exceeds the 65535 byte limit")]
    StringTooLong(usize),

    #[error("string at offset {offset} is not valid modified UTF-8")]
    InvalidString { offset: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type NbtResult<T> = std::result::Result<T, NbtError>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Compression {
    None,
    Gzip,
}

impl Compression {
    /// Gzip is recognised by its two-byte magic; everything else is read raw.
    pub fn sniff(raw: &[u8]) -> Compression {
        if raw.len() >= 2 && raw[..2] == GZIP_MAGIC {
            Compression::Gzip
        } else {
            Compression::None
        }
    }
}

/// A binary tagged-tree document: a named root compound plus the
/// compression it was stored with, so it can be written back the same way.
#[derive(Clone, Debug, PartialEq)]
pub struct NbtDocument {
    pub root_name: String,
    pub root: Node,
    pub compression: Compression,
}

impl NbtDocument {
    pub fn from_bytes(raw: &[u8]) -> NbtResult<Self> {
        let compression = Compression::sniff(raw);
        let inflated;
        let body: &[u8] = match compression {
            Compression::Gzip => {
                let mut decoder = GzDecoder::new(raw);
                let mut out = Vec::with_capacity(raw.len() * 4);
                decoder.read_to_end(&mut out)?;
                inflated = out;
                &inflated
            }
            Compression::None => raw,
        };

        let mut reader = TagReader { data: body, offset: 0 };
        let tag = reader.u8()?;
        if tag != TAG_COMPOUND {
            return Err(NbtError::RootNotCompound(tag));
        }
        let root_name = reader.string()?;
        let root = reader.payload(TAG_COMPOUND, 0)?;

        Ok(NbtDocument {
            root_name,
            root,
            compression,
        })
    }

    pub fn to_bytes(&self) -> NbtResult<Vec<u8>> {
        let mut body = Vec::new();
        body.push(TAG_COMPOUND);
        write_string(&mut body, &self.root_name)?;
        write_payload(&mut body, &self.root, 0)?;

        match self.compression {
            Compression::None => Ok(body),
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), GzLevel::default());
                encoder.write_all(&body)?;
                Ok(encoder.finish()?)
            }
        }
    }

    pub fn load(path: &Path) -> NbtResult<Self> {
        let raw = fs::read(path)?;
        Self::from_bytes(&raw)
    }

    pub fn save(&self, path: &Path) -> NbtResult<()> {
        let bytes = self.to_bytes()?;
        fs::write(path, bytes)?;
        Ok(())
    }
}

struct TagReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> TagReader<'a> {
    fn take(&mut self, len: usize) -> NbtResult<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(NbtError::UnexpectedEof {
                offset: self.offset,
            })?;
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> NbtResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> NbtResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn i32(&mut self) -> NbtResult<i32> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    fn length(&mut self) -> NbtResult<usize> {
        let offset = self.offset;
        let len = self.i32()?;
        if len < 0 {
            return Err(NbtError::NegativeLength { len, offset });
        }
        // Every element takes at least one byte, so a length past the end
        // of the buffer is truncated data rather than a huge allocation.
        if len as usize > self.data.len() - self.offset {
            return Err(NbtError::UnexpectedEof { offset });
        }
        Ok(len as usize)
    }

    /// Strings are stored as Java modified UTF-8: NUL is `C0 80` and
    /// characters outside the BMP are surrogate pairs.
    fn string(&mut self) -> NbtResult<String> {
        let len = u16::from_be_bytes(self.array()?) as usize;
        let offset = self.offset;
        let bytes = self.take(len)?;
        cesu8::from_java_cesu8(bytes)
            .map(|s| s.into_owned())
            .map_err(|_| NbtError::InvalidString { offset })
    }

    fn payload(&mut self, tag: u8, depth: usize) -> NbtResult<Node> {
        if depth > MAX_DEPTH {
            return Err(NbtError::TooDeep);
        }

        let node = match tag {
            TAG_BYTE => Node::Scalar(Scalar::Byte(self.u8()? as i8)),
            TAG_SHORT => Node::Scalar(Scalar::Short(i16::from_be_bytes(self.array()?))),
            TAG_INT => Node::Scalar(Scalar::Int(self.i32()?)),
            TAG_LONG => Node::Scalar(Scalar::Long(i64::from_be_bytes(self.array()?))),
            TAG_FLOAT => Node::Scalar(Scalar::Float(f32::from_be_bytes(self.array()?))),
            TAG_DOUBLE => Node::Scalar(Scalar::Double(f64::from_be_bytes(self.array()?))),
            TAG_BYTE_ARRAY => {
                let len = self.length()?;
                let bytes = self.take(len)?;
                Node::Scalar(Scalar::ByteArray(bytes.iter().map(|&b| b as i8).collect()))
            }
            TAG_STRING => Node::Scalar(Scalar::String(self.string()?)),
            TAG_LIST => {
                let element_tag = self.u8()?;
                let len = self.length()?;
                if len > 0 && element_tag == TAG_END {
                    return Err(NbtError::UnknownTag {
                        tag: element_tag,
                        offset: self.offset,
                    });
                }
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(self.payload(element_tag, depth + 1)?);
                }
                Node::Sequence(Sequence { items, element_tag })
            }
            TAG_COMPOUND => {
                let mut container = Container::new();
                loop {
                    let child_tag = self.u8()?;
                    if child_tag == TAG_END {
                        break;
                    }
                    let name = self.string()?;
                    let child = self.payload(child_tag, depth + 1)?;
                    container.insert(name, child);
                }
                Node::Container(container)
            }
            TAG_INT_ARRAY => {
                let len = self.length()?;
                let mut values = Vec::with_capacity(len);
                for _ in 0..len {
                    values.push(self.i32()?);
                }
                Node::Scalar(Scalar::IntArray(values))
            }
            TAG_LONG_ARRAY => {
                let len = self.length()?;
                let mut values = Vec::with_capacity(len);
                for _ in 0..len {
                    values.push(i64::from_be_bytes(self.array()?));
                }
                Node::Scalar(Scalar::LongArray(values))
            }
            other => {
                return Err(NbtError::UnknownTag {
                    tag: other,
                    offset: self.offset,
                })
            }
        };

        Ok(node)
    }
}

fn tag_of(node: &Node) -> NbtResult<u8> {
    let tag = match node {
        Node::Container(_) => TAG_COMPOUND,
        Node::Sequence(_) => TAG_LIST,
        Node::Scalar(scalar) => match scalar {
            Scalar::Byte(_) | Scalar::Bool(_) => TAG_BYTE,
            Scalar::Short(_) => TAG_SHORT,
            Scalar::Int(_) => TAG_INT,
            Scalar::Long(_) => TAG_LONG,
            Scalar::Float(_) => TAG_FLOAT,
            Scalar::Double(_) => TAG_DOUBLE,
            Scalar::ByteArray(_) => TAG_BYTE_ARRAY,
            Scalar::String(_) => TAG_STRING,
            Scalar::IntArray(_) => TAG_INT_ARRAY,
            Scalar::LongArray(_) => TAG_LONG_ARRAY,
            Scalar::Number(n) => {
                if n.as_i64().is_some() {
                    TAG_LONG
                } else {
                    TAG_DOUBLE
                }
            }
            Scalar::Null => return Err(NbtError::Unencodable("null")),
        },
    };
    Ok(tag)
}

fn write_string(out: &mut Vec<u8>, s: &str) -> NbtResult<()> {
    let encoded = cesu8::to_java_cesu8(s);
    let len =
        u16::try_from(encoded.len()).map_err(|_| NbtError::StringTooLong(encoded.len()))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&encoded);
    Ok(())
}

fn write_len(out: &mut Vec<u8>, len: usize) {
    out.extend_from_slice(&(len as i32).to_be_bytes());
}

fn write_payload(out: &mut Vec<u8>, node: &Node, depth: usize) -> NbtResult<()> {
    if depth > MAX_DEPTH {
        return Err(NbtError::TooDeep);
    }

    match node {
        Node::Container(container) => {
            for (key, child) in container.iter() {
                out.push(tag_of(child)?);
                write_string(out, key)?;
                write_payload(out, child, depth + 1)?;
            }
            out.push(TAG_END);
        }
        Node::Sequence(seq) => {
            let element_tag = match seq.items.first() {
                Some(first) => tag_of(first)?,
                None => seq.element_tag,
            };
            for item in &seq.items {
                let found = tag_of(item)?;
                if found != element_tag {
                    return Err(NbtError::MixedList {
                        expected: element_tag,
                        found,
                    });
                }
            }
            out.push(element_tag);
            write_len(out, seq.items.len());
            for item in &seq.items {
                write_payload(out, item, depth + 1)?;
            }
        }
        Node::Scalar(scalar) => match scalar {
            Scalar::Bool(b) => out.push(*b as u8),
            Scalar::Byte(v) => out.push(*v as u8),
            Scalar::Short(v) => out.extend_from_slice(&v.to_be_bytes()),
            Scalar::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
            Scalar::Long(v) => out.extend_from_slice(&v.to_be_bytes()),
            Scalar::Float(v) => out.extend_from_slice(&v.to_be_bytes()),
            Scalar::Double(v) => out.extend_from_slice(&v.to_be_bytes()),
            Scalar::Number(n) => {
                if let Some(v) = n.as_i64() {
                    out.extend_from_slice(&v.to_be_bytes());
                } else {
                    let v = n.as_f64().unwrap_or_default();
                    out.extend_from_slice(&v.to_be_bytes());
                }
            }
            Scalar::String(s) => write_string(out, s)?,
            Scalar::ByteArray(values) => {
                write_len(out, values.len());
                out.extend(values.iter().map(|&b| b as u8));
            }
            Scalar::IntArray(values) => {
                write_len(out, values.len());
                for v in values {
                    out.extend_from_slice(&v.to_be_bytes());
                }
            }
            Scalar::LongArray(values) => {
                write_len(out, values.len());
                for v in values {
                    out.extend_from_slice(&v.to_be_bytes());
                }
            }
            Scalar::Null => return Err(NbtError::Unencodable("null")),
        },
    }

    Ok(())
}
