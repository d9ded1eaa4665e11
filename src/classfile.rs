//! Class file header reader.
//!
//! The JVM normally hands the `ClassFileLoadHook` the class name, but it may
//! pass null (the name is optional in the JVMTI contract). This module reads
//! just far enough into the `.class` bytes to resolve `this_class`: the
//! magic, the version, the constant pool and the access flags. Fields,
//! methods and attributes are never touched.

use crate::error::ClassFileError;

const MAGIC: u32 = 0xCAFEBABE;

/// The fixed-position part of a class file, up to and including `this_class`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassHeader {
    pub minor_version: u16,
    pub major_version: u16,
    pub access_flags: u16,
    /// Internal (slash-separated) name of the class, e.g. `java/lang/String`.
    pub this_class: String,
}

impl ClassHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, ClassFileError> {
        let mut r = Reader::new(bytes);
        let magic = r.read_u4()?;
        if magic != MAGIC {
            return Err(ClassFileError::InvalidMagic(magic));
        }

        let minor_version = r.read_u2()?;
        let major_version = r.read_u2()?;

        let constant_pool = parse_constant_pool(&mut r)?;

        let access_flags = r.read_u2()?;
        let this_class_index = r.read_u2()?;
        let this_class = constant_pool.class_name(this_class_index)?.to_string();

        Ok(Self {
            minor_version,
            major_version,
            access_flags,
            this_class,
        })
    }
}

/// Shorthand for `ClassHeader::parse(bytes)?.this_class`.
pub fn class_name(bytes: &[u8]) -> Result<String, ClassFileError> {
    ClassHeader::parse(bytes).map(|h| h.this_class)
}

/// The two constant kinds needed to resolve a class name. Everything else
/// in the pool is skipped over.
#[derive(Debug, Clone)]
enum CpInfo {
    Utf8(String),
    Class { name_index: u16 },
    Other,
}

#[derive(Debug, Clone)]
struct ConstantPool {
    entries: Vec<Option<CpInfo>>,
}

impl ConstantPool {
    fn get(&self, index: u16) -> Result<&CpInfo, ClassFileError> {
        if index == 0 {
            return Err(ClassFileError::InvalidConstantPoolIndex(index));
        }
        self.entries
            .get(index as usize)
            .and_then(|e| e.as_ref())
            .ok_or(ClassFileError::InvalidConstantPoolIndex(index))
    }

    fn get_utf8(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            CpInfo::Utf8(s) => Ok(s.as_str()),
            _ => Err(ClassFileError::InvalidConstantPoolIndex(index)),
        }
    }

    fn class_name(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            CpInfo::Class { name_index } => self.get_utf8(*name_index),
            _ => Err(ClassFileError::InvalidConstantPoolIndex(index)),
        }
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn read_u1(&mut self) -> Result<u8, ClassFileError> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u2(&mut self) -> Result<u16, ClassFileError> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u4(&mut self) -> Result<u32, ClassFileError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn skip(&mut self, len: usize) -> Result<(), ClassFileError> {
        self.read_bytes(len).map(|_| ())
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ClassFileError> {
        if self.remaining() < len {
            return Err(ClassFileError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }
}

fn parse_constant_pool(r: &mut Reader) -> Result<ConstantPool, ClassFileError> {
    let count = r.read_u2()? as usize;
    let mut entries: Vec<Option<CpInfo>> = Vec::with_capacity(count);
    entries.push(None); // index 0 is unused

    let mut i = 1;
    while i < count {
        let tag = r.read_u1()?;
        let entry = match tag {
            1 => {
                let len = r.read_u2()? as usize;
                let bytes = r.read_bytes(len)?;
                let text = cesu8::from_java_cesu8(bytes)
                    .map_err(|_| ClassFileError::InvalidUtf8(i as u16))?;
                CpInfo::Utf8(text.into_owned())
            }
            // Long and Double take two slots.
            5 | 6 => {
                r.skip(8)?;
                entries.push(Some(CpInfo::Other));
                entries.push(None);
                i += 2;
                continue;
            }
            7 => CpInfo::Class { name_index: r.read_u2()? },
            3 | 4 => { r.skip(4)?; CpInfo::Other }
            8 | 16 | 19 | 20 => { r.skip(2)?; CpInfo::Other }
            9 | 10 | 11 | 12 | 17 | 18 => { r.skip(4)?; CpInfo::Other }
            15 => { r.skip(3)?; CpInfo::Other }
            _ => return Err(ClassFileError::InvalidConstantPoolTag(tag)),
        };

        entries.push(Some(entry));
        i += 1;
    }

    Ok(ConstantPool { entries })
}
