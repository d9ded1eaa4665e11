#![allow(dead_code)]

//! Hand-assembled class files for tests.

pub struct CpBuilder {
    entries: Vec<Vec<u8>>,
    // Long and Double occupy two constant pool slots.
    slots: u16,
}

impl CpBuilder {
    pub fn new() -> Self {
        Self { entries: Vec::new(), slots: 0 }
    }

    fn push(&mut self, entry: Vec<u8>, width: u16) -> u16 {
        self.entries.push(entry);
        let index = self.slots + 1;
        self.slots += width;
        index
    }

    /// A Utf8 constant, encoded as modified UTF-8 the way javac writes it.
    pub fn utf8(&mut self, s: &str) -> u16 {
        let encoded = cesu8::to_java_cesu8(s);
        let mut entry = vec![1];
        entry.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
        entry.extend_from_slice(&encoded);
        self.push(entry, 1)
    }

    pub fn class(&mut self, name_index: u16) -> u16 {
        let mut entry = vec![7];
        entry.extend_from_slice(&name_index.to_be_bytes());
        self.push(entry, 1)
    }

    pub fn name_and_type(&mut self, name_index: u16, descriptor_index: u16) -> u16 {
        let mut entry = vec![12];
        entry.extend_from_slice(&name_index.to_be_bytes());
        entry.extend_from_slice(&descriptor_index.to_be_bytes());
        self.push(entry, 1)
    }

    pub fn methodref(&mut self, class_index: u16, name_and_type_index: u16) -> u16 {
        let mut entry = vec![10];
        entry.extend_from_slice(&class_index.to_be_bytes());
        entry.extend_from_slice(&name_and_type_index.to_be_bytes());
        self.push(entry, 1)
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        let mut entry = vec![3];
        entry.extend_from_slice(&value.to_be_bytes());
        self.push(entry, 1)
    }

    pub fn long(&mut self, value: i64) -> u16 {
        let mut entry = vec![5];
        entry.extend_from_slice(&value.to_be_bytes());
        self.push(entry, 2)
    }

    pub fn double(&mut self, value: f64) -> u16 {
        let mut entry = vec![6];
        entry.extend_from_slice(&value.to_bits().to_be_bytes());
        self.push(entry, 2)
    }

    pub fn method_handle(&mut self, kind: u8, reference_index: u16) -> u16 {
        let mut entry = vec![15, kind];
        entry.extend_from_slice(&reference_index.to_be_bytes());
        self.push(entry, 1)
    }

    pub fn raw(&mut self, bytes: &[u8]) -> u16 {
        self.push(bytes.to_vec(), 1)
    }

    pub fn count(&self) -> u16 {
        self.slots + 1
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.count().to_be_bytes());
        for entry in &self.entries {
            out.extend_from_slice(entry);
        }
    }
}

/// Class file bytes with the given constant pool and `this_class` index.
pub fn class_with_pool(cp: &CpBuilder, this_class: u16, super_class: u16) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0xCAFEBABE_u32.to_be_bytes());
    out.extend_from_slice(&0_u16.to_be_bytes());
    out.extend_from_slice(&52_u16.to_be_bytes());
    cp.write(&mut out);
    out.extend_from_slice(&0x0021_u16.to_be_bytes());
    out.extend_from_slice(&this_class.to_be_bytes());
    out.extend_from_slice(&super_class.to_be_bytes());
    // interfaces, fields, methods, attributes
    for _ in 0..4 {
        out.extend_from_slice(&0_u16.to_be_bytes());
    }
    out
}

/// A minimal class named `name` extending `java/lang/Object`.
pub fn minimal_class(name: &str) -> Vec<u8> {
    let mut cp = CpBuilder::new();
    let utf_this = cp.utf8(name);
    let utf_object = cp.utf8("java/lang/Object");
    let class_this = cp.class(utf_this);
    let class_object = cp.class(utf_object);
    class_with_pool(&cp, class_this, class_object)
}
