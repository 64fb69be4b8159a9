//! Constant pool of one class file.
//!
//! Entries are deduplicated: adding an equal constant twice returns the
//! first index. Indices start at 1, and longs and doubles take two.

use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;

/// Values stored in the constant pool.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    /// Index of the internal name.
    Class(u16),
    /// Index of the contents.
    String(u16),
    NameAndType { name: u16, descriptor: u16 },
    Fieldref { class: u16, name_and_type: u16 },
    Methodref { class: u16, name_and_type: u16 },
    InterfaceMethodref { class: u16, name_and_type: u16 },
}

impl Constant {
    fn tag(&self) -> u8 {
        match self {
            Constant::Utf8(_) => 1,
            Constant::Integer(_) => 3,
            Constant::Float(_) => 4,
            Constant::Long(_) => 5,
            Constant::Double(_) => 6,
            Constant::Class(_) => 7,
            Constant::String(_) => 8,
            Constant::Fieldref { .. } => 9,
            Constant::Methodref { .. } => 10,
            Constant::InterfaceMethodref { .. } => 11,
            Constant::NameAndType { .. } => 12,
        }
    }

    /// Number of pool indices the entry takes.
    pub fn width(&self) -> u16 {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

/// Hashable version of [`Constant`].
///
/// `OrderedFloat` treats both zeros as equal, so the sign travels alongside
/// to keep `-0.0` and `0.0` apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Utf8(String),
    Integer(i32),
    Float(OrderedFloat<f32>, bool),
    Long(i64),
    Double(OrderedFloat<f64>, bool),
    Class(u16),
    String(u16),
    NameAndType(u16, u16),
    Fieldref(u16, u16),
    Methodref(u16, u16),
    InterfaceMethodref(u16, u16),
}

#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    constants: Vec<Constant>,
    index: FxHashMap<ConstantKey, u16>,
    /// Next free index; 0 is reserved.
    next: u32,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self {
            next: 1,
            ..Self::default()
        }
    }

    /// Add or get an existing constant, returning its index.
    ///
    /// Returns `None` once the pool is out of 16-bit indices.
    pub fn add(&mut self, constant: Constant) -> Option<u16> {
        let key = Self::to_key(&constant);
        if let Some(&idx) = self.index.get(&key) {
            return Some(idx);
        }
        let idx = u16::try_from(self.next).ok()?;
        let width = u32::from(constant.width());
        if self.next + width > u32::from(u16::MAX) + 1 {
            return None;
        }
        self.next += width;
        self.constants.push(constant);
        self.index.insert(key, idx);
        Some(idx)
    }

    pub fn utf8(&mut self, text: &str) -> Option<u16> {
        self.add(Constant::Utf8(text.to_string()))
    }

    pub fn class(&mut self, name: &str) -> Option<u16> {
        let name = self.utf8(name)?;
        self.add(Constant::Class(name))
    }

    pub fn string(&mut self, text: &str) -> Option<u16> {
        let text = self.utf8(text)?;
        self.add(Constant::String(text))
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> Option<u16> {
        let name = self.utf8(name)?;
        let descriptor = self.utf8(descriptor)?;
        self.add(Constant::NameAndType { name, descriptor })
    }

    pub fn field(&mut self, owner: &str, name: &str, descriptor: &str) -> Option<u16> {
        let class = self.class(owner)?;
        let name_and_type = self.name_and_type(name, descriptor)?;
        self.add(Constant::Fieldref {
            class,
            name_and_type,
        })
    }

    pub fn method(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        interface: bool,
    ) -> Option<u16> {
        let class = self.class(owner)?;
        let name_and_type = self.name_and_type(name, descriptor)?;
        self.add(if interface {
            Constant::InterfaceMethodref {
                class,
                name_and_type,
            }
        } else {
            Constant::Methodref {
                class,
                name_and_type,
            }
        })
    }

    /// Value of the `constant_pool_count` header field.
    pub fn count(&self) -> u16 {
        // Fits: `add` refuses indices past u16::MAX.
        self.next as u16
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    /// Serialize every entry in index order.
    pub fn write(&self, out: &mut Vec<u8>) {
        for constant in &self.constants {
            out.push(constant.tag());
            match constant {
                Constant::Utf8(text) => {
                    let bytes = modified_utf8(text);
                    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                    out.extend_from_slice(&bytes);
                }
                Constant::Integer(v) => out.extend_from_slice(&v.to_be_bytes()),
                Constant::Float(v) => out.extend_from_slice(&v.to_bits().to_be_bytes()),
                Constant::Long(v) => out.extend_from_slice(&v.to_be_bytes()),
                Constant::Double(v) => out.extend_from_slice(&v.to_bits().to_be_bytes()),
                Constant::Class(idx) | Constant::String(idx) => {
                    out.extend_from_slice(&idx.to_be_bytes())
                }
                Constant::NameAndType { name, descriptor } => {
                    out.extend_from_slice(&name.to_be_bytes());
                    out.extend_from_slice(&descriptor.to_be_bytes());
                }
                Constant::Fieldref {
                    class,
                    name_and_type,
                }
                | Constant::Methodref {
                    class,
                    name_and_type,
                }
                | Constant::InterfaceMethodref {
                    class,
                    name_and_type,
                } => {
                    out.extend_from_slice(&class.to_be_bytes());
                    out.extend_from_slice(&name_and_type.to_be_bytes());
                }
            }
        }
    }

    fn to_key(constant: &Constant) -> ConstantKey {
        match constant {
            Constant::Utf8(s) => ConstantKey::Utf8(s.clone()),
            Constant::Integer(v) => ConstantKey::Integer(*v),
            Constant::Float(v) => ConstantKey::Float(OrderedFloat(*v), v.is_sign_negative()),
            Constant::Long(v) => ConstantKey::Long(*v),
            Constant::Double(v) => ConstantKey::Double(OrderedFloat(*v), v.is_sign_negative()),
            Constant::Class(idx) => ConstantKey::Class(*idx),
            Constant::String(idx) => ConstantKey::String(*idx),
            Constant::NameAndType { name, descriptor } => {
                ConstantKey::NameAndType(*name, *descriptor)
            }
            Constant::Fieldref {
                class,
                name_and_type,
            } => ConstantKey::Fieldref(*class, *name_and_type),
            Constant::Methodref {
                class,
                name_and_type,
            } => ConstantKey::Methodref(*class, *name_and_type),
            Constant::InterfaceMethodref {
                class,
                name_and_type,
            } => ConstantKey::InterfaceMethodref(*class, *name_and_type),
        }
    }
}

/// Encode text the way class files store it: NUL as two bytes and
/// supplementary characters as surrogate pairs.
fn modified_utf8(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for unit in text.encode_utf16() {
        match unit {
            0x0001..=0x007f => out.push(unit as u8),
            0x0000 | 0x0080..=0x07ff => {
                out.push(0xc0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                out.push(0xe0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }
    out
}
