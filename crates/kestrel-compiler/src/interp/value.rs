//! Runtime values of the reference evaluator.

use std::fmt;

use kestrel_core::StackKind;

/// One operand stack entry or local. Longs and doubles are a single entry
/// here even though they take two words on the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// Heap index, `None` for null.
    Ref(Option<usize>),
}

impl Value {
    pub const NULL: Value = Value::Ref(None);

    /// Zero value of a field descriptor.
    pub fn default_for(descriptor: &str) -> Value {
        match descriptor.as_bytes().first() {
            Some(b'J') => Value::Long(0),
            Some(b'F') => Value::Float(0.0),
            Some(b'D') => Value::Double(0.0),
            Some(b'L' | b'[') => Value::NULL,
            _ => Value::Int(0),
        }
    }

    pub fn kind(&self) -> StackKind {
        match self {
            Value::Int(_) => StackKind::Int,
            Value::Long(_) => StackKind::Long,
            Value::Float(_) => StackKind::Float,
            Value::Double(_) => StackKind::Double,
            Value::Ref(_) => StackKind::Ref,
        }
    }

    pub fn is_wide(&self) -> bool {
        self.kind().width() == 2
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> Option<Option<usize>> {
        match self {
            Value::Ref(r) => Some(*r),
            _ => None,
        }
    }
}

/// Heap contents.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Instance {
        class: String,
        fields: Vec<(String, Value)>,
    },
    Str(String),
    /// A primitive boxed by `valueOf`.
    Boxed { class: String, value: Value },
    PrintStream,
}

impl Object {
    /// Internal name of the object's runtime class.
    pub fn class(&self) -> &str {
        match self {
            Object::Instance { class, .. } | Object::Boxed { class, .. } => class,
            Object::Str(_) => "java/lang/String",
            Object::PrintStream => "java/io/PrintStream",
        }
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        match self {
            Object::Instance { fields, .. } => fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, value)| *value),
            _ => None,
        }
    }

    pub fn set_field(&mut self, name: &str, value: Value) -> bool {
        let Object::Instance { fields, .. } = self else {
            return false;
        };
        match fields.iter_mut().find(|(field, _)| field == name) {
            Some(slot) => {
                slot.1 = value;
                true
            }
            None => false,
        }
    }
}

/// What `toString` would print for a boxed primitive.
pub fn boxed_text(class: &str, value: Value) -> String {
    match (class, value) {
        ("java/lang/Boolean", Value::Int(v)) => (v != 0).to_string(),
        ("java/lang/Character", Value::Int(v)) => char::from_u32(v as u32 & 0xffff)
            .unwrap_or(char::REPLACEMENT_CHARACTER)
            .to_string(),
        (_, Value::Int(v)) => v.to_string(),
        (_, Value::Long(v)) => v.to_string(),
        (_, Value::Float(v)) => {
            JavaFloat(f64::from(v), v.to_string(), format!("{v:e}")).to_string()
        }
        (_, Value::Double(v)) => JavaFloat(v, v.to_string(), format!("{v:e}")).to_string(),
        (_, Value::Ref(_)) => "null".to_string(),
    }
}

/// Host-style float text: plain between 10^-3 and 10^7, scientific outside,
/// always with a fractional part.
struct JavaFloat(f64, String, String);

impl fmt::Display for JavaFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let JavaFloat(value, plain, scientific) = self;
        if value.is_nan() {
            return f.write_str("NaN");
        }
        if value.is_infinite() {
            return f.write_str(if *value > 0.0 { "Infinity" } else { "-Infinity" });
        }
        let abs = value.abs();
        if abs == 0.0 || (1e-3..1e7).contains(&abs) {
            return if plain.contains('.') {
                f.write_str(plain)
            } else {
                write!(f, "{plain}.0")
            };
        }
        let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific, "0"));
        if mantissa.contains('.') {
            write!(f, "{mantissa}E{exponent}")
        } else {
            write!(f, "{mantissa}.0E{exponent}")
        }
    }
}
