//! Reading field and method descriptors.

use kestrel_core::{StackKind, internal_fault};

/// Stack kind of a field descriptor, or `None` for `V`.
pub fn field_kind(descriptor: &str) -> Option<StackKind> {
    match descriptor.as_bytes().first() {
        Some(b'V') | None => None,
        Some(b'J') => Some(StackKind::Long),
        Some(b'F') => Some(StackKind::Float),
        Some(b'D') => Some(StackKind::Double),
        Some(b'L' | b'[') => Some(StackKind::Ref),
        Some(_) => Some(StackKind::Int),
    }
}

/// Parameter kinds and return kind of a method descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodShape {
    pub params: Vec<StackKind>,
    pub ret: Option<StackKind>,
}

impl MethodShape {
    pub fn parse(descriptor: &str) -> Self {
        let Some(rest) = descriptor.strip_prefix('(') else {
            internal_fault(format_args!("malformed method descriptor {descriptor}"));
        };
        let Some((params, ret)) = rest.split_once(')') else {
            internal_fault(format_args!("malformed method descriptor {descriptor}"));
        };
        let mut kinds = Vec::new();
        let mut chars = params.chars();
        while let Some(c) = chars.next() {
            let mut c = c;
            let mut array = false;
            while c == '[' {
                array = true;
                c = chars.next().unwrap_or('V');
            }
            if c == 'L' {
                chars.by_ref().find(|&c| c == ';');
            }
            kinds.push(if array {
                StackKind::Ref
            } else {
                field_kind(c.encode_utf8(&mut [0; 4])).unwrap_or(StackKind::Int)
            });
        }
        Self {
            params: kinds,
            ret: field_kind(ret),
        }
    }

    /// Stack words taken by the parameters.
    pub fn param_words(&self) -> u16 {
        self.params.iter().map(|k| k.width()).sum()
    }

    /// Stack words pushed by the return value.
    pub fn ret_words(&self) -> u16 {
        self.ret.map_or(0, StackKind::width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_shapes() {
        let shape = MethodShape::parse("(IJLjava/lang/String;D[I)V");
        assert_eq!(
            shape.params,
            vec![
                StackKind::Int,
                StackKind::Long,
                StackKind::Ref,
                StackKind::Double,
                StackKind::Ref
            ]
        );
        assert_eq!(shape.param_words(), 7);
        assert_eq!(shape.ret, None);
        assert_eq!(MethodShape::parse("()Z").ret, Some(StackKind::Int));
        assert_eq!(MethodShape::parse("()J").ret_words(), 2);
    }

    #[test]
    fn field_kinds() {
        assert_eq!(field_kind("Z"), Some(StackKind::Int));
        assert_eq!(field_kind("F"), Some(StackKind::Float));
        assert_eq!(field_kind("Ljava/lang/Object;"), Some(StackKind::Ref));
    }
}
