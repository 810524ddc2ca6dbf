use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Integer,
    Boolean,
    String,
    /// Inclusive index range `lower..upper`.
    Array {
        lower: i32,
        upper: i32,
        elem: Box<Type>,
    },
}

impl Type {
    pub fn array(lower: i32, upper: i32, elem: Type) -> Self {
        Type::Array {
            lower,
            upper,
            elem: Box::new(elem),
        }
    }

    pub fn is_simple(&self) -> bool {
        !matches!(self, Type::Array { .. })
    }

    /// Arrays are compatible when their element types are; ranges do not
    /// take part in the check.
    pub fn compatible(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Array { elem: a, .. }, Type::Array { elem: b, .. }) => a.compatible(b),
            (a, b) => a == b,
        }
    }

    /// Number of elements of an array type.
    pub fn element_count(&self) -> Option<i32> {
        match self {
            Type::Array { lower, upper, .. } => {
                upper.checked_sub(*lower)?.checked_add(1).map(|n| n.max(0))
            }
            _ => None,
        }
    }

    /// Storage slots occupied by a value of this type. `None` on overflow.
    pub fn size(&self) -> Option<i32> {
        match self {
            Type::Array { elem, .. } => self.element_count()?.checked_mul(elem.size()?),
            _ => Some(1),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Integer => f.write_str("integer"),
            Type::Boolean => f.write_str("boolean"),
            Type::String => f.write_str("string"),
            Type::Array { lower, upper, elem } => write!(f, "array[{lower}..{upper}] of {elem}"),
        }
    }
}
