//! The FIRRTL-flavored type lattice of the IR.
//!
//! Types are either *ground* (clock, resets, integers, analog) or
//! *aggregate* (bundles and vectors). Every leaf of an aggregate type is
//! addressed by a dense *field-id*, assigned by an in-order traversal of the
//! type's leaves. A ground type has the single field-id 0. All elements of a
//! vector share the element's field-ids: type inference forces vector
//! elements to a uniform type, so distinguishing them would only split
//! equivalence classes that have to collapse again.

use ripple_utils::Id;
use std::fmt;

/// A single field of a [bundle type](Type::Bundle). A flipped field carries
/// data against the direction of the enclosing connection.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct BundleField {
    pub name: Id,
    pub flip: bool,
    pub ty: Type,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Type {
    Clock,
    /// A reset whose sync-vs-async discipline has not been resolved yet.
    Reset,
    AsyncReset,
    /// Unsigned integer with an optional known width.
    UInt(Option<u64>),
    /// Signed integer with an optional known width.
    SInt(Option<u64>),
    Analog(Option<u64>),
    Bundle(Vec<BundleField>),
    Vector(Box<Type>, usize),
}

impl Type {
    /// One-bit unsigned integer, the concrete type of a sync reset.
    pub const SYNC_RESET: Type = Type::UInt(Some(1));

    pub fn is_ground(&self) -> bool {
        !matches!(self, Type::Bundle(_) | Type::Vector(..))
    }

    /// Whether this type may legally appear in a reset network: the abstract
    /// reset, an async reset, or a one-bit unsigned integer.
    pub fn is_reset(&self) -> bool {
        matches!(
            self,
            Type::Reset | Type::AsyncReset | Type::UInt(Some(1))
        )
    }

    /// The number of ground leaves in this type. Vector elements are
    /// collapsed into a single shared set of leaves.
    pub fn num_leaves(&self) -> u32 {
        match self {
            Type::Bundle(fields) => {
                fields.iter().map(|f| f.ty.num_leaves()).sum()
            }
            Type::Vector(elem, _) => elem.num_leaves(),
            _ => 1,
        }
    }

    /// The field-id at which the leaves of the `index`-th bundle field
    /// start. Panics when applied to anything but a bundle.
    pub fn field_offset(&self, index: usize) -> u32 {
        let Type::Bundle(fields) = self else {
            panic!("field_offset on non-bundle type {}", self)
        };
        fields[..index].iter().map(|f| f.ty.num_leaves()).sum()
    }

    /// The ground type of the leaf addressed by `field_id`.
    pub fn leaf(&self, field_id: u32) -> &Type {
        match self {
            Type::Bundle(fields) => {
                let mut offset = 0;
                for field in fields {
                    let leaves = field.ty.num_leaves();
                    if field_id < offset + leaves {
                        return field.ty.leaf(field_id - offset);
                    }
                    offset += leaves;
                }
                panic!("field-id {} out of range for {}", field_id, self)
            }
            Type::Vector(elem, _) => elem.leaf(field_id),
            _ => {
                debug_assert_eq!(field_id, 0);
                self
            }
        }
    }

    /// Rebuild this type with the leaf addressed by `field_id` replaced by
    /// `leaf`. Bundle flips are preserved; replacing a leaf under a vector
    /// replaces it in every element, since elements share their leaves.
    pub fn with_leaf(&self, field_id: u32, leaf: Type) -> Type {
        match self {
            Type::Bundle(fields) => {
                let mut offset = 0;
                let mut fields = fields.clone();
                for index in 0..fields.len() {
                    let leaves = fields[index].ty.num_leaves();
                    if field_id < offset + leaves {
                        fields[index].ty =
                            fields[index].ty.with_leaf(field_id - offset, leaf);
                        return Type::Bundle(fields);
                    }
                    offset += leaves;
                }
                panic!("field-id {} out of range for {}", field_id, self)
            }
            Type::Vector(elem, len) => {
                Type::Vector(Box::new(elem.with_leaf(field_id, leaf)), *len)
            }
            _ => {
                debug_assert_eq!(field_id, 0);
                leaf
            }
        }
    }

    /// The declared bit width, for integer types that have one.
    pub fn width(&self) -> Option<u64> {
        match self {
            Type::UInt(w) | Type::SInt(w) | Type::Analog(w) => *w,
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn width(f: &mut fmt::Formatter<'_>, w: &Option<u64>) -> fmt::Result {
            match w {
                Some(w) => write!(f, "<{w}>"),
                None => Ok(()),
            }
        }
        match self {
            Type::Clock => write!(f, "Clock"),
            Type::Reset => write!(f, "Reset"),
            Type::AsyncReset => write!(f, "AsyncReset"),
            Type::UInt(w) => {
                write!(f, "UInt")?;
                width(f, w)
            }
            Type::SInt(w) => {
                write!(f, "SInt")?;
                width(f, w)
            }
            Type::Analog(w) => {
                write!(f, "Analog")?;
                width(f, w)
            }
            Type::Bundle(fields) => {
                write!(f, "{{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    if field.flip {
                        write!(f, "flip ")?;
                    }
                    write!(f, "{}: {}", field.name, field.ty)?;
                }
                write!(f, " }}")
            }
            Type::Vector(elem, len) => write!(f, "{elem}[{len}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BundleField, Type};

    fn field(name: &str, flip: bool, ty: Type) -> BundleField {
        BundleField {
            name: name.into(),
            flip,
            ty,
        }
    }

    #[test]
    fn leaf_numbering() {
        // { a: UInt<1>, b: { c: Reset, flip d: Clock }, e: Reset[4] }
        let inner = Type::Bundle(vec![
            field("c", false, Type::Reset),
            field("d", true, Type::Clock),
        ]);
        let ty = Type::Bundle(vec![
            field("a", false, Type::UInt(Some(1))),
            field("b", false, inner),
            field("e", false, Type::Vector(Box::new(Type::Reset), 4)),
        ]);

        // The vector contributes a single shared leaf.
        assert_eq!(ty.num_leaves(), 4);
        assert_eq!(ty.field_offset(0), 0);
        assert_eq!(ty.field_offset(1), 1);
        assert_eq!(ty.field_offset(2), 3);
        assert_eq!(ty.leaf(1), &Type::Reset);
        assert_eq!(ty.leaf(2), &Type::Clock);
        assert_eq!(ty.leaf(3), &Type::Reset);
    }

    #[test]
    fn leaf_replacement_preserves_flips() {
        let ty = Type::Bundle(vec![
            field("a", false, Type::Reset),
            field("b", true, Type::Reset),
        ]);
        let updated = ty.with_leaf(1, Type::AsyncReset);
        let Type::Bundle(fields) = &updated else {
            panic!("expected bundle")
        };
        assert_eq!(fields[0].ty, Type::Reset);
        assert!(fields[1].flip);
        assert_eq!(fields[1].ty, Type::AsyncReset);
    }

    #[test]
    fn vector_replacement_rewrites_all_elements() {
        let ty = Type::Vector(Box::new(Type::Reset), 2);
        let updated = ty.with_leaf(0, Type::SYNC_RESET);
        assert_eq!(
            updated,
            Type::Vector(Box::new(Type::UInt(Some(1))), 2)
        );
    }

    #[test]
    fn display() {
        let ty = Type::Bundle(vec![
            field("a", false, Type::UInt(Some(8))),
            field("b", true, Type::Vector(Box::new(Type::Clock), 3)),
        ]);
        assert_eq!(ty.to_string(), "{ a: UInt<8>, flip b: Clock[3] }");
    }
}
