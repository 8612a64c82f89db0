//! Mapping from Rust types to [`TypeShape`]s.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;

use super::TypeShape;

/// Types that can describe their own wire shape.
///
/// Implemented for the primitives, the standard containers and the resource
/// types. Record types implement it by hand:
///
/// ```ignore
/// impl Describe for Point {
///     fn shape() -> TypeShape {
///         TypeShape::record(RecordShape::new("Point").field::<f64>("x").field::<f64>("y"))
///     }
/// }
/// ```
pub trait Describe {
    fn shape() -> TypeShape;
}

macro_rules! describe_scalar {
    ($ctor:ident => $($ty:ty),+) => {
        $(
            impl Describe for $ty {
                fn shape() -> TypeShape {
                    TypeShape::$ctor()
                }
            }
        )+
    };
}

describe_scalar!(integer => i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
describe_scalar!(number => f32, f64);
describe_scalar!(string => String, str, char);
describe_scalar!(boolean => bool);
describe_scalar!(null => ());

impl<T: Describe + ?Sized> Describe for &T {
    fn shape() -> TypeShape {
        T::shape()
    }
}

impl<T: Describe + ?Sized> Describe for Box<T> {
    fn shape() -> TypeShape {
        T::shape()
    }
}

impl<T: Describe + ?Sized> Describe for Arc<T> {
    fn shape() -> TypeShape {
        T::shape()
    }
}

impl<T: Describe> Describe for Option<T> {
    fn shape() -> TypeShape {
        TypeShape::optional(T::shape())
    }
}

impl<T: Describe> Describe for Vec<T> {
    fn shape() -> TypeShape {
        TypeShape::array(T::shape())
    }
}

impl<T: Describe> Describe for [T] {
    fn shape() -> TypeShape {
        TypeShape::array(T::shape())
    }
}

impl<T: Describe, const N: usize> Describe for [T; N] {
    fn shape() -> TypeShape {
        TypeShape::array(T::shape())
    }
}

impl<T: Describe, H> Describe for HashMap<String, T, H> {
    fn shape() -> TypeShape {
        TypeShape::map(T::shape())
    }
}

impl<T: Describe> Describe for BTreeMap<String, T> {
    fn shape() -> TypeShape {
        TypeShape::map(T::shape())
    }
}

impl Describe for Value {
    fn shape() -> TypeShape {
        TypeShape::Opaque
    }
}

impl Describe for serde_json::Map<String, Value> {
    fn shape() -> TypeShape {
        TypeShape::map(TypeShape::Opaque)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{RecordShape, ScalarKind};

    struct Point;

    impl Describe for Point {
        fn shape() -> TypeShape {
            TypeShape::record(RecordShape::new("Point").field::<f64>("x").field::<f64>("y"))
        }
    }

    #[test]
    fn test_primitives() {
        assert_eq!(i32::shape(), TypeShape::Scalar(ScalarKind::Integer));
        assert_eq!(u64::shape(), TypeShape::integer());
        assert_eq!(f32::shape(), TypeShape::number());
        assert_eq!(String::shape(), TypeShape::string());
        assert_eq!(<&str>::shape(), TypeShape::string());
        assert_eq!(bool::shape(), TypeShape::boolean());
        assert_eq!(<()>::shape(), TypeShape::null());
    }

    #[test]
    fn test_containers() {
        assert_eq!(
            Vec::<Option<f64>>::shape(),
            TypeShape::array(TypeShape::optional(TypeShape::number()))
        );
        assert_eq!(
            HashMap::<String, Vec<String>>::shape(),
            TypeShape::map(TypeShape::array(TypeShape::string()))
        );
        assert_eq!(Value::shape(), TypeShape::Opaque);
    }

    #[test]
    fn test_nested_option_collapses() {
        assert_eq!(
            Option::<Option<i32>>::shape(),
            TypeShape::optional(TypeShape::integer())
        );
    }

    #[test]
    fn test_record_impl() {
        let schema = Vec::<Point>::shape().to_json_schema();
        assert_eq!(schema["items"]["title"], "Point");
        assert_eq!(schema["items"]["required"], serde_json::json!(["x", "y"]));
    }
}
