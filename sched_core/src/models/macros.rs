/// Declares an index newtype over an unsigned integer.
///
/// The wrapper serializes as the bare integer, displays as the integer and
/// exposes it through `value()`. Doc comments and extra attributes written
/// before the name are forwarded to the struct.
///
/// ```ignore
/// define_id_type! {
///     /// Position of a satellite in the fleet's ID order.
///     SatIndex(usize)
/// }
/// ```
#[macro_export]
macro_rules! define_id_type {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Copy,
            Clone,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            pub fn value(self) -> $inner {
                self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl ::std::convert::From<$inner> for $name {
            fn from(v: $inner) -> Self {
                $name(v)
            }
        }
    };
}
