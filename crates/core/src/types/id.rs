//! Integer primary keys, one newtype per table.
//!
//! Every table keys on `SERIAL`, so each id wraps an `i32`. Mixing up a
//! `SizeId` and a `ColourId` in a repository call is a compile error.
//!
//! ```rust
//! use vastra_core::{OrderId, SizeId};
//!
//! let size: SizeId = "17".parse().unwrap();
//! assert_eq!(size.as_i32(), 17);
//! assert_eq!(OrderId::from(3).to_string(), "3");
//! ```

/// Declare one or more id newtypes.
///
/// The postgres mapping comes from `sqlx(transparent)`, gated on this
/// crate's `postgres` feature.
#[macro_export]
macro_rules! define_id {
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {$(
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        #[cfg_attr(feature = "postgres", derive(::sqlx::Type), sqlx(transparent))]
        pub struct $name(i32);

        impl $name {
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn as_i32(self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        /// Accepts path segments and CLI arguments, surrounding blanks ignored.
        impl ::core::str::FromStr for $name {
            type Err = ::core::num::ParseIntError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }

        impl ::core::convert::From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl ::core::convert::From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    )+};
}

define_id!(
    /// `catalog.category.id`
    CategoryId,
    /// `catalog.product.id`
    ProductId,
    /// `catalog.product_colour.id`
    ColourId,
    /// `catalog.product_size.id`, the purchasable unit.
    SizeId,
    /// `catalog.product_image.id`
    ImageId,
);

define_id!(CustomerId, PanelUserId, RoleId, PermissionId);

define_id!(AddressId, OrderId, AuditLogId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_parses_from_path_segment() {
        assert_eq!("42".parse::<SizeId>(), Ok(SizeId::new(42)));
        assert_eq!(" 7 ".parse::<OrderId>(), Ok(OrderId::new(7)));
        assert!("abc".parse::<ProductId>().is_err());
    }

    #[test]
    fn test_id_serializes_transparently() {
        let json = serde_json::to_string(&CustomerId::new(9)).expect("serialize");
        assert_eq!(json, "9");
        let id: ColourId = serde_json::from_str("12").expect("deserialize");
        assert_eq!(id.as_i32(), 12);
    }

    #[test]
    fn test_ids_order_numerically() {
        let mut ids = vec![SizeId::new(3), SizeId::new(1), SizeId::new(2)];
        ids.sort();
        assert_eq!(ids, vec![SizeId::new(1), SizeId::new(2), SizeId::new(3)]);
    }
}
