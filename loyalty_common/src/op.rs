/// Implements `std::ops` traits for a single-field newtype by forwarding to the wrapped value.
///
/// ```ignore
/// op!(Amount: binary Add::add, inplace AddAssign::add_assign, unary Neg::neg);
/// ```
#[macro_export]
macro_rules! op {
    ($newtype:ident: $($kind:ident $op_trait:ident::$op_fn:ident),+ $(,)?) => {
        $( $crate::op!(@$kind $newtype, $op_trait, $op_fn); )+
    };

    (@binary $newtype:ident, $op_trait:ident, $op_fn:ident) => {
        impl std::ops::$op_trait for $newtype {
            type Output = $newtype;

            fn $op_fn(self, rhs: $newtype) -> $newtype {
                $newtype(std::ops::$op_trait::$op_fn(self.0, rhs.0))
            }
        }
    };

    (@inplace $newtype:ident, $op_trait:ident, $op_fn:ident) => {
        impl std::ops::$op_trait for $newtype {
            fn $op_fn(&mut self, rhs: $newtype) {
                std::ops::$op_trait::$op_fn(&mut self.0, rhs.0);
            }
        }
    };

    (@unary $newtype:ident, $op_trait:ident, $op_fn:ident) => {
        impl std::ops::$op_trait for $newtype {
            type Output = $newtype;

            fn $op_fn(self) -> $newtype {
                $newtype(std::ops::$op_trait::$op_fn(self.0))
            }
        }
    };
}
