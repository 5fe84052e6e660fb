//! Defines helper macros for generating domain port error enums.
//!
//! Every port declares its failure modes with `define_port_error!`, which
//! derives `thiserror::Error` and adds one snake_case constructor per variant
//! so adapters can write `SourceError::not_found(path)`.

macro_rules! define_port_error {
    (@ctor $variant:ident) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@ctor $variant:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        define_port_error!(@ctor_impl $variant () () $( $field : $ty, )*);
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) ) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]($($params)*) -> Self {
                Self::$variant { $($inits)* }
            }
        }
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) $field:ident : $ty:ty, $($rest:tt)*) => {
        define_port_error!(
            @ctor_impl
            $variant
            ($($params)* $field: impl Into<$ty>,)
            ($($inits)* $field: $field.into(),)
            $($rest)*
        );
    };
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )? => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        impl $name {
            $(
                define_port_error!(@ctor $variant $( { $($field : $ty),* } )?);
            )*
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    //! Constructor and formatting coverage for generated port errors.
    use rstest::rstest;

    define_port_error! {
        pub enum LedgerProbeError {
            Unavailable => "ledger unavailable",
            Query { message: String } => "ledger query failed: {message}",
            Conflict { commit: String, attempts: u32 } =>
                "commit {commit} conflicted after {attempts} attempts",
        }
    }

    #[rstest]
    fn unit_variants_get_nullary_constructors() {
        assert_eq!(LedgerProbeError::unavailable(), LedgerProbeError::Unavailable);
        assert_eq!(LedgerProbeError::unavailable().to_string(), "ledger unavailable");
    }

    #[rstest]
    fn string_fields_accept_borrowed_input() {
        let err = LedgerProbeError::query("relation missing");
        assert_eq!(err.to_string(), "ledger query failed: relation missing");
    }

    #[rstest]
    fn mixed_fields_keep_their_types() {
        let err = LedgerProbeError::conflict(String::from("abc123"), 3_u32);
        assert_eq!(
            err,
            LedgerProbeError::Conflict {
                commit: "abc123".to_owned(),
                attempts: 3,
            }
        );
        assert_eq!(err.to_string(), "commit abc123 conflicted after 3 attempts");
    }
}
