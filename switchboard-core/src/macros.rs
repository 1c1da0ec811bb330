//! Declarative helpers shared by the status enums.

/// Declare a platform status enum with its wire spelling and accepted aliases.
///
/// Generates serde renames, `as_str`, case-insensitive parsing, `Display`
/// and `FromStr`. Parsing failures return [`crate::ParseStatusError`].
macro_rules! status_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident : $label:literal {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => $wire:literal $(| $alias:literal)*
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $wire $(, alias = $alias)*)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire representation used by the platform.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }

            /// Parse a status string, ignoring ASCII case and surrounding whitespace.
            pub fn parse(value: &str) -> Result<Self, $crate::ParseStatusError> {
                let lowered = value.trim().to_ascii_lowercase();
                match lowered.as_str() {
                    $($wire $(| $alias)* => Ok($name::$variant),)+
                    _ => Err($crate::ParseStatusError::new($label, value)),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}
