/// Declares an enum stored as TEXT: serde names, `as_str`, `FromStr`
/// (rejecting unknown values as a bad request) and `Display`.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::error::AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(crate::error::AppError::BadRequest(format!(
                        "Invalid {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Parses a status column read back from the database. A value the code
/// does not know is a data problem, not a client mistake.
pub fn parse_stored<T: std::str::FromStr>(column: &str, value: &str) -> crate::error::AppResult<T> {
    value.parse().map_err(|_| {
        crate::error::AppError::Internal(format!("unexpected {column} value '{value}' in storage"))
    })
}

pub mod client;
pub mod expense;
pub mod folio;
pub mod housekeeping;
pub mod inventory;
pub mod lifecycle;
pub mod pos;
pub mod property;
pub mod purchasing;
pub mod reservation;
pub mod room;
pub mod saas;

pub use client::*;
pub use expense::*;
pub use folio::*;
pub use housekeeping::*;
pub use inventory::*;
pub use lifecycle::*;
pub use pos::*;
pub use property::*;
pub use purchasing::*;
pub use reservation::*;
pub use room::*;
pub use saas::*;
