pub mod allowance;
pub mod bonus_structure;
pub mod employee;
pub mod payroll;
pub mod salary_movement;
pub mod training_data;

/// Lets a `strum` enum stored as VARCHAR be read with `#[sqlx(try_from = "String")]`
/// and exposes its stored code and a display label for tables and `<select>` lists.
macro_rules! string_enum {
    ($ty:ty { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl TryFrom<String> for $ty {
            type Error = strum::ParseError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl $ty {
            /// Stored column value, e.g. `"on_leave"`.
            pub fn code(self) -> &'static str {
                self.into()
            }

            pub fn label(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }
    };
}

pub(crate) use string_enum;
