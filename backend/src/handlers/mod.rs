pub mod auth;
pub mod chat;
pub mod health;
pub mod hits;
pub mod invite;
pub mod logs;

pub use auth::*;
pub use chat::*;
pub use health::*;
pub use hits::*;
pub use invite::*;
pub use logs::*;

use crate::error::AppError;

/// Query flags follow the usual boolean spellings. Missing or empty means
/// false.
pub(crate) fn parse_bool_flag(name: &str, value: Option<&str>) -> Result<bool, AppError> {
    match value.map(str::trim).unwrap_or_default() {
        "" => Ok(false),
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        other => Err(AppError::BadRequest(format!(
            "invalid boolean for {}: {:?}",
            name, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_flag_accepts_common_spellings() {
        assert!(parse_bool_flag("cookie", Some("true")).unwrap());
        assert!(parse_bool_flag("cookie", Some("1")).unwrap());
        assert!(!parse_bool_flag("cookie", Some("F")).unwrap());
        assert!(!parse_bool_flag("cookie", None).unwrap());
        assert!(matches!(
            parse_bool_flag("cookie", Some("yes")),
            Err(AppError::BadRequest(_))
        ));
    }
}
