use derive_more::Display;
use validator::validate_email;

/// A syntactically valid email address.
///
/// Recipient lists are ordered and not deduplicated; the order defines the
/// positional correspondence with substitution-variable values.
#[derive(Clone, Debug, Display)]
#[display(fmt = "{}", _0)]
pub struct Email(String);

impl TryFrom<String> for Email {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        if validate_email(&value) {
            Ok(Self(value))
        } else {
            Err("invalid email".into())
        }
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
