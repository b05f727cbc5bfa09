use nanoid::nanoid;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

pub const ALPHABET: [char; 62] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S',
    'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l',
    'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1', '2', '3', '4',
    '5', '6', '7', '8', '9',
];

const LENGTH: usize = 8;

/// Identifies one runner session in logs and thread names.
#[derive(Debug, Clone, PartialEq, Hash, Eq)]
pub struct SessionId(Arc<str>);

impl Deref for SessionId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::generate()
    }
}

impl SessionId {
    pub fn new<S>(s: S) -> Self
    where
        S: AsRef<str>,
    {
        Self(Arc::from(s.as_ref()))
    }

    #[must_use]
    pub fn generate() -> Self {
        Self(Arc::from(nanoid!(LENGTH, &ALPHABET)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
