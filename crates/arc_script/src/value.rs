use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Boolean(bool),
    String(String),
    /// Opaque reference handed out by the host, e.g. an output placeholder.
    Handle(u64),
    Undefined,
}

pub trait ValueExt {
    fn to_bool(&self) -> Result<bool, String>;
    fn to_number(&self) -> Result<f64, String>;
}

impl ValueExt for Value {
    fn to_bool(&self) -> Result<bool, String> {
        match self {
            Self::Boolean(b) => Ok(*b),
            other => Err(format!("Expected boolean, found {}", other.type_name())),
        }
    }

    fn to_number(&self) -> Result<f64, String> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            other => Err(format!("Expected number, found {}", other.type_name())),
        }
    }
}

impl Value {
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Boolean(_) => "boolean",
            Self::String(_) => "string",
            Self::Handle(_) => "handle",
            Self::Undefined => "undefined",
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        if let Self::Boolean(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        if let Self::Number(n) = self {
            Some(*n)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_handle(&self) -> Option<u64> {
        if let Self::Handle(id) = self {
            Some(*id)
        } else {
            None
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => {
                if n.fract() == 0.0 {
                    write!(f, "{n:.0}")
                } else {
                    write!(f, "{n}")
                }
            }
            Self::Handle(id) => write!(f, "<handle {id}>"),
            Self::Undefined => write!(f, ""),
        }
    }
}

pub trait VariableResolver {
    /// Resolves a variable by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is not found.
    fn resolve(&self, name: &str) -> Result<Value, String>;
}
