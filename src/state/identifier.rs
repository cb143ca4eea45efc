use std::fmt;

/// Opaque per-source name of one listing item, derived from its canonical link
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// An item discovered on a listing page, pending detail fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLink {
    pub identifier: Identifier,
    pub url: String,
    pub page: u32,
}

impl CandidateLink {
    pub fn new(identifier: impl Into<Identifier>, url: impl Into<String>, page: u32) -> Self {
        Self {
            identifier: identifier.into(),
            url: url.into(),
            page,
        }
    }
}
