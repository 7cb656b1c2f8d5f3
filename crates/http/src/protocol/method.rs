use std::fmt;

/// Request methods accepted by the parser; anything else is answered with 405.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Options,
}

impl Method {
    /// Exact, case-sensitive match of a request line token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            "OPTIONS" => Some(Method::Options),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Options => "OPTIONS",
        }
    }

    /// Methods whose requests never carry a body.
    pub fn is_bodyless(self) -> bool {
        matches!(self, Method::Get | Method::Options)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
