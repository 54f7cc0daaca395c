//! HTTP verbs accepted by route descriptors.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// A recognized route method.
///
/// `All` only appears on routes: it matches every request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "&'static str")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    All,
}

impl Method {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::All => "ALL",
        }
    }

    /// Whether a route registered with `self` serves a `request` method.
    ///
    /// `GET` routes also answer `HEAD`.
    pub fn matches(self, request: Method) -> bool {
        self == Self::All || self == request || (self == Self::Get && request == Self::Head)
    }

    /// Map a request method from the HTTP layer. Non-standard verbs yield `None`.
    pub fn from_http(method: &tiny_http::Method) -> Option<Self> {
        use tiny_http::Method as M;
        Some(match method {
            M::Get => Self::Get,
            M::Post => Self::Post,
            M::Put => Self::Put,
            M::Delete => Self::Delete,
            M::Patch => Self::Patch,
            M::Head => Self::Head,
            M::Options => Self::Options,
            _ => return None,
        })
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "ALL" | "*" => Ok(Self::All),
            "" => Err("method must not be empty".into()),
            other => Err(format!("unsupported method `{other}`")),
        }
    }
}

impl From<Method> for &'static str {
    fn from(method: Method) -> Self {
        method.as_str()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("get".parse::<Method>(), Ok(Method::Get));
        assert_eq!(" Post ".parse::<Method>(), Ok(Method::Post));
        assert_eq!("*".parse::<Method>(), Ok(Method::All));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("FETCH".parse::<Method>().unwrap_err().contains("FETCH"));
        assert!("".parse::<Method>().is_err());
    }

    #[test]
    fn test_matches() {
        assert!(Method::Get.matches(Method::Get));
        assert!(Method::Get.matches(Method::Head));
        assert!(!Method::Head.matches(Method::Get));
        assert!(!Method::Post.matches(Method::Get));
        assert!(Method::All.matches(Method::Delete));
    }
}
