//! HTTP method as a typed enum.
//!
//! Only the verbs a JSON API routes on. Requests carrying any other method
//! never match a route and fall through to the dispatcher's 404 path — no
//! separate 405 handling.

use std::fmt;
use std::str::FromStr;

/// A routable HTTP method.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Delete,
    Get,
    Patch,
    Post,
    Put,
}

impl Method {
    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Get    => "GET",
            Self::Patch  => "PATCH",
            Self::Post   => "POST",
            Self::Put    => "PUT",
        }
    }
}

/// Parses an uppercase method string. Case-sensitive per RFC 9110 §9.1.
impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DELETE" => Ok(Self::Delete),
            "GET"    => Ok(Self::Get),
            "PATCH"  => Ok(Self::Patch),
            "POST"   => Ok(Self::Post),
            "PUT"    => Ok(Self::Put),
            _        => Err(()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::Method;

    #[test]
    fn parses_uppercase_only() {
        assert_eq!("GET".parse::<Method>(), Ok(Method::Get));
        assert_eq!("PATCH".parse::<Method>(), Ok(Method::Patch));
        assert!("get".parse::<Method>().is_err());
        assert!("PROPFIND".parse::<Method>().is_err());
    }

    #[test]
    fn round_trips_through_as_str() {
        for m in [Method::Delete, Method::Get, Method::Patch, Method::Post, Method::Put] {
            assert_eq!(m.as_str().parse::<Method>(), Ok(m));
        }
    }
}
