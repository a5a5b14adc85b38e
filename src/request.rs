//! Incoming HTTP request type.
//!
//! A [`Request`] is a plain value: the serving layer (or a test) builds one,
//! the dispatcher threads it through the middleware chain, the terminal
//! handler consumes it. Everything is read-only except the identity slot,
//! which authentication middleware may fill exactly once.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

use crate::auth::Identity;
use crate::method::Method;

/// Returned by [`Request::attach_identity`] when a middleware tries to
/// overwrite an identity another middleware already attached. A chain that
/// trips this is misconfigured; the dispatcher turns it into a 500.
#[derive(Debug, Error)]
#[error("request identity is already attached")]
pub struct IdentityAlreadySet;

/// An incoming HTTP request.
pub struct Request {
    method: Method,
    path: String,
    body: Value,
    params: HashMap<String, String>,
    query: HashMap<String, String>,
    headers: HashMap<String, String>,
    identity: Option<Identity>,
}

impl Request {
    /// Builds a request as it arrives off the wire: no path parameters (the
    /// router fills them on match) and no identity.
    ///
    /// Header names are stored lowercased so lookup is case-insensitive.
    pub fn new(
        method: Method,
        path: impl Into<String>,
        body: Value,
        query: HashMap<String, String>,
        headers: HashMap<String, String>,
    ) -> Self {
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        Self {
            method,
            path: path.into(),
            body,
            params: HashMap::new(),
            query,
            headers,
            identity: None,
        }
    }

    /// Builder for tests and hand-constructed requests.
    pub fn builder(method: Method, path: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            method,
            path: path.into(),
            body: Value::Null,
            query: HashMap::new(),
            headers: HashMap::new(),
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The parsed JSON body. `Value::Null` when the request had no body.
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/contacts/:id`, `req.param("id")` on `/contacts/42`
    /// returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns a query-string parameter.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// The authenticated identity, if a middleware attached one.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Attaches the authenticated identity. At most one middleware in a chain
    /// may do this; a second attempt fails and the first identity stays.
    pub fn attach_identity(&mut self, identity: Identity) -> Result<(), IdentityAlreadySet> {
        if self.identity.is_some() {
            return Err(IdentityAlreadySet);
        }
        self.identity = Some(identity);
        Ok(())
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }
}

/// Fluent builder for [`Request`]. Obtain via [`Request::builder`].
pub struct RequestBuilder {
    method: Method,
    path: String,
    body: Value,
    query: HashMap<String, String>,
    headers: HashMap<String, String>,
}

impl RequestBuilder {
    pub fn body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.insert(key.to_owned(), value.to_owned());
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_owned(), value.to_owned());
        self
    }

    pub fn build(self) -> Request {
        Request::new(self.method, self.path, self.body, self.query, self.headers)
    }
}
