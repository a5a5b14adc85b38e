//! Outgoing HTTP response type.
//!
//! Build a [`Response`] in your handler and return it. The serving layer owns
//! the wire format: the body is always serialised as JSON with
//! `content-type: application/json`.
//!
//! # Shortcuts (no custom headers needed)
//!
//! ```rust
//! use courier::{Response, Status};
//! use serde_json::json;
//!
//! Response::ok(json!({"id": 1}));
//! Response::status(Status::NoContent);
//! Response::error(Status::NotFound, "contact not found");
//! ```
//!
//! # Builder (custom status or headers)
//!
//! ```rust
//! use courier::{Response, Status};
//! use serde_json::json;
//!
//! Response::builder()
//!     .status(Status::Created)
//!     .header("location", "/contacts/42")
//!     .json(json!({"id": "42"}));
//! ```

use serde_json::{Value, json};

use crate::status::Status;

/// An outgoing HTTP response: status code, JSON body, extra headers.
#[derive(Debug)]
pub struct Response {
    status: Status,
    body: Value,
    headers: Vec<(String, String)>,
}

impl Response {
    /// `200 OK` with a JSON body.
    pub fn ok(body: Value) -> Self {
        Self::json(Status::Ok, body)
    }

    /// Response with the given status and a JSON body.
    pub fn json(status: Status, body: Value) -> Self {
        Self { status, body, headers: Vec::new() }
    }

    /// Response with no body (serialised as JSON `null`).
    pub fn status(status: Status) -> Self {
        Self::json(status, Value::Null)
    }

    /// Error response in the conventional `{"error": "..."}` shape.
    pub fn error(status: Status, message: &str) -> Self {
        Self::json(status, json!({ "error": message }))
    }

    /// Builder for responses that need extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { status: Status::Ok, headers: Vec::new() }
    }

    pub fn status_code(&self) -> Status {
        self.status
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

/// Fluent builder for [`Response`]. Obtain via [`Response::builder()`].
/// Defaults to `Status::Ok`; terminated by a body method.
pub struct ResponseBuilder {
    status: Status,
    headers: Vec<(String, String)>,
}

impl ResponseBuilder {
    pub fn status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Terminate with a JSON body.
    pub fn json(self, body: Value) -> Response {
        Response { status: self.status, body, headers: self.headers }
    }

    /// Terminate with no body.
    pub fn no_body(self) -> Response {
        self.json(Value::Null)
    }
}
