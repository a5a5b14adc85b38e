//! HTTP status codes as a typed enum.
//!
//! Trimmed to the codes a JSON CRUD backend actually emits. Handlers return a
//! [`Status`] through [`Response::status`](crate::Response::status) or the
//! response builder; the serving layer converts it to the wire code.

/// Status codes used by handlers and the dispatch error paths.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    Ok,                   // 200
    Created,              // 201
    Accepted,             // 202
    NoContent,            // 204
    BadRequest,           // 400
    Unauthorized,         // 401
    Forbidden,            // 403
    NotFound,             // 404
    Conflict,             // 409
    UnprocessableContent, // 422
    InternalServerError,  // 500
    ServiceUnavailable,   // 503
}

impl Status {
    pub fn as_u16(self) -> u16 {
        match self {
            Self::Ok                   => 200,
            Self::Created              => 201,
            Self::Accepted             => 202,
            Self::NoContent            => 204,
            Self::BadRequest           => 400,
            Self::Unauthorized         => 401,
            Self::Forbidden            => 403,
            Self::NotFound             => 404,
            Self::Conflict             => 409,
            Self::UnprocessableContent => 422,
            Self::InternalServerError  => 500,
            Self::ServiceUnavailable   => 503,
        }
    }
}

impl From<Status> for u16 {
    fn from(s: Status) -> u16 {
        s.as_u16()
    }
}
