/// HTTP status codes known to the message model.
///
/// Responses can only be built with one of these codes; anything else is
/// rejected by [`Status::from_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Continue,
    SwitchingProtocols,
    Ok,
    Created,
    Accepted,
    NonAuthoritative,
    NoContent,
    ResetContent,
    PartialContent,
    MultipleChoices,
    MovedPermanently,
    Found,
    SeeOther,
    NotModified,
    UseProxy,
    TemporaryRedirect,
    BadRequest,
    Unauthorized,
    PaymentRequired,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    NotAcceptable,
    ProxyAuthenticationRequired,
    RequestTimeout,
    Conflict,
    Gone,
    LengthRequired,
    PreconditionFailed,
    PayloadTooLarge,
    UriTooLong,
    UnsupportedMediaType,
    RangeNotSatisfiable,
    ExpectationFailed,
    InternalServerError,
    NotImplemented,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
    VersionNotSupported,
}

const TABLE: &[(Status, u16, &str)] = &[
    (Status::Continue, 100, "Continue"),
    (Status::SwitchingProtocols, 101, "Switching Protocols"),
    (Status::Ok, 200, "OK"),
    (Status::Created, 201, "Created"),
    (Status::Accepted, 202, "Accepted"),
    (Status::NonAuthoritative, 203, "Non-Authoritative Information"),
    (Status::NoContent, 204, "No Content"),
    (Status::ResetContent, 205, "Reset Content"),
    (Status::PartialContent, 206, "Partial Content"),
    (Status::MultipleChoices, 300, "Multiple Choices"),
    (Status::MovedPermanently, 301, "Moved Permanently"),
    (Status::Found, 302, "Found"),
    (Status::SeeOther, 303, "See Other"),
    (Status::NotModified, 304, "Not Modified"),
    (Status::UseProxy, 305, "Use Proxy"),
    (Status::TemporaryRedirect, 307, "Temporary Redirect"),
    (Status::BadRequest, 400, "Bad Request"),
    (Status::Unauthorized, 401, "Unauthorized"),
    (Status::PaymentRequired, 402, "Payment Required"),
    (Status::Forbidden, 403, "Forbidden"),
    (Status::NotFound, 404, "Not Found"),
    (Status::MethodNotAllowed, 405, "Method Not Allowed"),
    (Status::NotAcceptable, 406, "Not Acceptable"),
    (Status::ProxyAuthenticationRequired, 407, "Proxy Authentication Required"),
    (Status::RequestTimeout, 408, "Request Time-out"),
    (Status::Conflict, 409, "Conflict"),
    (Status::Gone, 410, "Gone"),
    (Status::LengthRequired, 411, "Length Required"),
    (Status::PreconditionFailed, 412, "Precondition Failed"),
    (Status::PayloadTooLarge, 413, "Request Entity Too Large"),
    (Status::UriTooLong, 414, "Request-URI Too Large"),
    (Status::UnsupportedMediaType, 415, "Unsupported Media Type"),
    (Status::RangeNotSatisfiable, 416, "Requested range not satisfiable"),
    (Status::ExpectationFailed, 417, "Expectation Failed"),
    (Status::InternalServerError, 500, "Internal Server Error"),
    (Status::NotImplemented, 501, "Not Implemented"),
    (Status::BadGateway, 502, "Bad Gateway"),
    (Status::ServiceUnavailable, 503, "Service Unavailable"),
    (Status::GatewayTimeout, 504, "Gateway Time-out"),
    (Status::VersionNotSupported, 505, "HTTP Version not supported"),
];

impl Status {
    /// Look up a status by its numeric code
    pub fn from_code(code: u16) -> Option<Status> {
        TABLE.iter().find(|(_, c, _)| *c == code).map(|(s, _, _)| *s)
    }

    pub fn code(&self) -> u16 {
        self.entry().1
    }

    pub fn phrase(&self) -> &'static str {
        self.entry().2
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code())
    }

    pub fn all() -> impl Iterator<Item = Status> {
        TABLE.iter().map(|(s, _, _)| *s)
    }

    fn entry(&self) -> &'static (Status, u16, &'static str) {
        // every variant has exactly one row
        TABLE
            .iter()
            .find(|(s, _, _)| s == self)
            .unwrap_or(&TABLE[0])
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code(), self.phrase())
    }
}
