use super::message::{HttpMessage, StartLine};
use super::status::Status;
use super::DEFAULT_HTTP_VERSION;
use crate::SoapError;

/// `<version> <code> <reason>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub version: String,
    pub status: Status,
    pub reason: String,
}

impl StartLine for StatusLine {
    const BODY_UNTIL_CLOSE: bool = true;

    fn version(&self) -> &str {
        &self.version
    }

    fn set_version(&mut self, version: &str) {
        self.version = version.to_string();
    }

    fn render(&self) -> String {
        format!("{} {} {}", self.version, self.status.code(), self.reason)
    }

    fn parse(line: &str) -> Result<Self, SoapError> {
        let parts: Vec<&str> = line.splitn(3, ' ').collect();
        if parts.len() < 3 {
            return Err(SoapError::InvalidArgument(format!(
                "Illegal status line: {line}"
            )));
        }
        let code = parts[1]
            .parse::<u16>()
            .map_err(|_| SoapError::InvalidArgument(format!("Illegal status code: {}", parts[1])))?;
        let status = Status::from_code(code)
            .ok_or_else(|| SoapError::InvalidArgument(format!("Unknown status code: {code}")))?;
        Ok(Self {
            version: parts[0].to_string(),
            status,
            reason: parts[2].trim().to_string(),
        })
    }
}

pub type HttpResponse = HttpMessage<StatusLine>;

impl HttpMessage<StatusLine> {
    pub fn new(status: Status) -> Self {
        Self::from_start_line(StatusLine {
            version: DEFAULT_HTTP_VERSION.to_string(),
            status,
            reason: status.phrase().to_string(),
        })
    }

    /// Build a response from a numeric code; unknown codes are rejected
    pub fn with_code(code: u16) -> Result<Self, SoapError> {
        let mut response = Self::new(Status::Ok);
        response.set_status_code(code)?;
        Ok(response)
    }

    pub fn status(&self) -> Status {
        self.start_line().status
    }

    pub fn status_code(&self) -> u16 {
        self.start_line().status.code()
    }

    pub fn reason_phrase(&self) -> &str {
        &self.start_line().reason
    }

    /// Replace the status and reset the reason phrase to the standard one
    pub fn set_status(&mut self, status: Status) {
        let line = self.start_line_mut();
        line.status = status;
        line.reason = status.phrase().to_string();
    }

    pub fn set_status_code(&mut self, code: u16) -> Result<(), SoapError> {
        let status = Status::from_code(code)
            .ok_or_else(|| SoapError::InvalidArgument(format!("Unknown status code: {code}")))?;
        self.set_status(status);
        Ok(())
    }

    pub fn set_reason_phrase(&mut self, reason: &str) {
        self.start_line_mut().reason = reason.to_string();
    }

    pub fn is_success(&self) -> bool {
        self.status().is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{CONTENT_TYPE, HTTP_1_0};

    #[test]
    fn test_encode_response() {
        let mut response = HttpResponse::new(Status::PreconditionFailed);
        response.set_header("Content-Length", "0");
        assert_eq!(
            String::from_utf8(response.to_bytes()).unwrap(),
            "HTTP/1.1 412 Precondition Failed\r\nContent-Length: 0\r\n\r\n"
        );
    }

    #[test]
    fn test_decode_keeps_server_reason_phrase() {
        let raw = b"HTTP/1.1 500 Internal Error Here\r\nContent-Length: 2\r\n\r\nok";
        let response = HttpResponse::decode(raw).unwrap();
        assert_eq!(response.status(), Status::InternalServerError);
        assert_eq!(response.reason_phrase(), "Internal Error Here");
        assert_eq!(response.body().as_deref(), Some("ok"));
    }

    #[test]
    fn test_unknown_status_code_rejected() {
        assert!(matches!(
            HttpResponse::with_code(299),
            Err(SoapError::InvalidArgument(_))
        ));
        assert!(matches!(
            StatusLine::parse("HTTP/1.1 abc Nope"),
            Err(SoapError::InvalidArgument(_))
        ));
        let mut response = HttpResponse::new(Status::Ok);
        assert!(response.set_status_code(999).is_err());
        assert_eq!(response.status(), Status::Ok);
    }

    #[test]
    fn test_decode_status_line_missing_reason_is_parse_error() {
        let err = HttpResponse::decode(b"HTTP/1.1 200\r\n\r\n").unwrap_err();
        assert!(matches!(err, SoapError::Parse(_)));
    }

    #[test]
    fn test_body_read_until_close() {
        let raw = b"HTTP/1.0 200 OK\r\nContent-Type: text/xml\r\n\r\n<root/>";
        let response = HttpResponse::decode(raw).unwrap();
        assert_eq!(response.version(), HTTP_1_0);
        assert_eq!(response.body().as_deref(), Some("<root/>"));
    }

    #[test]
    fn test_keep_alive_response_without_length_has_empty_body() {
        let raw = b"HTTP/1.1 200 OK\r\n\r\ntrailing";
        let response = HttpResponse::decode(raw).unwrap();
        assert_eq!(response.body().as_deref(), Some(""));
    }

    #[test]
    fn test_latin1_charset_decoding() {
        let mut raw = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=ISO-8859-1\r\nContent-Length: 3\r\n\r\n".to_vec();
        raw.extend_from_slice(&[0x63, 0x61, 0xe9]);
        let response = HttpResponse::decode(&raw).unwrap();
        assert_eq!(response.header(CONTENT_TYPE), Some("text/plain; charset=ISO-8859-1"));
        assert_eq!(response.body().as_deref(), Some("caé"));
    }
}
