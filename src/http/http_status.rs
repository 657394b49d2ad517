#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    Ok = 200,
    Unauthorized = 401,
    NotFound = 404,
    PayloadTooLarge = 413,
    InternalServerError = 500,
}

impl HttpStatus {
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Reason phrase written into synthesized status lines.
    ///
    /// Only a handful of codes are known by name; everything else has no description.
    pub fn description(code: u16) -> Option<&'static str> {
        match code {
            200 => Some("OK"),
            404 => Some("Not Found"),
            500 => Some("Internal Server Error"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::HttpStatus;

    #[test]
    fn describes_known_codes_only() {
        assert_eq!(HttpStatus::description(200), Some("OK"));
        assert_eq!(HttpStatus::description(404), Some("Not Found"));
        assert_eq!(HttpStatus::description(500), Some("Internal Server Error"));
        assert_eq!(HttpStatus::description(401), None);
        assert_eq!(HttpStatus::Unauthorized.code(), 401);
        assert_eq!(HttpStatus::PayloadTooLarge.code(), 413);
    }
}
