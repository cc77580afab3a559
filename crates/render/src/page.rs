use std::borrow::Cow;
use std::fmt;

pub const NOT_FOUND_MESSAGE: &str = "The requested database doesn't exist";
pub const INTERNAL_MESSAGE: &str = "Internal server error";

/// The only error detail a client ever sees.
///
/// Internal causes are logged by whoever builds the page and never echoed
/// in the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPage {
    pub status: u16,
    pub message: Cow<'static, str>,
}

impl ErrorPage {
    pub fn not_found() -> Self {
        Self { status: 404, message: Cow::Borrowed(NOT_FOUND_MESSAGE) }
    }

    /// A 400 with a short, caller-supplied message.
    pub fn bad_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self { status: 400, message: message.into() }
    }

    pub fn internal() -> Self {
        Self { status: 500, message: Cow::Borrowed(INTERNAL_MESSAGE) }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }
}

impl fmt::Display for ErrorPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}
