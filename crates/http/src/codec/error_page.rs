//! Canned responses for the five error outcomes.
//!
//! The pages are complete static responses (status line, headers and a tiny
//! HTML body) sent verbatim, after which the connection is closed.

use crate::protocol::HttpError;

macro_rules! canned_page {
    ($status:literal) => {
        concat!(
            "HTTP/1.1 ",
            $status,
            "\r\n",
            "Connection: close\r\n",
            "Content-Type: text/html\r\n",
            "Access-Control-Allow-Origin: *\r\n",
            "\r\n",
            "<html>",
            "<head><title>Error</title></head>",
            "<body><h1>",
            $status,
            "</h1></body>",
            "</html>"
        )
    };
}

const BAD_REQUEST: &str = canned_page!("400 Bad Request");
const NOT_FOUND: &str = canned_page!("404 Not Found");
const METHOD_NOT_ALLOWED: &str = canned_page!("405 Method Not Allowed");
const INTERNAL_SERVER_ERROR: &str = canned_page!("500 Internal Server Error");
const VERSION_NOT_SUPPORTED: &str = canned_page!("505 HTTP Version Not Supported");

/// The full response answering `error`.
pub fn error_page(error: HttpError) -> &'static [u8] {
    let page = match error {
        HttpError::BadRequest => BAD_REQUEST,
        HttpError::NotFound => NOT_FOUND,
        HttpError::MethodNotAllowed => METHOD_NOT_ALLOWED,
        HttpError::InternalError => INTERNAL_SERVER_ERROR,
        HttpError::VersionNotSupported => VERSION_NOT_SUPPORTED,
    };
    page.as_bytes()
}
