//! Just enough HTTP/1.1 to POST one JSON document.

use crate::error::Error;

pub const REQUEST_CAPACITY: usize = 512;

/// How much of a rejected response ends up in the log.
pub const RESPONSE_LOG_LIMIT: usize = 200;

pub type Request = heapless::String<REQUEST_CAPACITY>;

/// Frames `body` as a `POST` to `path` on `host`, asking the server to close
/// the connection after responding.
pub fn post_request(host: &str, path: &str, body: &str) -> Result<Request, Error> {
    let mut request = Request::new();
    ufmt::uwrite!(
        request,
        "POST {} HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        path,
        host,
        body.len(),
        body
    )
    .map_err(|_| Error::PayloadTooLarge)?;
    Ok(request)
}

/// Whether a response counts as accepted.
///
/// This only looks for `200 OK` or `201` anywhere in the bytes, it doesn't
/// parse the status line. A `500` whose body happens to contain `201` is
/// taken as success, and a `204` is not. Collectors in the field answer
/// `200 OK` or `201 Created`, and that's all this has to recognize.
pub fn is_success(response: &[u8]) -> bool {
    contains(response, b"200 OK") || contains(response, b"201")
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
