use super::types::Header;

/// Serializes a request. `Host` always comes first; `Content-Length` is added
/// for non-empty bodies unless the caller already supplied one.
pub fn encode_request(
    method: &str,
    target: &str,
    host: &str,
    headers: &[Header],
    body: &[u8],
) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(128 + body.len());
    bytes.extend_from_slice(format!("{method} {target} HTTP/1.1\r\n").as_bytes());
    push_header(&mut bytes, "Host", host);
    for header in headers {
        if header.name.eq_ignore_ascii_case("host") {
            continue;
        }
        push_header(&mut bytes, &header.name, &header.value);
    }
    if !body.is_empty() && !has_header(headers, "content-length") {
        push_header(&mut bytes, "Content-Length", &body.len().to_string());
    }
    bytes.extend_from_slice(b"\r\n");
    bytes.extend_from_slice(body);
    bytes
}

/// Serializes a response with an explicit `Content-Length`.
pub fn encode_response(status: u16, headers: &[Header], body: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(128 + body.len());
    bytes.extend_from_slice(format!("HTTP/1.1 {status} {}\r\n", reason_phrase(status)).as_bytes());
    for header in headers {
        if header.name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        push_header(&mut bytes, &header.name, &header.value);
    }
    push_header(&mut bytes, "Content-Length", &body.len().to_string());
    bytes.extend_from_slice(b"\r\n");
    bytes.extend_from_slice(body);
    bytes
}

pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

fn push_header(bytes: &mut Vec<u8>, name: &str, value: &str) {
    bytes.extend_from_slice(name.as_bytes());
    bytes.extend_from_slice(b": ");
    bytes.extend_from_slice(value.as_bytes());
    bytes.extend_from_slice(b"\r\n");
}

fn has_header(headers: &[Header], name: &str) -> bool {
    headers
        .iter()
        .any(|header| header.name.eq_ignore_ascii_case(name))
}
