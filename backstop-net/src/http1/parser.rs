use super::types::{
    Header, Limits, ParseError, ParseErrorKind, Request, RequestLine, Response, StatusLine,
    header_value,
};

const CRLF: &[u8] = b"\r\n";
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseStatus<T> {
    NeedMore,
    Complete { message: T },
    Error { error: ParseError },
}

/// Incremental HTTP/1 request parser. Feed it bytes as they arrive.
#[derive(Debug, Default)]
pub struct RequestParser {
    buffer: Vec<u8>,
    limits: Limits,
}

impl RequestParser {
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self {
            buffer: Vec::new(),
            limits,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) -> ParseStatus<Request> {
        self.buffer.extend_from_slice(bytes);
        let result = parse_message(&self.buffer, self.limits, false, |line, offset| {
            parse_request_line(line, offset).map(|line| (line, BodyKind::Request))
        });
        settle(&mut self.buffer, result, |(line, _), headers, body| Request {
            line,
            headers,
            body,
        })
    }
}

/// Incremental HTTP/1 response parser.
///
/// Responses without `Content-Length` or chunked framing are delimited by the
/// connection closing; call [`ResponseParser::finish`] once the peer hangs up.
#[derive(Debug, Default)]
pub struct ResponseParser {
    buffer: Vec<u8>,
    limits: Limits,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self {
            buffer: Vec::new(),
            limits,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) -> ParseStatus<Response> {
        self.buffer.extend_from_slice(bytes);
        self.parse(false)
    }

    /// Parses whatever is buffered, treating the end of input as final.
    pub fn finish(&mut self) -> ParseStatus<Response> {
        self.parse(true)
    }

    fn parse(&mut self, eof: bool) -> ParseStatus<Response> {
        let result = parse_message(&self.buffer, self.limits, eof, |line, offset| {
            parse_status_line(line, offset).map(|line| {
                let kind = BodyKind::Response(line.status_code);
                (line, kind)
            })
        });
        settle(&mut self.buffer, result, |(line, _), headers, body| Response {
            line,
            headers,
            body,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Request,
    Response(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Empty,
    Length(usize),
    Chunked,
    UntilEof,
}

struct Parsed<L> {
    start: L,
    headers: Vec<Header>,
    body: Vec<u8>,
    consumed: usize,
}

fn settle<L, T>(
    buffer: &mut Vec<u8>,
    result: Result<Option<Parsed<L>>, ParseError>,
    build: impl FnOnce(L, Vec<Header>, Vec<u8>) -> T,
) -> ParseStatus<T> {
    match result {
        Ok(Some(parsed)) => {
            buffer.drain(..parsed.consumed);
            ParseStatus::Complete {
                message: build(parsed.start, parsed.headers, parsed.body),
            }
        }
        Ok(None) => ParseStatus::NeedMore,
        Err(error) => ParseStatus::Error { error },
    }
}

fn parse_message<L>(
    buffer: &[u8],
    limits: Limits,
    eof: bool,
    start_line: impl FnOnce(&[u8], usize) -> Result<(L, BodyKind), ParseError>,
) -> Result<Option<Parsed<(L, BodyKind)>>, ParseError> {
    let Some(headers_end) = find_headers_end(buffer, limits)? else {
        if eof {
            return Err(ParseError {
                kind: ParseErrorKind::UnexpectedEof,
                offset: buffer.len(),
            });
        }
        return Ok(None);
    };

    let line_end = find_line_end(buffer, 0).unwrap_or(headers_end);
    let (start, kind) = start_line(&buffer[..line_end], 0)?;

    let headers_start = (line_end + CRLF.len()).min(headers_end);
    let headers = parse_headers(&buffer[headers_start..headers_end], headers_start)?;
    let body_start = headers_end + HEADER_TERMINATOR.len();

    let framing = body_framing(&headers, kind, body_start)?;
    let Some((body, body_consumed)) = parse_body(buffer, body_start, framing, limits, eof)? else {
        return Ok(None);
    };

    Ok(Some(Parsed {
        start: (start, kind),
        headers,
        body,
        consumed: body_start + body_consumed,
    }))
}

fn find_headers_end(buffer: &[u8], limits: Limits) -> Result<Option<usize>, ParseError> {
    let found = twoway::find_bytes(buffer, HEADER_TERMINATOR);
    let scanned = found.unwrap_or(buffer.len());
    if scanned > limits.max_header_bytes {
        return Err(ParseError {
            kind: ParseErrorKind::HeaderTooLarge,
            offset: limits.max_header_bytes,
        });
    }
    Ok(found)
}

fn find_line_end(buffer: &[u8], start: usize) -> Option<usize> {
    twoway::find_bytes(&buffer[start..], CRLF).map(|offset| start + offset)
}

fn parse_request_line(line: &[u8], offset: usize) -> Result<RequestLine, ParseError> {
    let invalid = ParseError {
        kind: ParseErrorKind::InvalidStartLine,
        offset,
    };
    let text = std::str::from_utf8(line).map_err(|_| invalid.clone())?;

    let mut parts = text.split_whitespace();
    let method = parts.next().ok_or_else(|| invalid.clone())?;
    let target = parts.next().ok_or_else(|| invalid.clone())?;
    let version = parts.next().unwrap_or("HTTP/1.1");
    if parts.next().is_some() || !version.starts_with("HTTP/") {
        return Err(invalid);
    }

    Ok(RequestLine {
        method: method.to_string(),
        target: target.to_string(),
        version: version.to_string(),
    })
}

fn parse_status_line(line: &[u8], offset: usize) -> Result<StatusLine, ParseError> {
    let invalid = ParseError {
        kind: ParseErrorKind::InvalidStatusLine,
        offset,
    };
    let text = std::str::from_utf8(line).map_err(|_| invalid.clone())?;

    let mut parts = text.splitn(3, ' ');
    let version = parts.next().unwrap_or("");
    if !version.starts_with("HTTP/") {
        return Err(invalid);
    }
    let status_code = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| invalid.clone())?;
    let reason = parts.next().unwrap_or("");

    Ok(StatusLine {
        version: version.to_string(),
        status_code,
        reason: reason.to_string(),
    })
}

fn parse_headers(bytes: &[u8], base_offset: usize) -> Result<Vec<Header>, ParseError> {
    let invalid = |offset| ParseError {
        kind: ParseErrorKind::InvalidHeader,
        offset,
    };
    let text = std::str::from_utf8(bytes).map_err(|_| invalid(base_offset))?;

    let mut headers: Vec<Header> = Vec::new();
    let mut offset = base_offset;
    for line in text.split("\r\n") {
        if line.is_empty() {
            offset += CRLF.len();
            continue;
        }

        if line.starts_with([' ', '\t']) {
            // obs-fold continuation of the previous header value
            let previous = headers.last_mut().ok_or_else(|| invalid(offset))?;
            previous.value.push(' ');
            previous.value.push_str(line.trim());
        } else {
            let (name, value) = line.split_once(':').ok_or_else(|| invalid(offset))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(invalid(offset));
            }
            headers.push(Header::new(name, value.trim()));
        }
        offset += line.len() + CRLF.len();
    }

    Ok(headers)
}

fn body_framing(headers: &[Header], kind: BodyKind, offset: usize) -> Result<Framing, ParseError> {
    if let BodyKind::Response(status) = kind {
        if (100..200).contains(&status) || status == 204 || status == 304 {
            return Ok(Framing::Empty);
        }
    }

    let chunked = header_value(headers, "transfer-encoding").is_some_and(|value| {
        value
            .split(',')
            .any(|encoding| encoding.trim().eq_ignore_ascii_case("chunked"))
    });
    if chunked {
        return Ok(Framing::Chunked);
    }

    if let Some(length) = header_value(headers, "content-length") {
        return length
            .trim()
            .parse::<usize>()
            .map(Framing::Length)
            .map_err(|_| ParseError {
                kind: ParseErrorKind::InvalidContentLength,
                offset,
            });
    }

    Ok(match kind {
        BodyKind::Request => Framing::Empty,
        BodyKind::Response(_) => Framing::UntilEof,
    })
}

fn parse_body(
    buffer: &[u8],
    body_start: usize,
    framing: Framing,
    limits: Limits,
    eof: bool,
) -> Result<Option<(Vec<u8>, usize)>, ParseError> {
    let too_large = ParseError {
        kind: ParseErrorKind::BodyTooLarge,
        offset: body_start,
    };
    let truncated = ParseError {
        kind: ParseErrorKind::UnexpectedEof,
        offset: buffer.len(),
    };

    match framing {
        Framing::Empty => Ok(Some((Vec::new(), 0))),
        Framing::Length(length) => {
            if length > limits.max_body_bytes {
                return Err(too_large);
            }
            let end = body_start + length;
            if buffer.len() < end {
                return if eof { Err(truncated) } else { Ok(None) };
            }
            Ok(Some((buffer[body_start..end].to_vec(), length)))
        }
        Framing::UntilEof => {
            let available = buffer.len() - body_start;
            if available > limits.max_body_bytes {
                return Err(too_large);
            }
            if !eof {
                return Ok(None);
            }
            Ok(Some((buffer[body_start..].to_vec(), available)))
        }
        Framing::Chunked => match parse_chunked_body(buffer, body_start, limits)? {
            Some(parsed) => Ok(Some(parsed)),
            None if eof => Err(truncated),
            None => Ok(None),
        },
    }
}

fn parse_chunked_body(
    buffer: &[u8],
    body_start: usize,
    limits: Limits,
) -> Result<Option<(Vec<u8>, usize)>, ParseError> {
    let mut cursor = body_start;
    let mut body = Vec::new();

    loop {
        let Some(line_end) = find_line_end(buffer, cursor) else {
            return Ok(None);
        };
        let invalid_size = ParseError {
            kind: ParseErrorKind::InvalidChunkSize,
            offset: cursor,
        };
        let line = std::str::from_utf8(&buffer[cursor..line_end])
            .map_err(|_| invalid_size.clone())?;
        let size_text = line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_text, 16).map_err(|_| invalid_size)?;
        cursor = line_end + CRLF.len();

        if size == 0 {
            // trailers are not supported; expect the terminating empty line
            if buffer.len() < cursor + CRLF.len() {
                return Ok(None);
            }
            if &buffer[cursor..cursor + CRLF.len()] != CRLF {
                return Err(ParseError {
                    kind: ParseErrorKind::InvalidChunkTerminator,
                    offset: cursor,
                });
            }
            cursor += CRLF.len();
            return Ok(Some((body, cursor - body_start)));
        }

        if size > limits.max_body_bytes.saturating_sub(body.len()) {
            return Err(ParseError {
                kind: ParseErrorKind::BodyTooLarge,
                offset: cursor,
            });
        }
        let chunk_end = cursor.checked_add(size).ok_or(ParseError {
            kind: ParseErrorKind::InvalidChunkSize,
            offset: cursor,
        })?;
        if chunk_end.saturating_add(CRLF.len()) > buffer.len() {
            return Ok(None);
        }
        body.extend_from_slice(&buffer[cursor..chunk_end]);
        cursor = chunk_end;

        if &buffer[cursor..cursor + CRLF.len()] != CRLF {
            return Err(ParseError {
                kind: ParseErrorKind::InvalidChunkTerminator,
                offset: cursor,
            });
        }
        cursor += CRLF.len();
    }
}
