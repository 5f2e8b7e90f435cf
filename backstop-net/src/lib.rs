mod http1;

pub use http1::{
    Header, Limits, ParseError, ParseErrorKind, ParseStatus, Request, RequestLine, RequestParser,
    Response, ResponseParser, StatusLine, encode_request, encode_response, header_value,
    reason_phrase,
};
