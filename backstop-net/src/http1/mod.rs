mod encoder;
mod parser;
mod types;

pub use encoder::{encode_request, encode_response, reason_phrase};
pub use parser::{ParseStatus, RequestParser, ResponseParser};
pub use types::{
    Header, Limits, ParseError, ParseErrorKind, Request, RequestLine, Response, StatusLine,
    header_value,
};
