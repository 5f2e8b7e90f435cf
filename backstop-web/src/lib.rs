mod client;
mod error;
mod request;
#[cfg(test)]
mod request_test;

pub use backstop_net::Response;
pub use client::{Client, ClientConfig, USER_AGENT_VALUE};
pub use error::RequestError;
pub use request::{Request, RequestBuilder};
