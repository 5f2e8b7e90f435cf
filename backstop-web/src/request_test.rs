use http::Uri;

use crate::Request;

#[test]
fn builds_request() {
    let uri: Uri = "http://example.com/".parse().unwrap();
    let request = Request::builder(uri.clone())
        .method(http::Method::POST)
        .header(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("text/plain"),
        )
        .body(b"hello".to_vec())
        .build();

    assert_eq!(request.uri, uri);
    assert_eq!(request.method, http::Method::POST);
    assert_eq!(request.headers.len(), 1);
    assert_eq!(request.body, b"hello".to_vec());
}

#[test]
fn target_defaults_to_root() {
    let request = Request::get("http://127.0.0.1:8080".parse().unwrap());
    assert_eq!(request.target(), "/");

    let request = Request::get("http://127.0.0.1:8080/greet?name=x".parse().unwrap());
    assert_eq!(request.target(), "/greet?name=x");
}
