use super::*;
use axum::http::HeaderMap;

#[test]
fn valid_bearer_token() {
    let mut headers = HeaderMap::new();
    headers.insert(
        "authorization",
        "Bearer 550e8400-e29b-41d4-a716-446655440000"
            .parse()
            .unwrap(),
    );

    let result = extract_bearer_token(&headers);
    assert_eq!(result.unwrap(), "550e8400-e29b-41d4-a716-446655440000");
}

#[test]
fn valid_bearer_token_with_extra_whitespace() {
    let mut headers = HeaderMap::new();
    headers.insert(
        "authorization",
        "Bearer   550e8400-e29b-41d4-a716-446655440000  "
            .parse()
            .unwrap(),
    );

    let result = extract_bearer_token(&headers);
    assert_eq!(result.unwrap(), "550e8400-e29b-41d4-a716-446655440000");
}

#[test]
fn case_insensitive_bearer() {
    let mut headers = HeaderMap::new();
    headers.insert(
        "authorization",
        "bearer 550e8400-e29b-41d4-a716-446655440000"
            .parse()
            .unwrap(),
    );

    assert!(extract_bearer_token(&headers).is_ok());
}

#[test]
fn missing_authorization_header() {
    let headers = HeaderMap::new();
    assert_eq!(extract_bearer_token(&headers), Err(TokenError::Missing));
}

#[test]
fn missing_bearer_prefix() {
    let mut headers = HeaderMap::new();
    headers.insert(
        "authorization",
        "550e8400-e29b-41d4-a716-446655440000".parse().unwrap(),
    );

    assert_eq!(
        extract_bearer_token(&headers),
        Err(TokenError::InvalidFormat)
    );
}

#[test]
fn wrong_auth_scheme() {
    let mut headers = HeaderMap::new();
    headers.insert("authorization", "Basic dXNlcjpwYXNz".parse().unwrap());

    assert_eq!(
        extract_bearer_token(&headers),
        Err(TokenError::InvalidFormat)
    );
}

#[test]
fn bearer_with_empty_token() {
    let mut headers = HeaderMap::new();
    headers.insert("authorization", "Bearer  ".parse().unwrap());

    assert_eq!(extract_bearer_token(&headers), Err(TokenError::Empty));
}
