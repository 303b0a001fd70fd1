//! Request parameter extraction
//!
//! Form fields come from an `application/x-www-form-urlencoded` body first,
//! then from the query string.

/// First value of `name` in urlencoded `input`
pub fn form_value(input: &[u8], name: &str) -> Option<String> {
    form_urlencoded::parse(input)
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Look up `name` in the body, falling back to the query string
pub fn request_param(body: Option<&[u8]>, query: Option<&str>, name: &str) -> Option<String> {
    body.and_then(|b| form_value(b, name))
        .or_else(|| query.and_then(|q| form_value(q.as_bytes(), name)))
}
