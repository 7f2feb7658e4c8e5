//! Core HTTP protocol types shared by requests and responses

#[inline(always)]
pub(crate) fn slice_to_usize(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() {
        return None;
    }

    let mut result: usize = 0;

    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return None;
        }

        result = result
            .checked_mul(10)?
            .checked_add((byte - b'0') as usize)?;
    }

    Some(result)
}

// HEADERS

/// A single header line: `Name: Value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub(crate) name: String,
    pub(crate) value: String,
}

impl Header {
    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline(always)]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Ordered collection of header fields.
///
/// Names keep the casing they were inserted with, lookups ignore ASCII case
/// (per [RFC 7230](https://tools.ietf.org/html/rfc7230#section-3.2)).
///
/// # Duplicate names
///
/// Inserting a name that is already present replaces the previous value
/// (last value wins). The field keeps the position of its first insertion
/// and takes the casing of the latest one, so a response never carries two
/// `Content-Length` lines. Repeated fields such as `Set-Cookie` are not
/// representable; join them into one value if needed.
///
/// # Examples
/// ```
/// use nimble_http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Content-Type", "text/plain");
/// headers.insert("X-Id", "1");
/// headers.insert("content-type", "text/html");
///
/// assert_eq!(headers.get("CONTENT-TYPE"), Some("text/html"));
/// assert_eq!(headers.len(), 2);
///
/// let names: Vec<_> = headers.iter().map(|h| h.name()).collect();
/// assert_eq!(names, ["content-type", "X-Id"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<Header>,
}

impl Headers {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a header, returning the value it replaced (if any).
    pub fn insert<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) -> Option<String> {
        let name = name.into();
        let value = value.into();

        match self.position(&name) {
            Some(i) => {
                let field = &mut self.fields[i];
                field.name = name;
                Some(std::mem::replace(&mut field.value, value))
            }
            None => {
                self.fields.push(Header { name, value });
                None
            }
        }
    }

    /// Returns the value for `name`, ignoring ASCII case.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.fields[i].value.as_str())
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Removes the header, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name).map(|i| self.fields.remove(i).value)
    }

    /// Iterates in insertion order.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Header> {
        self.fields.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[inline]
    fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|h| h.name.eq_ignore_ascii_case(name))
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// STATUS_CODE

macro_rules! set_status_codes {
    ($(
        $name:ident = ($num:literal, $str:literal);
    )+) => {
        /// Well-known HTTP status codes
        ///
        /// A shortcut for [`Response::status`](crate::Response::status), which sets
        /// both the numeric code and the reason phrase. Codes missing from this
        /// list are still available through
        /// [`set_status_code`](crate::Response::set_status_code).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusCode { $(
            #[doc = concat!(stringify!($num), " ", $str)]
            $name = $num,
        )+ }

        impl StatusCode {
            /// Numeric value, e.g. `404`.
            #[inline]
            pub const fn as_u16(&self) -> u16 {
                *self as u16
            }

            /// Canonical reason phrase, e.g. `"Not Found"`.
            #[inline]
            pub const fn reason(&self) -> &'static str {
                match self { $(
                    StatusCode::$name => $str,
                )+ }
            }

            #[inline]
            pub const fn from_u16(code: u16) -> Option<Self> {
                match code { $(
                    $num => Some(StatusCode::$name),
                )+
                    _ => None,
                }
            }
        }
    }
}

set_status_codes! {
    Continue = (100, "Continue");
    SwitchingProtocols = (101, "Switching Protocols");

    Ok = (200, "OK");
    Created = (201, "Created");
    Accepted = (202, "Accepted");
    NoContent = (204, "No Content");

    MovedPermanently = (301, "Moved Permanently");
    Found = (302, "Found");
    SeeOther = (303, "See Other");
    NotModified = (304, "Not Modified");
    TemporaryRedirect = (307, "Temporary Redirect");
    PermanentRedirect = (308, "Permanent Redirect");

    BadRequest = (400, "Bad Request");
    Unauthorized = (401, "Unauthorized");
    Forbidden = (403, "Forbidden");
    NotFound = (404, "Not Found");
    MethodNotAllowed = (405, "Method Not Allowed");
    RequestTimeout = (408, "Request Timeout");
    Conflict = (409, "Conflict");
    Gone = (410, "Gone");
    LengthRequired = (411, "Length Required");
    PayloadTooLarge = (413, "Payload Too Large");
    UriTooLong = (414, "URI Too Long");
    UnsupportedMediaType = (415, "Unsupported Media Type");
    ImaTeapot = (418, "I'm a teapot");
    UnprocessableEntity = (422, "Unprocessable Entity");
    TooManyRequests = (429, "Too Many Requests");
    RequestHeaderFieldsTooLarge = (431, "Request Header Fields Too Large");

    InternalServerError = (500, "Internal Server Error");
    NotImplemented = (501, "Not Implemented");
    BadGateway = (502, "Bad Gateway");
    ServiceUnavailable = (503, "Service Unavailable");
    GatewayTimeout = (504, "Gateway Timeout");
    HttpVersionNotSupported = (505, "HTTP Version Not Supported");
}

#[cfg(test)]
mod headers_tests {
    use super::*;

    #[test]
    fn last_value_wins() {
        let mut headers = Headers::new();

        assert_eq!(headers.insert("Multi", "value1"), None);
        assert_eq!(headers.insert("Other", "x"), None);
        assert_eq!(headers.insert("MULTI", "value2"), Some("value1".to_string()));

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("multi"), Some("value2"));

        let fields: Vec<_> = headers.iter().map(|h| (h.name(), h.value())).collect();
        assert_eq!(fields, [("MULTI", "value2"), ("Other", "x")]);
    }

    #[test]
    fn case_insensitive_lookup() {
        let mut headers = Headers::new();
        headers.insert("Custom-Header", "abc");

        for name in ["Custom-Header", "custom-header", "CUSTOM-HEADER", "cUsToM-hEaDeR"] {
            assert_eq!(headers.get(name), Some("abc"));
            assert!(headers.contains(name));
        }

        assert_eq!(headers.get("Custom"), None);
        assert_eq!(headers.get(""), None);
    }

    #[test]
    fn remove() {
        let mut headers = Headers::new();
        headers.insert("A", "1");
        headers.insert("B", "2");

        assert_eq!(headers.remove("a"), Some("1".to_string()));
        assert_eq!(headers.remove("a"), None);
        assert_eq!(headers.len(), 1);
        assert!(!headers.is_empty());

        assert_eq!(headers.remove("B"), Some("2".to_string()));
        assert!(headers.is_empty());
    }
}
