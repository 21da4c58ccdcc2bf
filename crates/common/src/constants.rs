use http::header::HeaderName;

pub const HEADER_DATE: HeaderName = http::header::DATE;
pub const HEADER_X_SERVICE: HeaderName = HeaderName::from_static("x-service");
pub const HEADER_X_SIGNATURE: HeaderName = HeaderName::from_static("x-signature");

/// `strftime` layout of the `Date` header, second precision, always GMT.
pub const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Maximum age of a signed message before it is rejected as stale.
pub const MAX_MESSAGE_AGE_SECS: i64 = 30;
/// Maximum distance into the future a message timestamp may sit.
pub const MAX_CLOCK_SKEW_SECS: i64 = 1;
