pub use tower_cookies::{Cookie, Cookies};

use crate::auth::{SESSION_COOKIE_NAME, SESSION_DURATION};

/// The `__session` cookie carrying a freshly minted session credential
pub fn session_cookie(value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE_NAME, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(true);
    cookie.set_max_age(time::Duration::seconds(SESSION_DURATION.as_secs() as i64));
    cookie
}

/// A cookie that makes the browser drop `__session`.
///
/// Always sent, whether or not the request carried a session.
pub fn expired_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE_NAME, "");
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(true);
    cookie.set_max_age(time::Duration::ZERO);
    cookie.set_expires(time::OffsetDateTime::UNIX_EPOCH);
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let header = session_cookie("opaque".to_string()).to_string();

        assert!(header.starts_with("__session=opaque"));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("Secure"));
        assert!(header.contains("Path=/"));
        assert!(header.contains("Max-Age=432000"));
    }

    #[test]
    fn test_expired_session_cookie_attributes() {
        let header = expired_session_cookie().to_string();

        assert!(header.starts_with("__session=;"));
        assert!(header.contains("Path=/"));
        assert!(header.contains("Max-Age=0"));
    }
}
