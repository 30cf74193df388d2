//! Recovery of the router's non-compliant session cookie.
//!
//! The router names its session cookie `<something>/sessid`. A `/` is not
//! allowed in a cookie name, so strict parsers drop the cookie entirely.
//! We patch the raw `Set-Cookie` value to a compliant name, parse it, and
//! restore the original name afterwards.

use cookie::Cookie;

use crate::SessidCookie;

/// Suffix of the session cookie's name, as sent by the router.
pub const SESSID_COOKIE_SUFFIX: &str = "/sessid";

/// Compliant stand-in used only while parsing.
const PATCHED_SESSID_COOKIE_SUFFIX: &str = "_sessid";

/// Finds the session cookie among raw `Set-Cookie` header values.
///
/// Only the first header mentioning `/sessid` is patched. The first parsed
/// cookie whose name ends with the patched suffix wins; its name is handed
/// back with the original `/sessid` suffix. Unparseable headers are
/// skipped.
pub fn find_sessid_cookie<S: AsRef<str>>(set_cookies: &[S]) -> Option<SessidCookie> {
    let mut patched = false;

    for raw in set_cookies {
        let raw = raw.as_ref();
        let raw = if !patched && raw.contains(SESSID_COOKIE_SUFFIX) {
            patched = true;
            raw.replacen(SESSID_COOKIE_SUFFIX, PATCHED_SESSID_COOKIE_SUFFIX, 1)
        } else {
            raw.to_owned()
        };

        let Ok(cookie) = Cookie::parse(raw) else {
            continue;
        };

        if cookie.name().ends_with(PATCHED_SESSID_COOKIE_SUFFIX) {
            return Some(SessidCookie {
                name: cookie.name().replacen(
                    PATCHED_SESSID_COOKIE_SUFFIX,
                    SESSID_COOKIE_SUFFIX,
                    1,
                ),
                value: cookie.value().to_owned(),
            });
        }
    }

    None
}
