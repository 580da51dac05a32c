//! services/api/src/web/locale.rs
//!
//! Edge-geography language detection: map the coarse country code supplied by
//! the edge network to a two-value language choice, remembered in a cookie.
//! An explicit user preference cookie always wins and is never overwritten.

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use serde::Serialize;
use tarot_core::domain::Language;

const COUNTRY_HEADER: &str = "x-vercel-ip-country";
const DETECTED_COOKIE: &str = "detected-language";
const PREFERRED_COOKIE: &str = "preferred-language";
const CHINESE_REGIONS: [&str; 5] = ["CN", "TW", "HK", "MO", "SG"];
const COOKIE_MAX_AGE_SECS: u64 = 31_536_000;

/// Maps a country code to the served language. Unknown or absent codes
/// default to English.
pub fn language_for_country(country: &str) -> Language {
    if CHINESE_REGIONS.contains(&country) {
        Language::Zh
    } else {
        Language::En
    }
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}

/// Resolution order: explicit preference cookie, then a prior detection
/// cookie, then the geography header. Returns the language and whether a
/// fresh detection cookie should be set.
pub fn resolve(headers: &HeaderMap) -> (Language, &'static str, bool) {
    if let Some(language) = cookie_value(headers, PREFERRED_COOKIE).and_then(Language::parse) {
        return (language, "preference", false);
    }
    if let Some(language) = cookie_value(headers, DETECTED_COOKIE).and_then(Language::parse) {
        return (language, "cookie", false);
    }
    let country = headers
        .get(COUNTRY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("US");
    (language_for_country(country), "geolocation", true)
}

#[derive(Serialize)]
pub struct DetectLanguageResponse {
    language: &'static str,
    country: String,
    source: &'static str,
}

/// GET handler returning the resolved language, setting the detection cookie
/// only when resolution actually fell through to geography.
pub async fn detect_language_handler(headers: HeaderMap) -> impl IntoResponse {
    let country = headers
        .get(COUNTRY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("US")
        .to_string();
    let (language, source, set_cookie) = resolve(&headers);

    let body = Json(DetectLanguageResponse {
        language: language.as_str(),
        country,
        source,
    });
    let mut response_headers = HeaderMap::new();
    if set_cookie {
        let cookie = format!(
            "{DETECTED_COOKIE}={}; Path=/; Max-Age={COOKIE_MAX_AGE_SECS}; SameSite=Lax",
            language.as_str()
        );
        if let Ok(value) = cookie.parse() {
            response_headers.insert(header::SET_COOKIE, value);
        }
    }
    (StatusCode::OK, response_headers, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                value.parse().unwrap(),
            );
        }
        map
    }

    #[test]
    fn chinese_regions_map_to_zh_and_others_to_en() {
        for region in CHINESE_REGIONS {
            assert_eq!(language_for_country(region), Language::Zh);
        }
        assert_eq!(language_for_country("US"), Language::En);
        assert_eq!(language_for_country("FR"), Language::En);
        assert_eq!(language_for_country(""), Language::En);
    }

    #[test]
    fn geolocation_is_used_when_no_cookies_exist() {
        let (language, source, set_cookie) = resolve(&headers(&[(COUNTRY_HEADER, "TW")]));
        assert_eq!(language, Language::Zh);
        assert_eq!(source, "geolocation");
        assert!(set_cookie);
    }

    #[test]
    fn missing_country_defaults_to_english() {
        let (language, _, set_cookie) = resolve(&headers(&[]));
        assert_eq!(language, Language::En);
        assert!(set_cookie);
    }

    #[test]
    fn detection_cookie_short_circuits_geography() {
        let (language, source, set_cookie) = resolve(&headers(&[
            ("cookie", "detected-language=en"),
            (COUNTRY_HEADER, "CN"),
        ]));
        assert_eq!(language, Language::En);
        assert_eq!(source, "cookie");
        assert!(!set_cookie);
    }

    #[test]
    fn preference_cookie_beats_everything_and_is_never_replaced() {
        let (language, source, set_cookie) = resolve(&headers(&[
            ("cookie", "detected-language=en; preferred-language=zh"),
            (COUNTRY_HEADER, "US"),
        ]));
        assert_eq!(language, Language::Zh);
        assert_eq!(source, "preference");
        assert!(!set_cookie);
    }

    #[test]
    fn malformed_cookie_values_fall_through() {
        let (language, source, _) = resolve(&headers(&[
            ("cookie", "preferred-language=klingon"),
            (COUNTRY_HEADER, "HK"),
        ]));
        assert_eq!(language, Language::Zh);
        assert_eq!(source, "geolocation");
    }
}
