/*
 * Responsibility
 * - リクエストからトークン候補を取り出す (Authorization ヘッダ → クエリパラメータの順)
 * - ここでは検証しない (文字列マッチのみ)
 *
 * Notes
 * - Authorization ヘッダが付いていればクエリは見ない (スキーム不一致でもフォールバックしない)
 */
use axum::http::{header, request::Parts};

/// Where the token candidate was found. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Header,
    Query,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedToken {
    pub value: String,
    pub source: TokenSource,
}

/// Extract the token candidate from the request.
///
/// - `header_scheme = None` disables the header lookup
/// - `query_param = None` disables the query lookup
/// - With the header lookup enabled, a present `Authorization` header decides alone:
///   no match means no candidate, the query parameter is not consulted
/// - Empty query values count as "no token"
pub fn extract(
    parts: &Parts,
    header_scheme: Option<&str>,
    query_param: Option<&str>,
) -> Option<ExtractedToken> {
    if let Some(scheme) = header_scheme {
        if let Some(value) = parts.headers.get(header::AUTHORIZATION) {
            // 非 ASCII のバイト列もヘッダ「あり」として扱う
            let value = String::from_utf8_lossy(value.as_bytes());
            return from_authorization(&value, scheme).map(|token| ExtractedToken {
                value: token.to_string(),
                source: TokenSource::Header,
            });
        }
    }

    let name = query_param?;
    from_query(parts.uri.query(), name).map(|value| ExtractedToken {
        value,
        source: TokenSource::Query,
    })
}

/// Match `^\s*<scheme>\s+(.+)` case-insensitively and return the capture.
///
/// The scheme is compared literally. Like the backtracking regex, `\s+` gives back
/// one whitespace character when nothing else follows, so `"Bearer   "` captures `" "`.
pub fn from_authorization<'a>(value: &'a str, scheme: &str) -> Option<&'a str> {
    let rest = value.trim_start();

    let head = rest.get(..scheme.len())?;
    if !head.eq_ignore_ascii_case(scheme) {
        return None;
    }

    let after = &rest[scheme.len()..];
    let first = after.chars().next().filter(|c| c.is_whitespace())?;
    let tail = &after[first.len_utf8()..];

    let token = tail.trim_start();
    if !token.is_empty() {
        return Some(token);
    }

    // only whitespace left: `(.+)` takes the last character
    let (idx, _) = tail.char_indices().last()?;
    Some(&tail[idx..])
}

/// Read `name` from a raw query string. When repeated, the last occurrence wins.
pub fn from_query(query: Option<&str>, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .filter(|(k, _)| k == name)
        .last()
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}
