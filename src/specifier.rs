//! Module specifier helpers.
//!
//! A specifier is either a local path relative to the app root written as
//! `./dir/file.ext`, or an absolute `http(s)://` URL. The module server
//! exposes remote specifiers under `/-/<host>/<path>`.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

/// Bytes escaped in a URL path; `/` stays literal.
const PATH_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Extensions handled by the script transform.
pub const SCRIPT_EXTS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs", "mts"];

/// Returns true for `http://` and `https://` specifiers.
pub fn is_remote(specifier: &str) -> bool {
    specifier.starts_with("https://") || specifier.starts_with("http://")
}

/// Normalize a slash separated path: collapse `.`/`..`/empty segments and
/// return it with a single leading slash and no trailing slash.
pub fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Drop the query string (and fragment) from a specifier.
pub fn strip_query(specifier: &str) -> &str {
    let end = specifier.find(['?', '#']).unwrap_or(specifier.len());
    &specifier[..end]
}

/// Key under which the dependency graph stores a specifier.
///
/// Remote modules keep their query (it selects a different build upstream),
/// local modules never do.
pub fn graph_key(specifier: &str) -> &str {
    if is_remote(specifier) {
        specifier
    } else {
        strip_query(specifier)
    }
}

/// Extension of the last path segment, without the dot.
pub fn extension(path: &str) -> Option<&str> {
    let path = strip_query(path);
    let basename = path.rsplit('/').next().unwrap_or(path);
    match basename.rfind('.') {
        Some(idx) if idx > 0 => Some(&basename[idx + 1..]),
        _ => None,
    }
}

/// Strip the extension from a file name (`page.tsx` → `page`).
pub fn trim_extension(basename: &str) -> &str {
    match basename.rfind('.') {
        Some(idx) if idx > 0 => &basename[..idx],
        _ => basename,
    }
}

pub fn is_script(path: &str) -> bool {
    extension(path).is_some_and(|ext| SCRIPT_EXTS.contains(&ext))
}

/// Map a remote URL onto the module server's `/-/` namespace.
///
/// `https://esm.sh/react@18?dev` becomes `/-/esm.sh/react@18?dev`; plain
/// http origins are tagged with `http_` and explicit ports with `_<port>`.
/// Local specifiers are returned as their URL path.
pub fn to_local_path(specifier: &str) -> String {
    if !is_remote(specifier) {
        return url_path(specifier);
    }
    let Ok(url) = Url::parse(specifier) else {
        return url_path(specifier);
    };
    let mut out = String::from("/-/");
    if url.scheme() == "http" {
        out.push_str("http_");
    }
    out.push_str(url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        out.push('_');
        out.push_str(&port.to_string());
    }
    out.push_str(url.path().trim_end_matches('/'));
    if let Some(query) = url.query() {
        out.push('?');
        out.push_str(query);
    }
    out
}

/// Percent-encode a URL path (`/routes/about us.tsx` → `/routes/about%20us.tsx`).
pub fn encode_path(path: &str) -> String {
    utf8_percent_encode(path, PATH_SET).to_string()
}

/// Percent-decode a URL path; invalid UTF-8 is replaced.
pub fn decode_path(path: &str) -> String {
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}

/// Inverse of [`to_local_path`] for the raw path component of a request.
///
/// Local paths are percent-decoded; remote ones are kept as sent since the
/// upstream URL owns its encoding.
pub fn from_request_path(path: &str) -> String {
    let Some(rest) = path.strip_prefix("/-/") else {
        return format!(".{}", clean_path(&decode_path(path)));
    };
    let (host, tail) = rest.split_once('/').unwrap_or((rest, ""));
    let (scheme, host) = match host.strip_prefix("http_") {
        Some(h) => ("http", h),
        None => ("https", host),
    };
    let host = match host.rsplit_once('_') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) && !port.is_empty() => {
            format!("{name}:{port}")
        }
        _ => host.to_string(),
    };
    format!("{scheme}://{host}/{tail}")
}

/// URL path of a local specifier (`./routes/a.tsx` → `/routes/a.tsx`).
pub fn url_path(specifier: &str) -> String {
    let trimmed = specifier.strip_prefix('.').unwrap_or(specifier);
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
