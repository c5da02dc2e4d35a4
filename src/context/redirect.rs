//! Location resolution for redirects.
//!
//! A location without scheme or host is made absolute against the directory
//! of the current request path, dot segments are collapsed, a trailing slash
//! survives cleaning and the query string is carried over verbatim.

use std::fmt::Write;

/// Resolve `location` against `request_path` the way browsers expect it.
pub(crate) fn resolve_location(request_path: &str, location: &str) -> String {
    if location.starts_with("//") {
        return escape_non_ascii(location);
    }
    match url::Url::parse(location) {
        Ok(_) => return escape_non_ascii(location),
        Err(url::ParseError::RelativeUrlWithoutBase) => {}
        Err(_) => return escape_non_ascii(location),
    }

    let request_path = if request_path.is_empty() { "/" } else { request_path };
    let mut target = if location.starts_with('/') {
        location.to_string()
    } else {
        let dir_end = request_path.rfind('/').map_or(0, |i| i + 1);
        format!("{}{}", &request_path[..dir_end], location)
    };

    let query = match target.find('?') {
        Some(i) => target.split_off(i),
        None => String::new(),
    };

    let trailing = target.ends_with('/');
    let mut cleaned = clean_path(&target);
    if trailing && !cleaned.ends_with('/') {
        cleaned.push('/');
    }
    cleaned.push_str(&query);
    escape_non_ascii(&cleaned)
}

/// Lexically normalize a slash-separated path.
pub(crate) fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if rooted {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

fn escape_non_ascii(s: &str) -> String {
    if s.is_ascii() {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() * 3);
    for byte in s.bytes() {
        if byte.is_ascii() {
            out.push(byte as char);
        } else {
            let _ = write!(out, "%{:02X}", byte);
        }
    }
    out
}

pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
