use reqwest::Url;

/// Parse "true"/"false"/"1"/"0"/"on"/"off" from a &str.
pub fn parse_bool_str(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Returns true for localhost, loopback IPv4/IPv6, and 0.0.0.0 URLs.
pub fn is_local_endpoint_url(url: &str) -> bool {
    let parsed = match Url::parse(url.trim()) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };

    match parsed.host_str() {
        Some(host) => {
            let normalized = host.trim().to_ascii_lowercase();
            normalized == "localhost"
                || normalized == "[::1]"
                || normalized == "::1"
                || normalized == "0.0.0.0"
                || normalized.starts_with("127.")
        }
        None => false,
    }
}

/// Byte offset of the `chars`-th character of `text`, clamped to its length.
pub fn char_boundary(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_helpers() {
        assert_eq!(parse_bool_str("true"), Some(true));
        assert_eq!(parse_bool_str("0"), Some(false));
        assert_eq!(parse_bool_str("YES"), Some(true));
        assert_eq!(parse_bool_str(" off "), Some(false));
        assert_eq!(parse_bool_str("maybe"), None);
    }

    #[test]
    fn test_is_local_endpoint_url_normalizes_case_and_space() {
        assert!(is_local_endpoint_url(" HTTP://LOCALHOST:8000/v1beta "));
        assert!(is_local_endpoint_url("https://127.0.0.1/v1beta"));
        assert!(is_local_endpoint_url("https://0.0.0.0/v1beta"));
        assert!(!is_local_endpoint_url("https://evil-localhost.com/v1beta"));
        assert!(!is_local_endpoint_url(
            "https://generativelanguage.googleapis.com/v1beta"
        ));
    }

    #[test]
    fn test_char_boundary_handles_multibyte_text() {
        let text = "héllo";
        assert_eq!(char_boundary(text, 0), 0);
        assert_eq!(char_boundary(text, 2), 3);
        assert_eq!(&text[..char_boundary(text, 2)], "hé");
        assert_eq!(char_boundary(text, 99), text.len());
    }
}
