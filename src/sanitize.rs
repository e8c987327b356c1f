/// Maps an instrument name to an identifier that is legal in the backend's
/// exposition format.
///
/// Every maximal run of characters outside `[A-Za-z0-9_]` collapses into a
/// single underscore, and a leading digit gets an underscore prefix since
/// series names must not start with one. Pure and idempotent; two distinct
/// inputs may sanitize to the same output (see the name-conflict handling
/// in the meter).
pub(crate) fn sanitize_metric_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 1);
    let mut in_run = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if out.is_empty() && c.is_ascii_digit() {
                out.push('_');
            }
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    out
}

/// Sanitizes an attribute key into a legal label name.
pub(crate) fn sanitize_label_key(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_name_sanitization() {
        let tests = vec![
            ("request.count#1", "request_count_1"),
            ("valid_name_23", "valid_name_23"),
            ("trailing.", "trailing_"),
            (".leading", "_leading"),
            ("a b\tc", "a_b_c"),
            // maximal runs collapse into one underscore
            ("a.#!b", "a_b"),
            ("€uro", "_uro"),
            // leading digits are prefixed
            ("1valid_23name", "_1valid_23name"),
            ("", ""),
        ];

        for (input, want) in tests {
            assert_eq!(want, sanitize_metric_name(input), "input: {input}");
        }
    }

    #[test]
    fn metric_name_sanitization_is_idempotent() {
        for input in ["request.count#1", "1valid", "a.#!b", "already_clean"] {
            let once = sanitize_metric_name(input);
            assert_eq!(once, sanitize_metric_name(&once));
        }
    }

    #[test]
    fn label_key_sanitization() {
        assert_eq!("http_method", sanitize_label_key("http.method"));
        assert_eq!("_0_key", sanitize_label_key("0.key"));
        assert_eq!("plain", sanitize_label_key("plain"));
    }
}
