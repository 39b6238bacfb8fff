//! `Content-Disposition` filename encoding

/// Encode a display name for `filename*=UTF-8''<value>`.
///
/// Double quotes are dropped and anything outside printable ASCII becomes
/// `_` before percent-encoding. `(`, `)`, `'` and `*` are always escaped;
/// `!` is left as is.
pub fn encode_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .filter(|c| *c != '"')
        .map(|c| if (' '..='~').contains(&c) { c } else { '_' })
        .collect();

    urlencoding::encode(&sanitized).replace("%21", "!")
}

pub fn content_disposition(name: &str) -> String {
    format!("attachment; filename*=UTF-8''{}", encode_filename(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_reserved_characters() {
        assert_eq!(
            encode_filename("Report (Final)*.pdf"),
            "Report%20%28Final%29%2A.pdf"
        );
        assert_eq!(encode_filename("it's \"done\"!.txt"), "it%27s%20done!.txt");
    }

    #[test]
    fn non_ascii_becomes_underscore() {
        assert_eq!(encode_filename("résumé.doc"), "r_sum_.doc");
        assert_eq!(
            content_disposition("a b.zip"),
            "attachment; filename*=UTF-8''a%20b.zip"
        );
    }
}
