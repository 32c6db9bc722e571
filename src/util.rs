/// Masks a secret string for log output.
///
/// Keeps the first and last `keep` characters when the string is long
/// enough, otherwise falls back to first/last single characters, and for
/// one- or two-character strings renders a fixed mask token. Empty input
/// renders an explicit "unset" marker so a missing secret is visible in
/// logs rather than silently blank.
pub fn mask_secret(s: &str, keep: usize) -> String {
    if s.is_empty() {
        return "(unset)".to_string();
    }

    let chars: Vec<char> = s.chars().collect();
    let n = chars.len();

    if keep > 0 && n > keep * 2 {
        let head: String = chars[..keep].iter().collect();
        let tail: String = chars[n - keep..].iter().collect();
        format!("{head}...{tail}")
    } else if n > 2 {
        format!("{}...{}", chars[0], chars[n - 1])
    } else {
        "***".to_string()
    }
}
