//! Slug generation and title de-duplication.

/// Generate a URL-safe slug from a title.
///
/// Converts text to lowercase, replaces spaces and special characters with
/// hyphens, and removes consecutive/leading/trailing hyphens.
///
/// # Examples
///
/// ```
/// use bookizip::naming::slugify;
///
/// assert_eq!(slugify("Chapter One"), "chapter-one");
/// assert_eq!(slugify("Hello, World!"), "hello-world");
/// assert_eq!(slugify("  Multiple   Spaces  "), "multiple-spaces");
/// ```
pub fn slugify(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else if c.is_whitespace() || c == '-' || c == '_' {
                '-'
            } else {
                // Skip other characters
                '\0'
            }
        })
        .filter(|&c| c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Return `requested` if no document with that title exists, otherwise the
/// first free title of the form `"{requested} - {n}"` with n = 1, 2, 3…
///
/// Terminates because candidates are distinct for each n and the existence
/// check runs against a finite record set.
pub fn make_unique(requested: &str, mut exists: impl FnMut(&str) -> bool) -> String {
    if !exists(requested) {
        return requested.to_string();
    }
    let mut n: u64 = 1;
    loop {
        let candidate = format!("{requested} - {n}");
        if !exists(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
