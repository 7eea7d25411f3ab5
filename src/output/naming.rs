//! Artifact file names: checking a caller's base name and enumerating
//! collision-free candidates for it.

/// Characters that would let a base name escape the bound directory or that no
/// host accepts in a single path component.
const RESERVED: [char; 3] = ['/', '\\', '\0'];

/// The stem to allocate names from, or `None` when `raw` is not a usable single
/// path component. Surrounding whitespace and a trailing `.{extension}` are
/// removed; everything else is kept as given.
pub fn stem(raw: &str, extension: &str) -> Option<String> {
    let trimmed = raw.trim();
    let suffix_start = trimmed.len().checked_sub(extension.len() + 1);
    let stem = match suffix_start {
        Some(start)
            if trimmed.is_char_boundary(start)
                && trimmed[start..].starts_with('.')
                && trimmed[start + 1..].eq_ignore_ascii_case(extension) =>
        {
            trimmed[..start].trim_end()
        }
        _ => trimmed,
    };

    if stem.is_empty() || stem == "." || stem == ".." || stem.contains(RESERVED) {
        return None;
    }
    Some(stem.to_string())
}

/// Candidate number `attempt`: `stem.ext`, then `stem_1.ext`, `stem_2.ext`, ...
pub fn candidate(stem: &str, extension: &str, attempt: u32) -> String {
    if attempt == 0 {
        format!("{stem}.{extension}")
    } else {
        format!("{stem}_{attempt}.{extension}")
    }
}
