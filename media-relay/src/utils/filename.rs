//! Filename sanitization for artifact paths.
//!
//! Submitter labels and media titles end up as directory and file names, so
//! anything that is invalid on common filesystems is replaced.

/// Characters rejected by at least one of the filesystems we care about.
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replace invalid characters with `_`, collapsing runs, and trim dots/spaces.
///
/// Returns `"unnamed"` when nothing usable is left.
///
/// ```
/// use media_relay::utils::filename::sanitize_filename;
///
/// assert_eq!(sanitize_filename("cats?dogs"), "cats_dogs");
/// assert_eq!(sanitize_filename(""), "unnamed");
/// ```
pub fn sanitize_filename(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_replaced = false;

    for c in input.chars() {
        if c.is_control() || INVALID_CHARS.contains(&c) {
            if !last_replaced {
                out.push('_');
                last_replaced = true;
            }
        } else {
            out.push(c);
            last_replaced = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '.');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Directory name used to keep one submitter's artifacts apart from another's.
///
/// Prefers the label (e.g. a username), falls back to the numeric id.
pub fn owner_dir_name(owner_id: Option<i64>, owner_label: Option<&str>) -> Option<String> {
    match (owner_label.map(str::trim), owner_id) {
        (Some(label), _) if !label.is_empty() => Some(sanitize_filename(label)),
        (_, Some(id)) => Some(format!("user_{id}")),
        _ => None,
    }
}
