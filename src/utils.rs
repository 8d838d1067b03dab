/// Truncate `s` to at most `max` bytes on a char boundary, marking the cut.
pub fn clip(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = s[..end].to_string();
    out.push_str("… [truncated]");
    out
}

/// First line of `s`, clipped for one-line listings.
pub fn preview(s: &str, max: usize) -> String {
    clip(s.lines().next().unwrap_or_default().trim(), max)
}
