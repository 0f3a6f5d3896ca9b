pub fn short_label(label: &str, max_chars: usize) -> String {
    if label.chars().count() <= max_chars {
        return label.to_owned();
    }
    let mut short = label
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    short.push('…');
    short
}

pub fn format_strength(strength: f64) -> String {
    if strength >= 100.0 {
        format!("{strength:.0}")
    } else {
        format!("{strength:.2}")
    }
}

/// Byte range of the first occurrence of `phrase` in `content`. Exact matches
/// win; otherwise ASCII case is ignored, which keeps byte offsets intact.
pub fn phrase_range(content: &str, phrase: &str) -> Option<(usize, usize)> {
    let phrase = phrase.trim();
    if phrase.is_empty() {
        return None;
    }
    if let Some(start) = content.find(phrase) {
        return Some((start, start + phrase.len()));
    }
    let needle = phrase.to_ascii_lowercase();
    content
        .to_ascii_lowercase()
        .find(&needle)
        .map(|start| (start, start + needle.len()))
}

/// First `lines` non-empty lines of `text`, each cut to `width` characters.
pub fn excerpt(text: &str, lines: usize, width: usize) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(lines)
        .map(|line| short_label(line, width))
        .collect()
}
