//! Human-readable, filesystem-safe base names.

/// Characters replaced by an ASCII spelling rather than dropped.
const TRANSLITERATIONS: &[(char, &str)] = &[
    ('ä', "ae"),
    ('ö', "oe"),
    ('ü', "ue"),
    ('Ä', "Ae"),
    ('Ö', "Oe"),
    ('Ü', "Ue"),
    ('ß', "ss"),
    ('à', "a"),
    ('á', "a"),
    ('â', "a"),
    ('ã', "a"),
    ('å', "a"),
    ('À', "A"),
    ('Á', "A"),
    ('Â', "A"),
    ('ç', "c"),
    ('Ç', "C"),
    ('è', "e"),
    ('é', "e"),
    ('ê', "e"),
    ('ë', "e"),
    ('È', "E"),
    ('É', "E"),
    ('ì', "i"),
    ('í', "i"),
    ('î', "i"),
    ('ï', "i"),
    ('ñ', "n"),
    ('Ñ', "N"),
    ('ò', "o"),
    ('ó', "o"),
    ('ô', "o"),
    ('õ', "o"),
    ('ø', "o"),
    ('Ø', "O"),
    ('ù', "u"),
    ('ú', "u"),
    ('û', "u"),
    ('ý', "y"),
    ('ÿ', "y"),
    ('æ', "ae"),
    ('Æ', "Ae"),
    ('œ', "oe"),
    ('Œ', "Oe"),
    ('&', "and"),
    ('–', "-"),
    ('—', "-"),
    ('‘', "'"),
    ('’', "'"),
    ('“', ""),
    ('”', ""),
    (':', " -"),
    ('/', "-"),
    ('\\', "-"),
    ('|', "-"),
];

/// Dropped outright: reserved on common filesystems or shells.
const STRIPPED: &[char] = &['<', '>', '"', '?', '*', '\0'];

/// Linux NAME_MAX, in bytes.
pub const NAME_MAX: usize = 255;

/// Transliterate, strip unsafe characters, collapse whitespace, and trim
/// leading/trailing dots and spaces. Truncates to `max_bytes` on a char
/// boundary. May return an empty string.
pub fn sanitize_base_name(raw: &str, max_bytes: usize) -> String {
    let mut mapped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if let Some((_, rep)) = TRANSLITERATIONS.iter().find(|(from, _)| *from == c) {
            mapped.push_str(rep);
        } else if STRIPPED.contains(&c) || c.is_control() {
            mapped.push(' ');
        } else {
            mapped.push(c);
        }
    }

    let collapsed = mapped.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(edge_char);

    let mut take = trimmed.len().min(max_bytes);
    while take > 0 && !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    // Truncation can expose a new trailing dot or separator.
    trimmed[..take].trim_end_matches(edge_char).to_string()
}

fn edge_char(c: char) -> bool {
    c == '.' || c == ' ' || c == '-'
}
