//! Char-offset helpers over UTF-8 strings.

use unicode_segmentation::UnicodeSegmentation;

/// Byte index of the `offset`-th char, clamped to the end of the string.
pub fn byte_offset(s: &str, offset: usize) -> usize {
    s.char_indices()
        .nth(offset)
        .map(|(ix, _)| ix)
        .unwrap_or(s.len())
}

pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

pub fn slice_chars(s: &str, start: usize, end: usize) -> &str {
    let start = byte_offset(s, start);
    let end = byte_offset(s, end).max(start);
    &s[start..end]
}

pub fn insert_chars(s: &mut String, offset: usize, text: &str) {
    let ix = byte_offset(s, offset);
    s.insert_str(ix, text);
}

/// Removes `count` chars starting at `offset` and returns them.
pub fn remove_chars(s: &mut String, offset: usize, count: usize) -> String {
    let start = byte_offset(s, offset);
    let end = byte_offset(s, offset + count);
    s.drain(start..end).collect()
}

/// Char offset of the grapheme boundary before `offset`.
pub fn grapheme_before(s: &str, offset: usize) -> usize {
    let head = &s[..byte_offset(s, offset)];
    head.grapheme_indices(true)
        .next_back()
        .map_or(0, |(ix, _)| char_len(&head[..ix]))
}

/// Char offset of the grapheme boundary after `offset`.
pub fn grapheme_after(s: &str, offset: usize) -> usize {
    let ix = byte_offset(s, offset);
    let step = s[ix..].graphemes(true).next().map_or(0, char_len);
    char_len(&s[..ix]) + step
}

/// Char offset of the start of the word ending at or before `offset`.
/// Punctuation and whitespace between the caret and the word are skipped too.
pub fn word_start_before(s: &str, offset: usize) -> usize {
    let end = byte_offset(s, offset);
    s.unicode_word_indices()
        .take_while(|(ix, _)| *ix < end)
        .last()
        .map_or(0, |(ix, _)| char_len(&s[..ix]))
}

/// Char offset of the end of the word starting at or after `offset`.
pub fn word_end_after(s: &str, offset: usize) -> usize {
    let start = byte_offset(s, offset);
    s.unicode_word_indices()
        .map(|(ix, word)| ix + word.len())
        .find(|end| *end > start)
        .map_or(char_len(s), |end| char_len(&s[..end]))
}
