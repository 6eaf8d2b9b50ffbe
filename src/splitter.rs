//!
//! A multi-character-separator text splitter with overlap handling.
//!
//! This is a direct port of `string_split` from `original_source/src/server.c`:
//! unlike `str::split`, a partial match against the separator that breaks
//! down rewinds so the first character of the failed match is re-examined as
//! a potential new start, and the end of the string acts as a virtual final
//! match so the trailing fragment is still emitted. Empty fragments are
//! dropped.
//!

/// Splits `input` on occurrences of `sep`, with overlap-aware rewinding.
///
/// # Examples
/// ```
/// use reseau_dht::splitter::split;
/// assert_eq!(split("A, B, C", ", "), vec!["A", "B", "C"]);
/// ```
pub fn split(input: &str, sep: &str) -> Vec<String> {
    if sep.is_empty() {
        return if input.is_empty() {
            vec![]
        } else {
            vec![input.to_string()]
        };
    }

    let chars: Vec<char> = input.chars().collect();
    let sep_chars: Vec<char> = sep.chars().collect();
    let n = chars.len() as isize;
    let m = sep_chars.len() as isize;

    let mut words = Vec::new();
    let mut i: isize = 0;
    let mut j: isize = 0;
    let mut word_len: isize = 0;

    loop {
        let is_end = i >= n;
        let cur = if is_end { None } else { Some(chars[i as usize]) };
        let sep_c = if j < m { Some(sep_chars[j as usize]) } else { None };

        let matches = matches!((cur, sep_c), (Some(c), Some(s)) if c == s);

        if !matches && !is_end {
            // The partial match broke. Rewind to right after where it started.
            i = i - j + 1;
            word_len += 1;
            j = 0;
        } else {
            // Either the separator matched this character, or we hit the
            // end of the string, which counts as a virtual final match.
            j += 1;
            let sep_done = j >= m;
            if sep_done || is_end {
                j -= 1;
                i -= j;
                i -= word_len;
                if is_end {
                    // What we thought was a partial separator match at the
                    // tail turns out to just be more word.
                    word_len += j;
                }
                if word_len > 0 {
                    let start = i as usize;
                    let end = (i + word_len) as usize;
                    words.push(chars[start..end].iter().collect());
                }
                if is_end {
                    break;
                }
                i += j;
                i += word_len;
                j = 0;
                word_len = 0;
            }
            i += 1;
        }
    }
    words
}
