use crate::error::ChunkerConfigError;

/// Separators tried coarsest first; a unit that still exceeds the chunk
/// size after the last one is split at character boundaries.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

#[derive(Debug, Clone, Copy)]
pub struct SplitterConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters re-included from the end of the previous chunk.
    pub overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            overlap: 200,
        }
    }
}

/// Splits text into overlapping chunks along natural boundaries.
///
/// Text is first broken into units no longer than `chunk_size`, preferring
/// paragraph breaks over line breaks over sentence ends over spaces; units
/// are then merged greedily, and each chunk after the first re-includes the
/// trailing `overlap` characters of its predecessor, snapped back to the
/// nearest separator so the seam never lands mid-word.
///
/// Pure and deterministic; holds no state beyond its configuration.
#[derive(Debug, Clone, Copy)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl RecursiveSplitter {
    /// # Errors
    ///
    /// Rejects a zero `chunk_size` or an `overlap` that is not strictly
    /// smaller than `chunk_size`.
    pub fn new(config: SplitterConfig) -> Result<Self, ChunkerConfigError> {
        if config.chunk_size == 0 {
            return Err(ChunkerConfigError::ZeroChunkSize);
        }
        if config.overlap >= config.chunk_size {
            return Err(ChunkerConfigError::OverlapTooLarge {
                overlap: config.overlap,
                chunk_size: config.chunk_size,
            });
        }
        Ok(Self {
            chunk_size: config.chunk_size,
            overlap: config.overlap,
        })
    }

    #[must_use]
    pub fn split(&self, text: &str) -> Vec<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        if char_len(trimmed) <= self.chunk_size {
            return vec![trimmed.to_owned()];
        }
        let units = atomize(trimmed, &SEPARATORS, self.chunk_size);
        self.merge(&units)
    }

    /// Greedily pack units into chunks, seeding each new chunk with the
    /// overlap tail of the previous one. Every chunk consumes at least one
    /// new unit, so the loop always makes progress.
    fn merge(&self, units: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;
        let mut fresh = 0usize;

        for unit in units {
            let unit_len = char_len(unit);
            if fresh > 0 && current_len + unit_len > self.chunk_size {
                let emitted = current.trim().to_owned();
                let tail = self.overlap_tail(&emitted).to_owned();
                if !emitted.is_empty() {
                    chunks.push(emitted);
                }
                current = tail;
                current_len = char_len(&current);
                fresh = 0;
            }
            current.push_str(unit);
            current_len += unit_len;
            fresh += 1;
        }

        if fresh > 0 {
            let last = current.trim();
            if !last.is_empty() {
                chunks.push(last.to_owned());
            }
        }
        chunks
    }

    /// The suffix of `chunk` carried into the next chunk: at least
    /// `overlap` characters, extended backward to the separator boundary
    /// nearest the cut point. Falls back to an exact character cut only
    /// when the prefix contains no separator at all.
    fn overlap_tail<'a>(&self, chunk: &'a str) -> &'a str {
        if self.overlap == 0 {
            return "";
        }
        let total = char_len(chunk);
        if total <= self.overlap {
            return chunk;
        }
        let cut = byte_offset_at(chunk, total - self.overlap);

        let mut nearest: Option<usize> = None;
        for sep in SEPARATORS {
            if let Some(pos) = chunk[..cut].rfind(sep) {
                let end = pos + sep.len();
                if nearest.is_none_or(|n| end > n) {
                    nearest = Some(end);
                }
            }
        }
        match nearest {
            Some(end) => &chunk[end..],
            None => &chunk[cut..],
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset of the `chars`-th character (or the end of the string).
fn byte_offset_at(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map_or(s.len(), |(i, _)| i)
}

/// Break text into units no longer than `chunk_size`, recursing into finer
/// separators only for the pieces that are still too long.
fn atomize(text: &str, separators: &[&str], chunk_size: usize) -> Vec<String> {
    let Some((sep, finer)) = separators.split_first() else {
        return hard_split(text, chunk_size);
    };

    let mut units = Vec::new();
    for piece in split_keep_separator(text, sep) {
        if char_len(&piece) <= chunk_size {
            units.push(piece);
        } else {
            units.extend(atomize(&piece, finer, chunk_size));
        }
    }
    units
}

/// Split on `sep`, keeping the separator attached to the preceding piece so
/// concatenating the pieces reproduces the input.
fn split_keep_separator(text: &str, sep: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0;
    while let Some(found) = text[start..].find(sep) {
        let end = start + found + sep.len();
        pieces.push(text[start..end].to_owned());
        start = end;
    }
    if start < text.len() {
        pieces.push(text[start..].to_owned());
    }
    pieces
}

fn hard_split(text: &str, chunk_size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_size)
        .map(|c| c.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splitter(chunk_size: usize, overlap: usize) -> RecursiveSplitter {
        RecursiveSplitter::new(SplitterConfig {
            chunk_size,
            overlap,
        })
        .unwrap()
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk_size() {
        let err = RecursiveSplitter::new(SplitterConfig {
            chunk_size: 100,
            overlap: 100,
        })
        .unwrap_err();
        assert!(matches!(err, ChunkerConfigError::OverlapTooLarge { .. }));

        assert!(
            RecursiveSplitter::new(SplitterConfig {
                chunk_size: 100,
                overlap: 150,
            })
            .is_err()
        );
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let err = RecursiveSplitter::new(SplitterConfig {
            chunk_size: 0,
            overlap: 0,
        })
        .unwrap_err();
        assert!(matches!(err, ChunkerConfigError::ZeroChunkSize));
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let splitter = splitter(100, 20);
        assert!(splitter.split("").is_empty());
        assert!(splitter.split("   \n\n  ").is_empty());
    }

    #[test]
    fn short_input_yields_single_trimmed_chunk() {
        let splitter = splitter(100, 20);
        let chunks = splitter.split("  Mitochondria are the powerhouse of the cell.  ");
        assert_eq!(
            chunks,
            vec!["Mitochondria are the powerhouse of the cell."]
        );
    }

    #[test]
    fn input_exactly_chunk_size_is_one_chunk() {
        let splitter = splitter(10, 2);
        let chunks = splitter.split("abcdefghij");
        assert_eq!(chunks, vec!["abcdefghij"]);
    }

    #[test]
    fn splits_on_paragraph_breaks_first() {
        let splitter = splitter(30, 0);
        let chunks = splitter.split("First paragraph here.\n\nSecond paragraph here as well.");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "First paragraph here.");
        assert_eq!(chunks[1], "Second paragraph here as well.");
    }

    #[test]
    fn long_sentence_falls_back_to_spaces() {
        let splitter = splitter(20, 0);
        let chunks = splitter.split("one two three four five six seven eight nine ten");
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 20);
            assert!(!chunk.starts_with(' ') && !chunk.ends_with(' '));
        }
    }

    #[test]
    fn unbroken_run_is_cut_at_character_boundaries() {
        let splitter = splitter(30, 0);
        let text = "x".repeat(100);
        let chunks = splitter.split(&text);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].len(), 30);
        assert_eq!(chunks[3].len(), 10);
    }

    #[test]
    fn adjacent_chunks_share_overlap() {
        let splitter = splitter(40, 10);
        let text = "alpha beta gamma delta. epsilon zeta eta theta. iota kappa lambda mu. \
                    nu xi omicron pi. rho sigma tau upsilon.";
        let chunks = splitter.split(text);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            // the next chunk starts with a suffix of the previous one
            let head: String = pair[1].chars().take(5).collect();
            assert!(
                pair[0].contains(head.trim_end()),
                "no overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn overlap_snaps_to_separator_boundary() {
        // 21 sentences of 20 chars = 420 chars, a paragraph break, then
        // 578 more chars: 1000 total with the break ending at char 420.
        let sentence_a = format!("{}. ", "a".repeat(18));
        let sentence_b = format!("{}. ", "b".repeat(18));
        let para1 = sentence_a.repeat(21);
        let para2 = format!("{}{}. ", sentence_b.repeat(28), "b".repeat(16));
        assert_eq!(para1.chars().count(), 420);
        assert_eq!(para2.chars().count(), 578);
        let text = format!("{para1}\n\n{para2}");
        assert_eq!(text.chars().count(), 1000);

        let splitter = splitter(800, 200);
        let chunks = splitter.split(&text);
        assert_eq!(chunks.len(), 2);

        // the second chunk re-includes the tail of the first, starting at
        // or before char 220 (420 - 200, snapped outward to a separator)
        let first = &chunks[0];
        let first_len = first.chars().count();
        let shared = (0..=first_len)
            .rev()
            .find(|&n| {
                let suffix: String = first.chars().skip(first_len - n).collect();
                chunks[1].starts_with(&suffix)
            })
            .unwrap_or(0);
        assert!(shared >= 200, "overlap of {shared} chars is too small");
        assert!(first_len - shared <= 220, "seam starts after char 220");
        // never mid-word: the seam sits right after a separator
        assert!(chunks[1].starts_with('a'));
    }

    #[test]
    fn zero_overlap_chunks_do_not_repeat_content() {
        let splitter = splitter(25, 0);
        let text = "cell wall. cell membrane. cytoplasm. nucleus. ribosome. vacuole.";
        let chunks = splitter.split(text);
        assert!(chunks.len() > 1);
        let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
        assert_eq!(strip(&chunks.concat()), strip(text));
    }

    mod proptest_splitter {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(500))]

            #[test]
            fn split_never_panics(
                content in "\\PC{0,2000}",
                chunk_size in 1usize..500,
                overlap_seed in 0usize..500,
            ) {
                let overlap = overlap_seed % chunk_size;
                let splitter = RecursiveSplitter::new(SplitterConfig { chunk_size, overlap }).unwrap();
                let _ = splitter.split(&content);
            }

            #[test]
            fn short_inputs_yield_single_chunk(
                content in "[a-z .]{1,50}",
                chunk_size in 50usize..200,
            ) {
                let splitter = RecursiveSplitter::new(SplitterConfig { chunk_size, overlap: 10 }).unwrap();
                let chunks = splitter.split(&content);
                if content.trim().is_empty() {
                    prop_assert!(chunks.is_empty());
                } else {
                    prop_assert_eq!(chunks.len(), 1);
                    prop_assert_eq!(chunks[0].as_str(), content.trim());
                }
            }

            #[test]
            fn no_empty_chunks(
                content in "[a-z \\n.!?]{0,800}",
                chunk_size in 1usize..100,
            ) {
                let splitter = RecursiveSplitter::new(SplitterConfig { chunk_size, overlap: 0 }).unwrap();
                for chunk in splitter.split(&content) {
                    prop_assert!(!chunk.trim().is_empty());
                }
            }

            #[test]
            fn zero_overlap_respects_chunk_size(
                content in "[a-z ]{0,800}",
                chunk_size in 5usize..100,
            ) {
                let splitter = RecursiveSplitter::new(SplitterConfig { chunk_size, overlap: 0 }).unwrap();
                for chunk in splitter.split(&content) {
                    prop_assert!(chunk.chars().count() <= chunk_size);
                }
            }

            #[test]
            fn zero_overlap_preserves_content(
                content in "[a-z \\n.]{0,800}",
                chunk_size in 5usize..100,
            ) {
                let splitter = RecursiveSplitter::new(SplitterConfig { chunk_size, overlap: 0 }).unwrap();
                let chunks = splitter.split(&content);
                let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
                prop_assert_eq!(strip(&chunks.concat()), strip(&content));
            }
        }
    }
}
