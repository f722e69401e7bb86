use super::types::Chunk;

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub sentence_aware: bool,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            sentence_aware: true,
        }
    }
}

pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }

        let pieces = if self.config.sentence_aware {
            let sentences = break_oversized(
                segment_sentences(text),
                self.config.chunk_size,
                self.config.chunk_overlap,
            );
            pack_sentences(&sentences, self.config.chunk_size, self.config.chunk_overlap)
        } else {
            window_chars(text, self.config.chunk_size, self.config.chunk_overlap)
        };

        pieces
            .into_iter()
            .enumerate()
            .map(|(chunk_index, content)| Chunk {
                content,
                chunk_index,
            })
            .collect()
    }
}

/// Cuts `text` into sentence-sized segments. A segment ends after `.`, `?`
/// or `!` followed by a space, or at a paragraph break.
fn segment_sentences(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let boundary = match c {
            '.' | '?' | '!' => chars.peek() == Some(&' '),
            '\n' => {
                if chars.peek() == Some(&'\n') {
                    current.push('\n');
                    chars.next();
                    true
                } else {
                    false
                }
            }
            _ => false,
        };
        if boundary && !current.trim().is_empty() {
            segments.push(std::mem::take(&mut current));
        }
    }

    if !current.trim().is_empty() {
        segments.push(current);
    }
    segments
}

/// Packing assumes every piece fits in a chunk. Text with no sentence
/// terminator for longer than `chunk_size` (tables, dumped logs) is cut by
/// character windows first.
fn break_oversized(sentences: Vec<String>, chunk_size: usize, overlap: usize) -> Vec<String> {
    sentences
        .into_iter()
        .flat_map(|s| {
            if s.chars().count() > chunk_size {
                window_chars(&s, chunk_size, overlap)
            } else {
                vec![s]
            }
        })
        .collect()
}

/// Greedily packs sentences into chunks up to `chunk_size` characters,
/// carrying up to `chunk_overlap` trailing characters of whole sentences
/// into the next chunk.
fn pack_sentences(sentences: &[String], chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut window_start = 0;

    for (idx, sentence) in sentences.iter().enumerate() {
        if !current.is_empty() && current.len() + sentence.len() > chunk_size {
            chunks.push(std::mem::take(&mut current));

            // Walk back from the boundary collecting whole sentences that
            // fit in the overlap budget.
            let mut carried = 0;
            let mut overlap_start = idx;
            for i in (window_start..idx).rev() {
                if carried + sentences[i].len() > chunk_overlap {
                    break;
                }
                carried += sentences[i].len();
                overlap_start = i;
            }
            for s in &sentences[overlap_start..idx] {
                current.push_str(s);
            }
            window_start = overlap_start;
        }
        current.push_str(sentence);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Fixed-size character windows advancing by `chunk_size - overlap`.
fn window_chars(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        start += step;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_chunks() {
        let splitter = TextSplitter::new(SplitterConfig::default());
        assert!(splitter.split("").is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        let splitter = TextSplitter::new(SplitterConfig::default());
        let chunks = splitter.split("Hello world.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].content, "Hello world.");
    }

    #[test]
    fn sentence_aware_splits_long_text() {
        let splitter = TextSplitter::new(SplitterConfig {
            chunk_size: 20,
            chunk_overlap: 5,
            sentence_aware: true,
        });
        let chunks = splitter.split("First sentence. Second sentence. Third sentence.");
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
        }
    }

    #[test]
    fn char_windows_overlap() {
        let splitter = TextSplitter::new(SplitterConfig {
            chunk_size: 10,
            chunk_overlap: 3,
            sentence_aware: false,
        });
        let chunks = splitter.split("abcdefghijklmnopqrstuvwxyz");
        assert!(chunks.len() > 1);
        assert_eq!(&chunks[0].content[7..10], &chunks[1].content[..3]);
    }

    #[test]
    fn paragraph_breaks_start_new_segments() {
        let segments = segment_sentences("First paragraph.\n\nSecond paragraph.");
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn question_and_exclamation_end_segments() {
        assert_eq!(segment_sentences("Really? Yes it is.").len(), 2);
        assert_eq!(segment_sentences("Wow! Amazing.").len(), 2);
    }

    #[test]
    fn trailing_text_without_terminator_kept() {
        let segments = segment_sentences("Hello world");
        assert_eq!(segments, vec!["Hello world".to_owned()]);
    }

    #[test]
    fn terminator_free_text_is_windowed() {
        let splitter = TextSplitter::new(SplitterConfig {
            chunk_size: 20,
            chunk_overlap: 4,
            sentence_aware: true,
        });
        let text = "x".repeat(95);
        let chunks = splitter.split(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 20);
        }
    }

    #[test]
    fn char_windows_without_overlap_partition() {
        assert_eq!(window_chars("abcdefghij", 5, 0), vec!["abcde", "fghij"]);
    }

    #[test]
    fn full_overlap_still_advances() {
        let chunks = window_chars("abcde", 3, 3);
        assert!(!chunks.is_empty());
        assert_eq!(chunks[0], "abc");
    }

    #[test]
    fn overlap_carries_previous_sentences() {
        let splitter = TextSplitter::new(SplitterConfig {
            chunk_size: 30,
            chunk_overlap: 15,
            sentence_aware: true,
        });
        let chunks = splitter.split("One two three. Four five six. Seven eight nine. Ten.");
        assert!(chunks.len() > 1);
        // The second chunk should repeat a sentence from the first.
        assert!(chunks[1].content.contains("Seven") || chunks[1].content.contains("six"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(500))]

            #[test]
            fn split_never_panics(
                text in "\\PC{0,3000}",
                chunk_size in 1usize..1500,
                chunk_overlap in 0usize..400,
                sentence_aware in proptest::bool::ANY,
            ) {
                let splitter = TextSplitter::new(SplitterConfig {
                    chunk_size,
                    chunk_overlap,
                    sentence_aware,
                });
                let _ = splitter.split(&text);
            }

            #[test]
            fn windows_cover_all_characters(
                text in "[a-z ]{10,400}",
                chunk_size in 10usize..150,
            ) {
                let splitter = TextSplitter::new(SplitterConfig {
                    chunk_size,
                    chunk_overlap: 0,
                    sentence_aware: false,
                });
                let chunks = splitter.split(&text);
                let total: usize = chunks.iter().map(|c| c.content.len()).sum();
                prop_assert!(total >= text.len());
            }

            #[test]
            fn indices_are_sequential(
                text in "[a-z. ]{10,800}",
                chunk_size in 5usize..80,
                sentence_aware in proptest::bool::ANY,
            ) {
                let splitter = TextSplitter::new(SplitterConfig {
                    chunk_size,
                    chunk_overlap: 0,
                    sentence_aware,
                });
                for (i, chunk) in splitter.split(&text).iter().enumerate() {
                    prop_assert_eq!(chunk.chunk_index, i);
                }
            }

            #[test]
            fn sentence_chunks_respect_size(
                text in "[a-z !?.]{1,600}",
                chunk_size in 5usize..100,
            ) {
                let splitter = TextSplitter::new(SplitterConfig {
                    chunk_size,
                    chunk_overlap: 0,
                    sentence_aware: true,
                });
                for chunk in splitter.split(&text) {
                    prop_assert!(chunk.content.chars().count() <= chunk_size);
                }
            }

            #[test]
            fn no_chunk_is_empty(
                text in "[a-z. !?]{1,400}",
                chunk_size in 1usize..150,
                sentence_aware in proptest::bool::ANY,
            ) {
                let splitter = TextSplitter::new(SplitterConfig {
                    chunk_size,
                    chunk_overlap: 0,
                    sentence_aware,
                });
                for chunk in splitter.split(&text) {
                    prop_assert!(!chunk.content.is_empty());
                }
            }
        }
    }
}
