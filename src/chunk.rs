//! Fixed-width text chunker.
//!
//! Splits a file's content into [`Chunk`]s of at most `chunk_size`
//! characters (Unicode scalar values). Slicing is purely mechanical and may
//! cut through a function or a comment.
//!
//! # Guarantees
//!
//! - Indices are contiguous: `0, 1, 2, …, N-1`.
//! - Concatenating chunk contents in index order reproduces the file exactly.
//! - Every chunk but the last holds exactly `chunk_size` characters; an
//!   even split leaves no empty trailing chunk.
//! - An empty file yields no chunks.
//! - A [`FileChunks`] plan is lazy and can be iterated any number of times,
//!   each time from index 0.
//!
//! # Example
//!
//! ```rust
//! use std::num::NonZeroUsize;
//! use code_scribe::chunk::chunk_file;
//! use code_scribe::models::{LanguageLabel, SourceFile};
//!
//! let file = SourceFile::new("a.py", "abcdefghij");
//! let label = LanguageLabel::known("Python");
//! let plan = chunk_file(&file, &label, NonZeroUsize::new(4).unwrap());
//! let lengths: Vec<usize> = plan.iter().map(|c| c.content.len()).collect();
//! assert_eq!(lengths, vec![4, 4, 2]);
//! ```

use std::num::NonZeroUsize;

use crate::models::{Chunk, LanguageLabel, SourceFile};
use crate::organize::OrganizedCorpus;

pub const DEFAULT_CHUNK_SIZE: NonZeroUsize = match NonZeroUsize::new(4000) {
    Some(size) => size,
    None => panic!("default chunk size must be non-zero"),
};

/// A lazy chunk plan for one file.
#[derive(Debug, Clone, Copy)]
pub struct FileChunks<'a> {
    path: &'a str,
    language: &'a LanguageLabel,
    content: &'a str,
    chunk_size: NonZeroUsize,
}

impl<'a> FileChunks<'a> {
    /// Start (or restart) iteration at index 0.
    pub fn iter(&self) -> ChunkIter<'a> {
        ChunkIter {
            plan: *self,
            offset: 0,
            index: 0,
        }
    }
}

impl<'a> IntoIterator for FileChunks<'a> {
    type Item = Chunk;
    type IntoIter = ChunkIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &FileChunks<'a> {
    type Item = Chunk;
    type IntoIter = ChunkIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct ChunkIter<'a> {
    plan: FileChunks<'a>,
    /// Byte offset of the next chunk.
    offset: usize,
    index: usize,
}

impl Iterator for ChunkIter<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let content = self.plan.content;
        if self.offset >= content.len() {
            return None;
        }

        let rest = &content[self.offset..];
        let end = rest
            .char_indices()
            .nth(self.plan.chunk_size.get())
            .map(|(i, _)| self.offset + i)
            .unwrap_or(content.len());

        let chunk = Chunk {
            path: self.plan.path.to_string(),
            language: self.plan.language.clone(),
            content: content[self.offset..end].to_string(),
            sequence_index: self.index,
        };
        self.offset = end;
        self.index += 1;
        Some(chunk)
    }
}

/// Plan the chunks of one file.
pub fn chunk_file<'a>(
    file: &'a SourceFile,
    language: &'a LanguageLabel,
    chunk_size: NonZeroUsize,
) -> FileChunks<'a> {
    FileChunks {
        path: &file.path,
        language,
        content: &file.content,
        chunk_size,
    }
}

/// Chunk every file of the corpus, in group order then file order.
pub fn collect_chunks(corpus: &OrganizedCorpus, chunk_size: NonZeroUsize) -> Vec<Chunk> {
    corpus
        .groups()
        .flat_map(|(language, files)| {
            files
                .iter()
                .flat_map(move |file| chunk_file(file, language, chunk_size))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn label() -> LanguageLabel {
        LanguageLabel::known("Python")
    }

    fn reassemble(chunks: &[Chunk]) -> String {
        chunks.iter().map(|c| c.content.as_str()).collect()
    }

    #[test]
    fn test_uneven_split() {
        let file = SourceFile::new("a.py", "x".repeat(25));
        let label = label();
        let chunks: Vec<Chunk> = chunk_file(&file, &label, size(10)).iter().collect();

        let indices: Vec<usize> = chunks.iter().map(|c| c.sequence_index).collect();
        let lengths: Vec<usize> = chunks.iter().map(|c| c.content.len()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(lengths, vec![10, 10, 5]);
        assert!(chunks.iter().all(|c| c.path == "a.py" && c.language == label));
    }

    #[test]
    fn test_even_split_has_no_empty_tail() {
        let file = SourceFile::new("a.py", "y".repeat(20));
        let label = label();
        let chunks: Vec<Chunk> = chunk_file(&file, &label, size(10)).iter().collect();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| !c.content.is_empty()));
    }

    #[test]
    fn test_size_larger_than_file() {
        let file = SourceFile::new("a.py", "print('hi')\n");
        let label = label();
        let chunks: Vec<Chunk> = chunk_file(&file, &label, DEFAULT_CHUNK_SIZE).iter().collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, file.content);
        assert_eq!(chunks[0].sequence_index, 0);
    }

    #[test]
    fn test_empty_file() {
        let file = SourceFile::new("empty.py", "");
        let label = label();
        assert_eq!(chunk_file(&file, &label, size(10)).iter().count(), 0);
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let file = SourceFile::new("u.py", "héllo wörld ✓");
        let label = label();
        let chunks: Vec<Chunk> = chunk_file(&file, &label, size(3)).iter().collect();
        assert!(chunks.iter().all(|c| c.content.chars().count() <= 3));
        assert_eq!(chunks[0].content, "hél");
        assert_eq!(reassemble(&chunks), file.content);
    }

    #[test]
    fn test_plan_is_restartable() {
        let file = SourceFile::new("a.py", "abcdefghijk");
        let label = label();
        let plan = chunk_file(&file, &label, size(4));

        let mut first = plan.iter();
        first.next();
        first.next();

        let again: Vec<Chunk> = plan.iter().collect();
        assert_eq!(again[0].sequence_index, 0);
        assert_eq!(again[0].content, "abcd");
        assert_eq!(again.len(), 3);
    }

    #[test]
    fn test_collect_chunks_over_corpus() {
        let detector = crate::language::LanguageDetector::new();
        let corpus = crate::organize::organize_files(
            vec![
                SourceFile::new("a.py", "a".repeat(7)),
                SourceFile::new("main.go", "g".repeat(3)),
            ],
            &detector,
        );
        let chunks = collect_chunks(&corpus, size(5));
        assert_eq!(chunks.len(), 3);

        let py: Vec<&Chunk> = chunks.iter().filter(|c| c.path == "a.py").collect();
        assert_eq!(py.len(), 2);
        assert_eq!(py[1].sequence_index, 1);
    }

    proptest! {
        #[test]
        fn chunks_reassemble_to_original(content in any::<String>(), n in 1usize..64) {
            let file = SourceFile::new("p.rs", content.clone());
            let label = LanguageLabel::known("Rust");
            let chunks: Vec<Chunk> = chunk_file(&file, &label, size(n)).iter().collect();

            prop_assert_eq!(reassemble(&chunks), content);
            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.sequence_index, i);
                let len = chunk.content.chars().count();
                if i + 1 < chunks.len() {
                    prop_assert_eq!(len, n);
                } else {
                    prop_assert!(len >= 1 && len <= n);
                }
            }
        }
    }
}
