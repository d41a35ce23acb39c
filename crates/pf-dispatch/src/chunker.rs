//! Batch Chunker
//!
//! Splits an ordered recipient list into gateway-sized batches.

use std::num::NonZeroUsize;

/// Split `tokens` into ordered batches of at most `batch_size` entries.
///
/// Concatenating the result reproduces the input exactly. Every batch except
/// possibly the last has exactly `batch_size` entries; an empty input yields
/// no batches.
pub fn chunk(tokens: &[String], batch_size: NonZeroUsize) -> Vec<Vec<String>> {
    tokens
        .chunks(batch_size.get())
        .map(|c| c.to_vec())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("token-{}", i)).collect()
    }

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_uneven_split_has_short_tail() {
        let batches = chunk(&tokens(320), size(150));

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 150);
        assert_eq!(batches[1].len(), 150);
        assert_eq!(batches[2].len(), 20);
    }

    #[test]
    fn test_concatenation_reproduces_input() {
        let input = tokens(320);
        let batches = chunk(&input, size(150));

        let rejoined: Vec<String> = batches.into_iter().flatten().collect();
        assert_eq!(rejoined, input);
    }

    #[test]
    fn test_exact_multiple_has_no_tail() {
        let batches = chunk(&tokens(300), size(150));

        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 150));
    }

    #[test]
    fn test_input_smaller_than_batch_size() {
        let batches = chunk(&tokens(7), size(150));

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 7);
    }

    #[test]
    fn test_empty_input_yields_no_batches() {
        let batches = chunk(&[], size(150));
        assert!(batches.is_empty());
    }

    #[test]
    fn test_batch_size_one() {
        let batches = chunk(&tokens(3), size(1));

        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|b| b.len() == 1));
    }
}
