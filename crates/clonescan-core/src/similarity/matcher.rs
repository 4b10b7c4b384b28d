//! Ratcliff/Obershelp sequence matching over character sequences.
//!
//! Finds the longest contiguous matching block, then recurses on the pieces
//! to its left and right.  The similarity ratio is `2 * M / T`, where `M` is
//! the number of matched elements and `T` the combined length of both
//! sequences.
//!
//! With `autojunk` enabled and a second sequence of at least
//! [`AUTOJUNK_MIN_LEN`] elements, elements occurring more than
//! `len / 100 + 1` times are "popular": they never seed a match, although a
//! match seeded elsewhere may still extend across them.  This keeps whitespace
//! and punctuation in source code from dominating the search.

use std::collections::HashMap;
use std::hash::Hash;

pub const AUTOJUNK_MIN_LEN: usize = 200;

/// A run of `size` equal elements at `a[a_start..]` and `b[b_start..]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct MatchBlock {
    pub a_start: usize,
    pub b_start: usize,
    pub size: usize,
}

/// Matcher holding the index of the second sequence.
pub struct SequenceMatcher<'a, T: Eq + Hash> {
    a: &'a [T],
    b: &'a [T],
    /// Positions of each non-popular element of `b`, ascending.
    b2j: HashMap<&'a T, Vec<usize>>,
    // Scratch rows for `find_longest_match`; entry `j + 1` holds the length
    // of the match ending at `b[j]`.  All zero between calls.
    j2len: Vec<usize>,
    new_j2len: Vec<usize>,
}

impl<'a, T: Eq + Hash> SequenceMatcher<'a, T> {
    pub fn new(a: &'a [T], b: &'a [T], autojunk: bool) -> Self {
        let mut b2j: HashMap<&'a T, Vec<usize>> = HashMap::new();
        for (j, elem) in b.iter().enumerate() {
            b2j.entry(elem).or_default().push(j);
        }

        let n = b.len();
        if autojunk && n >= AUTOJUNK_MIN_LEN {
            let ntest = n / 100 + 1;
            b2j.retain(|_, positions| positions.len() <= ntest);
        }

        Self {
            a,
            b,
            b2j,
            j2len: vec![0; n + 1],
            new_j2len: vec![0; n + 1],
        }
    }

    /// Longest matching block in `a[alo..ahi]` and `b[blo..bhi]`.
    ///
    /// Among equally long blocks the one starting earliest in `a` wins, then
    /// the one starting earliest in `b`.  A zero-sized block means no match.
    pub fn find_longest_match(&mut self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> MatchBlock {
        let (a, b) = (self.a, self.b);
        let mut best_i = alo;
        let mut best_j = blo;
        let mut best_size = 0usize;

        let mut touched: Vec<usize> = Vec::new();
        let mut new_touched: Vec<usize> = Vec::new();

        for i in alo..ahi {
            new_touched.clear();
            if let Some(positions) = self.b2j.get(&a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = self.j2len[j] + 1;
                    self.new_j2len[j + 1] = k;
                    new_touched.push(j + 1);
                    if k > best_size {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_size = k;
                    }
                }
            }
            for &idx in &touched {
                self.j2len[idx] = 0;
            }
            std::mem::swap(&mut self.j2len, &mut self.new_j2len);
            std::mem::swap(&mut touched, &mut new_touched);
        }
        for &idx in &touched {
            self.j2len[idx] = 0;
        }

        // Extend across popular elements on both sides.
        while best_i > alo && best_j > blo && a[best_i - 1] == b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_size += 1;
        }
        while best_i + best_size < ahi
            && best_j + best_size < bhi
            && a[best_i + best_size] == b[best_j + best_size]
        {
            best_size += 1;
        }

        MatchBlock {
            a_start: best_i,
            b_start: best_j,
            size: best_size,
        }
    }

    /// All non-overlapping matching blocks, ordered by position.
    pub fn matching_blocks(&mut self) -> Vec<MatchBlock> {
        let (la, lb) = (self.a.len(), self.b.len());
        let mut queue = vec![(0usize, la, 0usize, lb)];
        let mut blocks: Vec<MatchBlock> = Vec::new();

        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let m = self.find_longest_match(alo, ahi, blo, bhi);
            if m.size == 0 {
                continue;
            }
            if alo < m.a_start && blo < m.b_start {
                queue.push((alo, m.a_start, blo, m.b_start));
            }
            if m.a_start + m.size < ahi && m.b_start + m.size < bhi {
                queue.push((m.a_start + m.size, ahi, m.b_start + m.size, bhi));
            }
            blocks.push(m);
        }
        blocks.sort();

        // Collapse adjacent blocks.
        let mut collapsed: Vec<MatchBlock> = Vec::with_capacity(blocks.len());
        for block in blocks {
            if let Some(last) = collapsed.last_mut() {
                if last.a_start + last.size == block.a_start
                    && last.b_start + last.size == block.b_start
                {
                    last.size += block.size;
                    continue;
                }
            }
            collapsed.push(block);
        }
        collapsed
    }

    /// Total number of matched elements.
    pub fn matched_len(&mut self) -> usize {
        self.matching_blocks().iter().map(|m| m.size).sum()
    }

    /// `2 * M / T`; two empty sequences are identical.
    pub fn ratio(&mut self) -> f64 {
        let total = self.a.len() + self.b.len();
        if total == 0 {
            return 1.0;
        }
        2.0 * self.matched_len() as f64 / total as f64
    }
}

/// Ratio of two char sequences.
pub fn sequence_ratio(a: &[char], b: &[char], autojunk: bool) -> f64 {
    SequenceMatcher::new(a, b, autojunk).ratio()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn ratio(a: &str, b: &str) -> f64 {
        sequence_ratio(&chars(a), &chars(b), true)
    }

    #[test]
    fn test_known_ratios() {
        // difflib.SequenceMatcher(None, "abcd", "bcde").ratio() == 0.75
        assert!((ratio("abcd", "bcde") - 0.75).abs() < 1e-12);
        // difflib.SequenceMatcher(None, "abcdefg", "xbcdefx").ratio() == 10/14
        assert!((ratio("abcdefg", "xbcdefx") - 10.0 / 14.0).abs() < 1e-12);
        assert_eq!(ratio("abc", "xyz"), 0.0);
        assert_eq!(ratio("", ""), 1.0);
        assert_eq!(ratio("abc", ""), 0.0);
    }

    #[test]
    fn test_find_longest_match_prefers_earliest() {
        let a = chars(" abcd");
        let b = chars("abcd abcd");
        let mut m = SequenceMatcher::new(&a, &b, true);
        let best = m.find_longest_match(0, 5, 0, 9);
        assert_eq!(
            best,
            MatchBlock {
                a_start: 0,
                b_start: 4,
                size: 5
            }
        );
    }

    #[test]
    fn test_matching_blocks_are_collapsed_and_ordered() {
        let a = chars("abxcd");
        let b = chars("abcd");
        let mut m = SequenceMatcher::new(&a, &b, true);
        let blocks = m.matching_blocks();
        assert_eq!(
            blocks,
            vec![
                MatchBlock {
                    a_start: 0,
                    b_start: 0,
                    size: 2
                },
                MatchBlock {
                    a_start: 3,
                    b_start: 2,
                    size: 2
                },
            ]
        );
    }

    #[test]
    fn test_scratch_rows_are_reset_between_calls() {
        let a = chars("the quick brown fox");
        let b = chars("the quick brown fox");
        let mut m = SequenceMatcher::new(&a, &b, true);
        let first = m.ratio();
        let second = m.ratio();
        assert_eq!(first, 1.0);
        assert_eq!(first, second);
    }

    #[test]
    fn test_autojunk_popular_elements_do_not_seed_matches() {
        // 300 spaces in b make ' ' popular (300 > 300/100 + 1): only the 'z'
        // can seed, and it sits at the very end of b.
        let a = chars("z     ");
        let b = chars(&(" ".repeat(300) + "z"));
        let mut junked = SequenceMatcher::new(&a, &b, true);
        assert_eq!(junked.matched_len(), 1);
        let mut plain = SequenceMatcher::new(&a, &b, false);
        assert_eq!(plain.matched_len(), 5);
    }

    #[test]
    fn test_popular_elements_extend_seeded_matches() {
        // 'x' seeds the match; the surrounding popular spaces are absorbed.
        let a = chars("  x  ");
        let mut b_text = " ".repeat(250);
        b_text.insert_str(100, "  x  ");
        let b = chars(&b_text);
        let mut m = SequenceMatcher::new(&a, &b, true);
        assert_eq!(m.matched_len(), 5);
    }

    #[test]
    fn test_works_on_generic_tokens() {
        let a = ["fn", "main", "(", ")"];
        let b = ["fn", "helper", "(", ")"];
        let mut m = SequenceMatcher::new(&a, &b, false);
        assert_eq!(m.matched_len(), 3);
    }
}
