//! Delimiter detection for delimited text.
//!
//! This is a heuristic. Each candidate is counted on every sampled line (outside
//! double quotes); the candidate that appears the same non-zero number of times on
//! the most lines wins, with the larger per-line count breaking ties and then the
//! candidate order. When no candidate is consistent on a majority of lines the
//! fallback delimiter is returned, so detection never fails.

use std::collections::HashMap;

pub const DEFAULT_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];
pub const DEFAULT_SAMPLE_LINES: usize = 20;
pub const DEFAULT_FALLBACK: u8 = b',';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sniffed {
    pub delimiter: u8,
    /// False when the fallback was used.
    pub detected: bool,
}

#[derive(Debug, Clone)]
pub struct Sniffer {
    candidates: Vec<u8>,
    sample_lines: usize,
    fallback: u8,
}

impl Default for Sniffer {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_CANDIDATES.to_vec(),
            sample_lines: DEFAULT_SAMPLE_LINES,
            fallback: DEFAULT_FALLBACK,
        }
    }
}

impl Sniffer {
    pub fn new(candidates: Vec<u8>, sample_lines: usize, fallback: u8) -> Self {
        Self {
            candidates,
            sample_lines: sample_lines.max(1),
            fallback,
        }
    }

    pub fn sniff(&self, text: &str) -> Sniffed {
        let lines: Vec<&str> = text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .take(self.sample_lines)
            .collect();

        let mut best: Option<(usize, usize, u8)> = None;
        for &candidate in &self.candidates {
            let counts: Vec<usize> = lines
                .iter()
                .map(|line| count_unquoted(line, candidate))
                .collect();
            let Some((mode, agreeing)) = mode_of_nonzero(&counts) else {
                continue;
            };
            if agreeing * 2 <= lines.len() && agreeing != lines.len() {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_agree, best_mode, _)) => {
                    (agreeing, mode) > (best_agree, best_mode)
                }
            };
            if better {
                best = Some((agreeing, mode, candidate));
            }
        }

        match best {
            Some((_, _, delimiter)) => Sniffed {
                delimiter,
                detected: true,
            },
            None => Sniffed {
                delimiter: self.fallback,
                detected: false,
            },
        }
    }
}

/// Occurrences of `delimiter` outside double-quoted sections.
fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for &b in line.as_bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
        } else if b == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

/// Most frequent non-zero count and how many lines have it. Larger count wins ties.
fn mode_of_nonzero(counts: &[usize]) -> Option<(usize, usize)> {
    let mut freq: HashMap<usize, usize> = HashMap::new();
    for &c in counts.iter().filter(|&&c| c > 0) {
        *freq.entry(c).or_default() += 1;
    }
    freq.into_iter()
        .max_by_key(|&(count, lines)| (lines, count))
        .map(|(count, lines)| (count, lines))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_comma() {
        let s = Sniffer::default().sniff("id,name\n1,x\n2,y\n");
        assert_eq!(s, Sniffed { delimiter: b',', detected: true });
    }

    #[test]
    fn detects_semicolon_with_decimal_commas() {
        let text = "id;amount\n1;10,5\n2;3,25\n";
        assert_eq!(Sniffer::default().sniff(text).delimiter, b';');
    }

    #[test]
    fn detects_tab() {
        let text = "a\tb\tc\n1\t2\t3\n";
        assert_eq!(Sniffer::default().sniff(text).delimiter, b'\t');
    }

    #[test]
    fn ignores_delimiters_inside_quotes() {
        let text = "name;city\n\"Smith, J\";Rosario\n\"Doe, A\";Salta\n";
        assert_eq!(Sniffer::default().sniff(text).delimiter, b';');
    }

    #[test]
    fn single_column_falls_back() {
        let s = Sniffer::default().sniff("header\nvalue1\nvalue2\n");
        assert_eq!(s, Sniffed { delimiter: b',', detected: false });
    }

    #[test]
    fn empty_text_falls_back() {
        let s = Sniffer::new(vec![b';'], 5, b';').sniff("");
        assert_eq!(s, Sniffed { delimiter: b';', detected: false });
    }

    #[test]
    fn ragged_row_does_not_defeat_majority() {
        let text = "a,b,c\n1,2,3\n4,5\n6,7,8\n";
        assert_eq!(Sniffer::default().sniff(text).delimiter, b',');
    }

    #[test]
    fn sample_is_limited() {
        // Only the header line is sampled; it has no semicolons.
        let text = "a,b\n1;2;3\n4;5;6\n";
        let s = Sniffer::new(DEFAULT_CANDIDATES.to_vec(), 1, DEFAULT_FALLBACK).sniff(text);
        assert_eq!(s.delimiter, b',');
    }
}
