//! Natural ordering of strings with embedded numbers.
//!
//! Rolled log files carry a date and a sequence counter in their names, so a
//! plain byte comparison would put `trace_26.01.01_00.00.00.10.log` before
//! `trace_26.01.01_00.00.00.9.log`. Comparing digit runs by numeric value keeps
//! the file list in creation order.

use std::cmp::Ordering;

/// Compare two strings, treating runs of ASCII digits as numbers.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let start_a = i;
            let start_b = j;
            while i < a.len() && a[i].is_ascii_digit() {
                i += 1;
            }
            while j < b.len() && b[j].is_ascii_digit() {
                j += 1;
            }
            let ordering = compare_digit_runs(&a[start_a..i], &b[start_b..j]);
            if ordering != Ordering::Equal {
                return ordering;
            }
        } else {
            let ordering = a[i].cmp(&b[j]);
            if ordering != Ordering::Equal {
                return ordering;
            }
            i += 1;
            j += 1;
        }
    }

    (a.len() - i).cmp(&(b.len() - j))
}

fn compare_digit_runs(a: &[u8], b: &[u8]) -> Ordering {
    let a_trimmed = trim_leading_zeros(a);
    let b_trimmed = trim_leading_zeros(b);
    a_trimmed
        .len()
        .cmp(&b_trimmed.len())
        .then_with(|| a_trimmed.cmp(b_trimmed))
        // "007" sorts after "7" so distinct strings never compare equal
        .then_with(|| a.len().cmp(&b.len()))
}

fn trim_leading_zeros(digits: &[u8]) -> &[u8] {
    let first = digits
        .iter()
        .position(|&d| d != b'0')
        .unwrap_or(digits.len());
    &digits[first..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_runs() {
        assert_eq!(natural_cmp("file_9.log", "file_10.log"), Ordering::Less);
        assert_eq!(natural_cmp("file_10.log", "file_9.log"), Ordering::Greater);
        assert_eq!(natural_cmp("file_10.log", "file_10.log"), Ordering::Equal);
    }

    #[test]
    fn test_dated_names() {
        let mut names = vec![
            "trace_26.01.01_00.00.00.10.log",
            "trace_26.01.01_00.00.00.9.log",
            "trace_25.12.31_23.59.59.0.log",
            "trace_26.01.01_00.00.00.0.log",
        ];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(
            names,
            vec![
                "trace_25.12.31_23.59.59.0.log",
                "trace_26.01.01_00.00.00.0.log",
                "trace_26.01.01_00.00.00.9.log",
                "trace_26.01.01_00.00.00.10.log",
            ]
        );
    }

    #[test]
    fn test_prefix_and_text() {
        assert_eq!(natural_cmp("abc", "abd"), Ordering::Less);
        assert_eq!(natural_cmp("abc", "abc1"), Ordering::Less);
        assert_eq!(natural_cmp("", "a"), Ordering::Less);
    }

    #[test]
    fn test_leading_zeros() {
        assert_eq!(natural_cmp("a07", "a7"), Ordering::Greater);
        assert_eq!(natural_cmp("a007", "a8"), Ordering::Less);
    }
}
