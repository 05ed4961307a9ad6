//! Reading-order comparison
//!
//! Positions are compared step by step; ids are ignored. Ranges order by
//! their absolute start, then their end.

use std::cmp::Ordering;

use super::parser::parse;
use super::types::{Cfi, CfiPath, CfiStep};

fn cmp_step(a: &CfiStep, b: &CfiStep) -> Ordering {
    match (a.index(), b.index()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}

pub fn cmp_paths(a: &CfiPath, b: &CfiPath) -> Ordering {
    a.steps
        .iter()
        .zip(&b.steps)
        .map(|(x, y)| cmp_step(x, y))
        .find(|ord| ord.is_ne())
        .unwrap_or_else(|| a.steps.len().cmp(&b.steps.len()))
        .then_with(|| a.offset.cmp(&b.offset))
}

pub fn cmp_reading_order(a: &Cfi, b: &Cfi) -> Ordering {
    cmp_paths(&a.start(), &b.start()).then_with(|| cmp_paths(&a.end(), &b.end()))
}

pub fn is_before(a: &Cfi, b: &Cfi) -> bool {
    cmp_reading_order(a, b).is_lt()
}

/// Whether `cfi` starts inside `[range.start(), range.end()]`
pub fn is_in_range(cfi: &Cfi, range: &Cfi) -> bool {
    let position = cfi.start();
    cmp_paths(&position, &range.start()).is_ge() && cmp_paths(&position, &range.end()).is_le()
}

/// Compare two CFI strings; `None` if either fails to parse
pub fn compare_cfi_strings(a: &str, b: &str) -> Option<Ordering> {
    Some(cmp_reading_order(&parse(a).ok()?, &parse(b).ok()?))
}

/// Stable sort by the CFI each item carries. Unparseable CFIs go last, in
/// their original relative order.
pub fn sort_by_reading_order<T, F>(items: &mut [T], cfi_of: F)
where
    F: Fn(&T) -> Option<&str>,
{
    items.sort_by_cached_key(|item| ReadingKey(cfi_of(item).and_then(|s| parse(s).ok())));
}

struct ReadingKey(Option<Cfi>);

impl PartialEq for ReadingKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for ReadingKey {}

impl PartialOrd for ReadingKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReadingKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => cmp_reading_order(a, b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfi(s: &str) -> Cfi {
        parse(s).unwrap()
    }

    #[test]
    fn test_same_text_node() {
        assert!(is_before(&cfi("epubcfi(/6/4!/4/2/1:10)"), &cfi("epubcfi(/6/4!/4/2/1:20)")));
    }

    #[test]
    fn test_across_sections() {
        assert!(is_before(&cfi("epubcfi(/6/4!/4/80/1:900)"), &cfi("epubcfi(/6/6!/4/2/1:0)")));
    }

    #[test]
    fn test_ranges_order_by_absolute_start() {
        // Parent paths alone would order these the other way round
        let deep = cfi("epubcfi(/6/2!/4/2/6,/1:0,/1:4)");
        let shallow = cfi("epubcfi(/6/2!/4,/2/4/1:0,/6/1:3)");
        assert!(is_before(&shallow, &deep));
    }

    #[test]
    fn test_in_range() {
        let range = cfi("epubcfi(/6/2!/4/2,/1:5,/3:2)");
        assert!(is_in_range(&cfi("epubcfi(/6/2!/4/2/1:9)"), &range));
        assert!(!is_in_range(&cfi("epubcfi(/6/2!/4/2/3:7)"), &range));
    }

    #[test]
    fn test_compare_strings() {
        assert_eq!(
            compare_cfi_strings("epubcfi(/6/2!/4/1:0)", "epubcfi(/6/2!/4/1:0)"),
            Some(Ordering::Equal)
        );
        assert_eq!(compare_cfi_strings("junk", "epubcfi(/6/2!/4)"), None);
    }

    #[test]
    fn test_sort_puts_unparseable_last() {
        let mut items = vec![
            ("c", "epubcfi(/6/4!/4/2/1:0)"),
            ("x", "not a cfi"),
            ("a", "epubcfi(/6/2!/4/2/1:0)"),
            ("b", "epubcfi(/6/2!/4/2/1:7)"),
        ];
        sort_by_reading_order(&mut items, |(_, c)| Some(*c));
        let order: Vec<&str> = items.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec!["a", "b", "c", "x"]);
    }
}
