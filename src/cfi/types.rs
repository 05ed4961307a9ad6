//! Flow-position types
//!
//! A flow position is an EPUB CFI: a path of child steps from the package
//! document through the spine into one content document, ending on a text
//! node and a character offset. Ranges factor out the common parent path:
//!
//! ```text
//!   epubcfi(/6/4!/4/2,/1:8,/3:5)
//!           └─ parent ─┘ └start┘└end┘
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Step number of the spine element inside the package document
pub const SPINE_STEP: u32 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CfiStep {
    /// Child node by CFI index: even for elements, odd for text runs
    Child { index: u32, id: Option<String> },
    /// `!` - continue inside the referenced content document
    Indirection,
}

impl CfiStep {
    pub fn child(index: u32) -> Self {
        CfiStep::Child { index, id: None }
    }

    pub fn child_with_id(index: u32, id: impl Into<String>) -> Self {
        CfiStep::Child {
            index,
            id: Some(id.into()),
        }
    }

    pub fn index(&self) -> Option<u32> {
        match self {
            CfiStep::Child { index, .. } => Some(*index),
            CfiStep::Indirection => None,
        }
    }

    pub fn is_indirection(&self) -> bool {
        matches!(self, CfiStep::Indirection)
    }

    pub fn is_text(&self) -> bool {
        self.index().is_some_and(|i| i % 2 == 1)
    }
}

/// A run of steps with an optional terminal character offset
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CfiPath {
    pub steps: Vec<CfiStep>,
    pub offset: Option<u32>,
}

impl CfiPath {
    pub fn new(steps: Vec<CfiStep>, offset: Option<u32>) -> Self {
        Self { steps, offset }
    }

    /// Steps after the last indirection, i.e. inside the content document
    pub fn content_steps(&self) -> &[CfiStep] {
        match self.steps.iter().rposition(CfiStep::is_indirection) {
            Some(i) => &self.steps[i + 1..],
            None => &self.steps,
        }
    }

    /// Append a relative path; its offset replaces ours
    pub fn join(&self, relative: &CfiPath) -> CfiPath {
        let mut steps = self.steps.clone();
        steps.extend(relative.steps.iter().cloned());
        CfiPath {
            steps,
            offset: relative.offset,
        }
    }
}

/// Start and end paths, relative to the enclosing `Cfi::path`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CfiRange {
    pub start: CfiPath,
    pub end: CfiPath,
}

/// A point or range flow position
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cfi {
    /// Full path for points, common parent for ranges
    pub path: CfiPath,
    pub range: Option<CfiRange>,
}

impl Cfi {
    pub fn point(path: CfiPath) -> Self {
        Self { path, range: None }
    }

    pub fn range(parent: CfiPath, start: CfiPath, end: CfiPath) -> Self {
        Self {
            path: parent,
            range: Some(CfiRange { start, end }),
        }
    }

    pub fn is_range(&self) -> bool {
        self.range.is_some()
    }

    /// Absolute start position
    pub fn start(&self) -> CfiPath {
        match &self.range {
            Some(range) => self.path.join(&range.start),
            None => self.path.clone(),
        }
    }

    /// Absolute end position; equals `start()` for points
    pub fn end(&self) -> CfiPath {
        match &self.range {
            Some(range) => self.path.join(&range.end),
            None => self.path.clone(),
        }
    }

    /// 0-based spine index, read from the step before the first indirection
    pub fn spine_index(&self) -> Option<usize> {
        let steps = &self.path.steps;
        let indirection = steps.iter().position(CfiStep::is_indirection)?;
        if indirection < 2 || steps[indirection - 2].index() != Some(SPINE_STEP) {
            return None;
        }
        let item = steps[indirection - 1].index()?;
        if item == 0 || item % 2 == 1 {
            return None;
        }
        Some((item / 2 - 1) as usize)
    }
}

impl fmt::Display for CfiStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CfiStep::Child { index, id } => {
                write!(f, "/{}", index)?;
                if let Some(id) = id {
                    write!(f, "[{}]", escape(id))?;
                }
                Ok(())
            }
            CfiStep::Indirection => write!(f, "!"),
        }
    }
}

impl fmt::Display for CfiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            write!(f, "{}", step)?;
        }
        if let Some(offset) = self.offset {
            write!(f, ":{}", offset)?;
        }
        Ok(())
    }
}

impl fmt::Display for Cfi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epubcfi({}", self.path)?;
        if let Some(range) = &self.range {
            write!(f, ",{},{}", range.start, range.end)?;
        }
        write!(f, ")")
    }
}

/// Escape CFI special characters with `^`
fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '^' | '[' | ']' | '(' | ')' | ',' | ';' | '=') {
            escaped.push('^');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(indices: &[u32]) -> Vec<CfiStep> {
        indices.iter().map(|&i| CfiStep::child(i)).collect()
    }

    #[test]
    fn test_point_display() {
        let mut path_steps = steps(&[6, 4]);
        path_steps.push(CfiStep::Indirection);
        path_steps.extend(steps(&[4, 2, 1]));
        let cfi = Cfi::point(CfiPath::new(path_steps, Some(42)));
        assert_eq!(cfi.to_string(), "epubcfi(/6/4!/4/2/1:42)");
        assert_eq!(cfi.spine_index(), Some(1));
        assert_eq!(cfi.path.content_steps().len(), 3);
    }

    #[test]
    fn test_range_start_and_end() {
        let mut parent = steps(&[6, 2]);
        parent.push(CfiStep::Indirection);
        parent.extend(steps(&[4, 2]));
        let cfi = Cfi::range(
            CfiPath::new(parent, None),
            CfiPath::new(steps(&[1]), Some(8)),
            CfiPath::new(steps(&[3]), Some(5)),
        );

        assert_eq!(cfi.to_string(), "epubcfi(/6/2!/4/2,/1:8,/3:5)");
        assert_eq!(cfi.start().to_string(), "/6/2!/4/2/1:8");
        assert_eq!(cfi.end().to_string(), "/6/2!/4/2/3:5");
        assert_eq!(cfi.spine_index(), Some(0));
        assert!(cfi.start().steps.last().is_some_and(CfiStep::is_text));
    }

    #[test]
    fn test_id_assertion_is_escaped() {
        let step = CfiStep::child_with_id(4, "ch[1]");
        assert_eq!(step.to_string(), "/4[ch^[1^]]");
    }

    #[test]
    fn test_spine_index_requires_spine_prefix() {
        let cfi = Cfi::point(CfiPath::new(steps(&[4, 2]), None));
        assert_eq!(cfi.spine_index(), None);
    }
}
