//! Flow-position generation
//!
//! Builds range CFIs from a spine index plus the content-document
//! steps of a text node, as produced by the section walker.

use super::types::{Cfi, CfiPath, CfiStep, SPINE_STEP};

/// CFI index of the `position`-th child element (0-based)
pub fn element_step(position: usize) -> u32 {
    ((position + 1) * 2) as u32
}

/// CFI index of a text run preceded by `preceding_elements` sibling elements
pub fn text_step(preceding_elements: usize) -> u32 {
    (preceding_elements * 2 + 1) as u32
}

/// Fluent construction of a single path
#[derive(Debug, Clone, Default)]
pub struct CfiBuilder {
    path: CfiPath,
}

impl CfiBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `/6/N!` prefix addressing one spine item
    pub fn spine_item(mut self, spine_index: usize) -> Self {
        self.path.steps.push(CfiStep::child(SPINE_STEP));
        self.path.steps.push(CfiStep::child(element_step(spine_index)));
        self.path.steps.push(CfiStep::Indirection);
        self
    }

    pub fn steps(mut self, indices: &[u32]) -> Self {
        self.path
            .steps
            .extend(indices.iter().map(|&index| CfiStep::child(index)));
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.path.offset = Some(offset as u32);
        self
    }

    pub fn into_path(self) -> CfiPath {
        self.path
    }
}

/// Range between two text positions of one section.
///
/// The shared step prefix becomes the parent path. Each local path keeps at
/// least its final step, so a range inside one text node reads
/// `parent,/N:a,/N:b`.
pub fn flow_range(
    spine_index: usize,
    start_steps: &[u32],
    start_offset: usize,
    end_steps: &[u32],
    end_offset: usize,
) -> Cfi {
    let shared = start_steps
        .iter()
        .zip(end_steps)
        .take_while(|(a, b)| a == b)
        .count()
        .min(start_steps.len().saturating_sub(1))
        .min(end_steps.len().saturating_sub(1));

    let parent = CfiBuilder::new()
        .spine_item(spine_index)
        .steps(&start_steps[..shared])
        .into_path();
    let start = CfiBuilder::new()
        .steps(&start_steps[shared..])
        .offset(start_offset)
        .into_path();
    let end = CfiBuilder::new()
        .steps(&end_steps[shared..])
        .offset(end_offset)
        .into_path();

    Cfi::range(parent, start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_numbering() {
        assert_eq!(element_step(0), 2);
        assert_eq!(element_step(3), 8);
        assert_eq!(text_step(0), 1);
        assert_eq!(text_step(2), 5);
    }

    #[test]
    fn test_range_within_one_text_node() {
        let cfi = flow_range(0, &[4, 2, 1], 3, &[4, 2, 1], 9);
        assert_eq!(cfi.to_string(), "epubcfi(/6/2!/4/2,/1:3,/1:9)");
    }

    #[test]
    fn test_range_across_elements() {
        let cfi = flow_range(2, &[4, 2, 1], 10, &[4, 4, 2, 1], 5);
        assert_eq!(cfi.to_string(), "epubcfi(/6/6!/4,/2/1:10,/4/2/1:5)");
        let start = CfiBuilder::new().spine_item(2).steps(&[4, 2, 1]).offset(10).into_path();
        assert_eq!(cfi.start(), start);
        assert_eq!(cfi.spine_index(), Some(2));
    }
}
