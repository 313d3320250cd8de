//! Connected-component labeling over binary masks
//!
//! 4-connectivity flood fill with an explicit stack; regions smaller than the
//! configured minimum area are ignored, matching the contour-area filter of
//! the metric definitions.

/// Summary of the labeled regions in one mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionSummary {
    /// Number of regions with area >= the minimum
    pub count: usize,
    /// Area in pixels of the largest qualifying region (0 when none)
    pub largest_area: usize,
}

/// Label connected regions of `true` pixels in a row-major mask
pub fn label_regions(mask: &[bool], width: usize, height: usize, min_area: usize) -> RegionSummary {
    debug_assert_eq!(mask.len(), width * height);

    let mut visited = vec![false; mask.len()];
    let mut stack: Vec<usize> = Vec::new();
    let mut count = 0usize;
    let mut largest_area = 0usize;

    for start in 0..mask.len() {
        if !mask[start] || visited[start] {
            continue;
        }

        let mut area = 0usize;
        visited[start] = true;
        stack.push(start);

        while let Some(idx) = stack.pop() {
            area += 1;
            let x = idx % width;
            let y = idx / width;

            let mut visit = |nx: usize, ny: usize| {
                let nidx = ny * width + nx;
                if mask[nidx] && !visited[nidx] {
                    visited[nidx] = true;
                    stack.push(nidx);
                }
            };

            if x > 0 {
                visit(x - 1, y);
            }
            if x + 1 < width {
                visit(x + 1, y);
            }
            if y > 0 {
                visit(x, y - 1);
            }
            if y + 1 < height {
                visit(x, y + 1);
            }
        }

        if area >= min_area {
            count += 1;
            largest_area = largest_area.max(area);
        }
    }

    RegionSummary {
        count,
        largest_area,
    }
}
