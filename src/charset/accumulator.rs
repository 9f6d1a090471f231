use super::{push_merged, CodePointSet, Range};

/// Mutable builder for a [`CodePointSet`]. Ranges are kept canonical on every insert, so reading
/// the result is a copy.
#[derive(Debug, Clone, Default)]
pub struct CodePointSetAccumulator {
    ranges: Vec<Range>,
}

impl CodePointSetAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_code_point(&mut self, c: u32) {
        self.add_range(Range::single(c));
    }

    pub fn add_range(&mut self, r: Range) {
        // First range that could touch `r`, then everything that does gets folded into it.
        let start = self
            .ranges
            .partition_point(|x| x.hi.saturating_add(1) < r.lo);
        let mut end = start;
        let mut merged = r;
        while end < self.ranges.len() && self.ranges[end].lo <= r.hi.saturating_add(1) {
            merged.lo = merged.lo.min(self.ranges[end].lo);
            merged.hi = merged.hi.max(self.ranges[end].hi);
            end += 1;
        }
        self.ranges.splice(start..end, std::iter::once(merged));
    }

    pub fn add_set(&mut self, set: &CodePointSet) {
        if self.ranges.is_empty() {
            self.ranges.extend_from_slice(set.ranges());
            return;
        }
        let merged = self.to_code_point_set().union(set);
        self.ranges = merged.ranges;
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    pub fn copy_from(&mut self, set: &CodePointSet) {
        self.ranges.clear();
        self.ranges.extend_from_slice(set.ranges());
    }

    pub fn invert(&mut self, full: Range) {
        self.ranges = self.to_code_point_set().invert(full).ranges;
    }

    pub fn intersect_with(&mut self, set: &CodePointSet) {
        self.ranges = self.to_code_point_set().intersect(set).ranges;
    }

    pub fn subtract(&mut self, set: &CodePointSet) {
        self.ranges = self.to_code_point_set().subtract(set).ranges;
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn contains(&self, c: u32) -> bool {
        let i = self.ranges.partition_point(|x| x.hi < c);
        self.ranges.get(i).map_or(false, |r| r.contains(c))
    }

    pub fn matches_single_char(&self) -> bool {
        matches!(self.ranges.as_slice(), [r] if r.lo == r.hi)
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn to_code_point_set(&self) -> CodePointSet {
        CodePointSet::from_canonical(self.ranges.clone())
    }

    /// Appends ranges known to be above everything already present.
    pub(crate) fn append_ascending(&mut self, r: Range) {
        push_merged(&mut self.ranges, r);
    }
}

/// Reusable scratch accumulators for one parse. Taking one hands out a cleared accumulator;
/// giving it back keeps its allocation for the next character class.
#[derive(Debug, Default)]
pub struct AccumulatorPool {
    free: Vec<CodePointSetAccumulator>,
}

impl AccumulatorPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&mut self) -> CodePointSetAccumulator {
        self.free.pop().unwrap_or_default()
    }

    pub fn give_back(&mut self, mut acc: CodePointSetAccumulator) {
        acc.clear();
        self.free.push(acc);
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_merges_neighbours() {
        let mut acc = CodePointSetAccumulator::new();
        acc.add_range(Range::new(10, 20));
        acc.add_range(Range::new(30, 40));
        acc.add_code_point(21);
        assert_eq!(acc.ranges(), &[Range::new(10, 21), Range::new(30, 40)]);
        acc.add_range(Range::new(22, 29));
        assert_eq!(acc.ranges(), &[Range::new(10, 40)]);
        acc.add_code_point(5);
        assert_eq!(acc.ranges(), &[Range::new(5, 5), Range::new(10, 40)]);
    }

    #[test]
    fn invert_and_single_char() {
        let mut acc = CodePointSetAccumulator::new();
        acc.add_range(Range::new(0, 0x7E));
        acc.invert(Range::new(0, 0x7F));
        assert!(acc.matches_single_char());
        assert!(acc.contains(0x7F));
        assert!(!acc.contains(0x7E));
    }

    #[test]
    fn intersect_and_subtract() {
        let mut acc = CodePointSetAccumulator::new();
        acc.add_range(Range::new('a' as u32, 'z' as u32));
        acc.intersect_with(&CodePointSet::from_range('m' as u32, 0x7F));
        acc.subtract(&CodePointSet::from_code_point('q' as u32));
        assert_eq!(
            acc.to_code_point_set(),
            CodePointSet::from_ranges([
                Range::new('m' as u32, 'p' as u32),
                Range::new('r' as u32, 'z' as u32)
            ])
        );
    }

    #[test]
    fn pool_reuses_cleared() {
        let mut pool = AccumulatorPool::new();
        let mut acc = pool.take();
        acc.add_code_point(1);
        pool.give_back(acc);
        assert_eq!(pool.available(), 1);
        let acc = pool.take();
        assert!(acc.is_empty());
    }
}
