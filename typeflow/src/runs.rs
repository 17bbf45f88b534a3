// Copyright 2024 the Typeflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact piecewise-constant maps over text indices.

/// A piecewise-constant map from `[0, limit)` to values of `T`, stored as
/// parallel value/limit vectors where `limits[i]` is the exclusive end of
/// run `i`.
///
/// Limits are strictly increasing; lookups binary search, appends are O(1).
#[derive(Clone, Debug, Default)]
pub struct RunArray<T> {
    values: Vec<T>,
    limits: Vec<usize>,
}

impl<T> RunArray<T> {
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            limits: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            limits: Vec::with_capacity(capacity),
        }
    }

    /// A single run covering `[0, limit)`.
    pub fn single(value: T, limit: usize) -> Self {
        Self {
            values: vec![value],
            limits: vec![limit],
        }
    }

    /// Appends a run ending at `limit`, which must be greater than the
    /// current limit.
    pub fn add(&mut self, limit: usize, value: T) {
        debug_assert!(
            self.limits.last().is_none_or(|last| limit > *last),
            "run limits must be strictly increasing"
        );
        self.values.push(value);
        self.limits.push(limit);
    }

    /// The value covering `index`.
    pub fn value_at(&self, index: usize) -> &T {
        &self.values[self.run_index_at(index)]
    }

    /// Index of the run covering `index`: the first run whose limit is
    /// greater than `index`.
    pub fn run_index_at(&self, index: usize) -> usize {
        self.limits.partition_point(|limit| *limit <= index)
    }

    pub fn run_count(&self) -> usize {
        self.limits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }

    /// The exclusive end of the whole array.
    pub fn limit(&self) -> usize {
        self.limits.last().copied().unwrap_or(0)
    }

    pub fn value_of_run(&self, run_index: usize) -> &T {
        &self.values[run_index]
    }

    pub fn limit_of_run(&self, run_index: usize) -> usize {
        self.limits[run_index]
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn limits(&self) -> &[usize] {
        &self.limits
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.limits.clear();
    }
}

impl<T: Clone> RunArray<T> {
    /// Extracts the runs covering `[offset, offset + length)` into `out`,
    /// with limits re-based onto `[0, length)`.
    pub fn subset(&self, offset: usize, length: usize, out: &mut RunArray<T>) {
        let mut i = 0;
        while i < self.limits.len() && self.limits[i] < offset {
            i += 1;
        }
        while i < self.limits.len() {
            let new_limit = self.limits[i] - offset;
            if new_limit < length {
                out.add(new_limit, self.values[i].clone());
            } else {
                out.add(length, self.values[i].clone());
                break;
            }
            i += 1;
        }
    }
}

/// Builds a [`RunArray`] from LIFO push/pop value scopes, as produced by
/// nested markup tags.
#[derive(Clone, Debug)]
pub struct RunBuilder<T> {
    runs: RunArray<T>,
    stack: Vec<T>,
}

impl<T: Clone> RunBuilder<T> {
    pub fn new(base_value: T) -> Self {
        Self {
            runs: RunArray::new(),
            stack: vec![base_value],
        }
    }

    /// Opens a scope with `value` starting at `limit`.
    pub fn push(&mut self, limit: usize, value: T) {
        if self.runs.limit() < limit {
            let current = self.current_value().clone();
            self.runs.add(limit, current);
        }
        self.stack.push(value);
    }

    /// Closes the innermost scope at `limit`.
    pub fn pop(&mut self, limit: usize) {
        if self.runs.is_empty() || self.runs.limit() < limit {
            let current = self.current_value().clone();
            self.runs.add(limit, current);
        }
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    pub fn current_value(&self) -> &T {
        self.stack.last().expect("run builder stack is never empty")
    }

    pub fn base_value(&self) -> &T {
        &self.stack[0]
    }

    /// Number of scopes currently open, not counting the base value.
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    pub fn finish(self) -> RunArray<T> {
        self.runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_covering_run() {
        let mut runs = RunArray::new();
        runs.add(3, 'a');
        runs.add(7, 'b');
        runs.add(8, 'c');
        assert_eq!(runs.limit(), 8);
        for i in 0..3 {
            assert_eq!(*runs.value_at(i), 'a');
        }
        for i in 3..7 {
            assert_eq!(*runs.value_at(i), 'b');
        }
        assert_eq!(*runs.value_at(7), 'c');
    }

    #[test]
    fn limits_strictly_increase() {
        let mut runs = RunArray::new();
        runs.add(3, 1);
        runs.add(9, 2);
        assert!(runs.limits().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn subset_rebases_limits() {
        let mut runs = RunArray::new();
        runs.add(4, 'a');
        runs.add(10, 'b');
        runs.add(16, 'c');

        let mut out = RunArray::new();
        runs.subset(6, 6, &mut out);
        assert_eq!(out.values(), &['b', 'c']);
        assert_eq!(out.limits(), &[4, 6]);

        // A subset entirely within one run yields that single run.
        let mut out = RunArray::new();
        runs.subset(4, 3, &mut out);
        assert_eq!(out.values(), &['b']);
        assert_eq!(out.limits(), &[3]);
    }

    #[test]
    fn builder_scopes_nest() {
        let mut builder = RunBuilder::new(0);
        builder.push(2, 1);
        builder.push(4, 2);
        builder.pop(6);
        builder.pop(8);
        builder.pop(10);
        let runs = builder.finish();
        assert_eq!(runs.values(), &[0, 1, 2, 1, 0]);
        assert_eq!(runs.limits(), &[2, 4, 6, 8, 10]);
    }

    #[test]
    fn builder_skips_empty_scopes() {
        let mut builder = RunBuilder::new('x');
        // Open and close at the same position: no zero-length run emitted.
        builder.push(3, 'y');
        builder.pop(3);
        builder.pop(5);
        let runs = builder.finish();
        assert_eq!(runs.values(), &['x', 'x']);
        assert_eq!(runs.limits(), &[3, 5]);
    }
}
