//! Internal testing utilities for the qpack crates.

use std::fmt::Debug;
use std::panic::RefUnwindSafe;

/// Utility for creating parametrized (aka. table-driven) tests.
///
/// Create a `Debug` struct, conventionally named `Case`, holding the data for
/// one case, build a collection of cases and call `test_each` with the test
/// function. Every case is run, panics are caught, and if any case failed
/// `test_each` panics with the count and debug representations of the
/// failing cases.
///
/// ## Example
///
/// ```
/// use qpack_testing::TestCases;
///
/// // Add #[test] attribute
/// fn test_pad_depth() {
///   #[derive(Debug)]
///   struct Case {
///     depth: usize,
///     expected: usize,
///   }
///
///   let cases = [
///     Case { depth: 1, expected: 16 },
///     Case { depth: 16, expected: 16 },
///     Case { depth: 17, expected: 32 },
///   ];
///
///   cases.test_each(|&Case { depth, expected }| {
///     assert_eq!(depth.next_multiple_of(16), expected);
///   });
/// }
/// # test_pad_depth();
/// ```
///
/// ## Unwind safety
///
/// Test cases and values captured by the test function must be
/// [unwind safe](https://doc.rust-lang.org/std/panic/fn.catch_unwind.html).
/// Values created within the test function have no such restriction, so the
/// usual fix is to describe a complex value in the case and build it inside
/// the test function.
pub trait TestCases {
    /// The data for a single test case.
    type Case;

    /// Call test function `test` with each test case in `self`, catching any panics.
    ///
    /// After all cases have been evaluated, return if no panics occurred or
    /// panic with details of failing cases otherwise.
    fn test_each(self, test: impl Fn(&Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe;
}

impl<I: IntoIterator> TestCases for I {
    type Case = I::Item;

    fn test_each(self, test: impl Fn(&I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe,
    {
        let mut failures = Vec::new();
        for case in self {
            if std::panic::catch_unwind(|| {
                test(&case);
            })
            .is_err()
            {
                failures.push(case);
            }
        }
        assert_failures(&failures);
    }
}

fn assert_failures<T: Debug>(failures: &[T]) {
    assert_eq!(
        failures.len(),
        0,
        "{} test cases failed: {:?}",
        failures.len(),
        failures
    );
}

/// Return `len` bytes generated from a fixed seed.
///
/// Using a fixed seed keeps failures reproducible.
pub fn random_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = fastrand::Rng::with_seed(seed);
    std::iter::repeat_with(|| rng.u8(..)).take(len).collect()
}

/// Return `len` signed bytes generated from a fixed seed.
pub fn random_i8(seed: u64, len: usize) -> Vec<i8> {
    let mut rng = fastrand::Rng::with_seed(seed);
    std::iter::repeat_with(|| rng.i8(..)).take(len).collect()
}

/// Return the sum of each of `lines` lines of `line_len` bytes, where lines
/// start `stride` bytes apart.
pub fn line_sums(data: &[u8], lines: usize, line_len: usize, stride: usize) -> Vec<i32> {
    (0..lines)
        .map(|i| {
            data[i * stride..i * stride + line_len]
                .iter()
                .map(|&x| x as i32)
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{line_sums, random_bytes, random_i8, TestCases};

    #[test]
    fn test_test_cases_success() {
        #[derive(Debug)]
        struct Case {
            x: i32,
        }

        let cases = [Case { x: 1 }, Case { x: 2 }];
        cases.test_each(|case| _ = case.x);
    }

    #[test]
    #[should_panic(expected = "2 test cases failed")]
    fn test_test_each_failure() {
        #[derive(Debug)]
        struct Case {
            x: i32,
        }

        let cases = [Case { x: 1 }, Case { x: 2 }];
        cases.test_each(|case| {
            _ = case.x;
            panic!("oh no");
        })
    }

    #[test]
    #[should_panic(expected = "1 test cases failed")]
    fn test_test_each_partial_failure() {
        #[derive(Debug)]
        struct Case {
            x: i32,
        }

        let cases = [Case { x: 1 }, Case { x: 2 }];
        cases.test_each(|case| {
            assert_eq!(case.x, 1);
        })
    }

    #[test]
    fn test_random_bytes() {
        assert_eq!(random_bytes(1234, 64), random_bytes(1234, 64));
        assert_ne!(random_bytes(1234, 64), random_bytes(4321, 64));
        assert_eq!(random_i8(5, 10).len(), 10);
    }

    #[test]
    fn test_line_sums() {
        let data: Vec<u8> = (0..12).collect();
        assert_eq!(line_sums(&data, 3, 2, 4), vec![1, 9, 17]);
    }
}
