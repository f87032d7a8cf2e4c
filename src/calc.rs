//! The computations behind the calculator methods, free of any call plumbing.

use crate::error::CalcError;

#[inline]
pub fn sum(a: f64, b: f64) -> f64 {
    a + b
}

pub fn is_prime(n: i64) -> bool {
    if n < 2 {
        return false;
    }
    let mut i = 2;
    while i <= n / i {
        if n % i == 0 {
            return false;
        }
        i += 1;
    }
    true
}

/// Lazily enumerates the primes in `[0, limit]` in ascending order.
#[derive(Debug, Clone)]
pub struct Primes {
    next: i64,
    limit: i64,
}

impl Primes {
    pub fn up_to(limit: i64) -> Self {
        Self { next: 2, limit }
    }
}

impl Iterator for Primes {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        while self.next <= self.limit {
            let n = self.next;
            // limit may be i64::MAX
            self.next = match n.checked_add(1) {
                Some(next) => next,
                None => {
                    self.limit = n - 1;
                    n
                }
            };
            if is_prime(n) {
                return Some(n);
            }
        }
        None
    }
}

/// Running integer average, O(1) in the number of values.
#[derive(Debug, Default, Clone)]
pub struct Average {
    sum: i128,
    count: u64,
}

impl Average {
    #[inline]
    pub fn push(&mut self, value: i64) {
        self.sum += value as i128;
        self.count += 1;
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// `floor(sum / count)`
    pub fn finish(&self) -> Result<i64, CalcError> {
        if self.count == 0 {
            return Err(CalcError::EmptyInput);
        }
        // the mean lies between the smallest and largest value, so it fits
        Ok(self.sum.div_euclid(self.count as i128) as i64)
    }
}

/// Running maximum that reports each strict improvement.
#[derive(Debug, Clone)]
pub struct RunningMax {
    /// `None` stands for negative infinity, so the first value always improves it
    max: Option<i64>,
}

impl RunningMax {
    pub const NEG_INFINITY: Option<i64> = None;

    pub fn new() -> Self {
        Self { max: Self::NEG_INFINITY }
    }

    #[inline]
    pub fn get(&self) -> Option<i64> {
        self.max
    }

    /// Returns the new maximum when `value` is strictly greater than every value seen so far.
    pub fn observe(&mut self, value: i64) -> Option<i64> {
        match self.max {
            Some(max) if value <= max => None,
            _ => {
                self.max = Some(value);
                self.max
            }
        }
    }
}

impl Default for RunningMax {
    fn default() -> Self {
        Self::new()
    }
}
