//! The reference problem: squaring integers slowly on remote workers.
//!
//! Payloads are arbitrary-precision integers. The distributor side uses
//! [`RandomSquares`] as its work source; the worker side runs
//! [`square_slowly`] from the `slowsquare-app` binary.

use num_bigint::{BigInt, Sign, TryFromBigIntError};
use rand::Rng;
use std::ops::Range;
use std::time::Duration;

use crate::codec::Payload;
use crate::queue::WorkSource;

impl Payload for BigInt {
    /// One second per unit plus one, as the worker sleeps once per addition.
    fn estimated_duration(&self) -> u64 {
        match u64::try_from(self.magnitude()) {
            Ok(n) => n.saturating_add(1),
            Err(_) => u64::MAX,
        }
    }
}

/// Generates one random integer whenever the unsent bag runs dry.
#[derive(Debug, Clone)]
pub struct RandomSquares {
    range: Range<u64>,
}

impl RandomSquares {
    pub fn new(range: Range<u64>) -> Self {
        Self { range }
    }
}

impl Default for RandomSquares {
    fn default() -> Self {
        Self::new(1..20)
    }
}

impl WorkSource for RandomSquares {
    type Payload = BigInt;

    fn generate(&mut self) -> Vec<BigInt> {
        if self.range.is_empty() {
            return Vec::new();
        }
        let n = rand::thread_rng().gen_range(self.range.clone());
        vec![BigInt::from(n)]
    }
}

/// Square `n` by repeated addition, reporting progress after each step.
///
/// `progress` receives `(step, total)`, starting with `(0, total)`.
/// Negative inputs are squared through their magnitude.
pub fn square_slowly(
    n: &BigInt,
    step_delay: Duration,
    mut progress: impl FnMut(u64, u64),
) -> Result<BigInt, TryFromBigIntError<()>> {
    let total = u64::try_from(n.magnitude())?;
    let magnitude = BigInt::from_biguint(Sign::Plus, n.magnitude().clone());

    progress(0, total);
    let mut output = BigInt::from(0u32);
    for step in 1..=total {
        output += &magnitude;
        if !step_delay.is_zero() {
            std::thread::sleep(step_delay);
        }
        progress(step, total);
    }
    Ok(output)
}
