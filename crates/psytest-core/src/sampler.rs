//! Random selection of questions from a block's pool.
//!
//! Both operations take the RNG as a parameter so callers can seed them.

use rand::Rng;

use crate::error::{Result, TestError};
use crate::model::Question;

/// Draw `quantity` questions uniformly at random without replacement.
///
/// Fails with [`TestError::InsufficientQuestions`] when the pool is smaller
/// than `quantity`; a partially filled block is never returned. The order of
/// the returned questions is unspecified.
pub fn sample<R: Rng + ?Sized>(
    category: &str,
    pool: Vec<Question>,
    quantity: usize,
    rng: &mut R,
) -> Result<Vec<Question>> {
    if pool.len() < quantity {
        return Err(TestError::InsufficientQuestions {
            block: category.to_string(),
            requested: quantity,
            available: pool.len(),
        });
    }

    let mut remaining = pool;
    let mut drawn = Vec::with_capacity(quantity);
    while drawn.len() < quantity {
        let idx = rng.random_range(0..remaining.len());
        drawn.push(remaining.swap_remove(idx));
    }

    tracing::debug!(
        category,
        drawn = drawn.len(),
        left = remaining.len(),
        "sampled block pool"
    );
    Ok(drawn)
}

/// In-place Fisher–Yates shuffle.
///
/// For `i` from the last index down to 1, swap element `i` with a uniformly
/// chosen `j` in `0..=i`. Every permutation is equally likely.
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}
