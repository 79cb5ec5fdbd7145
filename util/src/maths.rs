//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Sum all elements of a slice.
pub fn sum<T>(values: &[T]) -> T
where
    T: Float
{
    values.iter().fold(T::zero(), |acc, v| acc + *v)
}

/// Arithmetic mean of the elements of a slice.
///
/// If the slice is empty `None` is returned.
pub fn mean<T>(values: &[T]) -> Option<T>
where
    T: Float
{
    if values.is_empty() {
        return None;
    }

    Some(sum(values) / T::from(values.len())?)
}

/// Arithmetic mean of the absolute values of the elements of a slice.
///
/// If the slice is empty `None` is returned.
pub fn mean_abs<T>(values: &[T]) -> Option<T>
where
    T: Float
{
    if values.is_empty() {
        return None;
    }

    let total = values.iter().fold(T::zero(), |acc, v| acc + v.abs());

    Some(total / T::from(values.len())?)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sum_and_mean() {
        assert_eq!(sum(&[1f64, 2.0, 3.5]), 6.5);
        assert_eq!(sum::<f64>(&[]), 0.0);

        assert_eq!(mean(&[1f64, 2.0, 3.0]), Some(2.0));
        assert_eq!(mean::<f64>(&[]), None);

        assert_eq!(mean_abs(&[-1f64, 2.0, -3.0]), Some(2.0));
        assert_eq!(mean_abs::<f32>(&[]), None);
    }
}
