// stats.rs
// Description: Descriptive statistics helpers (average, value search, quartiles).
// History:
// - 2026-10-06: Add average, find_all and quartiles.

use crate::error::{MlpError, Result};

pub fn average(data: &[f64]) -> Result<f64> {
    if data.is_empty() {
        return Err(MlpError::EmptyInput("average_data"));
    }
    Ok(data.iter().sum::<f64>() / data.len() as f64)
}

/// Indexes of every element equal to `value`.
pub fn find_all<T: PartialEq>(data: &[T], value: &T) -> Vec<usize> {
    data.iter()
        .enumerate()
        .filter(|(_, d)| *d == value)
        .map(|(i, _)| i)
        .collect()
}

fn median_sorted(v_sorted: &[f64]) -> f64 {
    let i_n = v_sorted.len();
    let i_mid = i_n / 2;
    if i_n % 2 == 1 {
        v_sorted[i_mid]
    } else {
        (v_sorted[i_mid - 1] + v_sorted[i_mid]) / 2.0
    }
}

/// First, second and third quartile.
///
/// With fewer than three values the result is `(d0 - 1, d0, d0 + 1)` where `d0` is the first
/// value as given. Otherwise q2 is the median and q1/q3 are the medians of the lower and upper
/// halves; for odd lengths the middle value belongs to neither half. For even lengths with an
/// odd half (6, 10, 14, ...) q1 is the true lower-half median, not the element a plain
/// `n / 4` index lookup would return.
pub fn quartiles(data: &[f64]) -> Result<(f64, f64, f64)> {
    let d_first = *data.first().ok_or(MlpError::EmptyInput("quartile_data"))?;
    if data.iter().any(|d| d.is_nan()) {
        return Err(MlpError::invalid_parameter("quartile_data_contains_nan"));
    }

    if data.len() < 3 {
        return Ok((d_first - 1.0, d_first, d_first + 1.0));
    }

    let mut v_sorted = data.to_vec();
    v_sorted.sort_by(f64::total_cmp);

    let i_half = v_sorted.len() / 2;
    let q1 = median_sorted(&v_sorted[..i_half]);
    let q2 = median_sorted(&v_sorted);
    let q3 = median_sorted(&v_sorted[v_sorted.len() - i_half..]);

    Ok((q1, q2, q3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_average() {
        assert_eq!(average(&[1.0, 2.0, 6.0]).unwrap(), 3.0);
        assert!(average(&[]).is_err());
    }

    #[test]
    fn test_find_all() {
        assert_eq!(find_all(&[1, 3, 1, 2, 1], &1), vec![0, 2, 4]);
        assert!(find_all(&[1.5, 2.5], &0.0).is_empty());
        assert_eq!(find_all(&["a", "b", "a"], &"a"), vec![0, 2]);
    }

    #[test]
    fn test_quartiles_odd_lengths() {
        assert_eq!(quartiles(&[7.0, 1.0, 3.0, 5.0, 2.0, 6.0, 4.0]).unwrap(), (2.0, 4.0, 6.0));
        assert_eq!(quartiles(&[5.0, 1.0, 3.0, 2.0, 4.0]).unwrap(), (1.5, 3.0, 4.5));
        assert_eq!(quartiles(&[3.0, 1.0, 2.0]).unwrap(), (1.0, 2.0, 3.0));
    }

    #[test]
    fn test_quartiles_even_lengths() {
        assert_eq!(quartiles(&[4.0, 3.0, 2.0, 1.0]).unwrap(), (1.5, 2.5, 3.5));
        assert_eq!(quartiles(&[6.0, 5.0, 4.0, 3.0, 2.0, 1.0]).unwrap(), (2.0, 3.5, 5.0));
        assert_eq!(
            quartiles(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]).unwrap(),
            (2.5, 4.5, 6.5)
        );
    }

    #[test]
    fn test_quartiles_short_input_uses_first_value() {
        assert_eq!(quartiles(&[4.0]).unwrap(), (3.0, 4.0, 5.0));
        assert_eq!(quartiles(&[9.0, 2.0]).unwrap(), (8.0, 9.0, 10.0));
    }

    #[test]
    fn test_quartiles_rejects_empty_and_nan() {
        assert!(quartiles(&[]).is_err());
        assert!(quartiles(&[1.0, f64::NAN, 3.0]).is_err());
    }
}
