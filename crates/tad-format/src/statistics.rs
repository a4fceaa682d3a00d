//! Per-component summary statistics over an array's elements.
//!
//! Values are converted to `f64` and only finite ones are counted, so NaN
//! and infinite samples in floating point data do not poison the result.

use serde::Serialize;

use crate::array::Array;

/// Minimum, maximum, sample mean, sample variance and standard deviation of
/// one component.
///
/// All fields are NaN when the component holds no finite value. With a
/// single finite value, variance and deviation are zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComponentStatistics {
    /// Number of finite values the statistics were computed from.
    pub finite_count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub variance: f64,
    pub deviation: f64,
}

impl ComponentStatistics {
    /// Compute statistics from a sequence of values, skipping non-finite ones.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let mut n = 0u64;
        let mut min = f64::MAX;
        let mut max = f64::MIN;
        let mut sum = 0.0;
        let mut sum_of_squares = 0.0;
        for value in values.into_iter().filter(|v| v.is_finite()) {
            n += 1;
            min = min.min(value);
            max = max.max(value);
            sum += value;
            sum_of_squares += value * value;
        }

        if n == 0 {
            return Self {
                finite_count: 0,
                min: f64::NAN,
                max: f64::NAN,
                mean: f64::NAN,
                variance: f64::NAN,
                deviation: f64::NAN,
            };
        }

        let count = n as f64;
        let variance = if n > 1 {
            // Rounding can push this slightly below zero for constant data.
            ((sum_of_squares - sum / count * sum) / (count - 1.0)).max(0.0)
        } else {
            0.0
        };
        Self {
            finite_count: n,
            min,
            max,
            mean: sum / count,
            variance,
            deviation: variance.sqrt(),
        }
    }

    /// Statistics of component `component` across all elements of `array`.
    ///
    /// Returns `None` if `component` is not below the component count.
    pub fn of_component(array: &Array, component: u64) -> Option<Self> {
        if component >= array.component_count() {
            return None;
        }
        let values = (0..array.element_count())
            .filter_map(|linear| array.component_value(linear, component));
        Some(Self::from_values(values))
    }

    /// Statistics for every component, in component order.
    pub fn of_array(array: &Array) -> Vec<Self> {
        (0..array.component_count())
            .filter_map(|c| Self::of_component(array, c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementType;

    #[test]
    fn test_grid_statistics() {
        let array = Array::from_data([2, 2], 1, ElementType::Uint8, vec![10, 20, 30, 40]).unwrap();
        let stats = ComponentStatistics::of_array(&array);
        assert_eq!(stats.len(), 1);
        let s = stats[0];
        assert_eq!(s.finite_count, 4);
        assert_eq!(s.min, 10.0);
        assert_eq!(s.max, 40.0);
        assert_eq!(s.mean, 25.0);
        assert!((s.variance - 500.0 / 3.0).abs() < 1e-9);
        assert!((s.deviation - (500.0f64 / 3.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_components_are_separate() {
        let data: Vec<u8> = [1i16, -100, 2, -200, 3, -300]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        let array = Array::from_data([3], 2, ElementType::Int16, data).unwrap();
        let stats = ComponentStatistics::of_array(&array);
        assert_eq!((stats[0].min, stats[0].max, stats[0].mean), (1.0, 3.0, 2.0));
        assert_eq!(
            (stats[1].min, stats[1].max, stats[1].mean),
            (-300.0, -100.0, -200.0)
        );
        assert_eq!(ComponentStatistics::of_component(&array, 2), None);
    }

    #[test]
    fn test_non_finite_values_are_skipped() {
        let s = ComponentStatistics::from_values([f64::NAN, 4.0, f64::INFINITY]);
        assert_eq!(s.finite_count, 1);
        assert_eq!((s.min, s.max, s.mean), (4.0, 4.0, 4.0));
        assert_eq!((s.variance, s.deviation), (0.0, 0.0));

        let none = ComponentStatistics::from_values([f64::NAN, f64::NEG_INFINITY]);
        assert_eq!(none.finite_count, 0);
        assert!(none.min.is_nan() && none.mean.is_nan() && none.deviation.is_nan());
    }

    #[test]
    fn test_constant_data_has_zero_variance() {
        let s = ComponentStatistics::from_values(std::iter::repeat(0.1).take(1000));
        assert!(s.variance >= 0.0);
        assert!(s.deviation < 1e-6);
    }
}
