/// Floating point type used throughout system
pub type Real = f64;

/// Largest absolute element-wise difference between two equally sized slices.
pub fn max_abs_diff(a: &[Real], b: &[Real]) -> Real {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, Real::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_abs_diff_picks_largest() {
        assert_eq!(max_abs_diff(&[1.0, 2.0, 3.0], &[1.0, 2.5, 2.0]), 1.0);
        assert_eq!(max_abs_diff(&[], &[]), 0.0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn max_abs_diff_is_symmetric(v in prop::collection::vec((-1.0e6_f64..1.0e6, -1.0e6_f64..1.0e6), 0..32)) {
            let (a, b): (Vec<Real>, Vec<Real>) = v.into_iter().unzip();
            prop_assert_eq!(max_abs_diff(&a, &b), max_abs_diff(&b, &a));
            prop_assert_eq!(max_abs_diff(&a, &a), 0.0);
        }
    }
}
