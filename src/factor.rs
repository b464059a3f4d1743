//! Factorization of process counts into grid shapes

use crate::types::{GridError, Result};

/// Find the height of the most square grid with `num_procs` processes.
///
/// This is the largest divisor of `num_procs` that does not exceed its square root,
/// so a prime process count gives a `1 x num_procs` grid.
pub fn find_factor(num_procs: usize) -> Result<usize> {
    if num_procs == 0 {
        return Err(GridError::InvalidArgument(
            "cannot factor a grid with zero processes".to_string(),
        ));
    }
    let mut factor = num::integer::sqrt(num_procs);
    while num_procs % factor != 0 {
        factor -= 1;
    }
    Ok(factor)
}

/// Greatest common divisor of a grid height and width.
pub fn gcd(height: usize, width: usize) -> usize {
    num::integer::gcd(height, width)
}

/// Least common multiple of a grid height and width.
pub fn lcm(height: usize, width: usize) -> usize {
    num::integer::lcm(height, width)
}

#[cfg(test)]
mod test {
    use super::*;
    use paste::paste;

    macro_rules! test_factor {
        ($(($procs:literal, $height:literal)),+) => {
        $(
            paste! {
                #[test]
                fn [<test_find_factor_ $procs>]() {
                    let height = find_factor($procs).unwrap();
                    assert_eq!(height, $height);
                    assert_eq!($procs % height, 0);
                }
            }
        )*
        };
    }

    test_factor!(
        (1, 1),
        (2, 1),
        (4, 2),
        (6, 2),
        (7, 1),
        (12, 3),
        (16, 4),
        (18, 3),
        (36, 6),
        (97, 1),
        (1000, 25)
    );

    #[test]
    fn test_find_factor_zero() {
        assert!(matches!(
            find_factor(0),
            Err(GridError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_find_factor_is_largest_divisor_below_root() {
        for n in 1..2000usize {
            let factor = find_factor(n).unwrap();
            assert_eq!(n % factor, 0);
            assert!(factor * factor <= n);
            for d in factor + 1..=n {
                if d * d > n {
                    break;
                }
                assert_ne!(n % d, 0, "{d} divides {n} and is larger than {factor}");
            }
        }
    }

    #[test]
    fn test_gcd_lcm_product() {
        for height in 1..40 {
            for width in 1..40 {
                assert_eq!(gcd(height, width) * lcm(height, width), height * width);
            }
        }
    }
}
