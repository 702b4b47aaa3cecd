// Reference block kernels shared by the CPU backend and host-side checks.

use crate::element::Element;

/// `c += a @ b` for row-major `n`x`n` blocks, i-outer, j-middle, k-inner.
///
/// Each output element is summed into a local accumulator before being
/// added to `c`, so `c` is written exactly once per element.
pub fn block_mac_ijk<T: Element>(n: usize, a: &[T], b: &[T], c: &mut [T]) {
    for i in 0..n {
        for j in 0..n {
            let mut sum = T::zero();
            for k in 0..n {
                sum = sum + a[i * n + k] * b[k * n + j];
            }
            c[i * n + j] = c[i * n + j] + sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_into_c() {
        let a = [1.0f64, 2.0, 3.0, 4.0];
        let b = [5.0f64, 6.0, 7.0, 8.0];
        let mut c = [1.0f64; 4];
        block_mac_ijk(2, &a, &b, &mut c);
        assert_eq!(c, [20.0, 23.0, 44.0, 51.0]);
    }
}
