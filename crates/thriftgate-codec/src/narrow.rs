//! Two's-complement narrowing used by the integer coercions.
//!
//! Values wider than the declared type keep their low-order bits, so 300
//! stored in a byte reads back as 44 and -129 as 127.

#[expect(
    clippy::cast_possible_truncation,
    reason = "wrapping to the declared width is the documented coercion"
)]
pub(crate) const fn to_i8(value: i64) -> i8 {
    value as i8
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "wrapping to the declared width is the documented coercion"
)]
pub(crate) const fn to_i16(value: i64) -> i16 {
    value as i16
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "wrapping to the declared width is the documented coercion"
)]
pub(crate) const fn to_i32(value: i64) -> i32 {
    value as i32
}

#[expect(
    clippy::cast_possible_wrap,
    reason = "unsigned values above i64::MAX wrap like any other overflow"
)]
pub(crate) const fn u64_to_i64(value: u64) -> i64 {
    value as i64
}

/// Truncates toward zero, saturating at the `i64` bounds.
#[expect(
    clippy::cast_possible_truncation,
    reason = "float to integer casts saturate and truncate toward zero"
)]
pub(crate) const fn f64_to_i64(value: f64) -> i64 {
    value as i64
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(300, 44)]
    #[case(-129, 127)]
    #[case(127, 127)]
    #[case(255, -1)]
    fn bytes_wrap(#[case] input: i64, #[case] expected: i8) {
        assert_eq!(to_i8(input), expected);
    }

    #[rstest]
    #[case(70_000, 4_464)]
    #[case(-32_769, 32_767)]
    fn shorts_wrap(#[case] input: i64, #[case] expected: i16) {
        assert_eq!(to_i16(input), expected);
    }

    #[test]
    fn ints_wrap() {
        assert_eq!(to_i32(i64::from(i32::MAX) + 1), i32::MIN);
    }

    #[rstest]
    #[case(2.9, 2)]
    #[case(-2.9, -2)]
    #[case(1e300, i64::MAX)]
    fn floats_truncate_toward_zero(#[case] input: f64, #[case] expected: i64) {
        assert_eq!(f64_to_i64(input), expected);
    }
}
