//! Luhn checksum for order numbers.

/// Returns `true` if the last decimal digit of `number` is a valid Luhn
/// check digit for the digits before it.
pub fn is_valid(number: u64) -> bool {
    (number % 10 + u64::from(checksum(number / 10))) % 10 == 0
}

/// Returns the digit that, appended to `payload`, makes it Luhn-valid.
///
/// When the payload checksum is already zero no correction is needed and
/// `0` is returned.
pub fn check_digit(payload: u64) -> u8 {
    match checksum(payload) {
        0 => 0,
        sum => 10 - sum,
    }
}

/// Order numbers are stored as signed integers; only positive,
/// Luhn-valid values are acceptable.
pub fn is_valid_order_number(number: i64) -> bool {
    u64::try_from(number).is_ok_and(|n| n > 0 && is_valid(n))
}

/// Luhn sum (mod 10) of a payload that does not yet carry its check digit,
/// so the rightmost payload digit is the first one doubled.
fn checksum(mut payload: u64) -> u8 {
    let mut sum = 0u64;
    let mut position = 0u32;
    while payload > 0 {
        let mut digit = payload % 10;
        if position % 2 == 0 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
        payload /= 10;
        position += 1;
    }
    (sum % 10) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_numbers() {
        assert!(is_valid(79927398713));
        assert!(!is_valid(79927398710));
        assert!(is_valid(4561261212345467));
        assert!(is_valid(12345678903));
        assert!(!is_valid(12345678901));
    }

    #[test]
    fn test_check_digit() {
        assert_eq!(check_digit(7992739871), 3);
        assert_eq!(check_digit(1234567890), 3);
    }

    #[test]
    fn test_zero_checksum_needs_no_correction() {
        assert_eq!(check_digit(0), 0);
        // 9 doubles to 18 -> 9, plus 1
        assert_eq!(checksum(19), 0);
        assert_eq!(check_digit(19), 0);
        assert!(is_valid(190));
    }

    #[test]
    fn test_order_number_must_be_positive() {
        assert!(is_valid_order_number(79927398713));
        assert!(!is_valid_order_number(0));
        assert!(!is_valid_order_number(-79927398713));
        assert!(!is_valid_order_number(79927398710));
    }

    proptest! {
        #[test]
        fn appending_check_digit_yields_valid_number(payload in 0u64..(u64::MAX / 10 - 9)) {
            let number = payload * 10 + u64::from(check_digit(payload));
            prop_assert!(is_valid(number));
        }

        #[test]
        fn exactly_one_last_digit_is_valid(payload in 0u64..(u64::MAX / 10 - 9)) {
            let valid = (0..10u64).filter(|d| is_valid(payload * 10 + d)).count();
            prop_assert_eq!(valid, 1);
        }
    }
}
