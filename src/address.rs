use crate::error::{Result, SheetError};

/// Bijective base-26 column label: 0 -> "A", 25 -> "Z", 26 -> "AA".
pub fn column_label(col: u32) -> String {
    let mut col = col as u64 + 1;
    let mut result = Vec::new();
    while col > 0 {
        col -= 1;
        result.push((col % 26) as u8 + b'A');
        col /= 26;
    }
    result.reverse();
    String::from_utf8(result).unwrap_or_default()
}

/// Zero-based column index of a run of column letters (case-insensitive).
pub fn letters_to_col(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut acc: u64 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A' + 1) as u64;
        acc = acc.checked_mul(26)?.checked_add(digit)?;
        if acc - 1 > u32::MAX as u64 {
            return None;
        }
    }
    Some((acc - 1) as u32)
}

/// Parses an A1-style reference such as `"B12"` into a zero-based `(row, col)`.
///
/// Surrounding whitespace is ignored. The letter run must come first and the
/// row number must be a positive integer.
pub fn parse_cell_ref(s: &str) -> Result<(u32, u32)> {
    let invalid = || SheetError::InvalidCellRef(s.to_string());
    let cell_name = s.trim();

    let split = cell_name
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(cell_name.len());
    let (letters, digits) = cell_name.split_at(split);

    if letters.is_empty() || digits.is_empty() {
        return Err(invalid());
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let col = letters_to_col(letters).ok_or_else(invalid)?;
    let row: u64 = digits.parse().map_err(|_| invalid())?;
    if row == 0 || row - 1 > u32::MAX as u64 {
        return Err(invalid());
    }

    Ok(((row - 1) as u32, col))
}

/// A1 name of a zero-based cell, e.g. `(11, 1)` -> `"B12"`.
pub fn cell_name(row: u32, col: u32) -> String {
    format!("{}{}", column_label(col), row as u64 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn labels_follow_spreadsheet_convention() {
        assert_eq!(column_label(0), "A");
        assert_eq!(column_label(25), "Z");
        assert_eq!(column_label(26), "AA");
        assert_eq!(column_label(27), "AB");
        assert_eq!(column_label(701), "ZZ");
        assert_eq!(column_label(702), "AAA");
        assert_eq!(column_label(18277), "ZZZ");
    }

    #[test]
    fn parses_simple_and_lowercase_refs() {
        assert_eq!(parse_cell_ref("A1").unwrap(), (0, 0));
        assert_eq!(parse_cell_ref("B12").unwrap(), (11, 1));
        assert_eq!(parse_cell_ref("ab3").unwrap(), (2, 27));
        assert_eq!(parse_cell_ref("  C7 ").unwrap(), (6, 2));
    }

    #[test]
    fn rejects_malformed_refs() {
        for bad in ["", "A", "12", "A0", "1A", "A1B", "A-1", "A 1", "Ä1", "A1.5"] {
            assert!(parse_cell_ref(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn rejects_overflowing_refs() {
        assert!(parse_cell_ref("A99999999999").is_err());
        assert!(parse_cell_ref("ZZZZZZZZ1").is_err());
    }

    #[test]
    fn cell_name_is_one_based() {
        assert_eq!(cell_name(0, 0), "A1");
        assert_eq!(cell_name(11, 1), "B12");
    }

    proptest! {
        #[test]
        fn label_then_parse_round_trips(row in 0u32..1_000_000, col in 0u32..100_000) {
            let reference = format!("{}{}", column_label(col), row + 1);
            prop_assert_eq!(parse_cell_ref(&reference).unwrap(), (row, col));
        }
    }
}
