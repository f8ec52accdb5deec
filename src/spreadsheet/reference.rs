//! A1-style cell reference conversions. All indexes are 0-based.

/// Converts a column name (`A`, `Z`, `AA`) to its index.
pub(crate) fn col_to_index(name: &str) -> Option<usize> {
    if name.is_empty() {
        return None;
    }
    name.bytes()
        .try_fold(0usize, |index, byte| {
            if byte.is_ascii_alphabetic() {
                let digit = (byte.to_ascii_uppercase() - b'A') as usize + 1;
                index.checked_mul(26)?.checked_add(digit)
            } else {
                None
            }
        })
        .map(|index| index - 1)
}

/// Converts a 1-based row number (`"1"`) to its index.
pub(crate) fn row_to_index(number: &str) -> Option<usize> {
    number.parse::<usize>().ok()?.checked_sub(1)
}

/// Splits a reference such as `B3` into `(row, col)`.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.trim_start_matches('$');
    let split = reference.find(|c: char| !c.is_ascii_alphabetic())?;
    let (col, row) = reference.split_at(split);
    let row = row.trim_start_matches('$');
    Some((row_to_index(row)?, col_to_index(col)?))
}

pub(crate) fn index_to_col(col: usize) -> String {
    let mut name = Vec::new();
    let mut col = col + 1;
    while col > 0 {
        col -= 1;
        name.push(b'A' + (col % 26) as u8);
        col /= 26;
    }
    name.reverse();
    String::from_utf8(name).unwrap_or_default()
}

/// Formats `(row, col)` as an A1 reference.
pub(crate) fn index_to_reference(row: usize, col: usize) -> String {
    format!("{}{}", index_to_col(col), row + 1)
}
