//! A1-style cell addresses

/// Zero-based cell coordinates (row, column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAddress {
    pub row: usize,
    pub col: usize,
}

impl CellAddress {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Convert to Excel-style reference (e.g., "A1")
    pub fn to_a1(&self) -> String {
        format!("{}{}", colname(self.col), self.row + 1)
    }
}

impl std::fmt::Display for CellAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_a1())
    }
}

/// Convert column number to letters (0 -> A, 25 -> Z, 26 -> AA)
pub fn colname(mut col: usize) -> String {
    let mut result = String::new();
    loop {
        result.insert(0, (b'A' + (col % 26) as u8) as char);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    result
}

/// A1 reference for zero-based (row, col)
pub fn cellname(row: usize, col: usize) -> String {
    CellAddress::new(row, col).to_a1()
}
