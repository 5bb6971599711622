//! Operator kinds of binary nodes.

use std::fmt;

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    /// Exponentiation (`^`).
    Pow,
}

impl ArithmeticOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "/",
            ArithmeticOp::Mod => "%",
            ArithmeticOp::Pow => "^",
        }
    }
}

/// Short-circuit logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn symbol(self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
        }
    }
}

/// Ordering operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationalOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl RelationalOp {
    pub fn symbol(self) -> &'static str {
        match self {
            RelationalOp::Lt => "<",
            RelationalOp::Le => "<=",
            RelationalOp::Gt => ">",
            RelationalOp::Ge => ">=",
        }
    }

    /// The relation with its operands swapped: `a < b` iff `b > a`.
    pub fn invert(self) -> Self {
        match self {
            RelationalOp::Lt => RelationalOp::Gt,
            RelationalOp::Le => RelationalOp::Ge,
            RelationalOp::Gt => RelationalOp::Lt,
            RelationalOp::Ge => RelationalOp::Le,
        }
    }
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for RelationalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invert_swaps_direction_and_keeps_strictness() {
        assert_eq!(RelationalOp::Lt.invert(), RelationalOp::Gt);
        assert_eq!(RelationalOp::Ge.invert(), RelationalOp::Le);
        for op in [RelationalOp::Lt, RelationalOp::Le, RelationalOp::Gt, RelationalOp::Ge] {
            assert_eq!(op.invert().invert(), op);
        }
    }
}
