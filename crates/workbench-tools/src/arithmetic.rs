//! Two-operand arithmetic calculators.
//!
//! Three command shapes are supported, each with its own operator vocabulary
//! and output line:
//!
//! | Command   | Arguments                 | Operators                                    | Output                              |
//! |-----------|---------------------------|----------------------------------------------|-------------------------------------|
//! | `calc`    | `<num1> <op> <num2>`      | `add`, `sub`, `mul`, `div`, `exp`            | `Result: 8`                         |
//! | `compute` | `<op> <num1> <num2>`      | `add`, `subtract`, `multiply`, `divide`, `exponent` | `The result of add 3 and 5 is: 8` |
//! | `add`     | `<num1> <num2>`           | -                                            | `3 + 5 = 8`                         |
//!
//! `calc` also accepts the operator in first position (`calc add 3 5`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Result, ToolError};

const CALC_USAGE: &str = "workbench calc <num1> <operation> <num2>";
const CALC_OPERATIONS: &str = "add, sub, mul, div, exp";
const COMPUTE_USAGE: &str = "workbench compute <operation> <num1> <num2>";
const COMPUTE_OPERATIONS: &str = "add, subtract, multiply, divide, exponent";

/// An arithmetic operation on two operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// `a + b`
    Add,
    /// `a - b`
    Subtract,
    /// `a * b`
    Multiply,
    /// `a / b`, rejected when `b` is zero.
    Divide,
    /// `a` raised to the power `b`.
    Exponent,
}

impl Operation {
    /// Parses the abbreviated operator names used by `calc`, case-insensitively.
    #[must_use]
    pub fn from_short_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "add" => Some(Self::Add),
            "sub" => Some(Self::Subtract),
            "mul" => Some(Self::Multiply),
            "div" => Some(Self::Divide),
            "exp" => Some(Self::Exponent),
            _ => None,
        }
    }

    /// Parses the full operator names used by `compute`, case-insensitively.
    #[must_use]
    pub fn from_long_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "add" => Some(Self::Add),
            "subtract" => Some(Self::Subtract),
            "multiply" => Some(Self::Multiply),
            "divide" => Some(Self::Divide),
            "exponent" => Some(Self::Exponent),
            _ => None,
        }
    }

    /// Returns the full operator name.
    #[must_use]
    pub const fn long_name(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
            Self::Exponent => "exponent",
        }
    }

    /// Applies the operation.
    ///
    /// A zero divisor is rejected before dividing, and any non-finite result
    /// (overflow, or a fractional power of a negative base) is rejected too.
    pub fn apply(self, lhs: f64, rhs: f64) -> Result<f64> {
        let value = match self {
            Self::Add => lhs + rhs,
            Self::Subtract => lhs - rhs,
            Self::Multiply => lhs * rhs,
            Self::Divide => {
                if rhs == 0.0 {
                    return Err(ToolError::DivisionByZero);
                }
                lhs / rhs
            }
            Self::Exponent => lhs.powf(rhs),
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(ToolError::NonFiniteResult)
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.long_name())
    }
}

/// Parses a single operand. Blank and non-finite input is rejected.
#[must_use]
pub fn parse_operand(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// A validated two-operand calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calculation {
    /// Left operand.
    pub lhs: f64,
    /// Operation to apply.
    pub op: Operation,
    /// Right operand.
    pub rhs: f64,
}

impl Calculation {
    /// Creates a calculation from already-parsed parts.
    #[must_use]
    pub const fn new(lhs: f64, op: Operation, rhs: f64) -> Self {
        Self { lhs, op, rhs }
    }

    /// Parses `calc` arguments: `<num1> <op> <num2>` or `<op> <num1> <num2>`.
    ///
    /// Operands are validated before the operator, so `x add 5` reports bad
    /// numbers rather than a bad operator.
    pub fn parse_calc<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let [a, b, c] = args else {
            return Err(ToolError::Usage {
                usage: CALC_USAGE,
                operations: CALC_OPERATIONS,
            });
        };
        let (a, b, c) = (a.as_ref(), b.as_ref(), c.as_ref());

        // Operator-first form is only chosen when the middle slot is not an operator.
        let (op_raw, lhs_raw, rhs_raw) =
            if Operation::from_short_name(b).is_none() && Operation::from_short_name(a).is_some() {
                (a, b, c)
            } else {
                (b, a, c)
            };

        let (Some(lhs), Some(rhs)) = (parse_operand(lhs_raw), parse_operand(rhs_raw)) else {
            return Err(ToolError::InvalidOperands(
                "Both num1 and num2 must be valid numbers.",
            ));
        };

        let op = Operation::from_short_name(op_raw)
            .ok_or(ToolError::InvalidOperation("add, sub, mul, div, or exp"))?;

        Ok(Self::new(lhs, op, rhs))
    }

    /// Parses `compute` arguments: `<op> <num1> <num2>`.
    pub fn parse_compute<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let [op_raw, lhs_raw, rhs_raw] = args else {
            return Err(ToolError::Usage {
                usage: COMPUTE_USAGE,
                operations: COMPUTE_OPERATIONS,
            });
        };

        let (Some(lhs), Some(rhs)) = (
            parse_operand(lhs_raw.as_ref()),
            parse_operand(rhs_raw.as_ref()),
        ) else {
            return Err(ToolError::InvalidOperands("Please enter valid numbers."));
        };

        let op = Operation::from_long_name(op_raw.as_ref()).ok_or(ToolError::InvalidOperation(
            "add, subtract, multiply, divide, or exponent",
        ))?;

        Ok(Self::new(lhs, op, rhs))
    }

    /// Parses `add` arguments: `<num1> <num2>`.
    pub fn parse_sum<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let invalid = ToolError::InvalidOperands("Please provide two valid numbers.");
        let [lhs_raw, rhs_raw] = args else {
            return Err(invalid);
        };
        match (
            parse_operand(lhs_raw.as_ref()),
            parse_operand(rhs_raw.as_ref()),
        ) {
            (Some(lhs), Some(rhs)) => Ok(Self::new(lhs, Operation::Add, rhs)),
            _ => Err(invalid),
        }
    }

    /// Evaluates the calculation.
    pub fn evaluate(&self) -> Result<f64> {
        self.op.apply(self.lhs, self.rhs)
    }

    /// Renders the `calc` output line.
    pub fn render_calc(&self) -> Result<String> {
        Ok(format!("Result: {}", self.evaluate()?))
    }

    /// Renders the `compute` output line.
    pub fn render_compute(&self) -> Result<String> {
        let value = self.evaluate()?;
        Ok(format!(
            "The result of {} {} and {} is: {value}",
            self.op, self.lhs, self.rhs
        ))
    }

    /// Renders the `add` output line.
    pub fn render_sum(&self) -> Result<String> {
        let value = self.evaluate()?;
        Ok(format!("{} + {} = {value}", self.lhs, self.rhs))
    }
}
