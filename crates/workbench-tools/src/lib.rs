//! Workbench Tools
//!
//! Small standalone utilities that ship with the `workbench` binary:
//!
//! - [`arithmetic`] - two-operand calculators (`calc`, `compute`, `add`)
//! - [`materials`] - a fixed lookup table of materials and tools for common
//!   woodworking projects
//!
//! Every tool validates its whole input before computing anything, so a
//! caller either gets a complete rendered result or a [`ToolError`] whose
//! message can be shown to the user verbatim.
//!
//! # Example
//!
//! ```rust
//! use workbench_tools::arithmetic::Calculation;
//!
//! let calc = Calculation::parse_calc(&["add", "3", "5"]).unwrap();
//! assert_eq!(calc.render_calc().unwrap(), "Result: 8");
//! ```

pub mod arithmetic;
pub mod materials;

pub use arithmetic::{Calculation, Operation};
pub use materials::{Catalog, CatalogEntry, MaterialsRenderer};

use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by the command-line tools.
///
/// The display text of each variant is the exact message printed to the
/// user before the process exits with status 1.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// Wrong number of arguments.
    #[error("Usage: {usage}\nOperations supported: {operations}")]
    Usage {
        /// Invocation synopsis.
        usage: &'static str,
        /// Comma-separated operator names accepted by the tool.
        operations: &'static str,
    },

    /// One or both operands are not finite numbers.
    #[error("{0}")]
    InvalidOperands(&'static str),

    /// Operator name is not recognized.
    #[error("Invalid operation. Use {0}.")]
    InvalidOperation(&'static str),

    /// Division with a zero divisor.
    #[error("Error: Division by zero is not allowed.")]
    DivisionByZero,

    /// The computation overflowed or has no real result.
    #[error("Error: Result is not a finite number.")]
    NonFiniteResult,

    /// No project name was given to the materials lookup.
    #[error("Please provide a project name ({options}). Example:\n  workbench materials shed")]
    MissingProject {
        /// Comma-separated list of known project names.
        options: String,
    },

    /// The requested project is not in the catalog.
    #[error("Sorry, I don't have materials & tools for '{name}'.\nAvailable options: {options}")]
    UnknownProject {
        /// The name that was looked up.
        name: String,
        /// Comma-separated list of known project names.
        options: String,
    },
}

/// Result type for tool operations.
pub type Result<T> = std::result::Result<T, ToolError>;
