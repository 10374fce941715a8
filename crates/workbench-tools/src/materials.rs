//! Built-in materials and tools catalog for common woodworking projects.
//!
//! This is a static table, not a generator: it answers instantly and works
//! offline, which makes it a useful fallback when the configurator service
//! cannot reach the generation API.
//!
//! # Example
//!
//! ```rust
//! use workbench_tools::{Catalog, MaterialsRenderer};
//!
//! let catalog = Catalog::builtin();
//! let entry = catalog.lookup("Shelf").unwrap();
//! let text = MaterialsRenderer::new(entry).render();
//! assert!(text.starts_with("Materials & Tools for building a shelf:"));
//! ```

use std::fmt::Write;

use serde::Serialize;

use crate::{Result, ToolError};

/// One project in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    /// Lowercase project name used for lookup.
    pub name: &'static str,
    /// Materials needed for the build.
    pub materials: &'static [&'static str],
    /// Tools needed for the build.
    pub tools: &'static [&'static str],
}

const ENTRIES: &[CatalogEntry] = &[
    CatalogEntry {
        name: "shelf",
        materials: &["Shelf board", "Wall anchors", "Screws"],
        tools: &["Drill", "Screwdriver", "Measuring tape", "Level"],
    },
    CatalogEntry {
        name: "shed",
        materials: &[
            "Wood planks",
            "Concrete or wood foundation",
            "Roofing material",
            "Siding",
            "Nails & screws",
        ],
        tools: &["Hammer", "Saw", "Drill", "Measuring tape", "Level", "Ladder"],
    },
    CatalogEntry {
        name: "fence",
        materials: &[
            "Fence posts",
            "Wooden panels or planks",
            "Concrete mix",
            "Nails & screws",
        ],
        tools: &[
            "Shovel",
            "Hammer",
            "Drill",
            "Measuring tape",
            "Level",
            "Post hole digger",
        ],
    },
];

/// Lookup table of known projects.
#[derive(Debug, Clone, Copy)]
pub struct Catalog {
    entries: &'static [CatalogEntry],
}

impl Catalog {
    /// Returns the built-in catalog (`shelf`, `shed`, `fence`).
    #[must_use]
    pub const fn builtin() -> Self {
        Self { entries: ENTRIES }
    }

    /// Returns the project names in catalog order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|e| e.name)
    }

    /// Looks up a project by name, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `ToolError::MissingProject` for blank input and
    /// `ToolError::UnknownProject` when the name is not in the catalog.
    pub fn lookup(&self, name: &str) -> Result<&'static CatalogEntry> {
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return Err(ToolError::MissingProject {
                options: self.options(),
            });
        }

        self.entries
            .iter()
            .find(|e| e.name == wanted)
            .ok_or_else(|| ToolError::UnknownProject {
                name: wanted,
                options: self.options(),
            })
    }

    fn options(&self) -> String {
        self.names().collect::<Vec<_>>().join(", ")
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Renders a catalog entry as the plain-text listing printed by the CLI.
pub struct MaterialsRenderer<'a> {
    entry: &'a CatalogEntry,
}

impl<'a> MaterialsRenderer<'a> {
    /// Creates a renderer for the given entry.
    #[must_use]
    pub const fn new(entry: &'a CatalogEntry) -> Self {
        Self { entry }
    }

    /// Renders the listing without a trailing newline.
    #[must_use]
    pub fn render(&self) -> String {
        let mut output = String::new();

        let _ = writeln!(
            output,
            "Materials & Tools for building a {}:",
            self.entry.name
        );
        let _ = writeln!(output, "---------------------------------------");
        let _ = writeln!(output, "Materials:");
        for item in self.entry.materials {
            let _ = writeln!(output, "- {item}");
        }
        let _ = writeln!(output, "\nTools:");
        for item in self.entry.tools {
            let _ = writeln!(output, "- {item}");
        }

        output.truncate(output.trim_end().len());
        output
    }
}
