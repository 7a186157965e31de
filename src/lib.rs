//! Mutation Testing Engine for Rust
//!
//! This library generates mutants of a Rust source file by rewriting its
//! syntax tree, runs the project's test command against each mutant in an
//! isolated copy of the project, and reports which mutants were killed.
//!
//! # Example Configuration
//!
//! ```yaml
//! version: "1.0"
//! source: src/math.rs
//! test_command:
//!   program: cargo
//!   args: [test, --quiet]
//! settings:
//!   timeout_factor: 5.0
//!   disable_operators: [swap_arguments]
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use bugbane::{run_mutation_tests, Catalog, Config, MutationReport};
//! use std::path::Path;
//!
//! let config = Config::load(Path::new("bugbane.yaml")).unwrap();
//! let catalog = Catalog::builtin().unwrap();
//! let run = run_mutation_tests(&config, &catalog).unwrap();
//! let report = MutationReport::new(run);
//! report.print();
//! ```

pub mod codegen;
pub mod config;
pub mod error;
pub mod frontend;
pub mod hom;
pub mod mutator;
pub mod operators;
pub mod report;
pub mod runner;
pub mod sandbox;
pub mod score;
pub mod tree;

// Re-export main types at crate root
pub use codegen::{RustSerializer, Serializer};
pub use config::{Config, Settings, TestCommand};
pub use error::{GenerationError, MutationError, Result, SerializeError};
pub use frontend::{Parser, RustParser};
pub use hom::HomStrategy;
pub use mutator::{GenerationOptions, Generator, MarkerSkip, Mutant, Rewrite, SkipPredicate};
pub use operators::{Catalog, MutationOperator, OperatorSelection};
pub use report::MutationReport;
pub use runner::{
    prepare, run_mutation_tests, run_mutation_tests_with, CancellationToken, MutationRun, Outcome,
    ProcessRunner, TestRunner,
};
pub use score::{OperatorTally, Score, ScoreReport};
pub use tree::{Node, NodeKind, NodePath, SyntaxTree};
