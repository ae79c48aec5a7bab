//! A MARIE assembler and reversible simulator.
//!
//! This is meant to be a general suite to use MARIE assembly
//! (meant as a backend for an educational MARIE simulator).
//!
//! # Usage
//!
//! To convert MARIE source code to a program, it must be assembled:
//! ```
//! use marie_ensemble::asm::{assemble, AssembledProgram};
//!
//! let code = "
//!     ORG 100
//!     Load X
//!     Add Y
//!     Output
//!     Halt
//!     X, DEC 2
//!     Y, HEX 3
//! ";
//! let program: AssembledProgram = assemble(code).unwrap();
//! assert_eq!(program.origin(), 0x100);
//! assert_eq!(program.lookup_label("X"), Some(0x104));
//! ```
//!
//! If the source has errors, every error is reported, each with a line number:
//! ```
//! use marie_ensemble::asm::assemble;
//! use marie_ensemble::err::report;
//!
//! let errs = assemble("Load X\nJump Y\nX, DEC 1").unwrap_err();
//! assert_eq!(errs.len(), 1);
//! assert_eq!(report(&errs[0]), "line 2: Syntax error: Unknown label 'Y'.");
//! ```
//!
//! Once a program has been assembled, it can be executed with the simulator:
//! ```
//! # use marie_ensemble::asm::assemble;
//! # let program = assemble("Halt").unwrap();
//! use marie_ensemble::sim::Simulator;
//! use std::time::Duration;
//!
//! let mut simulator = Simulator::new(Default::default());
//! simulator.load(&program).unwrap();
//! simulator.run(Duration::ZERO);
//! assert!(simulator.halted());
//! ```
//!
//! If more granularity is needed for simulation, there are also micro-step and rewind functions.
//! See the [`sim`] module for more details.
#![warn(missing_docs)]

pub mod parse;
pub mod ast;
pub mod asm;
pub mod sim;
pub mod err;
