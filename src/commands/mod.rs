//! CLI command implementations for bamsort.
//!
//! Each submodule implements a specific command; [`sort`] is the coordinate
//! sort itself, [`common`] holds shared argument structures.

// Blanket clippy pedantic allows for command implementations.
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::uninlined_format_args
)]

pub mod command;
pub mod common;
pub mod sort;
