//! Cross-module test suites.

mod helpers;
mod procedures;
mod shapes;
