//! RobotResults2DB: import Robot Framework results into a TestResultWebApp database
//!
//! Parses `output.xml` files, resolves project/version/component information
//! from command line, JSON configuration and suite metadata, and writes the
//! execution result, its test files and test cases through a [`store::ResultStore`].

pub mod cli;
pub mod core;
pub mod import;
pub mod robot;
pub mod store;
