#![allow(non_snake_case)]
pub mod group_structures;
pub mod iotools;
pub mod polynomial_structures;
pub mod vector_operations;
