pub mod action;
pub mod graph;
pub mod passage;
pub mod value;
