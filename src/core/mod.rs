pub mod engine;
pub mod flow;
pub mod lint;
pub mod state;
