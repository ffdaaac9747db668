pub mod analyses;
pub mod stream;
