pub mod config;
pub mod integrals;
pub mod jellium;
pub mod symmetry;
pub mod tensor;
pub mod testing;
