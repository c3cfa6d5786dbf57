pub use jellium::ConfigJellium;

mod jellium;
