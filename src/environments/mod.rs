pub mod cstr;

pub use cstr::Cstr;
