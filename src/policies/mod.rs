pub mod constant;
pub mod oracle;
pub mod proportional;
pub mod random;

pub use constant::ConstantPolicy;
pub use oracle::LookaheadOracle;
pub use proportional::ProportionalPolicy;
pub use random::RandomPolicy;
