mod transform;
mod ty;
mod var;

pub use transform::*;
pub use ty::*;
pub use var::*;
