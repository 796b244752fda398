mod gll;
mod rmc;
mod zda;

pub use gll::*;
pub use rmc::*;
pub use zda::*;
