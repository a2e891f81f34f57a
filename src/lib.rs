#[macro_use]
extern crate failure;
extern crate itertools;
#[macro_use]
extern crate log;

pub mod machine;
pub mod repair;
