pub mod archive;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod index;
pub mod jdx;
pub mod output;
pub mod sdf;
pub mod store;
pub mod tabulate;
pub mod webbook;
