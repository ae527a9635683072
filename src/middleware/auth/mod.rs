pub mod access;

pub use access::apply;
