//! Static description of the analytical store that natural-language questions are asked against.

pub mod metadata;
