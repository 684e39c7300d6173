pub mod array;
pub mod dtype;
pub mod error;
pub mod init;
pub mod scalar;
pub mod shape;
