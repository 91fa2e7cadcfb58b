//! Command implementations that touch the file system.

pub mod init;
