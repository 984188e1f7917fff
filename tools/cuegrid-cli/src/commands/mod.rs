pub mod devices;
pub mod info;
pub mod init;
pub mod rehearse;
pub mod validate;
