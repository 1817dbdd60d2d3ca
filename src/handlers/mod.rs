pub mod ask;
pub mod upload;
