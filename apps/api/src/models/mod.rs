pub mod blob;
pub mod feedback;
pub mod resume;
