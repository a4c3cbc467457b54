pub mod csv;
#[cfg(feature = "pdf-export")]
pub mod pdf;
pub mod report;
