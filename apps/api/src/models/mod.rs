pub mod applicant;
pub mod catalog;
