pub mod attrition;
pub mod compensation;
pub mod employee;
