pub mod access;
pub mod beam;
pub mod coverage;
pub mod effective;
pub mod flag;
pub mod gaq;
pub mod interval;
