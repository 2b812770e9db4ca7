pub mod mif2;
pub mod pfilter;
pub mod replicate;
pub mod search;
