pub mod helpers;

pub mod samp;
