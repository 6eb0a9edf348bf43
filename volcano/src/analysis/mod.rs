pub mod plot;
pub mod volcano;
