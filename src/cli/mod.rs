pub mod capture;
pub mod refresh;
pub mod status;
