pub mod calibrate;
pub mod review;
pub mod run;
pub mod trust;
