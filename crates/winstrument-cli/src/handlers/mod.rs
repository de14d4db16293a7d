pub mod config;
pub mod output;
pub mod probes;
pub mod run;
