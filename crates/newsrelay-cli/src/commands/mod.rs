pub mod check;
pub mod history;
pub mod once;
pub mod run;
