pub mod activity;
pub mod observers;
