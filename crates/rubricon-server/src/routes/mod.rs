pub mod attempts;
pub mod forms;
pub mod health;
pub mod imports;
pub mod items;
pub mod jobs;
pub mod reports;
pub mod stimuli;
pub mod sub_indicators;
