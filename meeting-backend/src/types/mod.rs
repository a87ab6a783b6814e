pub mod config_field;
pub mod descriptor;
pub mod meeting;
pub mod recording;
