pub mod bin;
pub mod history;
pub mod location;
pub mod move_request;
pub mod patch;
pub mod shift;
pub mod user;
