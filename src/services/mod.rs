// Services module - security helpers shared by the web layer

pub mod access;
pub mod csrf;
pub mod password;
