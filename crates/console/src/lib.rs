//! `ums-console`: command-line front end over the session manager and the
//! tenant directory.

pub mod app;
pub mod command;
