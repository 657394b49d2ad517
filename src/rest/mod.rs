pub mod action;
pub mod dispatcher;
pub mod dispatcher_config;
