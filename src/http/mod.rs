pub mod client;
pub mod crypto;
pub mod http_method;
pub mod http_query;
pub mod http_request;
pub mod http_response;
pub mod http_status;
pub mod mime;
pub mod server;
pub mod server_vars;

#[cfg(test)]
mod test;
