mod server;

pub use server::start_api_server;
