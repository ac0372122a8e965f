pub mod http;
pub(crate) mod time;
pub(crate) mod url;
