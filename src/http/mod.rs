pub mod headers;
pub mod req;
pub mod res;

pub use headers::Headers;
pub use req::{extract_tunnel_request, parse_request_line, RequestLine, TunnelRequest};
