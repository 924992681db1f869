pub mod request;
pub mod router;
pub mod writer;

pub use request::{Request, SigningKey};
pub use router::{RouteFlags, Router};
pub use writer::Writer;
