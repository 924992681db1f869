pub mod outbox;
pub mod resolver;

pub use outbox::{Outbox, QueueOutbox};
pub use resolver::{DbResolver, ResolveFlags, Resolver};
