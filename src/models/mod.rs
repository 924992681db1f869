pub mod actor;
pub mod feed;
pub mod follow;
pub mod note;
pub mod share;

pub use actor::{Actor, ActorType};
pub use feed::FeedRow;
pub use follow::{Follow, FollowState};
pub use note::{Note, PUBLIC_ADDRESS};
pub use share::Share;
