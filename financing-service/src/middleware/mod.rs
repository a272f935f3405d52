pub mod owner;

pub use owner::{OwnerContext, OWNER_ID_HEADER};
