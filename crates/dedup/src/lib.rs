pub mod store;

pub use store::{Admission, DedupStore};
