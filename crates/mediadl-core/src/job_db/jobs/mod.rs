//! Job CRUD split by concern: reads, lifecycle writes, and the claim.

mod claim;
mod read;
mod write;
