pub mod composer;
pub mod fanout;
pub mod model;
pub mod reconcile;
pub mod remote;
pub mod request;
pub mod schedule;
pub mod validation;

#[cfg(test)]
mod testing;
