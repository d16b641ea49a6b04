pub mod constants;
pub mod error;
pub mod poller;
pub mod socket;
pub mod token;
