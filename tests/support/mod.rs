pub mod socket_guard;
pub mod stub;
