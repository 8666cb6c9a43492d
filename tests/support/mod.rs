pub mod imgur_mock;
pub mod socket_guard;
