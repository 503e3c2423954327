pub mod messages;
pub mod order;
pub mod round;
