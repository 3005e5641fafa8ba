pub mod gateways;
pub mod telegram;
