//! Supporting utilities not central to the three core subsystems.

pub mod erc20_utils;
