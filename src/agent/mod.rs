//! Booster agent access: wire contract, ubus transport, scripted stand-in.

pub mod mock;
pub mod rpc;
pub mod ubus;
