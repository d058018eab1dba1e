mod backup;
mod channel;
mod config;
mod discovery;
mod error;
mod helpers;
mod peer;
mod rpc;
mod session;
