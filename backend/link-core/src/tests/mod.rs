mod backup;
mod channel;
mod network;
mod peer;
mod rpc;
mod status;
mod wire;
