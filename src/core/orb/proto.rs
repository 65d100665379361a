// src/core/orb/proto.rs

//! Generated gRPC types and service traits for the orb service, compiled
//! from `proto/orb.proto` by `build.rs`.

pub mod orb {
    tonic::include_proto!("orb");
}
