#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Keeps frpc agents running for `Client` resources and their config in
//! step with the `Proxy` resources that reference them.

pub use frpc_controller_core as core;
pub use frpc_controller_k8s_api as k8s;
pub use frpc_controller_k8s_builder as builder;

mod args;
mod client;
mod controller;
pub mod converge;
mod metrics;
mod proxy;
mod reconcile;
pub mod store;


pub use self::{
    args::Args,
    metrics::ReconcileMetrics,
    reconcile::{Error, Reconciled, Reconciler},
    store::{KubeStore, Store, StoreError},
};
