//! Demo operations served by `rpc-node serve`.

use anyhow::{anyhow, bail, Result};
use rpc::prelude::*;
use rpc_core::{register_functions, RpcServer};
use std::thread;
use std::time::Duration;

fn echo(args: &Args) -> Result<Value> {
    Ok(json!({ "args": args.positional(), "kwargs": args.named() }))
}

fn fail(args: &Args) -> Result<Value> {
    let reason: Option<String> = args.get_named("reason")?;
    bail!(reason.unwrap_or_else(|| "failed on request".to_string()))
}

pub fn register_all(server: &RpcServer) {
    server.register("add", operation!(|a: f64, b: f64| a + b));
    server.register(
        "sleep",
        operation!(|ms: u64| {
            thread::sleep(Duration::from_millis(ms));
            ms
        }),
    );
    register_functions!(server, echo, fail);

    let registry = server.registry();
    server.register("operations", move |_: &Args| -> Result<Value> {
        let names = registry
            .read()
            .map_err(|_| anyhow!("registry lock poisoned"))?
            .names();
        Ok(json!(names))
    });
}
