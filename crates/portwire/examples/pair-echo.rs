//! Two ports talking over an in-process pair.
//!
//! Run with:
//!   cargo run --example pair-echo

use portwire::adapter::pair;
use portwire::port::{Arg, Callback, Port, PortConfig, RemoteError, Reply};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (left, right) = pair();
    let server = Port::with_config(left, PortConfig::labeled("server"))?;
    let client = Port::with_config(right, PortConfig::labeled("client"))?;

    server.add_handler("greet", |_ctx, mut args| {
        let who = args
            .pop()
            .and_then(Arg::into_value)
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| "stranger".to_owned());
        Ok(Reply::now(format!("hello, {who}")))
    })?;

    // Reports progress through a callback argument before replying.
    server.add_handler("count", |_ctx, mut args| {
        let progress = args
            .pop()
            .and_then(Arg::into_callback)
            .ok_or_else(|| RemoteError::generic("count needs a callback"))?;
        for step in 1..=3i64 {
            progress.invoke(vec![Arg::from(step)])?.wait()?;
        }
        Ok(Reply::now("done"))
    })?;

    let greeting = client.request("greet", vec![Arg::from("world")])?.wait()?;
    eprintln!("greet -> {greeting:?}");

    let progress = Callback::new(|args| {
        eprintln!("progress: {:?}", args.first());
        Ok(Arg::null())
    });
    let outcome = client
        .request("count", vec![Arg::from(progress)])?
        .wait()?;
    eprintln!("count -> {outcome:?}");

    client.destroy();
    assert!(server.ended().is_ended());
    Ok(())
}
