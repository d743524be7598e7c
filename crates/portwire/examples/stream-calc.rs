//! A calculator served over a Unix stream socket pair.
//!
//! Run with:
//!   cargo run --example stream-calc

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::os::unix::net::UnixStream;

    use portwire::adapter::StreamAdapter;
    use portwire::port::{Arg, Port, PortConfig, RemoteError, RemoteErrorKind, Reply};

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .init();

    let (server_sock, client_sock) = UnixStream::pair()?;
    let server = Port::with_config(
        StreamAdapter::from_unix(server_sock)?,
        PortConfig::labeled("calc-server"),
    )?;
    let client = Port::with_config(
        StreamAdapter::from_unix(client_sock)?,
        PortConfig::labeled("calc-client"),
    )?;

    server.add_handler("divide", |_ctx, args| {
        let mut numbers = args
            .iter()
            .map(|arg| arg.as_value().and_then(|v| v.as_f64()));
        let (Some(Some(a)), Some(Some(b))) = (numbers.next(), numbers.next()) else {
            return Err(RemoteError::new(
                RemoteErrorKind::TypeError,
                "divide takes two numbers",
            ));
        };
        if b == 0.0 {
            return Err(RemoteError::new(
                RemoteErrorKind::RangeError,
                "division by zero",
            ));
        }
        Ok(Reply::now(a / b))
    })?;

    let quotient = client
        .request("divide", vec![Arg::from(22.0), Arg::from(7.0)])?
        .wait()?;
    eprintln!("22 / 7 -> {quotient:?}");

    match client
        .request("divide", vec![Arg::from(1.0), Arg::from(0.0)])?
        .wait()
    {
        Err(error) => eprintln!("1 / 0 -> {error}"),
        Ok(value) => eprintln!("1 / 0 -> unexpected {value:?}"),
    }

    client.destroy();
    server.ended().wait();
    Ok(())
}

#[cfg(not(unix))]
fn main() {
    eprintln!("this example needs unix stream sockets");
}
