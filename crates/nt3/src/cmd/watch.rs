use nt3_pipeline::{Client, ClientConfig, EntryTable, LoopExit};
use nt3_transport::{with_default_port, TransportConfig};
use tracing::{debug, info, warn};

use crate::cmd::{parse_duration, WatchArgs};
use crate::exit::{client_error, pipeline_error, CliResult, SUCCESS};
use crate::output::{print_entries, print_event, print_hello, OutputFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Count,
    Interrupted,
    Disconnected,
}

pub async fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.handshake_timeout)?;
    let addr = with_default_port(&args.addr);

    let config = ClientConfig {
        transport: TransportConfig {
            connect_timeout: timeout,
            ..TransportConfig::default()
        },
        handshake_timeout: timeout,
        ..ClientConfig::default()
    };

    let mut client = Client::connect(addr.as_str(), config)
        .await
        .map_err(|err| client_error("connect failed", err))?;
    let hello = match client.handshake().await {
        Ok(hello) => hello,
        Err(err) => {
            client.abort().await;
            return Err(client_error("handshake failed", err));
        }
    };

    let peer = client
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or(addr);
    let mut table = EntryTable::from_entries(hello.entries.iter().cloned());
    if !args.table {
        print_hello(&hello, &peer, format);
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut received = 0usize;
    let stop = loop {
        if args.count.is_some_and(|count| received >= count) {
            break Stop::Count;
        }
        tokio::select! {
            signal = &mut ctrl_c => {
                if let Err(err) = signal {
                    warn!(error = %err, "signal handler failed");
                }
                break Stop::Interrupted;
            }
            event = client.recv() => match event {
                Some(event) => {
                    table.apply(&event);
                    if !args.table {
                        print_event(&event, format);
                    }
                    received = received.saturating_add(1);
                }
                None => break Stop::Disconnected,
            },
        }
    };
    debug!(?stop, received, "watch stopping");

    let report = client.close().await;
    if args.table {
        print_entries(&table, format);
    }

    match report.decode {
        LoopExit::Failed(err) => return Err(pipeline_error("connection failed", err)),
        LoopExit::Cancelled | LoopExit::Completed => {}
    }
    if let LoopExit::Failed(err) = report.encode {
        warn!(error = %err, "request stream ended with an error");
    }

    if stop == Stop::Disconnected {
        info!(peer = %peer, "server closed the connection");
    }
    Ok(SUCCESS)
}
