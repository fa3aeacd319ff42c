use std::io::Write as _;

use gateway_client::messages::BlockDelta;
use gateway_client::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    init_tracing();
    let client = GatewayClient::from_env()?;
    let model = std::env::var("GATEWAY_MESSAGES_MODEL")
        .unwrap_or_else(|_| "anthropic/claude-3-5-haiku".into());

    let request = MessagesRequest::new(
        model,
        1024,
        vec![InputMessage::user("Why is the sky blue?")],
    )
    .system("Answer in two sentences.");

    let handle = AbortHandle::new();
    let ctrl_c = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.abort();
        }
    });

    let mut stream = client
        .stream_messages(request, CallOptions::default().abort_signal(handle.signal()))
        .await?;
    while let Some(event) = stream.next().await {
        match event {
            Ok(BlockStreamEvent::ContentBlockDelta { delta, .. }) => match delta {
                BlockDelta::TextDelta { text } => print!("{text}"),
                BlockDelta::ThinkingDelta { thinking } => eprint!("{thinking}"),
                _ => {}
            },
            Ok(BlockStreamEvent::MessageDelta { delta, .. }) => {
                if let Some(reason) = delta.stop_reason {
                    eprintln!("\n[stop: {reason}]");
                }
            }
            Ok(_) => {}
            Err(ClientError::Cancelled) => {
                eprintln!("\n[cancelled]");
                break;
            }
            Err(err) => return Err(err),
        }
        let _ = std::io::stdout().flush();
    }
    println!();
    Ok(())
}
