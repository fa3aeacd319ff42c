use std::io::Write as _;

use gateway_client::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    init_tracing();
    let client = GatewayClient::from_env()?;
    let model =
        std::env::var("GATEWAY_CHAT_MODEL").unwrap_or_else(|_| "openai/gpt-4o-mini".into());

    let request = ChatCompletionRequest::new(
        model,
        vec![
            ChatMessage::system("Answer briefly."),
            ChatMessage::user("Stream a short greeting."),
        ],
    )
    .max_tokens(128);

    let mut stream = client.stream_chat(request, CallOptions::default()).await?;
    eprintln!("request id: {}", stream.request_id());
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if let Some(text) = chunk.text() {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
        if let Some(usage) = chunk.usage {
            eprintln!("\n[{} tokens]", usage.total_tokens);
        }
    }
    println!();
    Ok(())
}
