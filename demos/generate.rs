use genai_relay::{Prompt, Relay, RelayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Write a haiku about retries.".to_owned());

    let relay = Relay::new(RelayConfig::from_env()?);
    let generation = relay.generate(&Prompt::text(prompt)).await?;

    println!("[{} / {}]", generation.provider, generation.model);
    println!("{}", generation.text);

    Ok(())
}
