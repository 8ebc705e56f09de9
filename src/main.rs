use atrium::client::{parse_message_data, AtriumClient};
use atrium::config::Config;
use atrium::error::{AtriumError, Result};
use clap::Parser;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "atrium")]
#[command(about = "Publish a message onto an atrium channel")]
struct Cli {
    #[arg(long, env = "ATRIUM_CONFIG", help = "Topology file (JSON)")]
    config: String,

    #[arg(long, help = "Target channel (defaults to the ingress channel)")]
    channel: Option<String>,

    #[arg(long = "message-type", default_value = "test")]
    message_type: String,

    #[arg(
        long = "message-data",
        value_delimiter = ',',
        help = "Body fields as name:value pairs, comma separated"
    )]
    message_data: Vec<String>,

    #[arg(
        short = 's',
        long = "stdin",
        default_value_t = false,
        help = "Read the JSON body from stdin"
    )]
    stdin: bool,

    #[arg(
        long,
        default_value_t = false,
        requires = "stdin",
        help = "Publish stdin verbatim instead of wrapping it in an envelope"
    )]
    raw: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,atrium=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let cli = Cli::parse();

    let config = Config::from_file(&cli.config)?;
    let mut client = AtriumClient::from_config(&config).await?;
    if let Some(channel) = cli.channel.clone() {
        client = client.with_channel(channel);
    }

    let receivers = if cli.stdin {
        let mut input = String::new();
        tokio::io::stdin()
            .read_to_string(&mut input)
            .await
            .map_err(|e| AtriumError::Runtime(e.to_string()))?;
        if cli.raw {
            client.publish_raw(input.trim().as_bytes()).await?
        } else {
            let body: Value = serde_json::from_str(&input)
                .map_err(|e| AtriumError::Serialization(e.to_string()))?;
            client.publish(&cli.message_type, body).await?
        }
    } else {
        let body = parse_message_data(&cli.message_data)?;
        client.publish(&cli.message_type, body).await?
    };

    println!("message sent to {receivers} subscribers.");
    Ok(())
}
